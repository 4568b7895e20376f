//! Image loading and rendering support.
//!
//! - [`source`]: classify markdown `src` attributes and resolve cache handles
//! - [`protocol`]: pick a terminal graphics protocol from capabilities
//! - [`loader`]: decode images on worker threads
//! - [`cache`]: byte-budgeted LRU shared with the workers
//!
//! Supported protocols are Kitty, Sixel, iTerm2 and Unicode half-blocks.

mod cache;
mod error;
mod loader;
mod protocol;
mod source;

pub use cache::{ImageCache, byte_size};
pub use error::ImageError;
pub use loader::{ImageLoader, LoadOutcome, LoadRequest, decode};
pub use protocol::{
    ImageProtocol, TerminalCaps, caps_from_env, caps_from_probe, detect_protocol, protocol_for,
};
pub use source::{ImageHandle, ImageSource};

#[cfg(unix)]
use std::time::Duration;

use image::{DynamicImage, Rgba};
use ratatui_image::picker::Picker;
#[cfg(unix)]
use ratatui_image::picker::cap_parser::QueryStdioOptions;

#[cfg(unix)]
const PICKER_QUERY_TIMEOUT_MS: u64 = 250;

/// Images never take more than this share of the document width.
pub const MAX_IMAGE_WIDTH_PERCENT: u32 = 65;

/// Cell size assumed when the terminal does not report one.
pub const DEFAULT_FONT_SIZE: (u16, u16) = (10, 20);

/// Create a picker for terminal image rendering.
///
/// The picker probes the terminal once and chooses the best protocol.
/// `force_half_cell` skips the probe and always renders half-blocks.
pub fn create_picker(force_half_cell: bool) -> Option<Picker> {
    if force_half_cell {
        tracing::debug!("forcing half-block image rendering");
        return Some(Picker::halfblocks());
    }

    // The stdio query can leave a reader thread on the console input buffer
    // on Windows, so skip it there.
    #[cfg(not(unix))]
    {
        return Some(Picker::halfblocks());
    }

    #[cfg(unix)]
    {
        match Picker::from_query_stdio_with_options(query_options()) {
            Ok(picker) => {
                let caps = caps_from_probe(picker.protocol_type());
                tracing::debug!(
                    protocol = %protocol_for(caps),
                    font_size = ?picker.font_size(),
                    "terminal graphics probe"
                );
                Some(picker)
            }
            Err(err) => {
                let fallback = detect_protocol();
                tracing::info!(error = %err, %fallback, "terminal graphics probe failed");
                let mut picker = Picker::halfblocks();
                picker.set_protocol_type(fallback.into());
                Some(picker)
            }
        }
    }
}

/// Widest an image may be, in columns, for a document `layout_width` wide.
pub fn max_image_cols(layout_width: u16) -> u16 {
    let cols = u32::from(layout_width) * MAX_IMAGE_WIDTH_PERCENT / 100;
    u16::try_from(cols).unwrap_or(u16::MAX).max(1)
}

/// Terminal cells an image of `pixels` occupies when scaled to fit `max_cols`.
///
/// Returns `(cols, rows)`. Small images are not upscaled; aspect ratio is
/// preserved using the cell size in pixels.
pub fn cell_size_for(pixels: (u32, u32), max_cols: u16, font_size: (u16, u16)) -> (u16, u16) {
    let (width_px, height_px) = (u64::from(pixels.0.max(1)), u64::from(pixels.1.max(1)));
    let cell_w = u64::from(font_size.0.max(1));
    let cell_h = u64::from(font_size.1.max(1));

    let natural_cols = width_px.div_ceil(cell_w);
    let cols = natural_cols.min(u64::from(max_cols.max(1))).max(1);
    let scaled_height_px = (height_px * cols * cell_w).div_ceil(width_px);
    let rows = scaled_height_px.div_ceil(cell_h).max(1);

    (
        u16::try_from(cols).unwrap_or(u16::MAX),
        u16::try_from(rows).unwrap_or(u16::MAX),
    )
}

/// Whether 24-bit color can be written to the terminal.
///
/// `MARKSIGHT_TRUECOLOR` overrides detection. Apple Terminal advertises
/// nothing reliable and is treated as 256-color.
pub fn supports_truecolor_terminal() -> bool {
    let var = |name| std::env::var(name).ok();
    if let Some(force) = var("MARKSIGHT_TRUECOLOR") {
        return matches!(
            force.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        );
    }
    if var("TERM_PROGRAM").as_deref() == Some("Apple_Terminal") {
        return false;
    }
    env_advertises_truecolor(var("COLORTERM").as_deref(), var("TERM").as_deref())
}

/// Snap every pixel to the xterm color cube, keeping alpha.
pub fn quantize_to_ansi256(image: &DynamicImage) -> DynamicImage {
    let mut rgba = image.to_rgba8();
    for px in rgba.pixels_mut() {
        let Rgba([r, g, b, a]) = *px;
        *px = Rgba([snap_to_cube(r), snap_to_cube(g), snap_to_cube(b), a]);
    }
    DynamicImage::ImageRgba8(rgba)
}

#[cfg(unix)]
fn query_options() -> QueryStdioOptions {
    let mut options = QueryStdioOptions::default();
    options.timeout = Duration::from_millis(PICKER_QUERY_TIMEOUT_MS);
    options
}

fn env_advertises_truecolor(colorterm: Option<&str>, term: Option<&str>) -> bool {
    let mentions = |value: Option<&str>, needles: &[&str]| {
        value.is_some_and(|v| {
            let lower = v.to_ascii_lowercase();
            needles.iter().any(|needle| lower.contains(needle))
        })
    };
    mentions(colorterm, &["truecolor", "24bit"]) || mentions(term, &["direct", "truecolor"])
}

/// Channel intensities of the 6x6x6 xterm cube.
const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

#[allow(clippy::cast_lossless, clippy::cast_possible_truncation)]
const fn cube_index(v: u8) -> u8 {
    // 0..=255 maps onto 0..=5.
    (v as u16 * 5 / 255) as u8
}

const fn snap_to_cube(v: u8) -> u8 {
    CUBE_LEVELS[cube_index(v) as usize]
}

/// Nearest color in the 6x6x6 xterm cube.
pub const fn rgb_to_xterm_256(r: u8, g: u8, b: u8) -> u8 {
    16 + 36 * cube_index(r) + 6 * cube_index(g) + cube_index(b)
}
