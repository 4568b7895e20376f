//! Terminal image surfaces.
//!
//! A surface is a protocol-encoded image sized to the rows the layout
//! reserved for it. Surfaces are built from the shared pixel cache on demand
//! and dropped once their image scrolls well out of view.

use std::collections::HashMap;

use image::imageops::FilterType;
use ratatui::prelude::*;
use ratatui_image::picker::{Picker, ProtocolType};
use ratatui_image::protocol::StatefulProtocol;
use ratatui_image::{CropOptions, Resize, StatefulImage};

use crate::app::Model;
use crate::document::ImageSlot;
use crate::image::{ImageHandle, cell_size_for, max_image_cols};

struct Surface {
    protocol: StatefulProtocol,
    cols: u16,
    rows: u16,
}

/// Render-side image state owned by the event loop.
pub struct ImageSurfaces {
    picker: Option<Picker>,
    entries: HashMap<ImageHandle, Surface>,
}

impl std::fmt::Debug for ImageSurfaces {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageSurfaces")
            .field("has_picker", &self.picker.is_some())
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ImageSurfaces {
    pub fn new(picker: Option<Picker>) -> Self {
        Self {
            picker,
            entries: HashMap::new(),
        }
    }

    /// Whether images can be drawn at all.
    pub const fn has_picker(&self) -> bool {
        self.picker.is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all surfaces so they are rebuilt from the cache.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn retain(&mut self, keep: &[ImageHandle]) {
        self.entries.retain(|handle, _| keep.contains(handle));
    }

    /// Surface for `handle` at `cols`x`rows`, built from the cache if needed.
    fn surface(
        &mut self,
        model: &Model,
        handle: &ImageHandle,
        cols: u16,
        rows: u16,
    ) -> Option<&mut Surface> {
        let stale = self
            .entries
            .get(handle)
            .is_none_or(|s| s.cols != cols || s.rows != rows);
        if stale {
            let picker = self.picker.as_ref()?;
            let pixels = model.images.cache.get(handle)?;
            let font = picker.font_size();
            let halfblocks = matches!(picker.protocol_type(), ProtocolType::Halfblocks);
            let filter = if halfblocks {
                // Nearest-neighbor aliases badly in half-cell mode.
                FilterType::CatmullRom
            } else {
                FilterType::Nearest
            };
            let mut scaled = pixels.resize(
                u32::from(cols) * u32::from(font.0),
                u32::from(rows) * u32::from(font.1),
                filter,
            );
            if halfblocks && !crate::image::supports_truecolor_terminal() {
                scaled = crate::image::quantize_to_ansi256(&scaled);
            }
            let protocol = picker.new_resize_protocol(scaled);
            crate::perf::log_event(
                "image.surface.build",
                format!("handle={handle} cols={cols} rows={rows} halfblocks={halfblocks}"),
            );
            self.entries.insert(
                handle.clone(),
                Surface {
                    protocol,
                    cols,
                    rows,
                },
            );
        }
        self.entries.get_mut(handle)
    }

    fn is_iterm2(&self) -> bool {
        self.picker
            .as_ref()
            .is_some_and(|p| matches!(p.protocol_type(), ProtocolType::Iterm2))
    }
}

/// Draw every image with reserved rows on screen into `doc_area`.
pub fn render_images(model: &Model, frame: &mut Frame, doc_area: Rect, surfaces: &mut ImageSurfaces) {
    if !surfaces.has_picker() || !model.images.enabled {
        return;
    }
    let vp_top = model.viewport.offset();
    let vp_bottom = vp_top + doc_area.height as usize;
    let max_cols = max_image_cols(model.layout_width());

    let window = model.image_window();
    let nearby: Vec<ImageHandle> = model
        .document
        .images()
        .iter()
        .filter(|img| img.line_range.start < window.end && img.line_range.end > window.start)
        .map(|img| img.source.resolve(&model.base_dir))
        .collect();
    surfaces.retain(&nearby);

    for img_ref in model.document.images() {
        let Some(ImageSlot::Rows(_)) = model.layout.image_slot(&img_ref.src) else {
            continue;
        };
        let (img_top, img_bottom) = (img_ref.line_range.start, img_ref.line_range.end);
        if img_bottom <= vp_top || img_top >= vp_bottom {
            continue;
        }
        let handle = img_ref.source.resolve(&model.base_dir);
        let Some(pixels) = model.images.dimensions(&handle) else {
            continue;
        };
        let (cols, rows) = cell_size_for(pixels, max_cols, model.images.font_size);
        let rows = rows.min(u16::try_from(img_bottom - img_top).unwrap_or(u16::MAX));
        let iterm2 = surfaces.is_iterm2();
        let Some(surface) = surfaces.surface(model, &handle, cols, rows) else {
            continue;
        };

        let src_start = u16::try_from(vp_top.saturating_sub(img_top)).unwrap_or(u16::MAX);
        let dst_y = doc_area.y + u16::try_from(img_top.saturating_sub(vp_top)).unwrap_or(0);
        let visible_rows =
            u16::try_from(img_bottom.min(vp_bottom) - img_top.max(vp_top)).unwrap_or(0);
        let visible_cols = cols.min(doc_area.width);
        if visible_rows == 0 || visible_cols == 0 {
            continue;
        }

        if iterm2 {
            // iTerm2 keeps the whole payload in one anchor cell, so crop instead of slicing rows.
            let crop = Resize::Crop(Some(CropOptions {
                clip_top: src_start > 0,
                clip_left: false,
            }));
            StatefulImage::default().resize(crop).render(
                Rect::new(doc_area.x, dst_y, visible_cols, visible_rows),
                frame.buffer_mut(),
                &mut surface.protocol,
            );
            continue;
        }

        let temp_area = Rect::new(0, 0, surface.cols, surface.rows);
        let mut temp_buf = ratatui::buffer::Buffer::empty(temp_area);
        StatefulImage::default()
            .resize(Resize::Scale(None))
            .render(temp_area, &mut temp_buf, &mut surface.protocol);

        let frame_buf = frame.buffer_mut();
        for row in 0..visible_rows {
            let src_row = src_start + row;
            let dst_row = dst_y + row;
            if src_row >= surface.rows || dst_row >= frame_buf.area.bottom() {
                continue;
            }
            for col in 0..visible_cols {
                frame_buf[(doc_area.x + col, dst_row)] = temp_buf[(col, src_row)].clone();
            }
        }
    }
    crate::perf::log_event(
        "render.images",
        format!("vp={vp_top}..{vp_bottom} surfaces={}", surfaces.len()),
    );
}
