//! Marksight - a terminal markdown viewer with inline images.
//!
//! # Usage
//!
//! ```bash
//! marksight README.md
//! marksight --watch --toc README.md
//! marksight --image-budget-mb 16 notes.md
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use marksight::app::App;
use marksight::config::{
    ConfigFlags, ThemeMode, ViewerConfig, clear_config_flags, global_config_path,
    load_config_flags, local_override_path, parse_flag_tokens, save_config_flags,
};
use marksight::highlight::HighlightBackground;
use marksight::perf;

/// A terminal markdown viewer with inline images
#[derive(Parser, Debug)]
#[command(name = "marksight", version, about, long_about = None)]
struct Cli {
    /// Markdown file to view
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Watch file for changes and auto-reload
    #[arg(short, long)]
    watch: bool,

    /// Hide table of contents sidebar
    #[arg(long)]
    no_toc: bool,

    /// Start with TOC sidebar visible
    #[arg(long)]
    toc: bool,

    /// Disable inline image rendering (show placeholders only)
    #[arg(long)]
    no_images: bool,

    /// Color theme background (light, dark or auto-detect)
    #[arg(long, value_enum, default_value = "auto")]
    theme: ThemeMode,

    /// Memory budget for decoded images, in MiB
    #[arg(long, value_name = "MB")]
    image_budget_mb: Option<usize>,

    /// Force image rendering to use half-cell fallback mode
    #[arg(long)]
    force_half_cell: bool,

    /// Enable startup performance logging
    #[arg(long)]
    perf: bool,

    /// Write detailed render/image debug events to a file
    #[arg(long, value_name = "PATH")]
    render_debug_log: Option<PathBuf>,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

// OSC 11 asks the terminal for its background color. /dev/tty is used so the
// query works when stdout is redirected. Elsewhere the environment is used.
#[cfg(not(unix))]
fn query_terminal_background() -> std::io::Result<Option<(u8, u8, u8)>> {
    Ok(None)
}

#[cfg(unix)]
fn query_terminal_background() -> std::io::Result<Option<(u8, u8, u8)>> {
    use std::io::{Read, Write};
    use std::sync::mpsc;

    let (tx, rx) = mpsc::channel();
    let mut tty = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/tty")?;
    let mut reader = tty.try_clone()?;

    tty.write_all(b"\x1b]11;?\x07")?;
    tty.flush()?;

    std::thread::spawn(move || {
        let mut buf = [0u8; 256];
        let mut collected = Vec::new();
        while let Ok(n) = reader.read(&mut buf) {
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&buf[..n]);
            if collected.contains(&b'\x07') || collected.windows(2).any(|w| w == b"\x1b\\") {
                let _ = tx.send(collected);
                break;
            }
        }
    });

    Ok(rx
        .recv_timeout(Duration::from_millis(75))
        .ok()
        .and_then(|bytes| parse_osc11_reply(&String::from_utf8_lossy(&bytes))))
}

/// Parse `ESC ] 11 ; rgb:RRRR/GGGG/BBBB` terminated by BEL or ST.
fn parse_osc11_reply(reply: &str) -> Option<(u8, u8, u8)> {
    let start = reply.find("rgb:")?;
    let mut parts = reply[start + 4..].split(['/', '\x07', '\x1b']);
    let r = parse_osc_component(parts.next()?)?;
    let g = parse_osc_component(parts.next()?)?;
    let b = parse_osc_component(parts.next()?)?;
    Some((r, g, b))
}

fn parse_osc_component(s: &str) -> Option<u8> {
    let hex = s.trim();
    match hex.len() {
        4.. => u16::from_str_radix(&hex[..4], 16)
            .ok()
            .map(|v| v.to_be_bytes()[0]),
        2 => u8::from_str_radix(hex, 16).ok(),
        _ => None,
    }
}

fn background_from_rgb((r, g, b): (u8, u8, u8)) -> HighlightBackground {
    let luma = 0.0722f32.mul_add(
        f32::from(b),
        0.2126f32.mul_add(f32::from(r), 0.7152 * f32::from(g)),
    );
    if luma >= 140.0 {
        HighlightBackground::Light
    } else {
        HighlightBackground::Dark
    }
}

/// Background guess used when the theme is `auto`.
fn detect_background() -> HighlightBackground {
    let _ = enable_raw_mode();
    let reply = query_terminal_background();
    let _ = disable_raw_mode();
    match reply {
        Ok(Some(rgb)) => background_from_rgb(rgb),
        Ok(None) | Err(_) => HighlightBackground::detect(),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    perf::set_enabled(effective.perf);
    let render_debug_log_path = effective
        .render_debug_log
        .clone()
        .or_else(|| std::env::var_os("MARKSIGHT_RENDER_DEBUG_LOG").map(PathBuf::from));
    if let Err(err) = perf::set_debug_log_path(render_debug_log_path.as_deref()) {
        tracing::warn!(
            path = ?render_debug_log_path,
            error = %err,
            "failed to open render debug log"
        );
    }

    let detected = match effective.theme.unwrap_or(ThemeMode::Auto) {
        ThemeMode::Auto => detect_background(),
        ThemeMode::Light | ThemeMode::Dark => HighlightBackground::Dark,
    };

    if !cli.file.exists() {
        anyhow::bail!("File not found: {}", cli.file.display());
    }

    let config = ViewerConfig::from_flags(cli.file, &effective, detected).with_config_paths(
        Some(global_path),
        local_path.exists().then_some(local_path),
    );
    tracing::debug!(?config, "starting viewer");

    App::new(config).run().context("Application error")
}
