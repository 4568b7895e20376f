//! Persistent default flags and the resolved viewer configuration.
//!
//! Defaults live in rc-files that hold command-line flags, one or more per
//! line, with `#` comments. The global file is written by `--save`; a local
//! `.marksightrc` in the working directory is layered on top, and flags given
//! on the command line win over both.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::highlight::HighlightBackground;

/// Image cache budget when none is configured.
pub const DEFAULT_IMAGE_BUDGET_MB: usize = 64;

/// Quiet period before a file change is reported.
pub const DEFAULT_WATCH_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Auto,
    Light,
    Dark,
}

impl ThemeMode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub watch: bool,
    pub no_toc: bool,
    pub toc: bool,
    pub no_images: bool,
    pub perf: bool,
    pub force_half_cell: bool,
    pub theme: Option<ThemeMode>,
    pub image_budget_mb: Option<usize>,
    pub render_debug_log: Option<PathBuf>,
}

impl ConfigFlags {
    /// Merge two flag sets; switches accumulate and `other` wins for values.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            watch: self.watch || other.watch,
            no_toc: self.no_toc || other.no_toc,
            toc: self.toc || other.toc,
            no_images: self.no_images || other.no_images,
            perf: self.perf || other.perf,
            force_half_cell: self.force_half_cell || other.force_half_cell,
            theme: other.theme.or(self.theme),
            image_budget_mb: other.image_budget_mb.or(self.image_budget_mb),
            render_debug_log: other
                .render_debug_log
                .clone()
                .or_else(|| self.render_debug_log.clone()),
        }
    }
}

/// Resolved, immutable settings the viewer starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerConfig {
    pub file_path: PathBuf,
    pub theme: HighlightBackground,
    pub watch: bool,
    pub toc_visible: bool,
    pub images_enabled: bool,
    pub force_half_cell: bool,
    pub image_budget_bytes: usize,
    pub watch_debounce: Duration,
    /// Config files shown in the help overlay.
    pub config_global_path: Option<PathBuf>,
    pub config_local_path: Option<PathBuf>,
}

impl ViewerConfig {
    /// Defaults for viewing `file_path`.
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            file_path,
            theme: HighlightBackground::Dark,
            watch: false,
            toc_visible: false,
            images_enabled: true,
            force_half_cell: false,
            image_budget_bytes: DEFAULT_IMAGE_BUDGET_MB * 1024 * 1024,
            watch_debounce: DEFAULT_WATCH_DEBOUNCE,
            config_global_path: None,
            config_local_path: None,
        }
    }

    /// Resolve merged flags. `detected` is used when the theme is `auto`.
    pub fn from_flags(file_path: PathBuf, flags: &ConfigFlags, detected: HighlightBackground) -> Self {
        let theme = match flags.theme.unwrap_or(ThemeMode::Auto) {
            ThemeMode::Auto => detected,
            ThemeMode::Light => HighlightBackground::Light,
            ThemeMode::Dark => HighlightBackground::Dark,
        };
        let budget_mb = flags.image_budget_mb.unwrap_or(DEFAULT_IMAGE_BUDGET_MB);
        Self {
            theme,
            watch: flags.watch,
            toc_visible: flags.toc && !flags.no_toc,
            images_enabled: !flags.no_images,
            force_half_cell: flags.force_half_cell,
            image_budget_bytes: budget_mb.saturating_mul(1024 * 1024),
            ..Self::new(file_path)
        }
    }

    #[must_use]
    pub fn with_config_paths(mut self, global: Option<PathBuf>, local: Option<PathBuf>) -> Self {
        self.config_global_path = global;
        self.config_local_path = local;
        self
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("marksight").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("marksight")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("marksight").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join(".config")
                .join("marksight")
                .join("config");
        }
    }

    local_override_path()
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".marksightrc")
}

/// Read flags from an rc-file. A missing file yields the defaults.
pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = vec!["# marksight defaults (saved with --save)".to_string()];
    let switches = [
        (flags.watch, "--watch"),
        (flags.no_toc, "--no-toc"),
        (flags.toc, "--toc"),
        (flags.no_images, "--no-images"),
        (flags.perf, "--perf"),
        (flags.force_half_cell, "--force-half-cell"),
    ];
    lines.extend(
        switches
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, flag)| (*flag).to_string()),
    );
    if let Some(theme) = flags.theme {
        lines.push(format!("--theme {}", theme.as_str()));
    }
    if let Some(mb) = flags.image_budget_mb {
        lines.push(format!("--image-budget-mb {mb}"));
    }
    if let Some(path) = &flags.render_debug_log {
        lines.push(format!("--render-debug-log {}", path.display()));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Extract known flags from raw tokens, ignoring anything else.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        let (name, inline_value) = match token.split_once('=') {
            Some((name, value)) if name.starts_with("--") => (name, Some(value)),
            _ => (token, None),
        };
        let mut value = || {
            inline_value.map(ToOwned::to_owned).or_else(|| {
                let next = tokens.get(i + 1).cloned();
                if next.is_some() {
                    i += 1;
                }
                next
            })
        };
        match name {
            "--watch" | "-w" => flags.watch = true,
            "--no-toc" => flags.no_toc = true,
            "--toc" => flags.toc = true,
            "--no-images" => flags.no_images = true,
            "--perf" => flags.perf = true,
            "--force-half-cell" => flags.force_half_cell = true,
            "--theme" => flags.theme = value().as_deref().and_then(parse_theme),
            "--image-budget-mb" => {
                flags.image_budget_mb = value().and_then(|v| v.parse().ok());
            }
            "--render-debug-log" => flags.render_debug_log = value().map(PathBuf::from),
            _ => {}
        }
        i += 1;
    }
    flags
}

fn parse_theme(s: &str) -> Option<ThemeMode> {
    match s {
        "auto" => Some(ThemeMode::Auto),
        "light" => Some(ThemeMode::Light),
        "dark" => Some(ThemeMode::Dark),
        _ => None,
    }
}
