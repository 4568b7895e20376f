use std::path::PathBuf;

use marksight::config::{
    ConfigFlags, DEFAULT_IMAGE_BUDGET_MB, ThemeMode, ViewerConfig, clear_config_flags,
    load_config_flags, parse_flag_tokens, save_config_flags,
};
use marksight::highlight::HighlightBackground;

fn args(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(ToString::to_string).collect()
}

#[test]
fn test_config_file_parsing_ignores_comments_and_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".marksightrc");
    let content = r"
# comment
--watch

--theme light
   
--image-budget-mb=8 --no-images
";
    std::fs::write(&path, content).unwrap();

    let flags = load_config_flags(&path).unwrap();
    assert!(flags.watch);
    assert!(flags.no_images);
    assert_eq!(flags.theme, Some(ThemeMode::Light));
    assert_eq!(flags.image_budget_mb, Some(8));
}

#[test]
fn test_missing_config_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let flags = load_config_flags(&dir.path().join("absent")).unwrap();
    assert_eq!(flags, ConfigFlags::default());
}

#[test]
fn test_cli_flags_override_file_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".marksightrc");
    std::fs::write(&path, "--watch\n--theme light\n--image-budget-mb 8\n").unwrap();

    let file_flags = load_config_flags(&path).unwrap();
    let cli_flags = parse_flag_tokens(&args(&["marksight", "--theme", "dark", "--toc"]));

    let effective = file_flags.union(&cli_flags);
    assert!(effective.watch, "file flags should remain enabled");
    assert!(effective.toc, "cli flags should be applied");
    assert_eq!(effective.theme, Some(ThemeMode::Dark), "cli should override theme");
    assert_eq!(
        effective.image_budget_mb,
        Some(8),
        "file config should be preserved when CLI does not override"
    );
}

#[test]
fn test_saved_flags_load_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config");
    let flags = parse_flag_tokens(&args(&[
        "marksight",
        "--watch",
        "--force-half-cell",
        "--theme=dark",
        "--image-budget-mb=32",
        "README.md",
    ]));

    save_config_flags(&path, &flags).unwrap();
    assert_eq!(load_config_flags(&path).unwrap(), flags);

    clear_config_flags(&path).unwrap();
    assert!(!path.exists());
    clear_config_flags(&path).unwrap();
}

#[test]
fn test_viewer_config_resolves_flags() {
    let flags = ConfigFlags {
        toc: true,
        no_toc: true,
        no_images: true,
        image_budget_mb: Some(2),
        ..ConfigFlags::default()
    };
    let config = ViewerConfig::from_flags(PathBuf::from("a.md"), &flags, HighlightBackground::Light);
    assert!(!config.toc_visible, "--no-toc wins over --toc");
    assert!(!config.images_enabled);
    assert_eq!(config.image_budget_bytes, 2 * 1024 * 1024);
    assert_eq!(config.theme, HighlightBackground::Light, "auto uses the detected background");

    let explicit = ConfigFlags {
        theme: Some(ThemeMode::Dark),
        ..ConfigFlags::default()
    };
    let config =
        ViewerConfig::from_flags(PathBuf::from("a.md"), &explicit, HighlightBackground::Light);
    assert_eq!(config.theme, HighlightBackground::Dark);
    assert_eq!(config.image_budget_bytes, DEFAULT_IMAGE_BUDGET_MB * 1024 * 1024);
}
