use std::path::PathBuf;
use std::time::{Duration, Instant};

use tempfile::tempdir;

use crate::document::ImageSlot;
use crate::search::SearchMode;

use super::effects::reload_message;
use super::{Message, Model, ToastLevel, update};

fn model_for(md: &str, size: (u16, u16)) -> Model {
    Model::new(PathBuf::from("test.md"), md.to_string(), size)
}

fn create_test_model() -> Model {
    model_for("# Test\n\nHello world", (80, 24))
}

fn create_long_test_model() -> Model {
    // 101 lines: a heading, then 50 paragraphs separated by blank lines
    let mut md = String::from("# Test Document\n\n");
    for i in 1..=50 {
        md.push_str(&format!("Line {i} of content.\n\n"));
    }
    model_for(&md, (80, 24))
}

fn create_many_headings_model() -> Model {
    let mut md = String::new();
    for i in 1..=20 {
        md.push_str(&format!("## Heading {i}\n\nBody {i}\n\n"));
    }
    model_for(&md, (80, 8))
}

fn sectioned_source(intro_paras: usize) -> String {
    let mut md = String::from("# Intro\n\n");
    for i in 0..intro_paras {
        md.push_str(&format!("Intro paragraph {i}.\n\n"));
    }
    md.push_str("## Target\n\n");
    for i in 0..30 {
        md.push_str(&format!("Target paragraph {i}.\n\n"));
    }
    md
}

fn apply(model: Model, msgs: impl IntoIterator<Item = Message>) -> Model {
    msgs.into_iter().fold(model, update)
}

#[test]
fn test_scroll_down_updates_viewport() {
    let model = update(create_long_test_model(), Message::ScrollDown(5));
    assert_eq!(model.viewport.offset(), 5);
}

#[test]
fn test_scroll_up_updates_viewport() {
    let mut model = create_long_test_model();
    model.viewport.scroll_down(10);
    let model = update(model, Message::ScrollUp(3));
    assert_eq!(model.viewport.offset(), 7);
}

#[test]
fn test_scroll_by_clamps_at_both_ends() {
    let model = update(create_long_test_model(), Message::ScrollBy(-4));
    assert_eq!(model.viewport.offset(), 0);
    let model = update(model, Message::ScrollBy(10_000));
    assert_eq!(model.viewport.offset(), model.viewport.max_offset());
}

#[test]
fn test_status_bar_row_is_reserved() {
    let model = create_test_model();
    assert_eq!(model.viewport.height(), 23);
}

#[test]
fn test_toggle_toc_changes_visibility_and_width() {
    let model = create_test_model();
    assert!(!model.toc.visible);
    let full_width = model.layout_width();

    let model = update(model, Message::ToggleToc);
    assert!(model.toc.visible);
    assert!(model.layout_width() < full_width);
    assert_eq!(model.toc.selected, Some(0));

    let model = update(model, Message::ToggleToc);
    assert!(!model.toc.visible);
    assert_eq!(model.layout_width(), full_width);
}

#[test]
fn test_switch_focus_requires_visible_toc() {
    let model = update(create_test_model(), Message::SwitchFocus);
    assert!(!model.toc.focused);
    let model = apply(model, [Message::ToggleToc, Message::SwitchFocus]);
    assert!(model.toc.focused);
}

#[test]
fn test_scroll_routes_to_toc_while_focused() {
    let model = apply(
        create_many_headings_model(),
        [Message::ToggleToc, Message::SwitchFocus],
    );
    assert_eq!(model.toc.selected, Some(0));

    let model = update(model, Message::ScrollDown(1));
    assert_eq!(model.toc.selected, Some(1));
    assert_eq!(model.viewport.offset(), 0);

    let model = update(model, Message::ScrollBy(-3));
    assert_eq!(model.toc.selected, Some(0));
    assert_eq!(model.viewport.offset(), 0);
}

#[test]
fn test_toc_select_jumps_and_returns_focus() {
    let model = apply(
        create_many_headings_model(),
        [
            Message::ToggleToc,
            Message::SwitchFocus,
            Message::TocDown,
            Message::TocDown,
            Message::TocSelect,
        ],
    );
    let target = model.document.headings()[2].line;
    assert_eq!(model.viewport.offset(), target);
    assert!(!model.toc.focused);
}

#[test]
fn test_toc_keeps_selection_in_view() {
    let mut model = apply(
        create_many_headings_model(),
        [Message::ToggleToc, Message::SwitchFocus],
    );
    for _ in 0..15 {
        model = update(model, Message::TocDown);
    }
    let rows = model.toc_visible_rows();
    let selected = model.toc.selected.unwrap_or_default();
    assert!(selected >= model.toc.scroll_offset);
    assert!(selected < model.toc.scroll_offset + rows);
}

#[test]
fn test_toc_collapse_and_expand_use_parent_links() {
    let md = "# A\n\n## A1\n\n## A2\n\n# B\n";
    let model = apply(
        model_for(md, (80, 24)),
        [Message::ToggleToc, Message::SwitchFocus],
    );
    assert_eq!(model.toc.selected, Some(0));

    let model = update(model, Message::TocCollapse);
    assert!(model.toc.collapsed.contains(&0));
    assert_eq!(model.toc.entries(model.document.headings()), vec![0, 3]);

    let model = update(model, Message::TocDown);
    assert_eq!(model.toc.selected, Some(3));

    let model = apply(model, [Message::TocUp, Message::TocExpand]);
    assert!(model.toc.collapsed.is_empty());

    // Expanded parent: expand steps into the first child.
    let model = update(model, Message::TocExpand);
    assert_eq!(model.toc.selected, Some(1));

    // Leaf: collapse moves to the parent.
    let model = update(model, Message::TocCollapse);
    assert_eq!(model.toc.selected, Some(0));
}

#[test]
fn test_unfocused_toc_follows_viewport() {
    let model = apply(create_many_headings_model(), [Message::ToggleToc]);
    let line = model.document.headings()[5].line;
    let model = update(model, Message::GoToLine(line + 1));
    assert_eq!(model.toc.selected, Some(5));
}

#[test]
fn test_toggle_watch_changes_state() {
    let model = create_test_model();
    assert!(!model.watch_enabled);

    let model = update(model, Message::ToggleWatch);
    assert!(model.watch_enabled);
    assert_eq!(
        model.active_toast(),
        Some(("Watching file changes", ToastLevel::Info))
    );

    let model = update(model, Message::ToggleWatch);
    assert!(!model.watch_enabled);
}

#[test]
fn test_watch_failure_disables_watch() {
    let model = apply(
        create_test_model(),
        [
            Message::ToggleWatch,
            Message::WatchFailed("inotify limit".to_string()),
        ],
    );
    assert!(!model.watch_enabled);
    let (text, level) = model.active_toast().expect("toast");
    assert_eq!(level, ToastLevel::Warning);
    assert!(text.contains("inotify limit"));
}

#[test]
fn test_toggle_help_changes_visibility() {
    let model = update(create_test_model(), Message::ToggleHelp);
    assert!(model.help_visible);
    let model = update(model, Message::ToggleHelp);
    assert!(!model.help_visible);
}

#[test]
fn test_quit_sets_flag() {
    let model = update(create_test_model(), Message::Quit);
    assert!(model.should_quit);
}

#[test]
fn test_toast_expires() {
    let mut model = create_test_model();
    model.show_toast(ToastLevel::Info, "hello");
    assert!(!model.expire_toast(Instant::now()));
    assert!(model.expire_toast(Instant::now() + Duration::from_secs(5)));
    assert!(model.active_toast().is_none());
}

#[test]
fn test_search_input_edits_query() {
    let model = apply(
        create_test_model(),
        [
            Message::StartSearch,
            Message::SearchInput("he".to_string()),
            Message::SearchInput("lx".to_string()),
            Message::SearchBackspace,
        ],
    );
    assert_eq!(model.search, SearchMode::Editing("hel".to_string()));
}

#[test]
fn test_search_input_ignored_when_not_editing() {
    let model = update(create_test_model(), Message::SearchInput("x".to_string()));
    assert_eq!(model.search, SearchMode::Idle);
}

#[test]
fn test_search_wraps_after_k_plus_one_next() {
    let md = "apple\n\nbanana\n\napple pie\n\ncherry\n\nAPPLE\n";
    let model = apply(
        model_for(md, (80, 24)),
        [
            Message::StartSearch,
            Message::SearchInput("apple".to_string()),
            Message::SearchCommit,
        ],
    );
    assert_eq!(model.search.matches(), &[0, 4, 8]);
    assert_eq!(model.search.position(), Some((1, 3)));

    // k NextMatch returns to the first match, k+1 lands on the second.
    let model = apply(model, [Message::NextMatch, Message::NextMatch, Message::NextMatch]);
    assert_eq!(model.search.current_line(), Some(0));
    let model = update(model, Message::NextMatch);
    assert_eq!(model.search.current_line(), Some(4));

    let model = apply(model, [Message::PrevMatch, Message::PrevMatch]);
    assert_eq!(model.search.current_line(), Some(8));
}

#[test]
fn test_search_commit_starts_at_viewport_top() {
    let mut model = create_long_test_model();
    model.viewport.scroll_to(50);
    let model = apply(
        model,
        [
            Message::StartSearch,
            Message::SearchInput("content".to_string()),
            Message::SearchCommit,
        ],
    );
    let line = model.search.current_line().expect("match");
    assert!(line >= 50);
    assert_eq!(model.viewport.offset(), line.min(model.viewport.max_offset()));
}

#[test]
fn test_search_commit_wraps_to_first_match() {
    let mut model = create_long_test_model();
    model.viewport.go_to_bottom();
    let model = apply(
        model,
        [
            Message::StartSearch,
            Message::SearchInput("test document".to_string()),
            Message::SearchCommit,
        ],
    );
    assert_eq!(model.search.current_line(), Some(0));
    assert_eq!(model.viewport.offset(), 0);
}

#[test]
fn test_search_without_matches_returns_to_idle() {
    let model = apply(
        create_test_model(),
        [
            Message::StartSearch,
            Message::SearchInput("zebra".to_string()),
            Message::SearchCommit,
        ],
    );
    assert_eq!(model.search, SearchMode::Idle);
    let (text, level) = model.active_toast().expect("toast");
    assert_eq!(level, ToastLevel::Info);
    assert!(text.contains("zebra"));
}

#[test]
fn test_clear_search_returns_to_idle() {
    let model = apply(
        create_test_model(),
        [
            Message::StartSearch,
            Message::SearchInput("hello".to_string()),
            Message::SearchCommit,
            Message::ClearSearch,
        ],
    );
    assert_eq!(model.search, SearchMode::Idle);
}

#[test]
fn test_reload_keeps_position_inside_section() {
    let mut model = model_for(&sectioned_source(10), (80, 24));
    let target = model.document.headings()[1].line;
    model.viewport.scroll_to(target + 3);

    let model = update(
        model,
        Message::FileChanged {
            source: sectioned_source(14),
        },
    );
    let moved = model.document.headings()[1].line;
    assert!(moved > target);
    assert_eq!(model.viewport.offset(), moved + 3);
}

#[test]
fn test_reload_bumps_generation() {
    let model = create_test_model();
    let before = model.images.generation;
    let model = update(
        model,
        Message::FileChanged {
            source: "# Test\n\nchanged".to_string(),
        },
    );
    assert_eq!(model.images.generation, before + 1);
    assert_eq!(model.source, "# Test\n\nchanged");
}

#[test]
fn test_reload_refreshes_active_search() {
    let model = apply(
        create_test_model(),
        [
            Message::StartSearch,
            Message::SearchInput("hello".to_string()),
            Message::SearchCommit,
        ],
    );
    assert_eq!(model.search.matches(), &[2]);

    let model = update(
        model,
        Message::FileChanged {
            source: "# Test\n\nnothing here".to_string(),
        },
    );
    assert_eq!(model.search, SearchMode::Idle);
}

#[test]
fn test_reload_keeps_collapsed_headings_by_id() {
    let md = "# A\n\n## A1\n\n# B\n\n## B1\n";
    let model = apply(
        model_for(md, (80, 24)),
        [
            Message::ToggleToc,
            Message::SwitchFocus,
            Message::TocDown,
            Message::TocDown,
            Message::TocCollapse,
        ],
    );
    assert!(model.toc.collapsed.contains(&2));

    let model = update(
        model,
        Message::FileChanged {
            source: format!("# Preface\n\n{md}"),
        },
    );
    assert_eq!(model.toc.collapsed.len(), 1);
    assert!(model.toc.collapsed.contains(&3));
}

#[test]
fn test_reload_failure_shows_error() {
    let model = update(
        create_test_model(),
        Message::ReloadFailed("permission denied".to_string()),
    );
    let (text, level) = model.active_toast().expect("toast");
    assert_eq!(level, ToastLevel::Error);
    assert!(text.contains("permission denied"));
}

#[test]
fn test_resize_keeps_heading_anchor() {
    let mut model = model_for(&sectioned_source(10), (80, 24));
    let target = model.document.headings()[1].line;
    model.viewport.scroll_to(target);

    let model = update(model, Message::Resize(40, 30));
    assert_eq!(model.viewport.width(), 40);
    assert_eq!(model.viewport.height(), 29);
    assert_eq!(model.viewport.offset(), model.document.headings()[1].line);
}

#[test]
fn test_reload_message_reads_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("doc.md");
    std::fs::write(&path, "# Fresh\n").expect("write");
    let model = Model::new(path, String::new(), (80, 24));

    assert_eq!(
        reload_message(&model),
        Message::FileChanged {
            source: "# Fresh\n".to_string()
        }
    );
}

#[test]
fn test_reload_message_reports_missing_file() {
    let dir = tempdir().expect("tempdir");
    let model = Model::new(dir.path().join("gone.md"), String::new(), (80, 24));
    match reload_message(&model) {
        Message::ReloadFailed(reason) => assert!(reason.contains("not found"), "{reason}"),
        other => panic!("unexpected message {other:?}"),
    }
}

#[test]
fn test_initial_layout_queues_visible_images() {
    let mut md = String::from("![near](near.png)\n\n");
    for i in 0..200 {
        md.push_str(&format!("para {i}\n\n"));
    }
    md.push_str("![far](far.png)\n");
    let mut model = model_for(&md, (80, 6));

    let pending: Vec<String> = model
        .take_pending_loads()
        .into_iter()
        .map(|req| req.handle.to_string())
        .collect();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].ends_with("near.png"));

    let mut model = update(model, Message::GoToBottom);
    let pending = model.take_pending_loads();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].handle.as_str().ends_with("far.png"));

    // In-flight images are not requested twice.
    let mut model = update(model, Message::ScrollUp(1));
    assert!(model.take_pending_loads().is_empty());
}

#[test]
fn test_image_loaded_reserves_rows() {
    let model = model_for("# Pics\n\n![pic](pic.png)\n\nafter", (80, 24));
    let handle = model.document.images()[0].source.resolve(&model.base_dir);
    let before = model.document.line_count();

    let model = update(
        model,
        Message::ImageLoaded {
            handle,
            generation: 0,
            width: 200,
            height: 100,
        },
    );
    assert!(matches!(
        model.layout.image_slot("pic.png"),
        Some(ImageSlot::Rows(_))
    ));
    assert!(model.document.line_count() > before);
    assert!(model.images.dimensions(&model.document.images()[0].source.resolve(&model.base_dir)).is_some());
}

#[test]
fn test_stale_image_results_are_ignored() {
    let model = model_for("![pic](pic.png)", (80, 24));
    let handle = model.document.images()[0].source.resolve(&model.base_dir);
    let model = update(
        model,
        Message::FileChanged {
            source: "![pic](pic.png)".to_string(),
        },
    );
    assert_eq!(model.images.generation, 1);
    let before = model.document.clone();

    let model = update(
        model,
        Message::ImageLoaded {
            handle: handle.clone(),
            generation: 0,
            width: 64,
            height: 64,
        },
    );
    assert_eq!(model.document, before);
    assert!(model.images.dimensions(&handle).is_none());

    let model = update(
        model,
        Message::ImageLoadFailed {
            handle: handle.clone(),
            generation: 0,
            reason: "old".to_string(),
        },
    );
    assert!(model.images.failure(&handle).is_none());
}

#[test]
fn test_failed_image_renders_missing_placeholder() {
    let model = model_for("![pic](missing.png)", (80, 24));
    let handle = model.document.images()[0].source.resolve(&model.base_dir);
    let model = update(
        model,
        Message::ImageLoadFailed {
            handle: handle.clone(),
            generation: 0,
            reason: "Image not found".to_string(),
        },
    );
    assert_eq!(model.layout.image_slot("missing.png"), Some(ImageSlot::Missing));
    assert_eq!(model.images.failure(&handle), Some("Image not found"));
    assert!(!model.images.is_in_flight(&handle));

    // Failed images are not requested again.
    let mut model = update(model, Message::ScrollDown(1));
    assert!(model.take_pending_loads().is_empty());
}

#[test]
fn test_disabled_images_queue_nothing() {
    let mut model = model_for("![pic](pic.png)", (80, 24));
    model.images.enabled = false;
    let _ = model.take_pending_loads();
    let mut model = update(model, Message::Resize(100, 30));
    assert!(model.take_pending_loads().is_empty());
}

#[test]
fn test_lookahead_images_over_budget_are_not_refetched() {
    use std::sync::Arc;

    use image::{DynamicImage, RgbaImage};

    use crate::image::ImageCache;

    let mut md = String::new();
    for i in 0..15 {
        md.push_str(&format!("filler {i}\n\n"));
    }
    md.push_str("![a](a.png)\n\n![b](b.png)\n");
    let mut model = model_for(&md, (80, 24));
    let pixels = Arc::new(DynamicImage::ImageRgba8(RgbaImage::new(1024, 32)));
    model.images.cache = ImageCache::new(crate::image::byte_size(&pixels));
    // Both images sit below the screen but inside the lookahead window.
    assert!(model.document.images()[0].line_range.start >= model.viewport.visible_range().end);

    let mut requests = 0;
    for _ in 0..20 {
        for req in model.take_pending_loads() {
            requests += 1;
            model.images.cache.insert(req.handle.clone(), Arc::clone(&pixels));
            model = update(
                model,
                Message::ImageLoaded {
                    handle: req.handle,
                    generation: req.generation,
                    width: 1024,
                    height: 32,
                },
            );
        }
        model = update(model, Message::ScrollBy(0));
    }
    assert_eq!(requests, 2, "each lookahead image is decoded once");
    assert_eq!(model.images.cache.len(), 1);

    // The evicted image is fetched again once it scrolls into view.
    let first = model.document.images()[0].line_range.start;
    let mut model = update(model, Message::GoToLine(first));
    let pending = model.take_pending_loads();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].handle.as_str().ends_with("a.png"));
}

fn filler(n: usize) -> String {
    (0..n).map(|i| format!("filler {i}\n\n")).collect()
}

#[test]
fn test_follow_link_jumps_to_heading() {
    let md = format!("[Go](#the-end)\n\n{}# The End\n\n{}", filler(40), filler(20));
    let model = model_for(&md, (80, 10));
    let target = model.document.headings()[0].line;
    let model = update(model, Message::FollowLinkAtLine(0));
    assert_eq!(model.viewport.offset(), target);
    let (text, level) = model.active_toast().expect("toast");
    assert_eq!(text, "Jumped to #the-end");
    assert_eq!(level, ToastLevel::Info);
}

#[test]
fn test_follow_link_jumps_to_footnote() {
    let md = format!("See[^1].\n\n{}[^1]: The note.\n\nbye", filler(40));
    let model = model_for(&md, (80, 10));
    let target = model.document.footnote_line("1").expect("footnote");
    let model = update(model, Message::FollowLinkAtLine(0));
    assert!(model.viewport.offset() > 0);
    assert!(model.viewport.visible_range().contains(&target));
    let (text, _) = model.active_toast().expect("toast");
    assert_eq!(text, "Jumped to [^1]");
}

#[test]
fn test_follow_missing_anchor_warns() {
    let md = format!("[Go](#nowhere)\n\n{}", filler(40));
    let model = update(model_for(&md, (80, 10)), Message::FollowLinkAtLine(0));
    assert_eq!(model.viewport.offset(), 0);
    let (text, level) = model.active_toast().expect("toast");
    assert_eq!(text, "#nowhere not found");
    assert_eq!(level, ToastLevel::Warning);
}

#[test]
fn test_follow_external_link_stays_put() {
    let md = format!("[site](https://example.com)\n\n{}", filler(40));
    let model = update(model_for(&md, (80, 10)), Message::FollowLinkAtLine(0));
    assert_eq!(model.viewport.offset(), 0);
    let (text, _) = model.active_toast().expect("toast");
    assert!(text.contains("https://example.com"));
}

#[test]
fn test_follow_line_without_link_is_noop() {
    let model = update(create_long_test_model(), Message::FollowLinkAtLine(1));
    assert_eq!(model.viewport.offset(), 0);
    assert!(model.active_toast().is_none());
}
