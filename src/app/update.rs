use crate::app::model::{Model, ToastLevel, has_children};
use crate::image::ImageHandle;
use crate::search::{SearchMode, find_matches, first_match_from};

/// All possible events and actions in the application.
///
/// These represent user input, system events, and results of effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // Navigation
    /// Scroll up by n lines
    ScrollUp(usize),
    /// Scroll down by n lines
    ScrollDown(usize),
    /// Scroll by a signed number of lines
    ScrollBy(isize),
    PageUp,
    PageDown,
    HalfPageUp,
    HalfPageDown,
    GoToTop,
    GoToBottom,
    /// Go to specific line
    GoToLine(usize),
    /// Go to percentage through document
    GoToPercent(u8),
    /// Jump to the target of the in-document link on a rendered line
    FollowLinkAtLine(usize),

    // Search
    /// Start typing a query
    StartSearch,
    /// Append text to the query being typed
    SearchInput(String),
    /// Delete the last character of the query
    SearchBackspace,
    /// Run the typed query
    SearchCommit,
    NextMatch,
    PrevMatch,
    ClearSearch,

    // TOC
    /// Toggle TOC sidebar visibility
    ToggleToc,
    /// Switch focus between TOC and document
    SwitchFocus,
    TocUp,
    TocDown,
    /// Jump to selected TOC heading
    TocSelect,
    /// Hide the selected heading's descendants
    TocCollapse,
    /// Show the selected heading's descendants
    TocExpand,

    // File
    /// Re-read the file from disk
    Reload,
    /// New file contents are available
    FileChanged { source: String },
    /// Reading the file failed
    ReloadFailed(String),
    ToggleWatch,
    /// The watcher could not be created or stopped working
    WatchFailed(String),

    // Images
    /// An image finished decoding
    ImageLoaded {
        handle: ImageHandle,
        generation: u64,
        width: u32,
        height: u32,
    },
    /// An image could not be loaded
    ImageLoadFailed {
        handle: ImageHandle,
        generation: u64,
        reason: String,
    },

    // Window
    /// Terminal resized
    Resize(u16, u16),
    ToggleHelp,
    /// Quit the application
    Quit,
}

/// Pure function that updates the model based on a message.
///
/// All state transitions happen here. File reads, watcher setup and image
/// decoding happen in the effect layer and come back as messages.
pub fn update(mut model: Model, msg: Message) -> Model {
    let msg = route_to_toc(&model, msg);
    let should_sync_toc = !matches!(
        msg,
        Message::TocUp
            | Message::TocDown
            | Message::TocSelect
            | Message::TocCollapse
            | Message::TocExpand
            | Message::SwitchFocus
    );

    match msg {
        // Navigation
        Message::ScrollUp(n) => model.viewport.scroll_up(n),
        Message::ScrollDown(n) => model.viewport.scroll_down(n),
        Message::ScrollBy(delta) => model.viewport.scroll_by(delta),
        Message::PageUp => model.viewport.page_up(),
        Message::PageDown => model.viewport.page_down(),
        Message::HalfPageUp => model.viewport.half_page_up(),
        Message::HalfPageDown => model.viewport.half_page_down(),
        Message::GoToTop => model.viewport.go_to_top(),
        Message::GoToBottom => model.viewport.go_to_bottom(),
        Message::GoToLine(line) => model.viewport.go_to_line(line),
        Message::GoToPercent(percent) => model.viewport.go_to_percent(percent),

        // Search
        Message::StartSearch => {
            model.search = SearchMode::Editing(String::new());
        }
        Message::SearchInput(text) => {
            if let SearchMode::Editing(query) = &mut model.search {
                query.push_str(&text);
            }
        }
        Message::SearchBackspace => {
            if let SearchMode::Editing(query) = &mut model.search {
                query.pop();
            }
        }
        Message::SearchCommit => commit_search(&mut model),
        Message::NextMatch => step_match(&mut model, true),
        Message::PrevMatch => step_match(&mut model, false),
        Message::ClearSearch => {
            model.search = SearchMode::Idle;
        }

        // TOC
        Message::ToggleToc => {
            model.toc.visible = !model.toc.visible;
            if !model.toc.visible {
                model.toc.focused = false;
            }
            model.relayout();
        }
        Message::SwitchFocus => {
            if model.toc.visible {
                model.toc.focused = !model.toc.focused;
            }
        }
        Message::TocUp => move_toc_selection(&mut model, false),
        Message::TocDown => move_toc_selection(&mut model, true),
        Message::TocSelect => {
            if let Some(heading) = model
                .toc
                .selected
                .and_then(|sel| model.document.headings().get(sel))
            {
                let line = heading.line;
                model.viewport.go_to_line(line);
            }
            model.toc.focused = false;
        }
        Message::TocCollapse => collapse_toc_entry(&mut model),
        Message::TocExpand => expand_toc_entry(&mut model),

        // File
        // Reload: the file read happens in effects
        Message::Reload => {}
        Message::FileChanged { source } => model.replace_source(source),
        Message::ReloadFailed(reason) => {
            model.show_toast(ToastLevel::Error, format!("Reload failed: {reason}"));
        }
        Message::ToggleWatch => {
            model.watch_enabled = !model.watch_enabled;
            let text = if model.watch_enabled {
                "Watching file changes"
            } else {
                "Watch disabled"
            };
            model.show_toast(ToastLevel::Info, text);
        }
        Message::WatchFailed(reason) => {
            model.watch_enabled = false;
            model.show_toast(ToastLevel::Warning, format!("Watch unavailable: {reason}"));
        }

        // Images
        Message::ImageLoaded {
            handle,
            generation,
            width,
            height,
        } => {
            if generation == model.images.generation && model.image_loaded(handle, (width, height))
            {
                model.relayout();
            }
        }
        Message::ImageLoadFailed {
            handle,
            generation,
            reason,
        } => {
            if generation == model.images.generation && model.image_failed(handle, reason) {
                model.relayout();
            }
        }

        Message::FollowLinkAtLine(line) => follow_link_at_line(&mut model, line),

        // Window
        Message::Resize(width, height) => {
            model.viewport.resize(width, height.saturating_sub(1));
            model.relayout();
        }
        Message::ToggleHelp => {
            model.help_visible = !model.help_visible;
        }
        Message::Quit => {
            model.should_quit = true;
        }
    }

    if should_sync_toc && !model.toc.focused {
        model.sync_toc_to_viewport();
    }
    model.queue_visible_loads();
    model
}

/// While the TOC has focus, line scrolling moves its selection instead.
fn route_to_toc(model: &Model, msg: Message) -> Message {
    if !(model.toc.visible && model.toc.focused) {
        return msg;
    }
    match msg {
        Message::ScrollUp(_) => Message::TocUp,
        Message::ScrollDown(_) => Message::TocDown,
        Message::ScrollBy(delta) if delta < 0 => Message::TocUp,
        Message::ScrollBy(delta) if delta > 0 => Message::TocDown,
        other => other,
    }
}

/// Follow the first link on `line`. Only `#anchor` and footnote links move
/// the viewport; other URLs are reported and left alone.
fn follow_link_at_line(model: &mut Model, line: usize) {
    let links: Vec<_> = model
        .document
        .links()
        .iter()
        .filter(|link| link.line == line)
        .collect();
    let Some(link) = links
        .iter()
        .find(|link| link.url.starts_with('#'))
        .or_else(|| links.first())
    else {
        return;
    };
    let url = link.url.clone();
    let Some(anchor) = url.strip_prefix('#') else {
        model.show_toast(ToastLevel::Info, format!("External link: {url}"));
        return;
    };
    let label = anchor
        .strip_prefix("fn-")
        .map_or_else(|| format!("#{anchor}"), |name| format!("[^{name}]"));
    match model.document.resolve_internal_anchor(anchor) {
        Some(target) => {
            model.viewport.go_to_line(target);
            model.show_toast(ToastLevel::Info, format!("Jumped to {label}"));
        }
        None => model.show_toast(ToastLevel::Warning, format!("{label} not found")),
    }
}

fn commit_search(model: &mut Model) {
    let SearchMode::Editing(query) = std::mem::take(&mut model.search) else {
        return;
    };
    if query.trim().is_empty() {
        return;
    }
    let matches = find_matches(&model.document, &query);
    if matches.is_empty() {
        model.show_toast(ToastLevel::Info, format!("No matches for \"{query}\""));
        return;
    }
    let index = first_match_from(&matches, model.viewport.offset());
    model.viewport.go_to_line(matches[index]);
    model.search = SearchMode::Active {
        query,
        matches,
        index,
    };
}

fn step_match(model: &mut Model, forward: bool) {
    let SearchMode::Active { matches, index, .. } = &mut model.search else {
        return;
    };
    let count = matches.len();
    if count == 0 {
        return;
    }
    *index = if forward {
        (*index + 1) % count
    } else {
        (*index + count - 1) % count
    };
    let line = matches[*index];
    model.viewport.go_to_line(line);
}

fn move_toc_selection(model: &mut Model, down: bool) {
    let entries = model.toc.entries(model.document.headings());
    if entries.is_empty() {
        return;
    }
    let pos = model
        .toc
        .selected
        .and_then(|sel| entries.iter().position(|&e| e == sel));
    let next = match pos {
        None => 0,
        Some(pos) if down => (pos + 1).min(entries.len() - 1),
        Some(pos) => pos.saturating_sub(1),
    };
    model.toc.selected = Some(entries[next]);
    model.scroll_toc_to_selection();
}

/// Collapse the selection, or move to its parent when there is nothing to collapse.
fn collapse_toc_entry(model: &mut Model) {
    let Some(sel) = model.toc.selected else {
        return;
    };
    let headings = model.document.headings();
    if has_children(headings, sel) && !model.toc.collapsed.contains(&sel) {
        model.toc.collapsed.insert(sel);
    } else if let Some(parent) = headings.get(sel).and_then(|h| h.parent) {
        model.toc.selected = Some(parent);
    }
    model.scroll_toc_to_selection();
}

/// Expand the selection, or step into its first child when already expanded.
fn expand_toc_entry(model: &mut Model) {
    let Some(sel) = model.toc.selected else {
        return;
    };
    if model.toc.collapsed.remove(&sel) {
        model.scroll_toc_to_selection();
        return;
    }
    if has_children(model.document.headings(), sel) {
        model.toc.selected = Some(sel + 1);
    }
    model.scroll_toc_to_selection();
}
