use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::app::{App, Message, Model};
use crate::search::SearchMode;

use super::event_loop::ResizeDebouncer;

/// Lines scrolled per mouse wheel notch.
const MOUSE_SCROLL_LINES: usize = 3;

impl App {
    pub(super) fn handle_event(
        event: &Event,
        model: &Model,
        now_ms: u64,
        resize_debouncer: &mut ResizeDebouncer,
    ) -> Option<Message> {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => Self::handle_key(*key, model),
            Event::Mouse(mouse) => Self::handle_mouse(*mouse, model),
            Event::Resize(w, h) => {
                crate::perf::log_event("event.resize.queue", format!("width={w} height={h}"));
                resize_debouncer.queue(*w, *h, now_ms);
                None
            }
            _ => None,
        }
    }

    pub(super) fn handle_mouse(mouse: MouseEvent, model: &Model) -> Option<Message> {
        if model.help_visible {
            return None;
        }
        match mouse.kind {
            MouseEventKind::ScrollDown if model.viewport.can_scroll_down() || model.toc.focused => {
                Some(Message::ScrollDown(MOUSE_SCROLL_LINES))
            }
            MouseEventKind::ScrollUp if model.viewport.can_scroll_up() || model.toc.focused => {
                Some(Message::ScrollUp(MOUSE_SCROLL_LINES))
            }
            MouseEventKind::Down(MouseButton::Left) => {
                let line = Self::document_line_at(model, mouse.column, mouse.row)?;
                model
                    .document
                    .links()
                    .iter()
                    .any(|link| link.line == line)
                    .then_some(Message::FollowLinkAtLine(line))
            }
            _ => None,
        }
    }

    /// Rendered line under a screen cell in the document pane.
    fn document_line_at(model: &Model, column: u16, row: u16) -> Option<usize> {
        if row >= model.viewport.height() {
            return None;
        }
        if model.toc.visible {
            let area = ratatui::layout::Rect::new(0, 0, model.viewport.width(), 1);
            let doc_start = crate::ui::split_main_columns(area)[1].x;
            if column < doc_start {
                return None;
            }
        }
        let line = model.viewport.offset() + usize::from(row);
        (line < model.document.line_count()).then_some(line)
    }

    /// First in-document link on screen, if any.
    fn first_visible_internal_link(model: &Model) -> Option<Message> {
        let visible = model.viewport.visible_range();
        model
            .document
            .links()
            .iter()
            .find(|link| visible.contains(&link.line) && link.url.starts_with('#'))
            .map(|link| Message::FollowLinkAtLine(link.line))
    }

    pub(super) fn handle_key(key: KeyEvent, model: &Model) -> Option<Message> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(Message::Quit);
        }

        if model.help_visible {
            return Some(Message::ToggleHelp);
        }

        if model.search.is_editing() {
            return match key.code {
                KeyCode::Esc => Some(Message::ClearSearch),
                KeyCode::Enter => Some(Message::SearchCommit),
                KeyCode::Backspace => Some(Message::SearchBackspace),
                KeyCode::Char(c)
                    if !key.modifiers.contains(KeyModifiers::CONTROL)
                        && !key.modifiers.contains(KeyModifiers::ALT) =>
                {
                    Some(Message::SearchInput(c.to_string()))
                }
                _ => None,
            };
        }

        // Handle TOC-focused navigation
        if model.toc.focused && model.toc.visible {
            return match key.code {
                KeyCode::Char('j') | KeyCode::Down => Some(Message::TocDown),
                KeyCode::Char('k') | KeyCode::Up => Some(Message::TocUp),
                KeyCode::Enter | KeyCode::Char(' ') => Some(Message::TocSelect),
                KeyCode::Char('h') | KeyCode::Left => Some(Message::TocCollapse),
                KeyCode::Char('l') | KeyCode::Right => Some(Message::TocExpand),
                KeyCode::Tab | KeyCode::Esc => Some(Message::SwitchFocus),
                KeyCode::Char('?') | KeyCode::F(1) => Some(Message::ToggleHelp),
                KeyCode::Char('t') => Some(Message::ToggleToc),
                KeyCode::Char('q') => Some(Message::Quit),
                _ => None,
            };
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let can_down = model.viewport.can_scroll_down();
        let can_up = model.viewport.can_scroll_up();
        match key.code {
            // Navigation
            KeyCode::Char('j') | KeyCode::Down if can_down => Some(Message::ScrollDown(1)),
            KeyCode::Char('k') | KeyCode::Up if can_up => Some(Message::ScrollUp(1)),
            KeyCode::Char('d') if ctrl && can_down => Some(Message::HalfPageDown),
            KeyCode::Char('u') if ctrl && can_up => Some(Message::HalfPageUp),
            KeyCode::Char(' ') | KeyCode::PageDown if can_down => Some(Message::PageDown),
            KeyCode::Char('b') | KeyCode::PageUp if can_up => Some(Message::PageUp),
            KeyCode::Char('g') | KeyCode::Home => Some(Message::GoToTop),
            KeyCode::Char('G') | KeyCode::End => Some(Message::GoToBottom),
            KeyCode::Char('f') => Self::first_visible_internal_link(model),

            // TOC
            KeyCode::Char('t') => Some(Message::ToggleToc),
            KeyCode::Tab if model.toc.visible => Some(Message::SwitchFocus),

            // File
            KeyCode::Char('w') => Some(Message::ToggleWatch),
            KeyCode::Char('r') => Some(Message::Reload),
            KeyCode::Char('?') | KeyCode::F(1) => Some(Message::ToggleHelp),

            // Search
            KeyCode::Char('/') => Some(Message::StartSearch),
            KeyCode::Char('n') if matches!(model.search, SearchMode::Active { .. }) => {
                Some(Message::NextMatch)
            }
            KeyCode::Char('N') if matches!(model.search, SearchMode::Active { .. }) => {
                Some(Message::PrevMatch)
            }
            KeyCode::Esc => Some(Message::ClearSearch),

            KeyCode::Char('q') => Some(Message::Quit),
            _ => None,
        }
    }
}
