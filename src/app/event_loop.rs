use std::collections::VecDeque;
use std::io::stdout;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use ratatui::DefaultTerminal;

use crate::app::effects::Runtime;
use crate::app::{App, Message, Model, read_source, update};
use crate::ui::images::ImageSurfaces;

/// Delay before a terminal resize is applied.
const RESIZE_DEBOUNCE_MS: u64 = 100;

/// Holds the latest terminal size until resizing has settled.
pub(super) struct ResizeDebouncer {
    delay_ms: u64,
    pending: Option<(u16, u16, u64)>,
}

impl ResizeDebouncer {
    pub(super) const fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            pending: None,
        }
    }

    pub(super) const fn queue(&mut self, width: u16, height: u16, now_ms: u64) {
        self.pending = Some((width, height, now_ms));
    }

    pub(super) fn take_ready(&mut self, now_ms: u64) -> Option<(u16, u16)> {
        let (width, height, queued_at) = self.pending?;
        if now_ms.saturating_sub(queued_at) >= self.delay_ms {
            self.pending = None;
            Some((width, height))
        } else {
            None
        }
    }

    pub(super) const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl App {
    /// Run the main event loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the terminal cannot be
    /// initialized, or drawing fails.
    pub fn run(&mut self) -> Result<()> {
        let _run_scope = crate::perf::scope("app.run.total");
        let config = self.config().clone();

        let source = read_source(&config.file_path)
            .with_context(|| format!("Failed to open {}", config.file_path.display()))?;

        // Create image picker BEFORE initializing terminal (queries stdio)
        let picker = if config.images_enabled {
            let _picker_scope = crate::perf::scope("app.create_picker");
            crate::image::create_picker(config.force_half_cell)
        } else {
            None
        };

        let mut terminal = ratatui::try_init()
            .context("Failed to initialize terminal; marksight requires an interactive terminal")?;
        let size = terminal.size()?;

        let mut model = {
            let _layout_scope = crate::perf::scope("app.initial_layout");
            Model::from_config(&config, source, (size.width, size.height))
        };
        if let Some(picker) = &picker {
            model = model.with_font_size(picker.font_size());
        }
        tracing::info!(
            path = %config.file_path.display(),
            lines = model.document.line_count(),
            "document loaded"
        );

        let mut runtime = Runtime::new(&model);
        let mut surfaces = ImageSurfaces::new(picker);

        let result = self.event_loop(&mut terminal, &mut model, &mut runtime, &mut surfaces);

        let _ = execute!(stdout(), DisableMouseCapture);
        ratatui::restore();

        result
    }

    /// Apply `first` and every message its effects produce, in order.
    fn dispatch(&self, model: &mut Model, runtime: &mut Runtime, first: Message) {
        let mut queue = VecDeque::from([first]);
        while let Some(msg) = queue.pop_front() {
            crate::perf::log_event("event.message", format!("msg={}", message_label(&msg)));
            let side_msg = msg.clone();
            *model = update(std::mem::take(model), msg);
            queue.extend(self.handle_message_side_effects(model, runtime, &side_msg));
        }
    }

    fn event_loop(
        &self,
        terminal: &mut DefaultTerminal,
        model: &mut Model,
        runtime: &mut Runtime,
        surfaces: &mut ImageSurfaces,
    ) -> Result<()> {
        let start = Instant::now();
        let mut resize_debouncer = ResizeDebouncer::new(RESIZE_DEBOUNCE_MS);
        let mut frame_idx: u64 = 0;
        let mut needs_render = true;

        if model.watch_enabled {
            match self.make_file_watcher(model) {
                Ok(watcher) => runtime.watcher = Some(watcher),
                Err(err) => {
                    tracing::warn!(%err, "watch unavailable");
                    self.dispatch(model, runtime, Message::WatchFailed(err.to_string()));
                }
            }
        }
        execute!(stdout(), EnableMouseCapture)?;

        loop {
            if model.expire_toast(Instant::now()) {
                needs_render = true;
            }

            let now_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            if let Some((width, height)) = resize_debouncer.take_ready(now_ms) {
                crate::perf::log_event(
                    "event.resize.apply",
                    format!("frame={frame_idx} width={width} height={height}"),
                );
                surfaces.clear();
                self.dispatch(model, runtime, Message::Resize(width, height));
                needs_render = true;
            }

            for msg in runtime.drain_image_outcomes() {
                self.dispatch(model, runtime, msg);
                needs_render = true;
            }

            if let Some(msg) = runtime.poll_watcher(model) {
                if matches!(msg, Message::FileChanged { .. }) {
                    surfaces.clear();
                }
                self.dispatch(model, runtime, msg);
                needs_render = true;
            }

            let poll_ms = if needs_render {
                0
            } else if resize_debouncer.is_pending()
                || runtime.watcher.as_ref().is_some_and(|w| w.is_pending())
                || model.images.has_loads_in_flight()
            {
                10
            } else {
                250
            };
            if event::poll(Duration::from_millis(poll_ms))? {
                // Coalesce key repeat bursts into a single render.
                loop {
                    let event_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                    let msg =
                        Self::handle_event(&event::read()?, model, event_ms, &mut resize_debouncer);
                    if let Some(msg) = msg {
                        if matches!(msg, Message::Reload) {
                            surfaces.clear();
                        }
                        self.dispatch(model, runtime, msg);
                        needs_render = true;
                    }
                    if !event::poll(Duration::from_millis(0))? {
                        break;
                    }
                }
            }

            if needs_render {
                frame_idx += 1;
                runtime.start_pending_loads(model);
                model.images.cache.set_visible(model.visible_image_handles());

                let draw_start = Instant::now();
                terminal.draw(|frame| crate::ui::render(model, frame, surfaces))?;
                crate::perf::log_event(
                    "frame.draw",
                    format!(
                        "frame={} draw_ms={:.3} viewport={}..{}",
                        frame_idx,
                        draw_start.elapsed().as_secs_f64() * 1000.0,
                        model.viewport.offset(),
                        model.viewport.offset() + model.viewport.height() as usize,
                    ),
                );
                needs_render = false;
            }

            if model.should_quit {
                break;
            }
        }
        Ok(())
    }
}

/// Message name for the debug log, without large payloads.
fn message_label(msg: &Message) -> String {
    match msg {
        Message::FileChanged { source } => format!("FileChanged({} bytes)", source.len()),
        other => format!("{other:?}"),
    }
}
