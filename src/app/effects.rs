use std::sync::mpsc::Receiver;

use crate::app::{App, Message, Model, read_source};
use crate::image::{ImageLoader, LoadOutcome};
use crate::watcher::{FileWatcher, WatchPoll};

/// Resources owned by the event loop on behalf of the model.
#[derive(Debug)]
pub(super) struct Runtime {
    pub(super) watcher: Option<FileWatcher>,
    pub(super) loader: ImageLoader,
    outcomes: Receiver<LoadOutcome>,
}

impl Runtime {
    pub(super) fn new(model: &Model) -> Self {
        let (loader, outcomes) = ImageLoader::new(model.base_dir.clone(), model.images.cache.clone());
        Self {
            watcher: None,
            loader,
            outcomes,
        }
    }

    /// Turn finished image loads into messages.
    pub(super) fn drain_image_outcomes(&self) -> Vec<Message> {
        self.outcomes.try_iter().map(outcome_message).collect()
    }

    /// Check the watcher for a settled change.
    pub(super) fn poll_watcher(&mut self, model: &Model) -> Option<Message> {
        let watcher = self.watcher.as_mut()?;
        match watcher.poll() {
            WatchPoll::Idle => None,
            WatchPoll::Changed => {
                tracing::debug!(path = %model.file_path.display(), "file changed on disk");
                Some(reload_message(model))
            }
            WatchPoll::Failed(reason) => {
                tracing::warn!(%reason, "file watcher failed");
                Some(Message::WatchFailed(reason))
            }
        }
    }

    /// Start decoding every image the model asked for.
    pub(super) fn start_pending_loads(&self, model: &mut Model) {
        for request in model.take_pending_loads() {
            crate::perf::log_event(
                "image.load.start",
                format!("handle={} gen={}", request.handle, request.generation),
            );
            // A cache hit is answered on the channel without a thread.
            let _ = self.loader.load_async(request);
        }
    }
}

fn outcome_message(outcome: LoadOutcome) -> Message {
    match outcome {
        LoadOutcome::Loaded {
            handle,
            generation,
            width,
            height,
        } => Message::ImageLoaded {
            handle,
            generation,
            width,
            height,
        },
        LoadOutcome::Failed {
            handle,
            generation,
            reason,
        } => {
            tracing::debug!(%handle, %reason, "image load failed");
            Message::ImageLoadFailed {
                handle,
                generation,
                reason,
            }
        }
    }
}

/// Read the viewed file and wrap the result as a message.
pub(super) fn reload_message(model: &Model) -> Message {
    match read_source(&model.file_path) {
        Ok(source) => {
            tracing::info!(path = %model.file_path.display(), bytes = source.len(), "reloaded");
            Message::FileChanged { source }
        }
        Err(err) => {
            tracing::warn!(%err, "reload failed");
            Message::ReloadFailed(err.to_string())
        }
    }
}

impl App {
    pub(super) fn make_file_watcher(&self, model: &Model) -> notify::Result<FileWatcher> {
        FileWatcher::new(&model.file_path, self.config().watch_debounce)
    }

    /// Perform the I/O a message implies.
    ///
    /// Runs after `update` has applied `msg`; returns follow-up messages.
    pub(super) fn handle_message_side_effects(
        &self,
        model: &Model,
        runtime: &mut Runtime,
        msg: &Message,
    ) -> Vec<Message> {
        match msg {
            Message::ToggleWatch => {
                if !model.watch_enabled {
                    runtime.watcher = None;
                    return Vec::new();
                }
                match self.make_file_watcher(model) {
                    Ok(watcher) => {
                        runtime.watcher = Some(watcher);
                        Vec::new()
                    }
                    Err(err) => {
                        tracing::warn!(%err, path = %model.file_path.display(), "watch unavailable");
                        crate::perf::log_event(
                            "watcher.error",
                            format!("failed path={} err={err}", model.file_path.display()),
                        );
                        vec![Message::WatchFailed(err.to_string())]
                    }
                }
            }
            Message::WatchFailed(_) => {
                runtime.watcher = None;
                Vec::new()
            }
            Message::Reload => vec![reload_message(model)],
            Message::ReloadFailed(reason) => {
                crate::perf::log_event(
                    "reload.error",
                    format!("failed path={} err={reason}", model.file_path.display()),
                );
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}
