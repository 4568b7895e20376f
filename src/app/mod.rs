//! Application state and main event loop.
//!
//! This module implements The Elm Architecture (TEA):
//! - [`Model`]: The complete application state
//! - [`Message`]: All possible events and actions
//! - [`update`]: Pure function for state transitions
//! - [`App::run`]: Main event loop with rendering

mod effects;
mod event_loop;
mod input;
mod model;
mod update;

pub use model::{ImageState, LoadError, Model, TocState, ToastLevel, read_source};
pub use update::{Message, update};

use crate::config::ViewerConfig;

/// Main application struct that owns the terminal and runs the event loop.
#[derive(Debug)]
pub struct App {
    config: ViewerConfig,
}

impl App {
    /// Create a new application from resolved configuration.
    pub const fn new(config: ViewerConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &ViewerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests;
