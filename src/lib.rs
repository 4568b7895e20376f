#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    clippy::module_name_repetitions
)]

//! # Marksight
//!
//! A terminal markdown viewer with inline images.
//!
//! The document is laid out once per width into a flat list of styled
//! lines; the viewport only picks a window of them. Images are decoded on
//! background threads into a byte-bounded cache and reserve rows in the
//! layout once their dimensions are known.
//!
//! ## Architecture
//!
//! Marksight uses The Elm Architecture (TEA) pattern:
//! - **Model**: Application state
//! - **Message**: Events and actions
//! - **Update**: Pure state transitions
//! - **View**: Render to terminal
//!
//! Side effects (file watching, image loads) run after `update` and feed
//! their results back in as messages.
//!
//! ## Modules
//!
//! - [`app`]: Model, messages, update and the event loop
//! - [`document`]: Markdown parsing and line layout
//! - [`anchor`]: Keeping the reading position across relayouts
//! - [`image`]: Image sources, decoding, the LRU cache and terminal protocols
//! - [`ui`]: Terminal UI components
//! - [`highlight`]: Syntax highlighting
//! - [`search`]: Search functionality
//! - [`watcher`]: File watching
//! - [`config`]: Saved flags and resolved settings

pub mod anchor;
pub mod app;
pub mod config;
pub mod document;
pub mod highlight;
pub mod image;
pub mod perf;
pub mod search;
pub mod ui;
pub mod watcher;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::app::{App, Message, Model, update};
    pub use crate::config::ViewerConfig;
    pub use crate::document::{LayoutContext, RenderedDocument, parse_and_layout};
    pub use crate::ui::viewport::Viewport;
}
