use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::anchor::{self, AnchorSnapshot};
use crate::config::ViewerConfig;
use crate::document::{
    HeadingRef, ImageSlot, LayoutContext, RenderedDocument, parse_and_layout, prepare_content,
};
use crate::highlight::SyntectHighlighter;
use crate::image::{
    DEFAULT_FONT_SIZE, ImageCache, ImageHandle, LoadRequest, cell_size_for, max_image_cols,
};
use crate::search::SearchMode;
use crate::ui::viewport::Viewport;

/// How long a toast stays on screen.
const TOAST_DURATION: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
struct Toast {
    level: ToastLevel,
    message: String,
    expires_at: Instant,
}

/// Failure to read the viewed file.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read `path` and turn it into markdown source.
///
/// Invalid UTF-8 is replaced rather than rejected; code and image files are
/// wrapped so they render sensibly.
pub fn read_source(path: &Path) -> Result<String, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            LoadError::NotFound(path.to_path_buf())
        } else {
            LoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    Ok(prepare_content(path, text))
}

/// Table of contents sidebar state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TocState {
    pub visible: bool,
    pub focused: bool,
    /// Selected heading index.
    pub selected: Option<usize>,
    /// First heading row shown in the sidebar (among visible entries).
    pub scroll_offset: usize,
    /// Headings whose descendants are hidden.
    pub collapsed: HashSet<usize>,
}

impl TocState {
    /// Whether heading `idx` is shown, i.e. none of its ancestors is collapsed.
    pub fn is_shown(&self, headings: &[HeadingRef], idx: usize) -> bool {
        let mut parent = headings.get(idx).and_then(|h| h.parent);
        while let Some(p) = parent {
            if self.collapsed.contains(&p) {
                return false;
            }
            parent = headings.get(p).and_then(|h| h.parent);
        }
        true
    }

    /// Indices of the headings currently listed, in document order.
    pub fn entries(&self, headings: &[HeadingRef]) -> Vec<usize> {
        (0..headings.len())
            .filter(|&idx| self.is_shown(headings, idx))
            .collect()
    }
}

/// Whether heading `idx` has any children.
pub(super) fn has_children(headings: &[HeadingRef], idx: usize) -> bool {
    headings.get(idx + 1).is_some_and(|h| h.parent == Some(idx))
}

/// Image bookkeeping that lives in the model.
///
/// Decoded pixels live in the shared [`ImageCache`]; this only tracks what
/// has been requested, what came back, and under which generation.
#[derive(Debug, Clone)]
pub struct ImageState {
    pub enabled: bool,
    /// Bumped on every reload; older load results are ignored.
    pub generation: u64,
    pub cache: ImageCache,
    /// Terminal cell size in pixels.
    pub font_size: (u16, u16),
    pending: Vec<LoadRequest>,
    in_flight: HashSet<ImageHandle>,
    dimensions: HashMap<ImageHandle, (u32, u32)>,
    failed: HashMap<ImageHandle, String>,
}

impl ImageState {
    pub fn new(enabled: bool, budget_bytes: usize) -> Self {
        Self {
            enabled,
            generation: 0,
            cache: ImageCache::new(budget_bytes),
            font_size: DEFAULT_FONT_SIZE,
            pending: Vec::new(),
            in_flight: HashSet::new(),
            dimensions: HashMap::new(),
            failed: HashMap::new(),
        }
    }

    /// Pixel size of a decoded image.
    pub fn dimensions(&self, handle: &ImageHandle) -> Option<(u32, u32)> {
        self.dimensions.get(handle).copied()
    }

    pub fn failure(&self, handle: &ImageHandle) -> Option<&str> {
        self.failed.get(handle).map(String::as_str)
    }

    pub fn is_in_flight(&self, handle: &ImageHandle) -> bool {
        self.in_flight.contains(handle)
    }

    pub fn has_loads_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Requests queued by `update` for the effect layer to start.
    pub fn pending(&self) -> &[LoadRequest] {
        &self.pending
    }
}

impl Default for ImageState {
    fn default() -> Self {
        Self::new(
            true,
            crate::config::DEFAULT_IMAGE_BUDGET_MB * 1024 * 1024,
        )
    }
}

/// The complete application state.
///
/// All state lives here; `update` turns one model into the next.
#[derive(Debug, Default)]
pub struct Model {
    /// Markdown source currently displayed.
    pub source: String,
    /// The laid-out document
    pub document: RenderedDocument,
    /// Viewport managing scroll position
    pub viewport: Viewport,
    /// Path to the source file
    pub file_path: PathBuf,
    /// Base directory for resolving relative image paths
    pub base_dir: PathBuf,
    /// Image slots and highlighter used for layout
    pub layout: LayoutContext,
    pub toc: TocState,
    pub search: SearchMode,
    /// Whether file watching is enabled
    pub watch_enabled: bool,
    /// Whether help overlay is visible
    pub help_visible: bool,
    /// Whether the app should quit
    pub should_quit: bool,
    /// Terminal background is light
    pub light_background: bool,
    pub images: ImageState,
    /// Global config path shown in help
    pub config_global_path: Option<PathBuf>,
    /// Local override path shown in help
    pub config_local_path: Option<PathBuf>,
    toast: Option<Toast>,
}

impl Model {
    /// Create a model for `source` with default settings.
    ///
    /// `terminal_size` is the full terminal; one row is kept for the status bar.
    pub fn new(file_path: PathBuf, source: String, terminal_size: (u16, u16)) -> Self {
        let mut model = Self {
            source,
            viewport: Viewport::new(terminal_size.0, terminal_size.1.saturating_sub(1), 0),
            base_dir: base_dir_for(&file_path),
            file_path,
            ..Self::default()
        };
        model.rebuild(None);
        model
    }

    /// Create the initial model from resolved configuration.
    pub fn from_config(config: &ViewerConfig, source: String, terminal_size: (u16, u16)) -> Self {
        let mut model = Self {
            source,
            viewport: Viewport::new(terminal_size.0, terminal_size.1.saturating_sub(1), 0),
            file_path: config.file_path.clone(),
            base_dir: base_dir_for(&config.file_path),
            layout: LayoutContext::new(Arc::new(SyntectHighlighter::new(config.theme))),
            toc: TocState {
                visible: config.toc_visible,
                ..TocState::default()
            },
            watch_enabled: config.watch,
            light_background: config.theme.is_light(),
            images: ImageState::new(config.images_enabled, config.image_budget_bytes),
            config_global_path: config.config_global_path.clone(),
            config_local_path: config.config_local_path.clone(),
            ..Self::default()
        };
        model.rebuild(None);
        model.sync_toc_to_viewport();
        model
    }

    /// Use the terminal's reported cell size for image scaling.
    #[must_use]
    pub fn with_font_size(mut self, font_size: (u16, u16)) -> Self {
        if font_size.0 > 0 && font_size.1 > 0 && font_size != self.images.font_size {
            self.images.font_size = font_size;
            self.relayout();
        }
        self
    }

    /// Columns available to the document text.
    pub fn layout_width(&self) -> u16 {
        crate::ui::document_content_width(self.viewport.width(), self.toc.visible)
    }

    /// Re-layout at the current width, keeping the reading position.
    pub(super) fn relayout(&mut self) {
        let snapshot = anchor::capture(&self.document, self.viewport.offset());
        self.rebuild(Some(&snapshot));
    }

    /// Replace the source after a reload and reconcile the reading position.
    pub(super) fn replace_source(&mut self, source: String) {
        let snapshot = anchor::capture_anchor(self);
        let collapsed: Vec<HeadingKey> = self
            .toc
            .collapsed
            .iter()
            .filter_map(|&idx| self.document.headings().get(idx))
            .map(HeadingKey::from)
            .collect();
        let selected = self
            .toc
            .selected
            .and_then(|idx| self.document.headings().get(idx))
            .map(HeadingKey::from);

        self.source = source;
        self.images.generation += 1;
        self.images.pending.clear();
        self.images.in_flight.clear();
        self.images.failed.clear();
        tracing::debug!(generation = self.images.generation, "source replaced");

        self.rebuild(Some(&snapshot));

        let headings = self.document.headings();
        self.toc.collapsed = collapsed
            .iter()
            .filter_map(|key| headings.iter().position(|h| key.matches(h)))
            .collect();
        if let Some(key) = selected {
            self.toc.selected = headings.iter().position(|h| key.matches(h)).or(self.toc.selected);
        }
        self.clamp_toc();
    }

    fn rebuild(&mut self, snapshot: Option<&AnchorSnapshot>) {
        let width = self.layout_width();
        self.sync_image_slots();
        self.document = parse_and_layout(&self.source, width, &self.layout);
        if self.sync_image_slots() {
            self.document = parse_and_layout(&self.source, width, &self.layout);
        }
        self.viewport.set_total_lines(self.document.line_count());
        if let Some(snapshot) = snapshot {
            let line = anchor::reconcile_anchor(&self.document, snapshot);
            self.viewport.scroll_to(line);
        }
        self.refresh_search();
        self.clamp_toc();
        self.queue_visible_loads();
    }

    /// Bring layout image slots in line with what is known about each image.
    ///
    /// Returns true when any slot changed.
    fn sync_image_slots(&mut self) -> bool {
        if !self.images.enabled {
            return false;
        }
        let max_cols = max_image_cols(self.layout_width());
        let mut changed = false;
        for image in self.document.images() {
            let handle = image.source.resolve(&self.base_dir);
            let slot = if let Some(&pixels) = self.images.dimensions.get(&handle) {
                let (_, rows) = cell_size_for(pixels, max_cols, self.images.font_size);
                Some(ImageSlot::Rows(rows))
            } else if self.images.failed.contains_key(&handle) {
                Some(ImageSlot::Missing)
            } else {
                None
            };
            changed |= match slot {
                Some(slot) => self.layout.set_image_slot(image.src.clone(), slot),
                None => self.layout.remove_image_slot(&image.src),
            };
        }
        changed
    }

    /// Record a decoded image's size. Returns true when the layout changed.
    pub(super) fn image_loaded(&mut self, handle: ImageHandle, pixels: (u32, u32)) -> bool {
        self.images.in_flight.remove(&handle);
        self.images.failed.remove(&handle);
        self.images.dimensions.insert(handle, pixels);
        self.sync_image_slots()
    }

    /// Record a failed load. Returns true when the layout changed.
    pub(super) fn image_failed(&mut self, handle: ImageHandle, reason: String) -> bool {
        self.images.in_flight.remove(&handle);
        self.images.dimensions.remove(&handle);
        self.images.failed.insert(handle, reason);
        self.sync_image_slots()
    }

    /// Lines whose images should be loaded: the viewport plus one screen
    /// above and below.
    pub fn image_window(&self) -> Range<usize> {
        let height = self.viewport.height() as usize;
        let top = self.viewport.offset();
        top.saturating_sub(height)..top + height * 2
    }

    /// Queue loads for images near the viewport that are not yet available.
    pub(super) fn queue_visible_loads(&mut self) {
        if !self.images.enabled {
            return;
        }
        let window = self.image_window();
        let visible = self.viewport.visible_range();
        for image in self.document.images() {
            let lines = &image.line_range;
            if lines.end <= window.start || lines.start >= window.end {
                continue;
            }
            let handle = image.source.resolve(&self.base_dir);
            let images = &mut self.images;
            if images.in_flight.contains(&handle) || images.failed.contains_key(&handle) {
                continue;
            }
            // An evicted image is fetched again only once it is on screen,
            // where the cache pins it; lookahead refetches could evict each other.
            let on_screen = lines.start < visible.end && lines.end > visible.start;
            if images.dimensions.contains_key(&handle)
                && (images.cache.contains(&handle) || !on_screen)
            {
                continue;
            }
            images.in_flight.insert(handle.clone());
            images.pending.push(LoadRequest {
                handle,
                source: image.source.clone(),
                generation: images.generation,
            });
        }
    }

    /// Hand queued load requests to the caller.
    pub fn take_pending_loads(&mut self) -> Vec<LoadRequest> {
        std::mem::take(&mut self.images.pending)
    }

    /// Handles of images with rows on screen.
    pub fn visible_image_handles(&self) -> Vec<ImageHandle> {
        let visible = self.viewport.visible_range();
        self.document
            .images()
            .iter()
            .filter(|img| img.line_range.start < visible.end && img.line_range.end > visible.start)
            .map(|img| img.source.resolve(&self.base_dir))
            .collect()
    }

    /// Recompute search matches after the document changed.
    fn refresh_search(&mut self) {
        let SearchMode::Active { query, index, .. } = &self.search else {
            return;
        };
        let matches = crate::search::find_matches(&self.document, query);
        if matches.is_empty() {
            self.search = SearchMode::Idle;
            return;
        }
        let index = (*index).min(matches.len() - 1);
        self.search = SearchMode::Active {
            query: query.clone(),
            matches,
            index,
        };
    }

    /// Rows available to the TOC list inside its border.
    pub(super) const fn toc_visible_rows(&self) -> usize {
        // Full frame height minus top and bottom border.
        (self.viewport.height() as usize + 1).saturating_sub(2)
    }

    fn clamp_toc(&mut self) {
        let count = self.document.headings().len();
        self.toc.collapsed.retain(|&idx| idx < count);
        if count == 0 {
            self.toc.selected = None;
            self.toc.scroll_offset = 0;
            return;
        }
        if let Some(sel) = self.toc.selected {
            let sel = sel.min(count - 1);
            self.toc.selected = Some(self.shown_ancestor(sel));
        }
        self.scroll_toc_to_selection();
    }

    /// `idx` itself if listed, else its nearest listed ancestor.
    pub(super) fn shown_ancestor(&self, mut idx: usize) -> usize {
        let headings = self.document.headings();
        while !self.toc.is_shown(headings, idx) {
            match headings.get(idx).and_then(|h| h.parent) {
                Some(parent) => idx = parent,
                None => break,
            }
        }
        idx
    }

    /// Keep the selected entry inside the TOC viewport.
    pub(super) fn scroll_toc_to_selection(&mut self) {
        let entries = self.toc.entries(self.document.headings());
        let rows = self.toc_visible_rows().max(1);
        let max_offset = entries.len().saturating_sub(rows);
        let Some(pos) = self
            .toc
            .selected
            .and_then(|sel| entries.iter().position(|&e| e == sel))
        else {
            self.toc.scroll_offset = self.toc.scroll_offset.min(max_offset);
            return;
        };
        if pos < self.toc.scroll_offset {
            self.toc.scroll_offset = pos;
        } else if pos >= self.toc.scroll_offset + rows {
            self.toc.scroll_offset = pos + 1 - rows;
        }
        self.toc.scroll_offset = self.toc.scroll_offset.min(max_offset);
    }

    /// Select the heading of the section at the viewport top.
    pub(super) fn sync_toc_to_viewport(&mut self) {
        let Some(idx) = self
            .document
            .heading_at_or_before(self.viewport.offset())
            .or_else(|| (!self.document.headings().is_empty()).then_some(0))
        else {
            self.toc.selected = None;
            self.toc.scroll_offset = 0;
            return;
        };
        self.toc.selected = Some(self.shown_ancestor(idx));
        self.scroll_toc_to_selection();
    }

    pub(super) fn show_toast(&mut self, level: ToastLevel, message: impl Into<String>) {
        self.toast = Some(Toast {
            level,
            message: message.into(),
            expires_at: Instant::now() + TOAST_DURATION,
        });
    }

    /// Drop the toast once it has expired. Returns true when one was removed.
    pub(super) fn expire_toast(&mut self, now: Instant) -> bool {
        if self
            .toast
            .as_ref()
            .is_some_and(|toast| toast.expires_at <= now)
        {
            self.toast = None;
            return true;
        }
        false
    }

    pub fn active_toast(&self) -> Option<(&str, ToastLevel)> {
        self.toast
            .as_ref()
            .map(|toast| (toast.message.as_str(), toast.level))
    }
}

/// Directory relative image paths are resolved against.
fn base_dir_for(file_path: &Path) -> PathBuf {
    file_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Identifies a heading across reloads.
struct HeadingKey {
    id: Option<String>,
    text: String,
}

impl HeadingKey {
    fn matches(&self, heading: &HeadingRef) -> bool {
        match (&self.id, &heading.id) {
            (Some(a), Some(b)) => a == b,
            _ => self.text == heading.text,
        }
    }
}

impl From<&HeadingRef> for HeadingKey {
    fn from(heading: &HeadingRef) -> Self {
        Self {
            id: heading.id.clone(),
            text: heading.text.clone(),
        }
    }
}
