//! Byte-budgeted LRU cache for decoded images.
//!
//! The cache is shared between the event loop and decode threads. Entries
//! are charged by decoded pixel size. When an insert would push the total
//! over budget, the least recently displayed entries are evicted first;
//! entries marked visible are never evicted.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use image::DynamicImage;

use super::ImageHandle;

#[derive(Debug)]
struct Entry {
    image: Arc<DynamicImage>,
    bytes: usize,
    last_used: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<ImageHandle, Entry>,
    visible: HashSet<ImageHandle>,
    used: usize,
    tick: u64,
}

impl CacheInner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, handle: &ImageHandle) -> bool {
        match self.entries.remove(handle) {
            Some(entry) => {
                self.used -= entry.bytes;
                true
            }
            None => false,
        }
    }

    fn lru_evictable(&self) -> Option<ImageHandle> {
        self.entries
            .iter()
            .filter(|(handle, _)| !self.visible.contains(*handle))
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(handle, _)| handle.clone())
    }
}

/// Shared decoded-image cache. Clones refer to the same storage.
#[derive(Debug, Clone)]
pub struct ImageCache {
    inner: Arc<Mutex<CacheInner>>,
    budget: usize,
}

impl ImageCache {
    /// Create a cache that holds at most `budget_bytes` of decoded pixels.
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner::default())),
            budget: budget_bytes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Insert a decoded image, evicting older entries as needed.
    ///
    /// Returns the handles that were evicted. An image larger than the whole
    /// budget is still stored; it simply displaces everything evictable.
    pub fn insert(&self, handle: ImageHandle, image: Arc<DynamicImage>) -> Vec<ImageHandle> {
        let bytes = byte_size(&image);
        let mut guard = self.lock();
        guard.remove(&handle);

        let mut evicted = Vec::new();
        while guard.used + bytes > self.budget {
            let Some(victim) = guard.lru_evictable() else {
                break;
            };
            guard.remove(&victim);
            evicted.push(victim);
        }

        let last_used = guard.next_tick();
        guard.used += bytes;
        guard.entries.insert(
            handle,
            Entry {
                image,
                bytes,
                last_used,
            },
        );
        if !evicted.is_empty() {
            tracing::debug!(
                count = evicted.len(),
                used = guard.used,
                budget = self.budget,
                "evicted images from cache"
            );
        }
        evicted
    }

    /// Fetch an image and mark it as just displayed.
    pub fn get(&self, handle: &ImageHandle) -> Option<Arc<DynamicImage>> {
        let mut guard = self.lock();
        let tick = guard.next_tick();
        let entry = guard.entries.get_mut(handle)?;
        entry.last_used = tick;
        Some(Arc::clone(&entry.image))
    }

    /// Fetch an image without touching its recency.
    pub fn peek(&self, handle: &ImageHandle) -> Option<Arc<DynamicImage>> {
        self.lock()
            .entries
            .get(handle)
            .map(|entry| Arc::clone(&entry.image))
    }

    pub fn contains(&self, handle: &ImageHandle) -> bool {
        self.lock().entries.contains_key(handle)
    }

    /// Replace the set of on-screen handles. Visible entries are pinned.
    pub fn set_visible<I>(&self, handles: I)
    where
        I: IntoIterator<Item = ImageHandle>,
    {
        let mut guard = self.lock();
        guard.visible = handles.into_iter().collect();
        let tick = guard.next_tick();
        let CacheInner {
            entries, visible, ..
        } = &mut *guard;
        for handle in visible.iter() {
            if let Some(entry) = entries.get_mut(handle) {
                entry.last_used = tick;
            }
        }
    }

    pub fn remove(&self, handle: &ImageHandle) -> bool {
        self.lock().remove(handle)
    }

    pub fn clear(&self) {
        let mut guard = self.lock();
        guard.entries.clear();
        guard.used = 0;
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently charged against the budget.
    pub fn used_bytes(&self) -> usize {
        self.lock().used
    }

    pub const fn budget_bytes(&self) -> usize {
        self.budget
    }
}

/// Decoded size in bytes.
pub fn byte_size(image: &DynamicImage) -> usize {
    image.as_bytes().len()
}
