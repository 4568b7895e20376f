//! Asynchronous image decoding.
//!
//! Each request decodes on its own worker thread, stores the pixels in the
//! shared [`ImageCache`] and reports a [`LoadOutcome`] over a channel that
//! the event loop drains between frames. Outcomes carry the generation the
//! request was issued under so results from before a reload can be dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use base64::Engine;
use image::{DynamicImage, GenericImageView};

use super::error::{ImageError, Result};
use super::{ImageCache, ImageHandle, ImageSource};

/// A request to decode one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub handle: ImageHandle,
    pub source: ImageSource,
    pub generation: u64,
}

/// Result of a [`LoadRequest`], delivered to the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded {
        handle: ImageHandle,
        generation: u64,
        /// Pixel width.
        width: u32,
        /// Pixel height.
        height: u32,
    },
    Failed {
        handle: ImageHandle,
        generation: u64,
        reason: String,
    },
}

/// Spawns decode workers that fill a shared cache.
#[derive(Debug)]
pub struct ImageLoader {
    cache: ImageCache,
    base_dir: PathBuf,
    tx: Sender<LoadOutcome>,
}

impl ImageLoader {
    /// Create a loader and the receiving end of its outcome channel.
    pub fn new(base_dir: PathBuf, cache: ImageCache) -> (Self, Receiver<LoadOutcome>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                cache,
                base_dir,
                tx,
            },
            rx,
        )
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub const fn cache(&self) -> &ImageCache {
        &self.cache
    }

    /// Decode `request` off the calling thread.
    ///
    /// Images already in the cache are reported immediately without a worker.
    /// Returns the worker's join handle when one was started.
    pub fn load_async(&self, request: LoadRequest) -> Option<JoinHandle<()>> {
        if let Some(image) = self.cache.peek(&request.handle) {
            let (width, height) = image.dimensions();
            let _ = self.tx.send(LoadOutcome::Loaded {
                handle: request.handle,
                generation: request.generation,
                width,
                height,
            });
            return None;
        }

        let cache = self.cache.clone();
        let tx = self.tx.clone();
        let base_dir = self.base_dir.clone();
        let fallback_tx = self.tx.clone();
        let fallback = (request.handle.clone(), request.generation);

        let spawned = thread::Builder::new()
            .name("marksight-image".to_string())
            .spawn(move || {
                let outcome = load_into_cache(&cache, &base_dir, request);
                let _ = tx.send(outcome);
            });
        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::warn!(error = %err, "failed to spawn image worker");
                let _ = fallback_tx.send(LoadOutcome::Failed {
                    handle: fallback.0,
                    generation: fallback.1,
                    reason: err.to_string(),
                });
                None
            }
        }
    }
}

fn load_into_cache(cache: &ImageCache, base_dir: &Path, request: LoadRequest) -> LoadOutcome {
    let _scope = crate::perf::scope("image.decode");
    let LoadRequest {
        handle,
        source,
        generation,
    } = request;
    match decode(&source, base_dir) {
        Ok(image) => {
            let (width, height) = image.dimensions();
            tracing::debug!(%handle, width, height, "decoded image");
            cache.insert(handle.clone(), Arc::new(image));
            LoadOutcome::Loaded {
                handle,
                generation,
                width,
                height,
            }
        }
        Err(err) => {
            tracing::info!(%handle, error = %err, "image load failed");
            LoadOutcome::Failed {
                handle,
                generation,
                reason: err.to_string(),
            }
        }
    }
}

/// Decode an image from its source, resolving relative paths against `base_dir`.
pub fn decode(source: &ImageSource, base_dir: &Path) -> Result<DynamicImage> {
    let bytes = match source {
        ImageSource::LocalPath(path) => {
            let full = if path.is_absolute() {
                path.clone()
            } else {
                base_dir.join(path)
            };
            read_file(&full)?
        }
        ImageSource::DataUri {
            base64, payload, ..
        } => {
            if *base64 {
                let compact: String = payload.split_whitespace().collect();
                base64::engine::general_purpose::STANDARD
                    .decode(compact.as_bytes())
                    .map_err(|err| ImageError::InvalidDataUri(err.to_string()))?
            } else {
                payload.as_bytes().to_vec()
            }
        }
        ImageSource::Url(url) => return Err(ImageError::UnsupportedSource(url.clone())),
    };
    Ok(image::load_from_memory(&bytes)?)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ImageError::NotFound(path.to_path_buf())
        } else {
            ImageError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::time::Duration;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([9, 8, 7, 255])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_decode_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), png_bytes(3, 2)).unwrap();
        let img = decode(&ImageSource::parse("a.png"), dir.path()).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
    }

    #[test]
    fn test_decode_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = decode(&ImageSource::parse("nope.png"), dir.path()).unwrap_err();
        assert!(matches!(err, ImageError::NotFound(_)), "{err}");
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.png"), b"not a png").unwrap();
        let err = decode(&ImageSource::parse("bad.png"), dir.path()).unwrap_err();
        assert!(matches!(err, ImageError::Decode(_)), "{err}");
    }

    #[test]
    fn test_decode_base64_data_uri() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes(4, 4));
        let src = format!("data:image/png;base64,{encoded}");
        let img = decode(&ImageSource::parse(&src), Path::new(".")).unwrap();
        assert_eq!(img.dimensions(), (4, 4));
    }

    #[test]
    fn test_decode_invalid_base64() {
        let err = decode(
            &ImageSource::parse("data:image/png;base64,!!!"),
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, ImageError::InvalidDataUri(_)));
    }

    #[test]
    fn test_decode_url_is_unsupported() {
        let err = decode(
            &ImageSource::parse("https://example.com/a.png"),
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedSource(_)));
    }

    #[test]
    fn test_load_async_reports_dimensions_and_fills_cache() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pic.png"), png_bytes(5, 7)).unwrap();
        let cache = ImageCache::new(1024 * 1024);
        let (loader, rx) = ImageLoader::new(dir.path().to_path_buf(), cache.clone());
        let source = ImageSource::parse("pic.png");
        let handle = source.resolve(loader.base_dir());

        let worker = loader.load_async(LoadRequest {
            handle: handle.clone(),
            source,
            generation: 3,
        });
        worker.unwrap().join().unwrap();

        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(
            outcome,
            LoadOutcome::Loaded {
                handle: handle.clone(),
                generation: 3,
                width: 5,
                height: 7,
            }
        );
        assert!(cache.contains(&handle));
    }

    #[test]
    fn test_load_async_reports_failure_with_generation() {
        let dir = tempfile::tempdir().unwrap();
        let (loader, rx) = ImageLoader::new(dir.path().to_path_buf(), ImageCache::new(1024));
        let source = ImageSource::parse("missing.png");
        let handle = source.resolve(loader.base_dir());
        if let Some(worker) = loader.load_async(LoadRequest {
            handle: handle.clone(),
            source,
            generation: 9,
        }) {
            worker.join().unwrap();
        }
        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            LoadOutcome::Failed {
                handle: h,
                generation,
                reason,
            } => {
                assert_eq!(h, handle);
                assert_eq!(generation, 9);
                assert!(reason.contains("not found"), "{reason}");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_cached_image_reported_without_worker() {
        let cache = ImageCache::new(1024 * 1024);
        let handle = ImageHandle::from("/tmp/cached.png");
        cache.insert(
            handle.clone(),
            Arc::new(DynamicImage::ImageRgba8(RgbaImage::new(2, 2))),
        );
        let (loader, rx) = ImageLoader::new(PathBuf::from("/tmp"), cache);
        let worker = loader.load_async(LoadRequest {
            handle: handle.clone(),
            source: ImageSource::parse("/tmp/cached.png"),
            generation: 1,
        });
        assert!(worker.is_none());
        assert!(matches!(
            rx.try_recv().unwrap(),
            LoadOutcome::Loaded { width: 2, height: 2, .. }
        ));
    }
}
