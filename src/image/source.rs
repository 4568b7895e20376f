//! Image source classification and handle resolution.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where an image's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageSource {
    /// A file path, relative to the document's directory unless absolute.
    LocalPath(PathBuf),
    /// A remote `http://` or `https://` URL.
    Url(String),
    /// An inline `data:` URI.
    DataUri {
        /// Declared media type, e.g. `image/png`.
        mime: String,
        /// Whether the payload is base64-encoded.
        base64: bool,
        /// Raw payload text after the comma.
        payload: String,
    },
}

impl ImageSource {
    /// Classify the `src` attribute of a markdown image.
    pub fn parse(src: &str) -> Self {
        let trimmed = src.trim();
        if let Some(rest) = strip_prefix_ignore_case(trimmed, "data:") {
            let (header, payload) = rest.split_once(',').unwrap_or((rest, ""));
            let base64 = header
                .rsplit(';')
                .next()
                .is_some_and(|p| p.eq_ignore_ascii_case("base64"));
            let mime = header.split(';').next().unwrap_or_default().to_string();
            return Self::DataUri {
                mime,
                base64,
                payload: payload.to_string(),
            };
        }
        if strip_prefix_ignore_case(trimmed, "http://").is_some()
            || strip_prefix_ignore_case(trimmed, "https://").is_some()
        {
            return Self::Url(trimmed.to_string());
        }
        let path = strip_prefix_ignore_case(trimmed, "file://").unwrap_or(trimmed);
        Self::LocalPath(PathBuf::from(path))
    }

    /// Resolve the source to a cache handle.
    ///
    /// Relative paths are joined onto `base_dir`; data URIs are keyed by a
    /// hash of their payload so large inline images do not bloat the key.
    pub fn resolve(&self, base_dir: &Path) -> ImageHandle {
        let key = match self {
            Self::LocalPath(path) if path.is_absolute() => path.display().to_string(),
            Self::LocalPath(path) => base_dir.join(path).display().to_string(),
            Self::Url(url) => url.clone(),
            Self::DataUri { mime, payload, .. } => {
                let mut hasher = DefaultHasher::new();
                payload.hash(&mut hasher);
                format!("data:{mime};{:016x}", hasher.finish())
            }
        };
        ImageHandle(Arc::from(key))
    }

    /// Short human-readable description used in placeholder lines.
    pub fn describe(&self) -> String {
        match self {
            Self::LocalPath(path) => path.display().to_string(),
            Self::Url(url) => url.clone(),
            Self::DataUri { mime, .. } => format!("data:{mime}"),
        }
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        s.get(prefix.len()..)
    } else {
        None
    }
}

/// Stable key identifying one decoded image in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageHandle(Arc<str>);

impl ImageHandle {
    /// The underlying key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageHandle {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_relative_path_is_local() {
        assert_eq!(
            ImageSource::parse("img/cat.png"),
            ImageSource::LocalPath(PathBuf::from("img/cat.png"))
        );
    }

    #[test]
    fn test_parse_file_scheme_strips_prefix() {
        assert_eq!(
            ImageSource::parse("file:///tmp/a.png"),
            ImageSource::LocalPath(PathBuf::from("/tmp/a.png"))
        );
    }

    #[test]
    fn test_parse_http_is_url() {
        assert!(matches!(
            ImageSource::parse("HTTPS://example.com/a.png"),
            ImageSource::Url(_)
        ));
    }

    #[test]
    fn test_parse_data_uri_extracts_parts() {
        let source = ImageSource::parse("data:image/png;base64,AAAA");
        assert_eq!(
            source,
            ImageSource::DataUri {
                mime: "image/png".to_string(),
                base64: true,
                payload: "AAAA".to_string(),
            }
        );
    }

    #[test]
    fn test_resolve_joins_relative_paths_onto_base() {
        let handle = ImageSource::parse("a.png").resolve(Path::new("/docs"));
        assert_eq!(handle.as_str(), Path::new("/docs").join("a.png").display().to_string());
    }

    #[test]
    fn test_resolve_data_uri_is_stable_and_short() {
        let source = ImageSource::parse("data:image/png;base64,QUJDRA==");
        let a = source.resolve(Path::new("/x"));
        let b = source.resolve(Path::new("/y"));
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("data:image/png;"));
    }
}
