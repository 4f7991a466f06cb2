//! Resource locators and byte fetching
//!
//! A model locator is either a remote `http(s)://` URL or a local file
//! (bare path or `file://` URI). Loaders that reference sibling resources
//! (glTF external buffers) resolve them relative to the model's locator.

use reqwest::Url;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::LoadError;

/// Where a resource lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLocator {
    Remote(Url),
    Local(PathBuf),
}

impl ResourceLocator {
    /// Parse a locator string
    pub fn parse(locator: &str) -> Result<Self, LoadError> {
        let trimmed = locator.trim();
        if trimmed.is_empty() {
            return Err(LoadError::InvalidLocator("empty locator".to_string()));
        }

        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(trimmed)
                .map_err(|e| LoadError::InvalidLocator(format!("{}: {}", trimmed, e)))?;
            return Ok(ResourceLocator::Remote(url));
        }

        if lower.starts_with("file://") {
            let url = Url::parse(trimmed)
                .map_err(|e| LoadError::InvalidLocator(format!("{}: {}", trimmed, e)))?;
            let path = url
                .to_file_path()
                .map_err(|_| LoadError::InvalidLocator(format!("{}: not a file path", trimmed)))?;
            return Ok(ResourceLocator::Local(path));
        }

        Ok(ResourceLocator::Local(PathBuf::from(trimmed)))
    }

    /// Resolve a reference relative to this resource
    ///
    /// Absolute `http(s)://` references replace the base entirely.
    pub fn join(&self, reference: &str) -> Result<Self, LoadError> {
        let lower = reference.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("file://") {
            return Self::parse(reference);
        }

        match self {
            ResourceLocator::Remote(base) => base
                .join(reference)
                .map(ResourceLocator::Remote)
                .map_err(|e| LoadError::InvalidLocator(format!("{} relative to {}: {}", reference, base, e))),
            ResourceLocator::Local(base) => {
                let dir = base.parent().map(PathBuf::from).unwrap_or_default();
                Ok(ResourceLocator::Local(dir.join(reference)))
            }
        }
    }

    /// File name without extension, used to name loader root nodes
    pub fn file_stem(&self) -> Option<String> {
        match self {
            ResourceLocator::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|last| !last.is_empty())
                .map(|last| match last.rsplit_once('.') {
                    Some((stem, _)) if !stem.is_empty() => stem.to_string(),
                    _ => last.to_string(),
                }),
            ResourceLocator::Local(path) => path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned()),
        }
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceLocator::Remote(url) => write!(f, "{}", url),
            ResourceLocator::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Reads resource bytes from disk or over HTTP
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Create a fetcher with the configured timeout and user agent
    pub fn new(config: &FetchConfig) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|source| LoadError::Http {
                url: "<client>".to_string(),
                source,
            })?;

        Ok(Self { client })
    }

    /// Fetch the full contents of a resource
    pub async fn fetch(&self, locator: &ResourceLocator) -> Result<Vec<u8>, LoadError> {
        match locator {
            ResourceLocator::Local(path) => {
                debug!(path = %path.display(), "Reading local resource");
                tokio::fs::read(path).await.map_err(|source| LoadError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
            ResourceLocator::Remote(url) => {
                debug!(url = %url, "Fetching remote resource");
                let response = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|source| LoadError::Http {
                        url: url.to_string(),
                        source,
                    })?;

                if !response.status().is_success() {
                    return Err(LoadError::Status {
                        url: url.to_string(),
                        status: response.status().as_u16(),
                    });
                }

                let bytes = response.bytes().await.map_err(|source| LoadError::Http {
                    url: url.to_string(),
                    source,
                })?;

                debug!(url = %url, bytes = bytes.len(), "Fetched remote resource");
                Ok(bytes.to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_remote_and_local() {
        let remote = ResourceLocator::parse("https://example.com/models/duck.gltf").unwrap();
        assert!(matches!(remote, ResourceLocator::Remote(_)));

        let local = ResourceLocator::parse("assets/duck.obj").unwrap();
        assert_eq!(local, ResourceLocator::Local(PathBuf::from("assets/duck.obj")));

        assert!(ResourceLocator::parse("   ").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_file_uri() {
        let local = ResourceLocator::parse("file:///tmp/models/duck.fbx").unwrap();
        assert_eq!(local, ResourceLocator::Local(PathBuf::from("/tmp/models/duck.fbx")));
    }

    #[test]
    fn test_join_relative() {
        let remote = ResourceLocator::parse("https://example.com/models/duck.gltf").unwrap();
        let buffer = remote.join("duck0.bin").unwrap();
        assert_eq!(buffer.to_string(), "https://example.com/models/duck0.bin");

        let local = ResourceLocator::parse("assets/duck.gltf").unwrap();
        let buffer = local.join("buffers/duck0.bin").unwrap();
        assert_eq!(buffer, ResourceLocator::Local(PathBuf::from("assets/buffers/duck0.bin")));

        let absolute = local.join("https://cdn.example.com/duck0.bin").unwrap();
        assert!(matches!(absolute, ResourceLocator::Remote(_)));
    }

    #[test]
    fn test_file_stem() {
        let remote = ResourceLocator::parse("https://example.com/models/duck.gltf").unwrap();
        assert_eq!(remote.file_stem(), Some("duck".to_string()));

        let local = ResourceLocator::parse("assets/teapot.obj").unwrap();
        assert_eq!(local.file_stem(), Some("teapot".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_local() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.bin");
        std::fs::write(&path, b"turntable").unwrap();

        let fetcher = Fetcher::new(&FetchConfig::default()).unwrap();
        let bytes = fetcher.fetch(&ResourceLocator::Local(path)).await.unwrap();
        assert_eq!(bytes, b"turntable");
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = Fetcher::new(&FetchConfig::default()).unwrap();
        let err = fetcher
            .fetch(&ResourceLocator::Local(temp_dir.path().join("missing.glb")))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
