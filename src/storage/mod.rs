//! Blob locator parsing and document retrieval.
//!
//! Uploads reference documents by locator rather than sending bytes. Accepted forms:
//!
//! - virtual-hosted S3 URLs (`https://bucket.s3.region.amazonaws.com/path/to/file.pdf`)
//! - `s3://bucket/key`, mapped to the public virtual-hosted endpoint
//! - any other `http(s)` URL whose host is listed in `DOCUMENT_ALLOWED_HOSTS`
//! - `file://relative/path` or a bare relative path, resolved under a configured root
//!
//! Object keys are percent-decoded before the file name is derived from them. HTTP fetches
//! never follow redirects, and upstream error bodies are logged rather than returned.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors raised while resolving a locator to bytes.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Locator string could not be interpreted.
    #[error("invalid document locator '{locator}': {reason}")]
    InvalidLocator {
        /// Offending locator.
        locator: String,
        /// What was wrong with it.
        reason: String,
    },
    /// HTTP host is neither an S3 endpoint nor on the allowlist.
    #[error("document host '{0}' is not allowed")]
    HostNotAllowed(String),
    /// Local paths were supplied but no storage root is configured.
    #[error("local document paths are disabled (LOCAL_STORAGE_ROOT is not set)")]
    LocalDisabled,
    /// Object does not exist.
    #[error("document not found: {0}")]
    NotFound(String),
    /// Object exceeded the configured size limit.
    #[error("document is {size} bytes, above the {limit} byte limit")]
    TooLarge {
        /// Reported or observed size.
        size: u64,
        /// Configured maximum.
        limit: u64,
    },
    /// Transport or filesystem failure.
    #[error("failed to fetch document: {0}")]
    Fetch(String),
}

/// Where the bytes of a located object live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectSource {
    /// Fetched over HTTP(S).
    Http(Url),
    /// Read from disk, relative to the storage root.
    Local(PathBuf),
}

/// A parsed document locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocator {
    /// Bucket name for S3 locators.
    pub bucket: Option<String>,
    /// Percent-decoded object key (or relative path).
    pub key: String,
    /// How to retrieve the object.
    pub source: ObjectSource,
}

impl ObjectLocator {
    /// Basename of the object key.
    pub fn file_name(&self) -> &str {
        self.key
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or("document")
    }
}

/// Parse a locator string into an [`ObjectLocator`].
pub fn parse_locator(raw: &str) -> Result<ObjectLocator, StorageError> {
    let locator = raw.trim();
    let invalid = |reason: &str| StorageError::InvalidLocator {
        locator: locator.to_string(),
        reason: reason.to_string(),
    };

    if locator.is_empty() {
        return Err(invalid("locator is empty"));
    }

    if let Some(rest) = locator.strip_prefix("s3://") {
        let (bucket, raw_key) = rest
            .split_once('/')
            .filter(|(bucket, key)| !bucket.is_empty() && !key.is_empty())
            .ok_or_else(|| invalid("expected s3://bucket/key"))?;
        let url = Url::parse(&format!("https://{bucket}.s3.amazonaws.com/{raw_key}"))
            .map_err(|error| invalid(&error.to_string()))?;
        return Ok(ObjectLocator {
            bucket: Some(bucket.to_string()),
            key: decode_key(raw_key).map_err(|reason| invalid(&reason))?,
            source: ObjectSource::Http(url),
        });
    }

    if locator.starts_with("http://") || locator.starts_with("https://") {
        let url = Url::parse(locator).map_err(|error| invalid(&error.to_string()))?;
        let host = url.host_str().ok_or_else(|| invalid("URL has no host"))?;
        let bucket = host
            .contains(".s3.")
            .then(|| host.split('.').next().map(str::to_string))
            .flatten();
        let raw_key = url.path().trim_start_matches('/');
        if raw_key.is_empty() {
            return Err(invalid("URL has no object path"));
        }
        let key = decode_key(raw_key).map_err(|reason| invalid(&reason))?;
        return Ok(ObjectLocator {
            bucket,
            key,
            source: ObjectSource::Http(url),
        });
    }

    let path = match locator.strip_prefix("file://") {
        Some(path) => path,
        None if locator.contains("://") => return Err(invalid("unsupported scheme")),
        None => locator,
    };
    let key = decode_key(path).map_err(|reason| invalid(&reason))?;
    let relative = PathBuf::from(&key);
    if !is_contained(&relative) {
        return Err(invalid("local paths must be relative and stay under the storage root"));
    }
    Ok(ObjectLocator {
        bucket: None,
        key,
        source: ObjectSource::Local(relative),
    })
}

fn decode_key(raw: &str) -> Result<String, String> {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|error| format!("object key is not valid UTF-8: {error}"))
}

fn is_contained(path: &Path) -> bool {
    path.components().all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
        && path.components().any(|component| matches!(component, Component::Normal(_)))
}

/// Interface implemented by document stores.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the full contents of the located object.
    async fn fetch(&self, locator: &ObjectLocator) -> Result<Vec<u8>, StorageError>;
}

/// Whether `host` is an Amazon S3 endpoint.
fn is_s3_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host.ends_with(".amazonaws.com")
        && (host.starts_with("s3.")
            || host.starts_with("s3-")
            || host.contains(".s3.")
            || host.contains(".s3-"))
}

/// Fetches documents over HTTP(S) or from a local root directory.
pub struct BlobClient {
    http: Client,
    local_root: Option<PathBuf>,
    max_bytes: u64,
    allowed_hosts: Vec<String>,
}

impl BlobClient {
    /// Build a client; `local_root` enables `file://` and bare-path locators.
    pub fn new(local_root: Option<PathBuf>, max_bytes: usize) -> Result<Self, StorageError> {
        let http = Client::builder()
            .user_agent("summeryai/storage")
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|error| StorageError::Fetch(error.to_string()))?;
        Ok(Self {
            http,
            local_root,
            max_bytes: max_bytes as u64,
            allowed_hosts: Vec::new(),
        })
    }

    /// Permit HTTP fetches from these hosts in addition to S3 endpoints.
    ///
    /// Entries match either the bare host or `host:port`, case-insensitively.
    pub fn with_allowed_hosts(mut self, hosts: impl IntoIterator<Item = String>) -> Self {
        self.allowed_hosts = hosts
            .into_iter()
            .map(|host| host.trim().to_ascii_lowercase())
            .filter(|host| !host.is_empty())
            .collect();
        self
    }

    fn check_host(&self, url: &Url) -> Result<(), StorageError> {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let with_port = url
            .port_or_known_default()
            .map(|port| format!("{host}:{port}"));
        let allowed = is_s3_host(&host)
            || self
                .allowed_hosts
                .iter()
                .any(|entry| *entry == host || Some(entry) == with_port.as_ref());
        if allowed {
            Ok(())
        } else {
            tracing::warn!(host = %host, "Rejected document host");
            Err(StorageError::HostNotAllowed(host))
        }
    }

    async fn fetch_http(&self, url: &Url) -> Result<Vec<u8>, StorageError> {
        self.check_host(url)?;
        let mut response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|error| {
                StorageError::Fetch(format!("GET {url} failed: {}", error.without_url()))
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
            return Err(StorageError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%url, %status, body = %body, "Document fetch failed");
            return Err(StorageError::Fetch(format!("GET {url} returned {status}")));
        }
        if let Some(length) = response.content_length()
            && length > self.max_bytes
        {
            return Err(StorageError::TooLarge {
                size: length,
                limit: self.max_bytes,
            });
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|error| StorageError::Fetch(error.without_url().to_string()))?
        {
            bytes.extend_from_slice(&chunk);
            self.check_size(bytes.len())?;
        }
        Ok(bytes)
    }

    async fn fetch_local(&self, relative: &Path) -> Result<Vec<u8>, StorageError> {
        let root = self.local_root.as_ref().ok_or(StorageError::LocalDisabled)?;
        let path = root.join(relative);
        let bytes = tokio::fs::read(&path).await.map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(path.display().to_string())
            } else {
                StorageError::Fetch(format!("failed to read {}: {error}", path.display()))
            }
        })?;
        self.check_size(bytes.len())?;
        Ok(bytes)
    }

    fn check_size(&self, size: usize) -> Result<(), StorageError> {
        let size = size as u64;
        if size > self.max_bytes {
            return Err(StorageError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for BlobClient {
    async fn fetch(&self, locator: &ObjectLocator) -> Result<Vec<u8>, StorageError> {
        let bytes = match &locator.source {
            ObjectSource::Http(url) => self.fetch_http(url).await?,
            ObjectSource::Local(relative) => self.fetch_local(relative).await?,
        };
        tracing::debug!(
            key = %locator.key,
            bucket = ?locator.bucket,
            bytes = bytes.len(),
            "Fetched document"
        );
        Ok(bytes)
    }
}
