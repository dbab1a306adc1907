//! Source acquisition: raw encoded bytes from a local file or a URL.
//!
//! Remote fetches go through an injected [`HttpFetch`] implementation. The
//! production one, [`ReqwestFetcher`], wraps a single blocking `reqwest`
//! client that is built once and shared by every invocation (and every
//! worker thread), so connections are pooled and reused.

use crate::config::FetchConfig;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("no input file or remote input URL provided")]
    NoSource,
    #[error("both an input file and a remote input URL were provided; pick one")]
    ConflictingSources,
    #[error("input file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to fetch {url}: {reason}")]
    Network { url: String, reason: String },
}

impl AcquireError {
    /// Caller mistakes detected before any I/O.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::NoSource | Self::ConflictingSources)
    }
}

/// Where the encoded image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Local(PathBuf),
    Remote(String),
}

impl Source {
    /// Build a source from the two mutually exclusive caller options.
    pub fn from_options(
        input: Option<PathBuf>,
        remote: Option<String>,
    ) -> Result<Self, AcquireError> {
        let input = input.filter(|p| !p.as_os_str().is_empty());
        let remote = remote.filter(|u| !u.trim().is_empty());
        match (input, remote) {
            (Some(path), None) => Ok(Self::Local(path)),
            (None, Some(url)) => Ok(Self::Remote(url)),
            (None, None) => Err(AcquireError::NoSource),
            (Some(_), Some(_)) => Err(AcquireError::ConflictingSources),
        }
    }

    /// Extension of the file name (or the URL path's last segment), lowercased.
    pub fn extension(&self) -> Option<String> {
        let ext = match self {
            Self::Local(path) => path.extension()?.to_str()?.to_string(),
            Self::Remote(url) => {
                let url = reqwest::Url::parse(url).ok()?;
                let name = url.path().rsplit('/').next()?;
                let (_, ext) = name.rsplit_once('.')?;
                ext.to_string()
            }
        };
        (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => f.write_str(url),
        }
    }
}

/// Status and fully drained body of a GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failure (DNS, connect, TLS, read).
#[derive(Error, Debug)]
#[error("{0}")]
pub struct FetchError(pub String);

/// Single blocking GET against a pooled client. Must be safe to share.
pub trait HttpFetch: Sync {
    fn get(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// [`HttpFetch`] over one shared `reqwest` blocking client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(concat!("imgops/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpFetch for ReqwestFetcher {
    fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError(e.to_string()))?;
        let status = response.status().as_u16();
        // Drain the body even for error statuses so the connection goes
        // back to the pool; `bytes()` consumes the response either way.
        let body = response.bytes().map_err(|e| FetchError(e.to_string()))?;
        Ok(FetchResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Turns a [`Source`] into bytes.
#[derive(Debug)]
pub struct SourceAcquirer<F> {
    fetcher: F,
}

impl<F: HttpFetch> SourceAcquirer<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub fn acquire(&self, source: &Source) -> Result<Vec<u8>, AcquireError> {
        match source {
            Source::Local(path) => read_local(path),
            Source::Remote(url) => self.fetch_remote(url),
        }
    }

    fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, AcquireError> {
        let response = self.fetcher.get(url).map_err(|e| AcquireError::Network {
            url: url.to_string(),
            reason: e.0,
        })?;
        if !response.is_success() {
            return Err(AcquireError::Network {
                url: url.to_string(),
                reason: format!("HTTP status {}", response.status),
            });
        }
        log::debug!("fetched {} bytes from {url}", response.body.len());
        Ok(response.body)
    }
}

fn read_local(path: &Path) -> Result<Vec<u8>, AcquireError> {
    std::fs::read(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => AcquireError::NotFound(path.to_path_buf()),
        _ => AcquireError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}
