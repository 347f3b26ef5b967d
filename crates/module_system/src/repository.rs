//! Transport used to reach remote artifact repositories.

use crate::error::ModuleSystemError;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Blocking GET access to repository documents and artifacts.
///
/// Implementations return `ModuleSystemError::Network` for any failure,
/// including non-success status codes. Callers treat every error as "this
/// repository does not have it" and move on to the next repository.
pub trait RepositoryTransport: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ModuleSystemError>;

    /// Fetches a text document.
    fn fetch_text(&self, url: &str) -> Result<String, ModuleSystemError> {
        let bytes = self.fetch(url)?;
        String::from_utf8(bytes)
            .map_err(|e| ModuleSystemError::Network(format!("{url}: response is not UTF-8: {e}")))
    }
}

/// HTTP transport backed by a blocking `reqwest` client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ModuleSystemError> {
        Self::with_timeout(None)
    }

    /// Creates a transport with an optional per-request timeout.
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self, ModuleSystemError> {
        let mut builder = reqwest::blocking::Client::builder()
            .user_agent(concat!("module_system/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ModuleSystemError::Network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl RepositoryTransport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ModuleSystemError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ModuleSystemError::Network(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(ModuleSystemError::Network(format!(
                "{url}: server returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| ModuleSystemError::Network(format!("{url}: {e}")))?;
        Ok(bytes.to_vec())
    }
}

/// Transport serving documents from memory.
///
/// Useful for mirrors bundled with the host and for exercising resolution
/// without a network. URLs below an "offline" prefix fail with a network
/// error, which simulates an unreachable repository.
#[derive(Default)]
pub struct InMemoryTransport {
    documents: DashMap<String, Vec<u8>>,
    offline_prefixes: DashMap<String, ()>,
    requests: DashMap<String, usize>,
    total_requests: AtomicUsize,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.documents.insert(url.into(), body.into());
    }

    /// Makes every URL starting with `prefix` fail.
    pub fn take_offline(&self, prefix: impl Into<String>) {
        self.offline_prefixes.insert(prefix.into(), ());
    }

    /// Number of requests made for `url`, successful or not.
    pub fn request_count(&self, url: &str) -> usize {
        self.requests.get(url).map(|count| *count).unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        self.total_requests.load(Ordering::SeqCst)
    }
}

impl RepositoryTransport for InMemoryTransport {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ModuleSystemError> {
        self.total_requests.fetch_add(1, Ordering::SeqCst);
        *self.requests.entry(url.to_string()).or_insert(0) += 1;

        if self
            .offline_prefixes
            .iter()
            .any(|prefix| url.starts_with(prefix.key().as_str()))
        {
            return Err(ModuleSystemError::Network(format!("{url}: connection refused")));
        }

        self.documents
            .get(url)
            .map(|body| body.value().clone())
            .ok_or_else(|| ModuleSystemError::Network(format!("{url}: server returned 404 Not Found")))
    }
}
