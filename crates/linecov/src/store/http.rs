//! Remote HTTP store
//!
//! Posts each batch to a collection service, which owns the merge and
//! declares add-delta semantics. Reads fetch the service's merged report.

use super::{ContentHasher, CoverageBatch, FileHasher, StoreAdapter};
use crate::coverage::{MergeMode, MergedCoverage, TrackingPhase};
use crate::result::{LinecovError, LinecovResult};
use reqwest::blocking::Client;
use reqwest::Method;
use serde_json::{json, Map, Value};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// Extra fields attached to every posted batch
pub trait MetadataProvider: Send + Sync + Debug {
    /// Metadata object, e.g. host name or release
    fn metadata(&self) -> Map<String, Value>;
}

/// Endpoint configuration
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// HTTP method for saving
    pub save_method: Method,
    /// URL batches are sent to
    pub save_url: String,
    /// Save request timeout
    pub save_timeout: Duration,
    /// HTTP method for reading
    pub get_method: Method,
    /// URL the merged report is read from
    pub get_url: String,
    /// Read request timeout
    pub get_timeout: Duration,
}

impl HttpStoreConfig {
    /// POST to `save_url`, GET from `get_url`, 10 second timeouts
    #[must_use]
    pub fn new(save_url: impl Into<String>, get_url: impl Into<String>) -> Self {
        Self {
            save_method: Method::POST,
            save_url: save_url.into(),
            save_timeout: Duration::from_secs(10),
            get_method: Method::GET,
            get_url: get_url.into(),
            get_timeout: Duration::from_secs(10),
        }
    }
}

/// Store backed by a remote collection service
#[derive(Debug)]
pub struct HttpStore {
    config: HttpStoreConfig,
    client: Client,
    hasher: Arc<dyn FileHasher>,
    metadata: Option<Arc<dyn MetadataProvider>>,
}

impl HttpStore {
    /// Create a store for the given endpoints
    pub fn new(config: HttpStoreConfig) -> LinecovResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| LinecovError::config(format!("HTTP client: {e}")))?;
        Ok(Self {
            config,
            client,
            hasher: Arc::new(ContentHasher::new()),
            metadata: None,
        })
    }

    /// Attach a metadata provider
    #[must_use]
    pub fn with_metadata(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.metadata = Some(provider);
        self
    }

    /// Use a different content hasher
    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<dyn FileHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    fn payload(&self, phase: TrackingPhase, batch: &CoverageBatch) -> Value {
        let report: Map<String, Value> = batch
            .iter()
            .map(|(path, lines)| {
                (
                    path.clone(),
                    json!({ "data": lines, "file_hash": self.hasher.hash(path) }),
                )
            })
            .collect();
        let metadata = self
            .metadata
            .as_ref()
            .map(|p| p.metadata())
            .unwrap_or_default();
        json!({
            "coverage_report": report,
            "phase": phase,
            "metadata": metadata,
        })
    }
}

fn transport_error(timeout: Duration) -> impl Fn(reqwest::Error) -> LinecovError {
    move |e| {
        if e.is_timeout() {
            LinecovError::Timeout {
                ms: timeout.as_millis() as u64,
            }
        } else {
            LinecovError::persistence(e.to_string())
        }
    }
}

impl StoreAdapter for HttpStore {
    fn name(&self) -> &'static str {
        "HttpStore"
    }

    fn merge_mode(&self) -> MergeMode {
        MergeMode::AddDelta
    }

    fn save_batch(&self, phase: TrackingPhase, batch: &CoverageBatch) -> LinecovResult<()> {
        let timeout = self.config.save_timeout;
        let _ = self
            .client
            .request(self.config.save_method.clone(), &self.config.save_url)
            .timeout(timeout)
            .json(&self.payload(phase, batch))
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(transport_error(timeout))?;
        Ok(())
    }

    fn load_all(&self, phase: TrackingPhase) -> LinecovResult<MergedCoverage> {
        let timeout = self.config.get_timeout;
        self.client
            .request(self.config.get_method.clone(), &self.config.get_url)
            .timeout(timeout)
            .query(&[("phase", phase.as_str())])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::json::<MergedCoverage>)
            .map_err(transport_error(timeout))
    }

    fn clear_all(&self) -> LinecovResult<()> {
        Err(LinecovError::Unsupported {
            store: "HttpStore",
            operation: "clear_all",
        })
    }

    fn clear_file(&self, _path: &str) -> LinecovResult<()> {
        Err(LinecovError::Unsupported {
            store: "HttpStore",
            operation: "clear_file",
        })
    }
}
