// Runtime settings for the retrieval core

use std::time::Duration;

/// Connection settings for the three external services.
///
/// Built once at startup (usually via [`Settings::from_env`]) and passed into
/// the connector and client constructors; the core keeps no process-wide
/// configuration state.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the document-store engine.
    pub document_store_url: String,
    /// Base URL of the ANN vector-search service.
    pub ann_service_url: String,
    /// Base URL of the embedding (encoder) service.
    pub embedding_service_url: String,
    /// Prefix of the logical ANN index names (`<prefix>_<datastore>_<index>`).
    pub ann_index_prefix: String,
    /// Timeout applied to outbound HTTP calls.
    pub request_timeout: Duration,
    /// Page size used by the scroll-backed document stream.
    pub scroll_batch_size: usize,
}

impl Settings {
    /// Reads settings from the environment, falling back to local-development
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            document_store_url: std::env::var("DOCUMENT_STORE_URL")
                .unwrap_or(defaults.document_store_url),
            ann_service_url: std::env::var("ANN_SERVICE_URL").unwrap_or(defaults.ann_service_url),
            embedding_service_url: std::env::var("EMBEDDING_SERVICE_URL")
                .unwrap_or(defaults.embedding_service_url),
            ann_index_prefix: std::env::var("ANN_INDEX_PREFIX")
                .unwrap_or(defaults.ann_index_prefix),
            request_timeout: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|value| value.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            scroll_batch_size: std::env::var("SCROLL_BATCH_SIZE")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.scroll_batch_size),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            document_store_url: "http://localhost:9200".to_string(),
            ann_service_url: "http://localhost:5000".to_string(),
            embedding_service_url: "http://localhost:8000".to_string(),
            ann_index_prefix: "datastore".to_string(),
            request_timeout: Duration::from_secs(30),
            scroll_batch_size: 500,
        }
    }
}
