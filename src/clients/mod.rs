// Clients for the external ANN and embedding services

pub mod ann;
pub mod embedding;

pub use ann::AnnServiceClient;
pub use embedding::EmbeddingServiceClient;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Index;

/// Vector-search operations against one logical ANN index per
/// `(datastore, index)` pair.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Existence probe. Never fails: any non-success response or connection
    /// error means "absent".
    async fn status(&self, datastore_name: &str, index_name: &str) -> bool;

    /// Nearest-neighbor search returning up to `top_k` hits as a mapping of
    /// document id to score. The mapping carries no order; callers re-sort.
    async fn search(
        &self,
        datastore_name: &str,
        index_name: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<HashMap<String, f32>>;

    /// Scores one specific document against a query vector.
    async fn explain(
        &self,
        datastore_name: &str,
        index_name: &str,
        query_vector: &[f32],
        document_id: &str,
    ) -> Result<f32>;

    /// Returns the stored embedding of a document without recomputing it.
    async fn reconstruct(
        &self,
        datastore_name: &str,
        index_name: &str,
        document_id: &str,
    ) -> Result<Vec<f32>>;
}

/// Turns query text into a query vector using an index's configured encoder.
#[async_trait]
pub trait QueryEncoder: Send + Sync {
    /// Encodes a query for the given index. `Ok(None)` for pure-lexical
    /// indices without a query encoder; vectors are zero-padded to the
    /// index's embedding size.
    async fn encode_query(&self, query: &str, index: &Index) -> Result<Option<Vec<f32>>>;

    /// Health probe for the index's encoder. Never fails: any connection
    /// error, timeout or non-success response means "not alive".
    async fn is_alive(&self, index: &Index) -> bool;
}
