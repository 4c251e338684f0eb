// Per-query result types; never persisted

use serde::{Deserialize, Serialize};

use crate::models::document::Document;

/// Default number of hits returned by search operations.
pub const DEFAULT_TOP_K: usize = 10;

/// One scored hit of a search or score operation.
///
/// `id` always equals the document's identity field after hydration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub document: Document,
    pub score: f32,
    pub id: String,
}

impl QueryResult {
    pub fn new(document: Document, score: f32, id: impl Into<String>) -> Self {
        Self {
            document,
            score,
            id: id.into(),
        }
    }
}

/// The stored embedding of one document, as reconstructed by the ANN service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEmbedding {
    pub id: String,
    pub embedding: Vec<f32>,
}
