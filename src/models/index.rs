// Index configuration: a named retrieval strategy attached to a datastore

use serde::{Deserialize, Serialize};

use crate::error::{Result, RetrievalError};

/// A retrieval strategy over a datastore.
///
/// An index without a query encoder is a pure lexical (BM25) strategy; one
/// with a query encoder is a dense strategy and must carry a positive
/// embedding size so query vectors can be validated and padded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub datastore_name: String,
    pub name: String,
    #[serde(default)]
    pub doc_encoder_model: Option<String>,
    #[serde(default)]
    pub doc_encoder_adapter: Option<String>,
    #[serde(default)]
    pub query_encoder_model: Option<String>,
    #[serde(default)]
    pub query_encoder_adapter: Option<String>,
    #[serde(default)]
    pub embedding_size: usize,
    #[serde(default)]
    pub embedding_mode: Option<String>,
}

impl Index {
    /// A pure-lexical index with no dense configuration.
    pub fn lexical(datastore_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            datastore_name: datastore_name.into(),
            name: name.into(),
            doc_encoder_model: None,
            doc_encoder_adapter: None,
            query_encoder_model: None,
            query_encoder_adapter: None,
            embedding_size: 0,
            embedding_mode: None,
        }
    }

    pub fn is_dense(&self) -> bool {
        self.query_encoder_model.is_some()
    }

    /// A dense index must have a positive embedding size; the orchestrator
    /// relies on this to pad and validate query vectors.
    pub fn validate(&self) -> Result<()> {
        if self.is_dense() && self.embedding_size == 0 {
            return Err(RetrievalError::Invalid(format!(
                "index {} has a query encoder but no embedding size",
                self.name
            )));
        }
        Ok(())
    }

    /// Right-pads `vector` with zeros up to the configured embedding size.
    ///
    /// Longer vectors are passed through unchanged; that indicates a
    /// misconfigured encoder and is logged, not truncated.
    pub fn pad_vector(&self, mut vector: Vec<f32>) -> Vec<f32> {
        if vector.len() < self.embedding_size {
            vector.resize(self.embedding_size, 0.0);
        } else if vector.len() > self.embedding_size {
            tracing::warn!(
                index = %self.name,
                got = vector.len(),
                configured = self.embedding_size,
                "query vector longer than configured embedding size"
            );
        }
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense(embedding_size: usize) -> Index {
        Index {
            query_encoder_model: Some("enc-a".to_string()),
            embedding_size,
            ..Index::lexical("wiki", "dense")
        }
    }

    #[test]
    fn test_validate_requires_embedding_size_for_dense() {
        assert!(dense(0).validate().is_err());
        assert!(dense(4).validate().is_ok());
        assert!(Index::lexical("wiki", "bm25").validate().is_ok());
    }

    #[test]
    fn test_pad_vector_right_pads_with_zeros() {
        let padded = dense(4).pad_vector(vec![0.1, 0.2]);
        assert_eq!(padded, vec![0.1, 0.2, 0.0, 0.0]);
    }

    #[test]
    fn test_pad_vector_leaves_full_and_long_vectors_alone() {
        assert_eq!(dense(2).pad_vector(vec![0.1, 0.2]), vec![0.1, 0.2]);
        assert_eq!(dense(2).pad_vector(vec![0.1, 0.2, 0.3]), vec![0.1, 0.2, 0.3]);
    }
}
