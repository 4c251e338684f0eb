// Dense retrieval orchestrator composing the connector with the ANN and
// embedding service clients

use std::sync::Arc;

use crate::clients::{QueryEncoder, VectorSearch};
use crate::connector::DatastoreConnector;
use crate::error::{Result, RetrievalError};
use crate::models::{DocumentEmbedding, Index, QueryResult};

/// Federates the datastore connector, the embedding service and the ANN
/// service into one query/score/explain API.
///
/// Holds no per-call state; one instance is shared across concurrent
/// requests. All collaborators are injected at construction.
pub struct DenseRetrieval {
    connector: Arc<dyn DatastoreConnector>,
    encoder: Arc<dyn QueryEncoder>,
    vector_search: Arc<dyn VectorSearch>,
}

impl DenseRetrieval {
    pub fn new(
        connector: Arc<dyn DatastoreConnector>,
        encoder: Arc<dyn QueryEncoder>,
        vector_search: Arc<dyn VectorSearch>,
    ) -> Self {
        Self {
            connector,
            encoder,
            vector_search,
        }
    }

    /// Whether the index is ready to serve dense queries.
    ///
    /// Requires all three: the index config exists, the ANN service knows
    /// the logical index, and the index's encoder is alive. Fails closed and
    /// short-circuits on the first failing check.
    pub async fn status(&self, datastore_name: &str, index_name: &str) -> bool {
        let index = match self.connector.get_index(datastore_name, index_name).await {
            Ok(Some(index)) => index,
            Ok(None) => return false,
            Err(err) => {
                tracing::warn!(datastore = datastore_name, index = index_name, %err,
                    "index lookup failed during status check");
                return false;
            }
        };
        if !self.vector_search.status(datastore_name, index_name).await {
            return false;
        }
        self.encoder.is_alive(&index).await
    }

    /// Searches for documents matching the query text.
    pub async fn search(
        &self,
        datastore_name: &str,
        index_name: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<QueryResult>> {
        let index = self.require_index(datastore_name, index_name).await?;
        let query_vector = self.query_vector(query, &index).await?;
        self.run_search(datastore_name, &index, query_vector, top_k)
            .await
    }

    /// Searches with a caller-supplied query vector. Shorter vectors are
    /// zero-padded exactly like encoded text queries.
    pub async fn search_by_vector(
        &self,
        datastore_name: &str,
        index_name: &str,
        query_vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<QueryResult>> {
        let index = self.require_index(datastore_name, index_name).await?;
        let query_vector = index.pad_vector(query_vector);
        self.run_search(datastore_name, &index, query_vector, top_k)
            .await
    }

    /// Scores one specific document against the query text.
    pub async fn score(
        &self,
        datastore_name: &str,
        index_name: &str,
        query: &str,
        document_id: &str,
    ) -> Result<QueryResult> {
        let index = self.require_index(datastore_name, index_name).await?;
        let query_vector = self.query_vector(query, &index).await?;
        let score = self
            .vector_search
            .explain(datastore_name, index_name, &query_vector, document_id)
            .await?;
        let document = self
            .connector
            .get_document(datastore_name, document_id)
            .await?
            .ok_or_else(|| {
                RetrievalError::NotFound(format!(
                    "datastore {} has no document {}",
                    datastore_name, document_id
                ))
            })?;
        Ok(QueryResult::new(document, score, document_id))
    }

    /// Returns the stored embedding of a document from the ANN service.
    pub async fn get_document_embedding(
        &self,
        datastore_name: &str,
        index_name: &str,
        document_id: &str,
    ) -> Result<DocumentEmbedding> {
        self.require_index(datastore_name, index_name).await?;
        let embedding = self
            .vector_search
            .reconstruct(datastore_name, index_name, document_id)
            .await?;
        Ok(DocumentEmbedding {
            id: document_id.to_string(),
            embedding,
        })
    }

    async fn require_index(&self, datastore_name: &str, index_name: &str) -> Result<Index> {
        self.connector
            .get_index(datastore_name, index_name)
            .await?
            .ok_or_else(|| {
                RetrievalError::NotFound(format!(
                    "datastore {} has no index {}",
                    datastore_name, index_name
                ))
            })
    }

    async fn query_vector(&self, query: &str, index: &Index) -> Result<Vec<f32>> {
        self.encoder
            .encode_query(query, index)
            .await?
            .ok_or_else(|| {
                RetrievalError::Invalid(format!(
                    "index {} has no query encoder",
                    index.name
                ))
            })
    }

    async fn run_search(
        &self,
        datastore_name: &str,
        index: &Index,
        query_vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<QueryResult>> {
        let scored = self
            .vector_search
            .search(datastore_name, &index.name, &query_vector, top_k)
            .await?;
        let ids: Vec<String> = scored.keys().cloned().collect();
        // lossy join: ids the store no longer has are dropped, ANN staleness
        // against the document store is expected here
        let documents = self
            .connector
            .get_document_batch(datastore_name, &ids)
            .await?;
        let mut results = Vec::with_capacity(documents.len());
        for document in documents {
            let Some(id) = document.id() else { continue };
            let Some(score) = scored.get(&id).copied() else {
                continue;
            };
            results.push(QueryResult::new(document, score, id));
        }
        // the ANN engine's return order is not trusted
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::connector::DocumentStream;
    use crate::models::{Datastore, DatastoreStats, Document};

    struct FakeConnector {
        indices: HashMap<(String, String), Index>,
        documents: HashMap<(String, String), Document>,
    }

    impl FakeConnector {
        fn new() -> Self {
            Self {
                indices: HashMap::new(),
                documents: HashMap::new(),
            }
        }

        fn with_index(mut self, index: Index) -> Self {
            self.indices.insert(
                (index.datastore_name.clone(), index.name.clone()),
                index,
            );
            self
        }

        fn with_document(mut self, datastore_name: &str, value: serde_json::Value) -> Self {
            let document: Document = serde_json::from_value(value).unwrap();
            let id = document.id().unwrap();
            self.documents
                .insert((datastore_name.to_string(), id), document);
            self
        }
    }

    #[async_trait]
    impl DatastoreConnector for FakeConnector {
        async fn get_datastores(&self) -> crate::error::Result<Vec<Datastore>> {
            unimplemented!()
        }
        async fn get_datastore(&self, _: &str) -> crate::error::Result<Option<Datastore>> {
            unimplemented!()
        }
        async fn add_datastore(&self, _: &Datastore) -> crate::error::Result<bool> {
            unimplemented!()
        }
        async fn update_datastore(&self, _: &Datastore) -> crate::error::Result<bool> {
            unimplemented!()
        }
        async fn delete_datastore(&self, _: &str) -> crate::error::Result<bool> {
            unimplemented!()
        }
        async fn get_datastore_stats(
            &self,
            _: &str,
        ) -> crate::error::Result<Option<DatastoreStats>> {
            unimplemented!()
        }
        async fn get_indices(&self, _: &str) -> crate::error::Result<Vec<Index>> {
            unimplemented!()
        }
        async fn get_index(
            &self,
            datastore_name: &str,
            index_name: &str,
        ) -> crate::error::Result<Option<Index>> {
            Ok(self
                .indices
                .get(&(datastore_name.to_string(), index_name.to_string()))
                .cloned())
        }
        async fn add_index(&self, _: &Index) -> crate::error::Result<bool> {
            unimplemented!()
        }
        async fn update_index(&self, _: &Index) -> crate::error::Result<(bool, bool)> {
            unimplemented!()
        }
        async fn delete_index(&self, _: &str, _: &str) -> crate::error::Result<bool> {
            unimplemented!()
        }
        fn get_documents<'a>(&'a self, _: &str) -> DocumentStream<'a> {
            Box::pin(futures::stream::empty())
        }
        async fn get_document(
            &self,
            datastore_name: &str,
            document_id: &str,
        ) -> crate::error::Result<Option<Document>> {
            Ok(self
                .documents
                .get(&(datastore_name.to_string(), document_id.to_string()))
                .cloned())
        }
        async fn get_document_batch(
            &self,
            datastore_name: &str,
            document_ids: &[String],
        ) -> crate::error::Result<Vec<Document>> {
            Ok(document_ids
                .iter()
                .filter_map(|id| {
                    self.documents
                        .get(&(datastore_name.to_string(), id.clone()))
                        .cloned()
                })
                .collect())
        }
        async fn add_document(
            &self,
            _: &str,
            _: &str,
            _: &Document,
        ) -> crate::error::Result<(bool, bool)> {
            unimplemented!()
        }
        async fn add_document_batch(
            &self,
            _: &str,
            _: &[Document],
        ) -> crate::error::Result<(usize, usize)> {
            unimplemented!()
        }
        async fn update_document(
            &self,
            _: &str,
            _: &str,
            _: &Document,
        ) -> crate::error::Result<(bool, bool)> {
            unimplemented!()
        }
        async fn delete_document(&self, _: &str, _: &str) -> crate::error::Result<bool> {
            unimplemented!()
        }
        async fn has_document(&self, _: &str, _: &str) -> crate::error::Result<bool> {
            unimplemented!()
        }
        async fn search(
            &self,
            _: &str,
            _: &str,
            _: usize,
        ) -> crate::error::Result<Vec<QueryResult>> {
            unimplemented!()
        }
        async fn search_for_id(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> crate::error::Result<Option<QueryResult>> {
            unimplemented!()
        }
        async fn commit(&self) -> crate::error::Result<()> {
            Ok(())
        }
    }

    struct FakeVectorSearch {
        present: bool,
        results: HashMap<String, f32>,
        explain_score: f32,
        stored_embedding: Vec<f32>,
        seen_vectors: Mutex<Vec<Vec<f32>>>,
    }

    impl FakeVectorSearch {
        fn new(results: HashMap<String, f32>) -> Self {
            Self {
                present: true,
                results,
                explain_score: 0.0,
                stored_embedding: Vec::new(),
                seen_vectors: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<Vec<f32>> {
            self.seen_vectors.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VectorSearch for FakeVectorSearch {
        async fn status(&self, _: &str, _: &str) -> bool {
            self.present
        }
        async fn search(
            &self,
            _: &str,
            _: &str,
            query_vector: &[f32],
            top_k: usize,
        ) -> crate::error::Result<HashMap<String, f32>> {
            self.seen_vectors
                .lock()
                .unwrap()
                .push(query_vector.to_vec());
            let mut hits: Vec<(&String, &f32)> = self.results.iter().collect();
            hits.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap());
            Ok(hits
                .into_iter()
                .take(top_k)
                .map(|(id, score)| (id.clone(), *score))
                .collect())
        }
        async fn explain(
            &self,
            _: &str,
            _: &str,
            query_vector: &[f32],
            _: &str,
        ) -> crate::error::Result<f32> {
            self.seen_vectors
                .lock()
                .unwrap()
                .push(query_vector.to_vec());
            Ok(self.explain_score)
        }
        async fn reconstruct(&self, _: &str, _: &str, _: &str) -> crate::error::Result<Vec<f32>> {
            Ok(self.stored_embedding.clone())
        }
    }

    struct FakeEncoder {
        raw_vector: Option<Vec<f32>>,
        alive: bool,
    }

    #[async_trait]
    impl QueryEncoder for FakeEncoder {
        async fn encode_query(
            &self,
            _: &str,
            index: &Index,
        ) -> crate::error::Result<Option<Vec<f32>>> {
            // contract: encoders hand out vectors padded to the index size
            Ok(self
                .raw_vector
                .clone()
                .map(|vector| index.pad_vector(vector)))
        }
        async fn is_alive(&self, _: &Index) -> bool {
            self.alive
        }
    }

    fn dense_index(embedding_size: usize) -> Index {
        Index {
            query_encoder_model: Some("enc-a".to_string()),
            embedding_size,
            ..Index::lexical("wiki", "dense")
        }
    }

    fn orchestrator(
        connector: FakeConnector,
        encoder: FakeEncoder,
        vector_search: FakeVectorSearch,
    ) -> (DenseRetrieval, Arc<FakeVectorSearch>) {
        let vector_search = Arc::new(vector_search);
        let retrieval = DenseRetrieval::new(
            Arc::new(connector),
            Arc::new(encoder),
            vector_search.clone(),
        );
        (retrieval, vector_search)
    }

    #[tokio::test]
    async fn test_search_pads_hydrates_and_sorts() {
        // encoder returns a 2-dim vector for a 4-dim index; the store only
        // has document "7" of the two ANN hits
        let connector = FakeConnector::new()
            .with_index(dense_index(4))
            .with_document("wiki", serde_json::json!({"id": "7", "title": "t"}));
        let encoder = FakeEncoder {
            raw_vector: Some(vec![0.1, 0.2]),
            alive: true,
        };
        let ann = FakeVectorSearch::new(HashMap::from([
            ("7".to_string(), 0.9),
            ("3".to_string(), 0.4),
        ]));
        let (retrieval, ann) = orchestrator(connector, encoder, ann);

        let results = retrieval.search("wiki", "dense", "query", 2).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "7");
        assert_eq!(results[0].score, 0.9);
        assert_eq!(results[0].document.id(), Some("7".to_string()));
        assert_eq!(ann.seen(), vec![vec![0.1, 0.2, 0.0, 0.0]]);
    }

    #[tokio::test]
    async fn test_search_sorts_descending_by_score() {
        let connector = FakeConnector::new()
            .with_index(dense_index(2))
            .with_document("wiki", serde_json::json!({"id": "1"}))
            .with_document("wiki", serde_json::json!({"id": "2"}))
            .with_document("wiki", serde_json::json!({"id": "3"}));
        let encoder = FakeEncoder {
            raw_vector: Some(vec![1.0, 0.0]),
            alive: true,
        };
        let ann = FakeVectorSearch::new(HashMap::from([
            ("1".to_string(), 0.2),
            ("2".to_string(), 0.8),
            ("3".to_string(), 0.5),
        ]));
        let (retrieval, _) = orchestrator(connector, encoder, ann);

        let results = retrieval.search("wiki", "dense", "query", 3).await.unwrap();
        assert_eq!(results.len(), 3);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(results[0].id, "2");
    }

    #[tokio::test]
    async fn test_search_by_vector_applies_same_padding() {
        let connector = FakeConnector::new().with_index(dense_index(4));
        let encoder = FakeEncoder {
            raw_vector: None,
            alive: true,
        };
        let ann = FakeVectorSearch::new(HashMap::new());
        let (retrieval, ann) = orchestrator(connector, encoder, ann);

        let results = retrieval
            .search_by_vector("wiki", "dense", vec![0.5], 10)
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(ann.seen(), vec![vec![0.5, 0.0, 0.0, 0.0]]);
    }

    #[tokio::test]
    async fn test_search_fails_on_missing_index() {
        let connector = FakeConnector::new();
        let encoder = FakeEncoder {
            raw_vector: Some(vec![0.1]),
            alive: true,
        };
        let ann = FakeVectorSearch::new(HashMap::new());
        let (retrieval, _) = orchestrator(connector, encoder, ann);

        let err = retrieval
            .search("wiki", "missing", "query", 10)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_score_explains_and_hydrates() {
        let connector = FakeConnector::new()
            .with_index(dense_index(2))
            .with_document("wiki", serde_json::json!({"id": "7", "title": "t"}));
        let encoder = FakeEncoder {
            raw_vector: Some(vec![0.3, 0.4]),
            alive: true,
        };
        let mut ann = FakeVectorSearch::new(HashMap::new());
        ann.explain_score = 0.42;
        let (retrieval, _) = orchestrator(connector, encoder, ann);

        let result = retrieval.score("wiki", "dense", "query", "7").await.unwrap();
        assert_eq!(result.id, "7");
        assert_eq!(result.score, 0.42);
        assert_eq!(result.document.id(), Some("7".to_string()));
    }

    #[tokio::test]
    async fn test_score_fails_on_missing_document() {
        let connector = FakeConnector::new().with_index(dense_index(2));
        let encoder = FakeEncoder {
            raw_vector: Some(vec![0.3, 0.4]),
            alive: true,
        };
        let ann = FakeVectorSearch::new(HashMap::new());
        let (retrieval, _) = orchestrator(connector, encoder, ann);

        let err = retrieval
            .score("wiki", "dense", "query", "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_document_embedding() {
        let connector = FakeConnector::new().with_index(dense_index(3));
        let encoder = FakeEncoder {
            raw_vector: None,
            alive: true,
        };
        let mut ann = FakeVectorSearch::new(HashMap::new());
        ann.stored_embedding = vec![0.1, 0.2, 0.3];
        let (retrieval, _) = orchestrator(connector, encoder, ann);

        let embedding = retrieval
            .get_document_embedding("wiki", "dense", "7")
            .await
            .unwrap();
        assert_eq!(embedding.id, "7");
        assert_eq!(embedding.embedding, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_status_requires_all_three_checks() {
        // all three healthy
        let (retrieval, _) = orchestrator(
            FakeConnector::new().with_index(dense_index(2)),
            FakeEncoder {
                raw_vector: Some(vec![0.1]),
                alive: true,
            },
            FakeVectorSearch::new(HashMap::new()),
        );
        assert!(retrieval.status("wiki", "dense").await);

        // index config missing
        let (retrieval, _) = orchestrator(
            FakeConnector::new(),
            FakeEncoder {
                raw_vector: Some(vec![0.1]),
                alive: true,
            },
            FakeVectorSearch::new(HashMap::new()),
        );
        assert!(!retrieval.status("wiki", "dense").await);

        // ANN probe absent
        let mut ann = FakeVectorSearch::new(HashMap::new());
        ann.present = false;
        let (retrieval, _) = orchestrator(
            FakeConnector::new().with_index(dense_index(2)),
            FakeEncoder {
                raw_vector: Some(vec![0.1]),
                alive: true,
            },
            ann,
        );
        assert!(!retrieval.status("wiki", "dense").await);

        // encoder not alive
        let (retrieval, _) = orchestrator(
            FakeConnector::new().with_index(dense_index(2)),
            FakeEncoder {
                raw_vector: Some(vec![0.1]),
                alive: false,
            },
            FakeVectorSearch::new(HashMap::new()),
        );
        assert!(!retrieval.status("wiki", "dense").await);
    }

    #[tokio::test]
    async fn test_search_on_lexical_index_is_invalid() {
        let connector =
            FakeConnector::new().with_index(Index::lexical("wiki", "bm25"));
        let encoder = FakeEncoder {
            raw_vector: None,
            alive: true,
        };
        let ann = FakeVectorSearch::new(HashMap::new());
        let (retrieval, _) = orchestrator(connector, encoder, ann);

        let err = retrieval
            .search("wiki", "bm25", "query", 10)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Invalid(_)));
    }
}
