// HTTP client for the external ANN vector-search service

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::clients::VectorSearch;
use crate::config::Settings;
use crate::error::{Result, RetrievalError};

const SERVICE: &str = "ANN service";

/// Client for the per-index ANN service endpoints.
///
/// Each `(datastore, index)` pair maps to one logical index named
/// `<prefix>_<datastore>_<index>`; all endpoints live under that name.
pub struct AnnServiceClient {
    client: reqwest::Client,
    base_url: String,
    index_prefix: String,
}

#[derive(Debug, Deserialize)]
struct ExplainResponse {
    score: f32,
}

#[derive(Debug, Deserialize)]
struct ReconstructResponse {
    vector: Vec<f32>,
}

impl AnnServiceClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: settings.ann_service_url.trim_end_matches('/').to_string(),
            index_prefix: settings.ann_index_prefix.clone(),
        })
    }

    fn logical_index_name(&self, datastore_name: &str, index_name: &str) -> String {
        format!("{}_{}_{}", self.index_prefix, datastore_name, index_name)
    }

    fn endpoint(&self, datastore_name: &str, index_name: &str, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.logical_index_name(datastore_name, index_name),
            path
        )
    }

    /// The service returns one result map per input vector; we always send
    /// exactly one, so anything past the first batch is discarded.
    fn first_batch(batches: Vec<HashMap<String, f32>>) -> HashMap<String, f32> {
        batches.into_iter().next().unwrap_or_default()
    }
}

#[async_trait]
impl VectorSearch for AnnServiceClient {
    async fn status(&self, datastore_name: &str, index_name: &str) -> bool {
        let url = self.endpoint(datastore_name, index_name, "index_list");
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::debug!(datastore = datastore_name, index = index_name, %err,
                    "ANN status probe failed");
                false
            }
        }
    }

    async fn search(
        &self,
        datastore_name: &str,
        index_name: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<HashMap<String, f32>> {
        let url = self.endpoint(datastore_name, index_name, "search");
        let body = json!({ "k": top_k, "vectors": [query_vector] });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| RetrievalError::unavailable(SERVICE, err))?;
        if !response.status().is_success() {
            return Err(RetrievalError::unavailable(
                SERVICE,
                format!("search returned {}", response.status()),
            ));
        }
        let batches: Vec<HashMap<String, f32>> = response
            .json()
            .await
            .map_err(|err| RetrievalError::unavailable(SERVICE, err))?;
        Ok(Self::first_batch(batches))
    }

    async fn explain(
        &self,
        datastore_name: &str,
        index_name: &str,
        query_vector: &[f32],
        document_id: &str,
    ) -> Result<f32> {
        let url = self.endpoint(datastore_name, index_name, "explain");
        let body = json!({ "vector": query_vector, "id": document_id });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| RetrievalError::unavailable(SERVICE, err))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RetrievalError::NotFound(format!(
                "document {} is not indexed",
                document_id
            )));
        }
        if !response.status().is_success() {
            return Err(RetrievalError::unavailable(
                SERVICE,
                format!("explain returned {}", response.status()),
            ));
        }
        let parsed: ExplainResponse = response
            .json()
            .await
            .map_err(|err| RetrievalError::unavailable(SERVICE, err))?;
        Ok(parsed.score)
    }

    async fn reconstruct(
        &self,
        datastore_name: &str,
        index_name: &str,
        document_id: &str,
    ) -> Result<Vec<f32>> {
        let url = self.endpoint(datastore_name, index_name, "reconstruct");
        let response = self
            .client
            .get(&url)
            .query(&[("id", document_id)])
            .send()
            .await
            .map_err(|err| RetrievalError::unavailable(SERVICE, err))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RetrievalError::NotFound(format!(
                "document {} is not indexed",
                document_id
            )));
        }
        if !response.status().is_success() {
            return Err(RetrievalError::unavailable(
                SERVICE,
                format!("reconstruct returned {}", response.status()),
            ));
        }
        let parsed: ReconstructResponse = response
            .json()
            .await
            .map_err(|err| RetrievalError::unavailable(SERVICE, err))?;
        Ok(parsed.vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_index_name() {
        let client = AnnServiceClient::new(&Settings::default()).unwrap();
        assert_eq!(client.logical_index_name("wiki", "dense"), "datastore_wiki_dense");
        assert_eq!(
            client.endpoint("wiki", "dense", "search"),
            "http://localhost:5000/datastore_wiki_dense/search"
        );
    }

    #[test]
    fn test_first_batch_takes_first_map_only() {
        let batches = vec![
            HashMap::from([("7".to_string(), 0.9), ("3".to_string(), 0.4)]),
            HashMap::from([("1".to_string(), 0.1)]),
        ];
        let first = AnnServiceClient::first_batch(batches);
        assert_eq!(first.len(), 2);
        assert_eq!(first["7"], 0.9);

        assert!(AnnServiceClient::first_batch(Vec::new()).is_empty());
    }
}
