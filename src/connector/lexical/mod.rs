// Lexical store connector over the document-store engine's REST API

mod convert;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use crate::config::Settings;
use crate::connector::{DatastoreConnector, DocumentStream};
use crate::error::{Result, RetrievalError};
use crate::models::{Datastore, DatastoreStats, Document, Index, QueryResult};

/// Suffix of the collection holding a datastore's documents.
const DOCS_SUFFIX: &str = "-docs";
/// Suffix of the schema-less collection holding a datastore's index configs.
const CONFIGS_SUFFIX: &str = "-search-indices";

/// Connector for an Elasticsearch-style document-store backend.
///
/// Each datastore maps to two physically separate collections: a documents
/// collection whose mapping mirrors the datastore's fields, and a
/// schema-less configs collection holding one record per index, keyed by
/// index name. The two are created and deleted in separate, non-atomic
/// steps; see `add_datastore` and `delete_datastore` for the resulting
/// inconsistency windows.
pub struct LexicalConnector {
    client: reqwest::Client,
    base_url: String,
    scroll_batch_size: usize,
}

fn docs_collection(datastore_name: &str) -> String {
    format!("{}{}", datastore_name, DOCS_SUFFIX)
}

fn configs_collection(datastore_name: &str) -> String {
    format!("{}{}", datastore_name, CONFIGS_SUFFIX)
}

impl LexicalConnector {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: settings.document_store_url.trim_end_matches('/').to_string(),
            scroll_batch_size: settings.scroll_batch_size,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Sends a request and returns the response status together with the
    /// decoded JSON body (`Null` when the body is not JSON).
    async fn request_json(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut request = self.client.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        let value = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, value))
    }

    fn backend_error(status: StatusCode, path: &str) -> RetrievalError {
        RetrievalError::Backend(format!("document store returned {} for {}", status, path))
    }
}

#[async_trait]
impl DatastoreConnector for LexicalConnector {
    // --- Datastore schemas ---

    async fn get_datastores(&self) -> Result<Vec<Datastore>> {
        let path = format!("*{}", DOCS_SUFFIX);
        let (status, body) = self.request_json(Method::GET, &path, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(Self::backend_error(status, &path));
        }
        let mut datastores = Vec::new();
        if let Some(collections) = body.as_object() {
            for (collection, mapping) in collections {
                let Some(name) = collection.strip_suffix(DOCS_SUFFIX) else {
                    continue;
                };
                datastores.push(convert::datastore_from_mapping(name, mapping));
            }
        }
        Ok(datastores)
    }

    async fn get_datastore(&self, datastore_name: &str) -> Result<Option<Datastore>> {
        let docs = docs_collection(datastore_name);
        let (status, body) = self.request_json(Method::GET, &docs, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::backend_error(status, &docs));
        }
        Ok(Some(convert::datastore_from_mapping(
            datastore_name,
            &body[&docs],
        )))
    }

    async fn add_datastore(&self, datastore: &Datastore) -> Result<bool> {
        let docs = docs_collection(&datastore.name);
        let mapping = convert::mapping_from_datastore(datastore);
        let (status, _) = self.request_json(Method::PUT, &docs, Some(mapping)).await?;
        if !status.is_success() {
            tracing::info!(datastore = %datastore.name, %status,
                "document collection create rejected");
            return Ok(false);
        }

        let configs = configs_collection(&datastore.name);
        let (status, _) = self
            .request_json(Method::PUT, &configs, Some(json!({})))
            .await?;
        if !status.is_success() {
            // Partial create: the documents collection exists without its
            // configs counterpart. Clean up best-effort and report failure;
            // retrying the create is the caller's repair path.
            tracing::warn!(datastore = %datastore.name, %status,
                "config collection create failed after document collection create");
            if let Err(err) = self.request_json(Method::DELETE, &docs, None).await {
                tracing::warn!(datastore = %datastore.name, %err,
                    "cleanup of partially created datastore failed");
            }
            return Ok(false);
        }
        Ok(true)
    }

    async fn update_datastore(&self, datastore: &Datastore) -> Result<bool> {
        let path = format!("{}/_mapping", docs_collection(&datastore.name));
        let mapping = convert::mapping_from_datastore(datastore);
        let (status, _) = self
            .request_json(Method::PUT, &path, Some(mapping["mappings"].clone()))
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(Self::backend_error(status, &path));
        }
        Ok(true)
    }

    async fn delete_datastore(&self, datastore_name: &str) -> Result<bool> {
        let docs = docs_collection(datastore_name);
        let (status, _) = self.request_json(Method::DELETE, &docs, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(Self::backend_error(status, &docs));
        }

        let configs = configs_collection(datastore_name);
        let (status, _) = self.request_json(Method::DELETE, &configs, None).await?;
        if status == StatusCode::NOT_FOUND {
            // Partial delete window: the documents collection is already
            // gone while the configs collection was missing.
            tracing::warn!(datastore = datastore_name,
                "config collection was already missing during datastore delete");
            return Ok(false);
        }
        if !status.is_success() {
            return Err(Self::backend_error(status, &configs));
        }
        Ok(true)
    }

    async fn get_datastore_stats(&self, datastore_name: &str) -> Result<Option<DatastoreStats>> {
        let path = format!("{}/_stats", docs_collection(datastore_name));
        let (status, body) = self.request_json(Method::GET, &path, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::backend_error(status, &path));
        }
        let primaries = &body["_all"]["primaries"];
        Ok(Some(DatastoreStats {
            name: datastore_name.to_string(),
            documents: primaries["docs"]["count"].as_u64().unwrap_or(0),
            size_in_bytes: primaries["store"]["size_in_bytes"].as_u64().unwrap_or(0),
        }))
    }

    // --- Index configurations ---

    async fn get_indices(&self, datastore_name: &str) -> Result<Vec<Index>> {
        let path = format!(
            "{}/_search?ignore_unavailable=true",
            configs_collection(datastore_name)
        );
        let body = json!({ "query": { "match_all": {} } });
        let (status, response) = self.request_json(Method::POST, &path, Some(body)).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(Self::backend_error(status, &path));
        }
        let mut indices = Vec::new();
        if let Some(hits) = response["hits"]["hits"].as_array() {
            for hit in hits {
                indices.push(convert::index_from_record(&hit["_source"])?);
            }
        }
        Ok(indices)
    }

    async fn get_index(&self, datastore_name: &str, index_name: &str) -> Result<Option<Index>> {
        let path = format!(
            "{}/_doc/{}",
            configs_collection(datastore_name),
            index_name
        );
        let (status, body) = self.request_json(Method::GET, &path, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::backend_error(status, &path));
        }
        if !body["found"].as_bool().unwrap_or(false) {
            return Ok(None);
        }
        convert::index_from_record(&body["_source"]).map(Some)
    }

    async fn add_index(&self, index: &Index) -> Result<bool> {
        index.validate()?;
        let path = format!(
            "{}/_doc/{}",
            configs_collection(&index.datastore_name),
            index.name
        );
        let record = convert::record_from_index(index)?;
        let (status, body) = self.request_json(Method::PUT, &path, Some(record)).await?;
        if !status.is_success() {
            tracing::info!(index = %index.name, %status, "index create rejected");
            return Ok(false);
        }
        Ok(body["_shards"]["successful"].as_u64().unwrap_or(0) > 0)
    }

    async fn update_index(&self, index: &Index) -> Result<(bool, bool)> {
        index.validate()?;
        let path = format!(
            "{}/_update/{}",
            configs_collection(&index.datastore_name),
            index.name
        );
        let body = json!({ "doc": convert::record_from_index(index)? });
        let (status, response) = self.request_json(Method::POST, &path, Some(body)).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok((false, false));
        }
        if !status.is_success() {
            return Err(Self::backend_error(status, &path));
        }
        let success = response["_shards"]["successful"].as_u64().unwrap_or(0) > 0;
        let created = response["result"].as_str() == Some("created");
        Ok((success, created))
    }

    async fn delete_index(&self, datastore_name: &str, index_name: &str) -> Result<bool> {
        let path = format!(
            "{}/_doc/{}",
            configs_collection(datastore_name),
            index_name
        );
        let (status, body) = self.request_json(Method::DELETE, &path, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(Self::backend_error(status, &path));
        }
        Ok(body["result"].as_str() == Some("deleted"))
    }

    // --- Documents ---

    fn get_documents<'a>(&'a self, datastore_name: &str) -> DocumentStream<'a> {
        let docs = docs_collection(datastore_name);
        let batch_size = self.scroll_batch_size;
        Box::pin(async_stream::try_stream! {
            let path = format!("{}/_search?scroll=2m&ignore_unavailable=true", docs);
            let body = json!({ "query": { "match_all": {} }, "size": batch_size });
            let (status, mut page) = self
                .request_json(Method::POST, &path, Some(body))
                .await?;
            if status != StatusCode::NOT_FOUND {
                if !status.is_success() {
                    Err(Self::backend_error(status, &path))?;
                }
                loop {
                    let scroll_id = page["_scroll_id"].as_str().map(str::to_string);
                    let hits = page["hits"]["hits"].as_array().cloned().unwrap_or_default();
                    if hits.is_empty() {
                        if let Some(scroll_id) = &scroll_id {
                            // cursor exhausted; release it server-side
                            let _ = self
                                .request_json(
                                    Method::DELETE,
                                    "_search/scroll",
                                    Some(json!({ "scroll_id": scroll_id })),
                                )
                                .await;
                        }
                        break;
                    }
                    for hit in &hits {
                        let id = hit["_id"].as_str().unwrap_or_default();
                        yield convert::document_from_source(&hit["_source"], id);
                    }
                    let Some(scroll_id) = scroll_id else { break };
                    let body = json!({ "scroll": "2m", "scroll_id": scroll_id });
                    let (status, next) = self
                        .request_json(Method::POST, "_search/scroll", Some(body))
                        .await?;
                    if !status.is_success() {
                        Err(Self::backend_error(status, "_search/scroll"))?;
                    }
                    page = next;
                }
            }
        })
    }

    async fn get_document(
        &self,
        datastore_name: &str,
        document_id: &str,
    ) -> Result<Option<Document>> {
        let path = format!("{}/_doc/{}", docs_collection(datastore_name), document_id);
        let (status, body) = self.request_json(Method::GET, &path, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::backend_error(status, &path));
        }
        if !body["found"].as_bool().unwrap_or(false) {
            return Ok(None);
        }
        Ok(Some(convert::document_from_source(
            &body["_source"],
            document_id,
        )))
    }

    async fn get_document_batch(
        &self,
        datastore_name: &str,
        document_ids: &[String],
    ) -> Result<Vec<Document>> {
        if document_ids.is_empty() {
            return Ok(Vec::new());
        }
        let path = format!("{}/_mget", docs_collection(datastore_name));
        let body = json!({ "ids": document_ids });
        let (status, response) = self.request_json(Method::POST, &path, Some(body)).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(Self::backend_error(status, &path));
        }
        let mut documents = Vec::new();
        if let Some(entries) = response["docs"].as_array() {
            for entry in entries {
                // ids unknown to the store come back with found=false and
                // are dropped here
                if !entry["found"].as_bool().unwrap_or(false) {
                    continue;
                }
                let id = entry["_id"].as_str().unwrap_or_default();
                documents.push(convert::document_from_source(&entry["_source"], id));
            }
        }
        Ok(documents)
    }

    async fn add_document(
        &self,
        datastore_name: &str,
        document_id: &str,
        document: &Document,
    ) -> Result<(bool, bool)> {
        let (_, source) = convert::source_from_document(&document.clone().with_id(document_id))?;
        let path = format!("{}/_doc/{}", docs_collection(datastore_name), document_id);
        let (status, body) = self.request_json(Method::PUT, &path, Some(source)).await?;
        if !status.is_success() {
            tracing::info!(datastore = datastore_name, document = document_id, %status,
                "document write rejected");
            return Ok((false, false));
        }
        let success = body["_shards"]["successful"].as_u64().unwrap_or(0) > 0;
        let created = body["result"].as_str() == Some("created");
        Ok((success, created))
    }

    async fn add_document_batch(
        &self,
        datastore_name: &str,
        documents: &[Document],
    ) -> Result<(usize, usize)> {
        let Some(datastore) = self.get_datastore(datastore_name).await? else {
            return Ok((0, documents.len()));
        };
        let (body, rejected) =
            convert::bulk_body(&datastore, &docs_collection(datastore_name), documents);
        if body.is_empty() {
            return Ok((0, rejected));
        }
        let response = self
            .client
            .post(self.url("_bulk"))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::backend_error(status, "_bulk"));
        }
        let outcome: Value = response.json().await?;
        Ok(convert::bulk_counts(&outcome, rejected))
    }

    async fn update_document(
        &self,
        datastore_name: &str,
        document_id: &str,
        document: &Document,
    ) -> Result<(bool, bool)> {
        let (_, source) = convert::source_from_document(&document.clone().with_id(document_id))?;
        let path = format!("{}/_update/{}", docs_collection(datastore_name), document_id);
        let body = json!({ "doc": source });
        let (status, response) = self.request_json(Method::POST, &path, Some(body)).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok((false, false));
        }
        if !status.is_success() {
            return Err(Self::backend_error(status, &path));
        }
        let success = response["_shards"]["successful"].as_u64().unwrap_or(0) > 0;
        let created = response["result"].as_str() == Some("created");
        Ok((success, created))
    }

    async fn delete_document(&self, datastore_name: &str, document_id: &str) -> Result<bool> {
        let path = format!("{}/_doc/{}", docs_collection(datastore_name), document_id);
        let (status, body) = self.request_json(Method::DELETE, &path, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(Self::backend_error(status, &path));
        }
        Ok(body["result"].as_str() == Some("deleted"))
    }

    async fn has_document(&self, datastore_name: &str, document_id: &str) -> Result<bool> {
        let path = format!("{}/_doc/{}", docs_collection(datastore_name), document_id);
        let response = self.client.head(self.url(&path)).send().await?;
        Ok(response.status().is_success())
    }

    // --- Lexical search ---

    async fn search(
        &self,
        datastore_name: &str,
        query: &str,
        n_hits: usize,
    ) -> Result<Vec<QueryResult>> {
        let path = format!("{}/_search", docs_collection(datastore_name));
        let body = json!({
            "query": { "multi_match": { "query": query } },
            "size": n_hits,
        });
        let (status, response) = self.request_json(Method::POST, &path, Some(body)).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(RetrievalError::NotFound(format!(
                "datastore {} does not exist",
                datastore_name
            )));
        }
        if !status.is_success() {
            return Err(Self::backend_error(status, &path));
        }
        let mut results = Vec::new();
        if let Some(hits) = response["hits"]["hits"].as_array() {
            for hit in hits {
                let id = hit["_id"].as_str().unwrap_or_default().to_string();
                let score = hit["_score"].as_f64().unwrap_or(0.0) as f32;
                let document = convert::document_from_source(&hit["_source"], &id);
                results.push(QueryResult::new(document, score, id));
            }
        }
        Ok(results)
    }

    async fn search_for_id(
        &self,
        datastore_name: &str,
        query: &str,
        document_id: &str,
    ) -> Result<Option<QueryResult>> {
        if !self.has_document(datastore_name, document_id).await? {
            return Ok(None);
        }
        let path = format!(
            "{}/_explain/{}",
            docs_collection(datastore_name),
            document_id
        );
        let body = json!({ "query": { "multi_match": { "query": query } } });
        let (status, response) = self.request_json(Method::POST, &path, Some(body)).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::backend_error(status, &path));
        }
        let score = response["explanation"]["value"].as_f64().unwrap_or(0.0) as f32;
        let Some(document) = self.get_document(datastore_name, document_id).await? else {
            return Ok(None);
        };
        Ok(Some(QueryResult::new(document, score, document_id)))
    }

    // --- Management ---

    async fn commit(&self) -> Result<()> {
        let (status, _) = self.request_json(Method::POST, "_refresh", None).await?;
        if !status.is_success() {
            return Err(Self::backend_error(status, "_refresh"));
        }
        Ok(())
    }
}
