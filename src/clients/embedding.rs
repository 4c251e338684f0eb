// HTTP client for the external embedding (encoder) service

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use crate::clients::QueryEncoder;
use crate::config::Settings;
use crate::error::{Result, RetrievalError};
use crate::models::Index;

const SERVICE: &str = "embedding service";

/// Client for the encoder service that turns query text into query vectors.
pub struct EmbeddingServiceClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    /// Base64-encoded little-endian f32 array.
    embeddings: String,
}

#[derive(Debug, Deserialize)]
struct HeartbeatResponse {
    #[serde(default)]
    is_alive: bool,
}

impl EmbeddingServiceClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: settings
                .embedding_service_url
                .trim_end_matches('/')
                .to_string(),
        })
    }

    fn decode_embeddings(encoded: &str) -> Result<Vec<f32>> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|err| {
                RetrievalError::unavailable(SERVICE, format!("invalid embedding payload: {}", err))
            })?;
        if bytes.len() % 4 != 0 {
            return Err(RetrievalError::unavailable(
                SERVICE,
                format!("embedding payload of {} bytes is not an f32 array", bytes.len()),
            ));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }
}

#[async_trait]
impl QueryEncoder for EmbeddingServiceClient {
    async fn encode_query(&self, query: &str, index: &Index) -> Result<Option<Vec<f32>>> {
        let Some(model) = &index.query_encoder_model else {
            // pure-lexical index; nothing to encode
            return Ok(None);
        };
        let url = format!("{}/{}/embedding", self.base_url, model);
        let body = json!({
            "input": [query],
            "adapter_name": index.query_encoder_adapter,
            "embedding_mode": index.embedding_mode,
        });
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
                format!("encoder {} returned {}", model, response.status()),
            ));
        }
        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| RetrievalError::unavailable(SERVICE, err))?;
        let embeddings = Self::decode_embeddings(&parsed.embeddings)?;
        if embeddings.len() < index.embedding_size {
            tracing::warn!(index = %index.name, got = embeddings.len(),
                configured = index.embedding_size,
                "embedded query vector shorter than the configured size");
        }
        Ok(Some(index.pad_vector(embeddings)))
    }

    async fn is_alive(&self, index: &Index) -> bool {
        let Some(model) = &index.query_encoder_model else {
            return false;
        };
        let url = format!("{}/{}/health/heartbeat", self.base_url, model);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response
                .json::<HeartbeatResponse>()
                .await
                .map(|heartbeat| heartbeat.is_alive)
                .unwrap_or(false),
            Ok(_) => false,
            Err(err) => {
                tracing::debug!(index = %index.name, %err, "encoder heartbeat failed");
                false
            }
        }
    }
}
