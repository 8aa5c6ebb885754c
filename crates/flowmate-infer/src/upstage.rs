//! Upstage embeddings API client.

use std::time::Duration;

use async_trait::async_trait;
use flowmate_core::{EmbeddingSettings, Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embedder::{EmbedderBackend, Embedding, EmbeddingBatch};

pub const UPSTAGE_EMBEDDINGS_URL: &str = "https://api.upstage.ai/v1/solar/embeddings";
/// Texts per request.
pub const EMBEDDING_BATCH_SIZE: usize = 3;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

/// Embedder backed by the Upstage embeddings endpoint.
pub struct UpstageEmbedder {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl UpstageEmbedder {
    pub fn new(api_key: impl Into<String>, settings: &EmbeddingSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: UPSTAGE_EMBEDDINGS_URL.to_string(),
            api_key: api_key.into(),
            model: settings.model.clone(),
            dimension: settings.dimension,
            batch_size: EMBEDDING_BATCH_SIZE,
        })
    }

    /// Point the client at a different endpoint (proxies, tests).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Embed one probe string and describe the outcome.
    pub async fn test_connection(&self) -> Result<usize> {
        let texts = ["connection test".to_string()];
        let vectors = self.request(&texts).await?;
        Ok(vectors.first().map(Vec::len).unwrap_or(0))
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("API error {}: {}", status, body)));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("malformed response: {}", e)))?;

        order_embeddings(parsed.data, texts.len())
    }

    async fn embed_sub_batch(&self, texts: &[String]) -> EmbeddingBatch {
        match self.request(texts).await {
            Ok(vectors) => EmbeddingBatch {
                embeddings: vectors.into_iter().map(Embedding::Computed).collect(),
            },
            Err(e) => {
                warn!(
                    "Upstage embedding failed for {} texts, using placeholders: {}",
                    texts.len(),
                    e
                );
                EmbeddingBatch {
                    embeddings: texts
                        .iter()
                        .map(|_| Embedding::placeholder(self.dimension))
                        .collect(),
                }
            }
        }
    }
}

/// Put returned vectors back in input order and check the count.
fn order_embeddings(mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(Error::Embedding(format!(
            "expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }
    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl EmbedderBackend for UpstageEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> EmbeddingBatch {
        let mut out = EmbeddingBatch::default();
        if texts.is_empty() {
            return out;
        }

        debug!("Embedding {} texts with {}", texts.len(), self.model);
        for batch in texts.chunks(self.batch_size.max(1)) {
            out.extend(self.embed_sub_batch(batch).await);
        }

        let degraded = out.degraded();
        if degraded > 0 {
            warn!("{} of {} embeddings are placeholders", degraded, out.len());
        } else {
            info!("Embedded {} texts", out.len());
        }
        out
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        &self.model
    }
}
