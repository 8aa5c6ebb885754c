//! Pinecone REST client (control plane + per-index data plane).

use std::time::Duration;

use async_trait::async_trait;
use flowmate_core::{Error, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::database::VectorDatabase;
use crate::types::{IndexDescription, IndexHandle, IndexSpec, QueryMatch, VectorRecord};

pub const PINECONE_CONTROL_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    indexes: Vec<IndexModel>,
}

#[derive(Deserialize)]
struct IndexModel {
    name: String,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Deserialize)]
struct UpsertResponse {
    #[serde(default, rename = "upsertedCount")]
    upserted_count: Option<usize>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

/// Pinecone serverless client.
pub struct PineconeClient {
    client: Client,
    api_key: String,
    control_url: String,
    cloud: String,
    region: String,
}

impl PineconeClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            control_url: PINECONE_CONTROL_URL.to_string(),
            cloud: "aws".into(),
            region: "us-east-1".into(),
        })
    }

    /// Override the control-plane base URL.
    pub fn with_control_url(mut self, url: impl Into<String>) -> Self {
        self.control_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Serverless placement for new indexes.
    pub fn with_placement(mut self, cloud: impl Into<String>, region: impl Into<String>) -> Self {
        self.cloud = cloud.into();
        self.region = region.into();
        self
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    fn data_url(&self, index: &IndexHandle, path: &str) -> Result<String> {
        let host = index.host.as_deref().ok_or_else(|| {
            Error::VectorStore(format!("index {} has no data-plane host yet", index.name))
        })?;
        if host.starts_with("http://") || host.starts_with("https://") {
            Ok(format!("{}{}", host.trim_end_matches('/'), path))
        } else {
            Ok(format!("https://{}{}", host, path))
        }
    }
}

async fn check(
    response: std::result::Result<Response, reqwest::Error>,
    what: &str,
) -> Result<Response> {
    let response =
        response.map_err(|e| Error::VectorStore(format!("{} request failed: {}", what, e)))?;
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(Error::VectorStore(format!("{} failed with {}: {}", what, status, body)))
    }
}

#[async_trait]
impl VectorDatabase for PineconeClient {
    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        debug!("Pinecone create_index {}", spec.name);
        let body = json!({
            "name": spec.name,
            "dimension": spec.dimension,
            "metric": spec.metric,
            "spec": { "serverless": { "cloud": self.cloud, "region": self.region } },
        });
        let response = self
            .authed(self.client.post(format!("{}/indexes", self.control_url)))
            .json(&body)
            .send()
            .await;
        check(response, "create_index").await?;
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        debug!("Pinecone delete_index {}", name);
        let response = self
            .authed(self.client.delete(format!("{}/indexes/{}", self.control_url, name)))
            .send()
            .await;
        check(response, "delete_index").await?;
        Ok(())
    }

    async fn list_indexes(&self) -> Result<Vec<IndexDescription>> {
        let response = self
            .authed(self.client.get(format!("{}/indexes", self.control_url)))
            .send()
            .await;
        let parsed: ListResponse = check(response, "list_indexes")
            .await?
            .json()
            .await
            .map_err(|e| Error::VectorStore(format!("malformed list response: {}", e)))?;

        Ok(parsed
            .indexes
            .into_iter()
            .map(|model| IndexDescription {
                ready: model.status.map(|s| s.ready).unwrap_or(false),
                host: model.host.filter(|h| !h.is_empty()),
                name: model.name,
            })
            .collect())
    }

    async fn upsert(&self, index: &IndexHandle, vectors: Vec<VectorRecord>) -> Result<usize> {
        let count = vectors.len();
        let url = self.data_url(index, "/vectors/upsert")?;
        let response = self
            .authed(self.client.post(url))
            .json(&json!({ "vectors": vectors }))
            .send()
            .await;
        let parsed: UpsertResponse = check(response, "upsert")
            .await?
            .json()
            .await
            .map_err(|e| Error::VectorStore(format!("malformed upsert response: {}", e)))?;
        Ok(parsed.upserted_count.unwrap_or(count))
    }

    async fn query(
        &self,
        index: &IndexHandle,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        let url = self.data_url(index, "/query")?;
        let response = self
            .authed(self.client.post(url))
            .json(&json!({
                "vector": vector,
                "topK": top_k,
                "includeMetadata": true,
                "includeValues": false,
            }))
            .send()
            .await;
        let parsed: QueryResponse = check(response, "query")
            .await?
            .json()
            .await
            .map_err(|e| Error::VectorStore(format!("malformed query response: {}", e)))?;
        Ok(parsed.matches)
    }

    fn backend_name(&self) -> &'static str {
        "pinecone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use parking_lot::Mutex;

    type Seen = Arc<Mutex<Vec<String>>>;

    fn note(seen: &Seen, headers: &HeaderMap, what: String) {
        let key = headers
            .get("Api-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        seen.lock().push(format!("{} key={}", what, key));
    }

    async fn create(
        State(seen): State<Seen>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        note(
            &seen,
            &headers,
            format!(
                "create {} dim={} metric={} region={}",
                body["name"].as_str().unwrap_or(""),
                body["dimension"],
                body["metric"].as_str().unwrap_or(""),
                body["spec"]["serverless"]["region"].as_str().unwrap_or(""),
            ),
        );
        StatusCode::CREATED
    }

    async fn remove(
        State(seen): State<Seen>,
        headers: HeaderMap,
        Path(name): Path<String>,
    ) -> StatusCode {
        note(&seen, &headers, format!("delete {}", name));
        if name == "missing" {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::ACCEPTED
        }
    }

    async fn list() -> Json<serde_json::Value> {
        Json(json!({
            "indexes": [
                {"name": "temp-a-1", "host": "temp-a-1.svc.pinecone.io", "status": {"ready": true, "state": "Ready"}},
                {"name": "temp-b-2", "host": "", "status": {"ready": false, "state": "Initializing"}},
            ]
        }))
    }

    async fn upsert(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
        let n = body["vectors"].as_array().map(|v| v.len()).unwrap_or(0);
        Json(json!({ "upsertedCount": n }))
    }

    async fn query(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
        assert_eq!(body["includeMetadata"], true);
        Json(json!({
            "matches": [
                {"id": "v1", "score": 0.9, "metadata": {"text": "best"}},
                {"id": "v2", "score": 0.5, "metadata": {"text": "second"}},
            ]
        }))
    }

    async fn spawn_fake() -> (String, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/indexes", post(create).get(list))
            .route("/indexes/{name}", delete(remove))
            .route("/vectors/upsert", post(upsert))
            .route("/query", post(query))
            .route("/health", get(|| async { "ok" }))
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), seen)
    }

    #[tokio::test]
    async fn test_control_plane_calls() {
        let (base, seen) = spawn_fake().await;
        let client = PineconeClient::new("pc-key").unwrap().with_control_url(&base);

        client
            .create_index(&IndexSpec {
                name: "temp-abc-1".into(),
                dimension: 1024,
                metric: crate::types::Metric::Cosine,
            })
            .await
            .unwrap();
        client.delete_index("temp-abc-1").await.unwrap();
        assert!(client.delete_index("missing").await.is_err());

        let listed = client.list_indexes().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].ready);
        assert_eq!(listed[0].host.as_deref(), Some("temp-a-1.svc.pinecone.io"));
        assert!(!listed[1].ready);
        assert_eq!(listed[1].host, None);

        let seen = seen.lock().clone();
        assert_eq!(
            seen,
            vec![
                "create temp-abc-1 dim=1024 metric=cosine region=us-east-1 key=pc-key".to_string(),
                "delete temp-abc-1 key=pc-key".to_string(),
                "delete missing key=pc-key".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_data_plane_calls() {
        let (base, _seen) = spawn_fake().await;
        let client = PineconeClient::new("pc-key").unwrap();
        let handle = IndexHandle {
            name: "temp-a-1".into(),
            host: Some(base),
        };

        let upserted = client
            .upsert(
                &handle,
                vec![VectorRecord {
                    id: "v1".into(),
                    values: vec![0.1, 0.2],
                    metadata: serde_json::Map::new(),
                }],
            )
            .await
            .unwrap();
        assert_eq!(upserted, 1);

        let matches = client.query(&handle, &[0.1, 0.2], 5).await.unwrap();
        let texts: Vec<&str> = matches.iter().filter_map(|m| m.text()).collect();
        assert_eq!(texts, vec!["best", "second"]);
    }

    #[tokio::test]
    async fn test_data_plane_requires_host() {
        let client = PineconeClient::new("pc-key").unwrap();
        let handle = IndexHandle {
            name: "pending".into(),
            host: None,
        };
        let err = client.query(&handle, &[1.0], 1).await.unwrap_err();
        assert!(err.to_string().contains("no data-plane host"));
    }
}
