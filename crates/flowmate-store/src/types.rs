//! Vector index types shared by all backends.

use serde::{Deserialize, Serialize};

/// Stored chunk text is truncated to this many characters.
pub const MAX_METADATA_TEXT_CHARS: usize = 1000;

/// Similarity metric of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    Euclidean,
    Dotproduct,
}

/// Parameters for creating an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
}

/// An index as reported by the list call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescription {
    pub name: String,
    /// Data-plane host. Pinecone assigns it once the index exists.
    pub host: Option<String>,
    pub ready: bool,
}

impl IndexDescription {
    pub fn handle(&self) -> IndexHandle {
        IndexHandle {
            name: self.name.clone(),
            host: self.host.clone(),
        }
    }
}

/// Reference to a live index, enough to reach its data plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexHandle {
    pub name: String,
    pub host: Option<String>,
}

/// One vector to upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// One nearest-neighbour match, best first.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl QueryMatch {
    /// The chunk text stored alongside the vector.
    pub fn text(&self) -> Option<&str> {
        self.metadata.get("text").and_then(|v| v.as_str())
    }
}

/// Per-chunk metadata attached at upload time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkMetadata {
    /// Uploaded file name.
    pub source: String,
    pub chunk_id: usize,
    pub total_chunks: usize,
    pub session_id: String,
}

impl ChunkMetadata {
    /// Metadata map for one chunk, including its truncated text.
    pub fn to_map(&self, text: &str) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("source".into(), self.source.clone().into());
        map.insert("chunk_id".into(), self.chunk_id.into());
        map.insert("total_chunks".into(), self.total_chunks.into());
        map.insert("session_id".into(), self.session_id.clone().into());
        map.insert("text".into(), truncate_chars(text, MAX_METADATA_TEXT_CHARS).into());
        map
    }
}

/// Outcome of storing a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertReport {
    pub index_name: String,
    pub vectors: usize,
    /// Vectors stored with placeholder embeddings.
    pub degraded: usize,
}

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
