//! Remote vector database abstraction.

use async_trait::async_trait;
use flowmate_core::Result;

use crate::types::{IndexDescription, IndexHandle, IndexSpec, QueryMatch, VectorRecord};

/// Operations the index lifecycle needs from a vector database.
///
/// Create and delete are asynchronous on the remote side; callers observe
/// completion through [`VectorDatabase::list_indexes`].
#[async_trait]
pub trait VectorDatabase: Send + Sync {
    async fn create_index(&self, spec: &IndexSpec) -> Result<()>;

    async fn delete_index(&self, name: &str) -> Result<()>;

    async fn list_indexes(&self) -> Result<Vec<IndexDescription>>;

    /// Upsert vectors, returning how many the backend accepted.
    async fn upsert(&self, index: &IndexHandle, vectors: Vec<VectorRecord>) -> Result<usize>;

    /// Top-k nearest neighbours with metadata, best first.
    async fn query(
        &self,
        index: &IndexHandle,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>>;

    /// Short backend name for logs and status output.
    fn backend_name(&self) -> &'static str;
}
