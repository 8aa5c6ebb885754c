//! Index lifecycle: create-and-wait, delete, sweep, store, search.

use std::sync::Arc;
use std::time::Duration;

use flowmate_core::{Error, Result};
use flowmate_infer::EmbedderBackend;
use tracing::{debug, info, warn};

use crate::database::VectorDatabase;
use crate::naming;
use crate::types::{ChunkMetadata, IndexHandle, IndexSpec, Metric, UpsertReport, VectorRecord};

/// Upper bound on neighbours returned by a similarity search.
pub const MAX_TOP_K: usize = 5;
/// Vectors per upsert request.
pub const UPSERT_BATCH_SIZE: usize = 5;
/// Temporary indexes older than this are swept.
pub const INDEX_MAX_AGE: Duration = Duration::from_secs(3600);

/// Polling schedule while waiting for an index to appear or disappear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub deadline: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(120),
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(4),
        }
    }
}

/// The index a session currently owns, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSlot {
    current: Option<IndexHandle>,
}

impl IndexSlot {
    pub fn current(&self) -> Option<&IndexHandle> {
        self.current.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.current.as_ref().map(|h| h.name.as_str())
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }
}

#[derive(Clone, Copy)]
enum WaitFor {
    Ready,
    Gone,
}

impl WaitFor {
    fn state(self) -> &'static str {
        match self {
            WaitFor::Ready => "ready",
            WaitFor::Gone => "deleted",
        }
    }
}

/// Manages per-session temporary indexes on a [`VectorDatabase`].
pub struct IndexManager {
    db: Arc<dyn VectorDatabase>,
    embedder: Arc<dyn EmbedderBackend>,
    dimension: usize,
    metric: Metric,
    wait: WaitPolicy,
    upsert_batch_size: usize,
    max_age: Duration,
}

impl IndexManager {
    pub fn new(db: Arc<dyn VectorDatabase>, embedder: Arc<dyn EmbedderBackend>) -> Self {
        let dimension = embedder.dimension();
        Self {
            db,
            embedder,
            dimension,
            metric: Metric::Cosine,
            wait: WaitPolicy::default(),
            upsert_batch_size: UPSERT_BATCH_SIZE,
            max_age: INDEX_MAX_AGE,
        }
    }

    pub fn with_wait_policy(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// Age after which the sweep treats a temporary index as abandoned.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.db.backend_name()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Replace the slot's index with a fresh, ready one.
    ///
    /// The previous index is deleted first; a failed delete is logged and
    /// left for the sweep. The slot stays empty if creation fails.
    pub async fn create_new_index(
        &self,
        slot: &mut IndexSlot,
        session_hint: Option<&str>,
    ) -> Result<IndexHandle> {
        self.delete_current_index(slot).await;

        let name = naming::index_name(session_hint, chrono::Utc::now().timestamp());
        let spec = IndexSpec {
            name: name.clone(),
            dimension: self.dimension,
            metric: self.metric,
        };
        info!("Creating index {} (dim={})", name, self.dimension);
        self.db.create_index(&spec).await?;

        let handle = match self.wait_until(&name, WaitFor::Ready).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                self.discard(&name).await;
                return Err(Error::Internal(format!(
                    "index {} ready but not described",
                    name
                )));
            }
            Err(e) => {
                self.discard(&name).await;
                return Err(e);
            }
        };
        info!("Index {} is ready", name);
        slot.current = Some(handle.clone());
        Ok(handle)
    }

    /// Delete the slot's index, if any. The slot is cleared regardless.
    ///
    /// Returns whether the remote delete succeeded.
    pub async fn delete_current_index(&self, slot: &mut IndexSlot) -> bool {
        let Some(handle) = slot.current.take() else {
            return true;
        };

        if let Err(e) = self.db.delete_index(&handle.name).await {
            warn!("Failed to delete index {}: {}", handle.name, e);
            return false;
        }
        match self.wait_until(&handle.name, WaitFor::Gone).await {
            Ok(_) => {
                info!("Deleted index {}", handle.name);
                true
            }
            Err(e) => {
                warn!("Index {} still listed after delete: {}", handle.name, e);
                false
            }
        }
    }

    /// Delete every temporary index older than the max age, except those
    /// named in `in_use`.
    ///
    /// Returns the names whose delete call succeeded.
    pub async fn cleanup_old_indexes(&self, in_use: &[String]) -> Vec<String> {
        let listed = match self.db.list_indexes().await {
            Ok(listed) => listed,
            Err(e) => {
                warn!("Index sweep skipped, list failed: {}", e);
                return Vec::new();
            }
        };

        let now = chrono::Utc::now().timestamp();
        let max_age = self.max_age.as_secs() as i64;
        let mut removed = Vec::new();
        for name in naming::expired(listed.iter().map(|d| d.name.as_str()), now, max_age) {
            if in_use.iter().any(|live| live == name) {
                debug!("Sweep skipping {}: still held by a session", name);
                continue;
            }
            match self.db.delete_index(name).await {
                Ok(()) => {
                    info!("Swept expired index {}", name);
                    removed.push(name.to_string());
                }
                Err(e) => warn!("Failed to sweep index {}: {}", name, e),
            }
        }
        removed
    }

    /// Embed `texts` and store them in a fresh index for the slot.
    ///
    /// `metadata[i]` describes `texts[i]`. Placeholder embeddings are stored
    /// like any other and counted in the report.
    pub async fn add_documents(
        &self,
        slot: &mut IndexSlot,
        session_hint: Option<&str>,
        texts: &[String],
        metadata: &[ChunkMetadata],
    ) -> Result<UpsertReport> {
        if texts.len() != metadata.len() {
            return Err(Error::Internal(format!(
                "{} texts but {} metadata entries",
                texts.len(),
                metadata.len()
            )));
        }

        let handle = self.create_new_index(slot, session_hint).await?;

        let batch = self.embedder.embed_documents(texts).await;
        let degraded = batch.degraded();
        if degraded > 0 {
            warn!(
                "{} of {} chunks stored with placeholder embeddings",
                degraded,
                texts.len()
            );
        }

        let records: Vec<VectorRecord> = batch
            .into_iter()
            .zip(texts.iter().zip(metadata))
            .map(|(embedding, (text, meta))| VectorRecord {
                id: uuid::Uuid::new_v4().to_string(),
                values: embedding.into_values(),
                metadata: meta.to_map(text),
            })
            .collect();

        let mut stored = 0;
        let mut records = records.into_iter().peekable();
        while records.peek().is_some() {
            let chunk: Vec<VectorRecord> = records.by_ref().take(self.upsert_batch_size).collect();
            match self.db.upsert(&handle, chunk).await {
                Ok(n) => stored += n,
                Err(e) => {
                    // A half-filled index must not stay attached to the session.
                    self.delete_current_index(slot).await;
                    return Err(e);
                }
            }
        }
        debug!("Upserted {} vectors into {}", stored, handle.name);

        Ok(UpsertReport {
            index_name: handle.name,
            vectors: stored,
            degraded,
        })
    }

    /// Texts of the `k` chunks nearest to `query`, best first.
    ///
    /// Empty when the slot has no index, when the query could not be embedded,
    /// or when the backend query fails.
    pub async fn similarity_search(&self, slot: &IndexSlot, query: &str, k: usize) -> Vec<String> {
        let Some(handle) = slot.current() else {
            return Vec::new();
        };
        let k = k.clamp(1, MAX_TOP_K);

        let embedding = self.embedder.embed_query(query).await;
        if embedding.is_placeholder() {
            warn!("Query embedding unavailable; skipping retrieval");
            return Vec::new();
        }

        match self.db.query(handle, embedding.values(), k).await {
            Ok(matches) => matches
                .iter()
                .filter_map(|m| m.text())
                .map(str::to_string)
                .collect(),
            Err(e) => {
                warn!("Similarity search on {} failed: {}", handle.name, e);
                Vec::new()
            }
        }
    }

    /// Best-effort delete of an index the slot never took ownership of.
    async fn discard(&self, name: &str) {
        match self.db.delete_index(name).await {
            Ok(()) => info!("Discarded unusable index {}", name),
            Err(e) => warn!("Failed to discard index {}: {}", name, e),
        }
    }

    /// Poll the list call until `name` is ready (or gone), backing off
    /// exponentially up to the policy deadline.
    async fn wait_until(&self, name: &str, target: WaitFor) -> Result<Option<IndexHandle>> {
        let started = tokio::time::Instant::now();
        let mut backoff = self.wait.initial_backoff;

        loop {
            let found = match self.db.list_indexes().await {
                Ok(listed) => Some(listed.into_iter().find(|d| d.name == name)),
                Err(e) => {
                    debug!("list_indexes failed while waiting on {}: {}", name, e);
                    None
                }
            };

            match (target, found) {
                (WaitFor::Ready, Some(Some(desc))) if desc.ready => return Ok(Some(desc.handle())),
                (WaitFor::Gone, Some(None)) => return Ok(None),
                _ => {}
            }

            let elapsed = started.elapsed();
            if elapsed >= self.wait.deadline {
                return Err(Error::IndexTimeout {
                    index: name.to_string(),
                    state: target.state(),
                    waited_ms: elapsed.as_millis() as u64,
                });
            }
            let remaining = self.wait.deadline - elapsed;
            tokio::time::sleep(backoff.min(remaining)).await;
            backoff = (backoff * 2).min(self.wait.max_backoff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryVectorDatabase, StoreEvent};
    use async_trait::async_trait;
    use flowmate_infer::{Embedding, EmbeddingBatch};

    /// Maps each text to a 2-d vector from its first byte, or a placeholder
    /// when the text starts with '!'.
    struct FakeEmbedder;

    #[async_trait]
    impl EmbedderBackend for FakeEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> EmbeddingBatch {
            EmbeddingBatch {
                embeddings: texts
                    .iter()
                    .map(|t| {
                        if t.starts_with('!') {
                            Embedding::placeholder(2)
                        } else {
                            let b = t.bytes().next().unwrap_or(0) as f32;
                            Embedding::Computed(vec![b, 100.0 - b])
                        }
                    })
                    .collect(),
            }
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model(&self) -> &str {
            "fake"
        }
    }

    fn fast() -> WaitPolicy {
        WaitPolicy {
            deadline: Duration::from_millis(200),
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(10),
        }
    }

    fn manager(db: Arc<InMemoryVectorDatabase>) -> IndexManager {
        IndexManager::new(db, Arc::new(FakeEmbedder)).with_wait_policy(fast())
    }

    fn meta(n: usize) -> Vec<ChunkMetadata> {
        (0..n)
            .map(|i| ChunkMetadata {
                source: "doc.txt".into(),
                chunk_id: i,
                total_chunks: n,
                session_id: "s1".into(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_second_create_replaces_first() {
        let db = Arc::new(InMemoryVectorDatabase::new());
        let mgr = manager(db.clone());
        let mut slot = IndexSlot::default();

        let first = mgr.create_new_index(&mut slot, Some("aaaa")).await.unwrap();
        // Same-second names would collide.
        db.delete_index(&first.name).await.unwrap();
        db.insert_index("temp-aaaa-1", 2);
        slot.current = Some(IndexHandle {
            name: "temp-aaaa-1".into(),
            host: None,
        });
        db.clear_events();

        let second = mgr.create_new_index(&mut slot, Some("aaaa")).await.unwrap();
        assert_eq!(slot.name(), Some(second.name.as_str()));
        assert_eq!(
            db.events(),
            vec![
                StoreEvent::Deleted("temp-aaaa-1".into()),
                StoreEvent::Created(second.name.clone()),
            ]
        );
        assert_eq!(db.index_names(), vec![second.name]);
    }

    #[tokio::test]
    async fn test_create_waits_for_readiness() {
        let db = Arc::new(InMemoryVectorDatabase::new());
        db.set_ready_after_polls(3);
        let mgr = manager(db.clone());
        let mut slot = IndexSlot::default();

        let handle = mgr.create_new_index(&mut slot, Some("slow")).await.unwrap();
        assert!(handle.host.is_some());
        assert!(slot.is_active());
    }

    #[tokio::test]
    async fn test_create_times_out() {
        let db = Arc::new(InMemoryVectorDatabase::new());
        db.set_never_ready(true);
        let mgr = manager(db.clone());
        let mut slot = IndexSlot::default();

        let err = mgr.create_new_index(&mut slot, Some("stuck")).await.unwrap_err();
        assert!(matches!(err, Error::IndexTimeout { state: "ready", .. }));
        assert!(!slot.is_active());
        assert!(db.index_names().is_empty());
    }

    #[tokio::test]
    async fn test_delete_failure_still_clears_slot() {
        let db = Arc::new(InMemoryVectorDatabase::new());
        let mgr = manager(db.clone());
        let mut slot = IndexSlot::default();
        mgr.create_new_index(&mut slot, Some("gone")).await.unwrap();

        db.set_fail_deletes(true);
        assert!(!mgr.delete_current_index(&mut slot).await);
        assert!(!slot.is_active());
        assert!(mgr.delete_current_index(&mut slot).await);
    }

    #[tokio::test]
    async fn test_sweep_deletes_only_expired_temp_indexes() {
        let db = Arc::new(InMemoryVectorDatabase::new());
        let now = chrono::Utc::now().timestamp();
        let old = format!("temp-old00000-{}", now - 7200);
        let fresh = format!("temp-new00000-{}", now - 60);
        db.insert_index(&old, 2);
        db.insert_index(&fresh, 2);
        db.insert_index("production", 2);

        let removed = manager(db.clone()).cleanup_old_indexes(&[]).await;
        assert_eq!(removed, vec![old]);
        assert_eq!(db.index_names(), vec!["production".to_string(), fresh]);
    }

    #[tokio::test]
    async fn test_sweep_spares_indexes_in_use() {
        let db = Arc::new(InMemoryVectorDatabase::new());
        let now = chrono::Utc::now().timestamp();
        let held = format!("temp-live0000-{}", now - 3660);
        let abandoned = format!("temp-gone0000-{}", now - 3660);
        db.insert_index(&held, 2);
        db.insert_index(&abandoned, 2);

        let removed = manager(db.clone())
            .cleanup_old_indexes(std::slice::from_ref(&held))
            .await;
        assert_eq!(removed, vec![abandoned]);
        assert_eq!(db.index_names(), vec![held]);
    }

    #[tokio::test]
    async fn test_sweep_survives_list_failure() {
        let db = Arc::new(InMemoryVectorDatabase::new());
        db.set_fail_lists(true);
        assert!(manager(db).cleanup_old_indexes(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_add_documents_batches_and_searches() {
        let db = Arc::new(InMemoryVectorDatabase::new());
        let mgr = manager(db.clone());
        let mut slot = IndexSlot::default();

        let texts: Vec<String> = ["alpha", "bravo", "charlie", "delta", "echo", "!broken", "zulu"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let report = mgr
            .add_documents(&mut slot, Some("s1"), &texts, &meta(texts.len()))
            .await
            .unwrap();
        assert_eq!(report.vectors, 7);
        assert_eq!(report.degraded, 1);
        assert_eq!(db.vector_count(&report.index_name), Some(7));

        let upserts: Vec<usize> = db
            .events()
            .into_iter()
            .filter_map(|e| match e {
                StoreEvent::Upserted { count, .. } => Some(count),
                _ => None,
            })
            .collect();
        assert_eq!(upserts, vec![5, 2]);

        let hits = mgr.similarity_search(&slot, "zebra", 10).await;
        assert_eq!(hits.len(), MAX_TOP_K);
        assert_eq!(hits[0], "zulu");
    }

    #[tokio::test]
    async fn test_search_without_index_is_empty() {
        let db = Arc::new(InMemoryVectorDatabase::new());
        let mgr = manager(db.clone());
        assert!(mgr
            .similarity_search(&IndexSlot::default(), "anything", 3)
            .await
            .is_empty());
        assert!(db.events().is_empty());
    }

    #[tokio::test]
    async fn test_search_with_placeholder_query_is_empty() {
        let db = Arc::new(InMemoryVectorDatabase::new());
        let mgr = manager(db.clone());
        let mut slot = IndexSlot::default();
        let texts = vec!["alpha".to_string()];
        mgr.add_documents(&mut slot, None, &texts, &meta(1))
            .await
            .unwrap();

        assert!(mgr.similarity_search(&slot, "!nope", 3).await.is_empty());
        assert_eq!(mgr.similarity_search(&slot, "alpha", 3).await, vec!["alpha"]);
    }
}
