//! In-memory [`VectorDatabase`] for offline development and tests.
//!
//! Vector search is brute-force cosine similarity. Every control-plane and
//! data-plane call is recorded as a [`StoreEvent`] so callers can assert on
//! the exact sequence of remote operations.

use std::collections::HashMap;

use async_trait::async_trait;
use flowmate_core::{Error, Result};
use parking_lot::RwLock;

use crate::database::VectorDatabase;
use crate::types::{IndexDescription, IndexHandle, IndexSpec, QueryMatch, VectorRecord};

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Created(String),
    Deleted(String),
    Upserted { index: String, count: usize },
    Queried { index: String, top_k: usize },
}

struct StoredIndex {
    dimension: usize,
    /// List calls remaining before the index reports ready.
    pending_polls: usize,
    vectors: Vec<VectorRecord>,
}

#[derive(Default)]
struct Behaviour {
    ready_after_polls: usize,
    never_ready: bool,
    fail_deletes: bool,
    fail_lists: bool,
}

/// Process-local vector database.
pub struct InMemoryVectorDatabase {
    indexes: RwLock<HashMap<String, StoredIndex>>,
    events: RwLock<Vec<StoreEvent>>,
    behaviour: RwLock<Behaviour>,
}

impl InMemoryVectorDatabase {
    pub fn new() -> Self {
        Self {
            indexes: RwLock::new(HashMap::new()),
            events: RwLock::new(Vec::new()),
            behaviour: RwLock::new(Behaviour::default()),
        }
    }

    /// New indexes report ready only after this many list calls.
    pub fn set_ready_after_polls(&self, polls: usize) {
        self.behaviour.write().ready_after_polls = polls;
    }

    /// New indexes never become ready.
    pub fn set_never_ready(&self, never: bool) {
        self.behaviour.write().never_ready = never;
    }

    /// Make every delete call fail.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.behaviour.write().fail_deletes = fail;
    }

    /// Make every list call fail.
    pub fn set_fail_lists(&self, fail: bool) {
        self.behaviour.write().fail_lists = fail;
    }

    /// Register a ready, empty index without recording an event.
    pub fn insert_index(&self, name: &str, dimension: usize) {
        self.indexes.write().insert(
            name.to_string(),
            StoredIndex {
                dimension,
                pending_polls: 0,
                vectors: Vec::new(),
            },
        );
    }

    /// All recorded calls, oldest first.
    pub fn events(&self) -> Vec<StoreEvent> {
        self.events.read().clone()
    }

    pub fn clear_events(&self) {
        self.events.write().clear();
    }

    /// Names of all existing indexes, sorted.
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of vectors stored in an index.
    pub fn vector_count(&self, name: &str) -> Option<usize> {
        self.indexes.read().get(name).map(|i| i.vectors.len())
    }

    fn record(&self, event: StoreEvent) {
        self.events.write().push(event);
    }
}

impl Default for InMemoryVectorDatabase {
    fn default() -> Self {
        Self::new()
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[async_trait]
impl VectorDatabase for InMemoryVectorDatabase {
    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        let pending_polls = {
            let behaviour = self.behaviour.read();
            if behaviour.never_ready {
                usize::MAX
            } else {
                behaviour.ready_after_polls
            }
        };

        {
            let mut indexes = self.indexes.write();
            if indexes.contains_key(&spec.name) {
                return Err(Error::VectorStore(format!(
                    "index {} already exists",
                    spec.name
                )));
            }
            indexes.insert(
                spec.name.clone(),
                StoredIndex {
                    dimension: spec.dimension,
                    pending_polls,
                    vectors: Vec::new(),
                },
            );
        }
        self.record(StoreEvent::Created(spec.name.clone()));
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        self.record(StoreEvent::Deleted(name.to_string()));
        if self.behaviour.read().fail_deletes {
            return Err(Error::VectorStore(format!("delete of {} rejected", name)));
        }
        match self.indexes.write().remove(name) {
            Some(_) => Ok(()),
            None => Err(Error::VectorStore(format!("index {} not found", name))),
        }
    }

    async fn list_indexes(&self) -> Result<Vec<IndexDescription>> {
        if self.behaviour.read().fail_lists {
            return Err(Error::VectorStore("list rejected".into()));
        }
        let mut indexes = self.indexes.write();
        let mut out: Vec<IndexDescription> = indexes
            .iter_mut()
            .map(|(name, index)| {
                let ready = index.pending_polls == 0;
                if index.pending_polls != usize::MAX {
                    index.pending_polls = index.pending_polls.saturating_sub(1);
                }
                IndexDescription {
                    name: name.clone(),
                    host: ready.then(|| format!("{}.memory.local", name)),
                    ready,
                }
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn upsert(&self, index: &IndexHandle, vectors: Vec<VectorRecord>) -> Result<usize> {
        let count = vectors.len();
        {
            let mut indexes = self.indexes.write();
            let stored = indexes
                .get_mut(&index.name)
                .ok_or_else(|| Error::VectorStore(format!("index {} not found", index.name)))?;

            if let Some(bad) = vectors.iter().find(|v| v.values.len() != stored.dimension) {
                return Err(Error::VectorStore(format!(
                    "vector {} has dimension {}, index expects {}",
                    bad.id,
                    bad.values.len(),
                    stored.dimension
                )));
            }
            for record in vectors {
                stored.vectors.retain(|v| v.id != record.id);
                stored.vectors.push(record);
            }
        }
        self.record(StoreEvent::Upserted {
            index: index.name.clone(),
            count,
        });
        Ok(count)
    }

    async fn query(
        &self,
        index: &IndexHandle,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        let mut matches: Vec<QueryMatch> = {
            let indexes = self.indexes.read();
            let stored = indexes
                .get(&index.name)
                .ok_or_else(|| Error::VectorStore(format!("index {} not found", index.name)))?;
            stored
                .vectors
                .iter()
                .map(|record| QueryMatch {
                    id: record.id.clone(),
                    score: cosine_sim(vector, &record.values),
                    metadata: record.metadata.clone(),
                })
                .collect()
        };
        self.record(StoreEvent::Queried {
            index: index.name.clone(),
            top_k,
        });

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metric;

    fn spec(name: &str) -> IndexSpec {
        IndexSpec {
            name: name.into(),
            dimension: 2,
            metric: Metric::Cosine,
        }
    }

    fn record(id: &str, values: Vec<f32>, text: &str) -> VectorRecord {
        let mut metadata = serde_json::Map::new();
        metadata.insert("text".into(), text.into());
        VectorRecord {
            id: id.into(),
            values,
            metadata,
        }
    }

    #[tokio::test]
    async fn test_query_ranks_by_cosine() {
        let db = InMemoryVectorDatabase::new();
        db.create_index(&spec("idx")).await.unwrap();
        let handle = db.list_indexes().await.unwrap()[0].handle();

        db.upsert(
            &handle,
            vec![
                record("a", vec![1.0, 0.0], "east"),
                record("b", vec![0.0, 1.0], "north"),
                record("c", vec![0.7, 0.7], "north-east"),
            ],
        )
        .await
        .unwrap();

        let matches = db.query(&handle, &[0.0, 2.0], 2).await.unwrap();
        let texts: Vec<&str> = matches.iter().filter_map(|m| m.text()).collect();
        assert_eq!(texts, vec!["north", "north-east"]);
    }

    #[tokio::test]
    async fn test_readiness_delay() {
        let db = InMemoryVectorDatabase::new();
        db.set_ready_after_polls(2);
        db.create_index(&spec("slow")).await.unwrap();

        assert!(!db.list_indexes().await.unwrap()[0].ready);
        assert!(!db.list_indexes().await.unwrap()[0].ready);
        let listed = db.list_indexes().await.unwrap();
        assert!(listed[0].ready);
        assert!(listed[0].host.is_some());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let db = InMemoryVectorDatabase::new();
        db.create_index(&spec("idx")).await.unwrap();
        let handle = IndexHandle {
            name: "idx".into(),
            host: None,
        };
        let err = db
            .upsert(&handle, vec![record("a", vec![1.0, 2.0, 3.0], "x")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dimension"));
    }

    #[tokio::test]
    async fn test_events_are_recorded() {
        let db = InMemoryVectorDatabase::new();
        db.create_index(&spec("one")).await.unwrap();
        db.delete_index("one").await.unwrap();
        assert!(db.delete_index("one").await.is_err());
        assert_eq!(
            db.events(),
            vec![
                StoreEvent::Created("one".into()),
                StoreEvent::Deleted("one".into()),
                StoreEvent::Deleted("one".into()),
            ]
        );
        assert!(db.index_names().is_empty());
    }
}
