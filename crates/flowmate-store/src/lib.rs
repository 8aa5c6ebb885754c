//! FlowMate Store: per-session remote vector indexes.
//!
//! `VectorDatabase` abstracts the remote service (Pinecone in production,
//! `InMemoryVectorDatabase` for offline runs and tests). `IndexManager`
//! owns the lifecycle: one fresh index per upload, deletion of the
//! session's previous index, and a sweep of abandoned temporary indexes.
//! Per-session state lives in an `IndexSlot` that callers own.

pub mod database;
pub mod manager;
pub mod memory;
pub mod naming;
pub mod pinecone;
pub mod types;

pub use database::VectorDatabase;
pub use manager::{IndexManager, IndexSlot, WaitPolicy, MAX_TOP_K};
pub use memory::{InMemoryVectorDatabase, StoreEvent};
pub use pinecone::PineconeClient;
pub use types::*;
