//! FlowMate Infer: embedding generation through a remote API.
//!
//! Provides the `EmbedderBackend` trait. `UpstageEmbedder` calls the Upstage
//! embeddings endpoint in small sequential batches. Failed batches degrade to
//! placeholder vectors, which stay distinguishable from computed ones through
//! the `Embedding` type.

pub mod embedder;
pub mod upstage;

pub use embedder::{Embedding, EmbedderBackend, EmbeddingBatch, PLACEHOLDER_VALUE};
pub use upstage::UpstageEmbedder;
