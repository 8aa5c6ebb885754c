//! FlowMate Core: error taxonomy, configuration, data directories.

pub mod config;
pub mod error;

pub use config::{DataPaths, EmbeddingSettings, FlowMateConfig, VectorBackend};
pub use error::{Error, Result};
