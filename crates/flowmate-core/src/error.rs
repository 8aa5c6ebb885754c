//! Error types for FlowMate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Text extraction error: {0}")]
    Extract(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Timed out after {waited_ms}ms waiting for index {index} to become {state}")]
    IndexTimeout {
        index: String,
        state: &'static str,
        waited_ms: u64,
    },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error came from the caller's input rather than from us or a remote service.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::Extract(_))
    }

    /// Whether the error came from a remote dependency.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::Embedding(_)
                | Error::VectorStore(_)
                | Error::IndexTimeout { .. }
                | Error::Llm(_)
                | Error::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_timeout_message() {
        let err = Error::IndexTimeout {
            index: "temp-abcd1234-1700000000".into(),
            state: "ready",
            waited_ms: 1500,
        };
        let msg = err.to_string();
        assert!(msg.contains("temp-abcd1234-1700000000"));
        assert!(msg.contains("ready"));
        assert!(err.is_remote());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_classification() {
        assert!(Error::Validation("bad extension".into()).is_validation());
        assert!(Error::Extract("empty pdf".into()).is_validation());
        assert!(!Error::Internal("boom".into()).is_remote());
    }
}
