//! Configuration and data directory management.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default HTTP port (same as the Flask deployment).
pub const DEFAULT_PORT: u16 = 5000;
/// Maximum accepted upload size (16 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
/// Default Upstage embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "solar-embedding-1-large";
/// Default embedding dimension, also used for the vector index.
pub const DEFAULT_EMBEDDING_DIM: usize = 1024;
/// Default Groq chat model.
pub const DEFAULT_LLM_MODEL: &str = "llama-3.1-8b-instant";
/// Timeout applied to embedding and completion requests.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Paths to all FlowMate data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Uploaded source documents (`data/uploads/`).
    pub uploads: PathBuf,
    /// Generated reports served by `/download` (`data/downloads/`).
    pub downloads: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            uploads: root.join("uploads"),
            downloads: root.join("downloads"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.uploads)?;
        std::fs::create_dir_all(&self.downloads)?;
        Ok(())
    }
}

/// Which vector database backs the session indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    Pinecone,
    /// Process-local index, for offline development and tests.
    Memory,
}

impl VectorBackend {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "" | "pinecone" => Ok(Self::Pinecone),
            "memory" => Ok(Self::Memory),
            other => Err(Error::Config(format!(
                "unknown FLOWMATE_VECTOR_BACKEND '{}', expected 'pinecone' or 'memory'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for VectorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorBackend::Pinecone => write!(f, "pinecone"),
            VectorBackend::Memory => write!(f, "memory"),
        }
    }
}

/// Embedding API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub model: String,
    pub dimension: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimension: DEFAULT_EMBEDDING_DIM,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Top-level FlowMate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowMateConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Upper bound on a single uploaded file.
    pub max_upload_bytes: usize,
    pub vector_backend: VectorBackend,
    pub embedding: EmbeddingSettings,
    pub llm_model: String,
    pub llm_timeout_secs: u64,
    #[serde(skip_serializing)]
    pub groq_api_key: String,
    #[serde(skip_serializing)]
    pub upstage_api_key: String,
    #[serde(skip_serializing)]
    pub pinecone_api_key: Option<String>,
}

impl FlowMateConfig {
    /// Create configuration from environment variables and defaults.
    ///
    /// Fails when a required API key is missing; the server must not start
    /// without them.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::from_lookup(data_dir, |key| std::env::var(key).ok())
    }

    /// Same as [`FlowMateConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(data_dir: impl AsRef<Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let vector_backend = match non_empty("FLOWMATE_VECTOR_BACKEND") {
            Some(raw) => VectorBackend::parse(&raw)?,
            None => VectorBackend::Pinecone,
        };

        let groq_api_key = non_empty("GROQ_API_KEY");
        let upstage_api_key = non_empty("UPSTAGE_API_KEY");
        let pinecone_api_key = non_empty("PINECONE_API_KEY");

        let mut missing = Vec::new();
        if groq_api_key.is_none() {
            missing.push("GROQ_API_KEY");
        }
        if pinecone_api_key.is_none() && vector_backend == VectorBackend::Pinecone {
            missing.push("PINECONE_API_KEY");
        }
        if upstage_api_key.is_none() {
            missing.push("UPSTAGE_API_KEY");
        }
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let port = parse_or(non_empty("PORT"), "PORT", DEFAULT_PORT)?;
        let dimension = parse_or(
            non_empty("FLOWMATE_EMBEDDING_DIM"),
            "FLOWMATE_EMBEDDING_DIM",
            DEFAULT_EMBEDDING_DIM,
        )?;
        if dimension == 0 {
            return Err(Error::Config("FLOWMATE_EMBEDDING_DIM must be positive".into()));
        }

        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            port,
            data_paths,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            vector_backend,
            embedding: EmbeddingSettings {
                model: non_empty("UPSTAGE_EMBEDDING_MODEL")
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.into()),
                dimension,
                timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            },
            llm_model: non_empty("GROQ_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.into()),
            llm_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            groq_api_key: groq_api_key.unwrap_or_default(),
            upstage_api_key: upstage_api_key.unwrap_or_default(),
            pinecone_api_key,
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", key, value))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const ALL_KEYS: &[(&str, &str)] = &[
        ("GROQ_API_KEY", "gsk-test"),
        ("PINECONE_API_KEY", "pc-test"),
        ("UPSTAGE_API_KEY", "up-test"),
    ];

    #[test]
    fn test_defaults_with_all_keys() {
        let dir = tempfile::tempdir().unwrap();
        let config = FlowMateConfig::from_lookup(dir.path(), lookup(ALL_KEYS)).unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.vector_backend, VectorBackend::Pinecone);
        assert_eq!(config.embedding.dimension, 1024);
        assert_eq!(config.llm_model, DEFAULT_LLM_MODEL);
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
        assert!(config.data_paths.uploads.is_dir());
        assert!(config.data_paths.downloads.is_dir());
    }

    #[test]
    fn test_missing_keys_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        let err = FlowMateConfig::from_lookup(dir.path(), lookup(&[("GROQ_API_KEY", "x")]))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("PINECONE_API_KEY"));
        assert!(msg.contains("UPSTAGE_API_KEY"));
        assert!(!msg.contains("GROQ_API_KEY"));
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = FlowMateConfig::from_lookup(
            dir.path(),
            lookup(&[
                ("GROQ_API_KEY", "  "),
                ("PINECONE_API_KEY", "pc"),
                ("UPSTAGE_API_KEY", "up"),
            ]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }

    #[test]
    fn test_memory_backend_needs_no_pinecone_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = FlowMateConfig::from_lookup(
            dir.path(),
            lookup(&[
                ("GROQ_API_KEY", "gsk"),
                ("UPSTAGE_API_KEY", "up"),
                ("FLOWMATE_VECTOR_BACKEND", "Memory"),
                ("PORT", "8080"),
            ]),
        )
        .unwrap();
        assert_eq!(config.vector_backend, VectorBackend::Memory);
        assert!(config.pinecone_api_key.is_none());
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut vars = ALL_KEYS.to_vec();
        vars.push(("PORT", "not-a-port"));
        let err = FlowMateConfig::from_lookup(dir.path(), lookup(&vars)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_keys_not_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let config = FlowMateConfig::from_lookup(dir.path(), lookup(ALL_KEYS)).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("gsk-test"));
        assert!(!json.contains("pc-test"));
    }
}
