//! FlowMate Ingest: text extraction, upload filename handling, chunking.

pub mod chunking;
pub mod file;
pub mod filename;

pub use chunking::{split_text, ChunkingConfig, TextChunk};
pub use file::{extract_text, extract_text_from_bytes, FileType, ALLOWED_EXTENSIONS};
pub use filename::{claim_unique_path, dotted_extension, sanitize_filename};
