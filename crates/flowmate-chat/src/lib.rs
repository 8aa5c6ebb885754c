//! Retrieval-augmented chat building blocks.
//!
//! The LLM call goes to an external chat-completion API (Groq); this crate
//! holds the client, the per-session conversation buffer and the prompt
//! templates. Retrieval itself lives in `flowmate-store`.

pub mod llm;
pub mod memory;
pub mod prompts;

pub use llm::{ChatMessage, Completion, CompletionModel, GroqClient, LlmError, LlmSettings};
pub use memory::{ConversationBuffer, Turn, DEFAULT_MAX_TURNS};
