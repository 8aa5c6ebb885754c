//! Shared application state.

use std::sync::Arc;

use flowmate_chat::CompletionModel;
use flowmate_core::FlowMateConfig;
use flowmate_infer::EmbedderBackend;
use flowmate_ingest::ChunkingConfig;
use flowmate_store::IndexManager;
use tracing::info;

use crate::session::{SessionHandle, SessionStore, SESSION_IDLE_TIMEOUT};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: FlowMateConfig,
    pub embedder: Arc<dyn EmbedderBackend>,
    pub llm: Arc<dyn CompletionModel>,
    pub indexes: IndexManager,
    pub sessions: SessionStore,
    pub chunking: ChunkingConfig,
}

impl AppState {
    pub fn new(
        config: FlowMateConfig,
        embedder: Arc<dyn EmbedderBackend>,
        llm: Arc<dyn CompletionModel>,
        indexes: IndexManager,
    ) -> Self {
        Self {
            config,
            embedder,
            llm,
            indexes,
            sessions: SessionStore::new(),
            chunking: ChunkingConfig::default(),
        }
    }

    /// Delete a session's index and forget its conversation.
    pub async fn close_session(&self, session: &SessionHandle) {
        let mut ctx = session.lock().await;
        if let Some(name) = ctx.index_slot.name().map(str::to_string) {
            info!("Closing session {}: deleting index {}", ctx.id, name);
        }
        self.indexes.delete_current_index(&mut ctx.index_slot).await;
        ctx.uploaded_file = None;
        ctx.memory.clear();
    }

    /// Periodic maintenance: evict idle sessions, then sweep expired indexes
    /// that no remaining session holds.
    pub async fn sweep(&self) {
        let idle = self.sessions.take_idle(SESSION_IDLE_TIMEOUT);
        if !idle.is_empty() {
            info!("Evicting {} idle sessions", idle.len());
        }
        for session in idle {
            self.close_session(&session).await;
        }

        let mut in_use = Vec::new();
        for session in self.sessions.handles() {
            if let Some(name) = session.lock().await.index_slot.name() {
                in_use.push(name.to_string());
            }
        }

        let removed = self.indexes.cleanup_old_indexes(&in_use).await;
        if !removed.is_empty() {
            info!("Sweep removed {} expired indexes", removed.len());
        }
    }

    /// Close every live session. Called once on shutdown.
    pub async fn shutdown(&self) {
        let sessions = self.sessions.drain();
        info!("Shutting down: closing {} sessions", sessions.len());
        for session in sessions {
            self.close_session(&session).await;
        }
    }
}
