//! Per-browser sessions keyed by the `flowmate_session` cookie.
//!
//! Each session owns its uploaded-file reference, its vector index slot and
//! its conversation buffer. The context sits behind an async mutex, so two
//! requests from the same browser run one after the other while different
//! sessions proceed independently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap};
use flowmate_chat::ConversationBuffer;
use flowmate_store::IndexSlot;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

pub const SESSION_COOKIE: &str = "flowmate_session";
/// Sessions unused for longer than this are evicted by the sweep.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(3600);

/// Mutable state of one session.
#[derive(Debug)]
pub struct SessionContext {
    pub id: String,
    /// Stored name of the most recent successful upload.
    pub uploaded_file: Option<String>,
    pub index_slot: IndexSlot,
    pub memory: ConversationBuffer,
}

impl SessionContext {
    fn new(id: String) -> Self {
        Self {
            id,
            uploaded_file: None,
            index_slot: IndexSlot::default(),
            memory: ConversationBuffer::default(),
        }
    }

    pub fn has_upload(&self) -> bool {
        self.uploaded_file.is_some()
    }
}

pub struct SessionHandle {
    id: String,
    context: tokio::sync::Mutex<SessionContext>,
    last_seen: Mutex<Instant>,
}

impl SessionHandle {
    fn new(id: String) -> Self {
        Self {
            context: tokio::sync::Mutex::new(SessionContext::new(id.clone())),
            id,
            last_seen: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Exclusive access to the session's context.
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, SessionContext> {
        self.context.lock().await
    }

    fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_seen.lock())
    }
}

/// A resolved session, plus the cookie to send if it was just created.
pub struct ResolvedSession {
    pub handle: Arc<SessionHandle>,
    pub set_cookie: Option<String>,
}

/// All live sessions.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the request's session, creating one when the cookie is missing,
    /// malformed, or names a session that no longer exists.
    pub fn resolve(&self, headers: &HeaderMap) -> ResolvedSession {
        if let Some(id) = session_id_from_headers(headers) {
            if let Some(handle) = self.sessions.read().get(&id).cloned() {
                handle.touch();
                return ResolvedSession {
                    handle,
                    set_cookie: None,
                };
            }
        }
        let handle = self.create();
        ResolvedSession {
            set_cookie: Some(session_cookie(handle.id())),
            handle,
        }
    }

    /// Start a fresh session with a new id.
    pub fn create(&self) -> Arc<SessionHandle> {
        let id = uuid::Uuid::new_v4().to_string();
        let handle = Arc::new(SessionHandle::new(id.clone()));
        self.sessions.write().insert(id.clone(), handle.clone());
        debug!("Session {} created", id);
        handle
    }

    pub fn remove(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Every live session, in no particular order.
    pub fn handles(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions.read().values().cloned().collect()
    }

    /// Remove and return sessions idle for longer than `max_idle`.
    pub fn take_idle(&self, max_idle: Duration) -> Vec<Arc<SessionHandle>> {
        self.take_idle_at(Instant::now(), max_idle)
    }

    fn take_idle_at(&self, now: Instant, max_idle: Duration) -> Vec<Arc<SessionHandle>> {
        let mut sessions = self.sessions.write();
        let idle: Vec<String> = sessions
            .iter()
            .filter(|(_, h)| h.idle_for(now) > max_idle)
            .map(|(id, _)| id.clone())
            .collect();
        idle.iter().filter_map(|id| sessions.remove(id)).collect()
    }

    /// Remove and return every session.
    pub fn drain(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions.write().drain().map(|(_, h)| h).collect()
    }
}

/// Session id from the `Cookie` header, if it is a well-formed UUID.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| uuid::Uuid::parse_str(value).is_ok())
        .map(str::to_string)
}

/// `Set-Cookie` value binding the browser to `id`.
pub fn session_cookie(id: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id)
}
