//! In-memory session registry.
//!
//! Each session is wrapped in its own async mutex, so concurrent requests
//! against the same session serialize (one turn or resolution at a time)
//! while different sessions proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use dinebot_core::{Session, SessionId};

type SharedSession = Arc<tokio::sync::Mutex<Session>>;

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<SessionId, SharedSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh session and return its handle.
    pub fn create(&self) -> (SessionId, SharedSession) {
        let session = Session::new();
        let id = session.id();
        let shared = Arc::new(tokio::sync::Mutex::new(session));
        self.sessions.lock().expect("registry lock").insert(id, Arc::clone(&shared));
        (id, shared)
    }

    pub fn get(&self, id: &SessionId) -> Option<SharedSession> {
        self.sessions.lock().expect("registry lock").get(id).cloned()
    }

    /// Drop a session. Returns whether it existed.
    pub fn remove(&self, id: &SessionId) -> bool {
        self.sessions.lock().expect("registry lock").remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().expect("registry lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().expect("registry lock").is_empty()
    }
}
