//! Conversation sessions
//!
//! Sessions are kept in process memory only. Each one maps an opaque caller
//! supplied id to the turns exchanged so far.

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

pub const DEFAULT_SESSION_ID: &str = "default";

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    #[inline]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Keep only the most recent `max_turns` entries of a history
#[inline]
pub fn truncate_history(history: &[Turn], max_turns: usize) -> Vec<Turn> {
    let start = history.len().saturating_sub(max_turns);
    history[start..].to_vec()
}

/// Storage for conversation sessions shared between request handlers
pub trait SessionStore: Send + Sync {
    /// Return the stored history, creating an empty session if needed
    fn get_or_create(&self, session_id: &str) -> Vec<Turn>;

    /// Overwrite the stored history, creating the session if needed
    fn replace(&self, session_id: &str, history: Vec<Turn>);

    /// Append one turn to the session, creating it if needed
    fn append_turn(&self, session_id: &str, role: Role, content: &str);

    /// Remove a session; returns false if it did not exist
    fn clear(&self, session_id: &str) -> bool;

    /// When more than `max_sessions` exist, keep only the `keep` most recently
    /// inserted ones. Returns the number of sessions removed.
    fn evict_if_over_capacity(&self, max_sessions: usize, keep: usize) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Session ids in insertion order, at most `limit` of them
    fn session_ids(&self, limit: usize) -> Vec<String>;
}

#[derive(Debug, Default)]
struct Sessions {
    histories: HashMap<String, Vec<Turn>>,
    // first-insertion order; overwriting a session does not move it
    order: VecDeque<String>,
}

impl Sessions {
    fn entry(&mut self, session_id: &str) -> &mut Vec<Turn> {
        if !self.histories.contains_key(session_id) {
            debug!("Creating session {}", session_id);
            self.order.push_back(session_id.to_string());
        }
        self.histories.entry(session_id.to_string()).or_default()
    }
}

/// Mutex-guarded in-memory session store
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    inner: Mutex<Sessions>,
}

impl InMemorySessionStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Sessions> {
        // a panicking holder cannot leave the map half-written, so keep serving
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for InMemorySessionStore {
    #[inline]
    fn get_or_create(&self, session_id: &str) -> Vec<Turn> {
        self.lock().entry(session_id).clone()
    }

    #[inline]
    fn replace(&self, session_id: &str, history: Vec<Turn>) {
        *self.lock().entry(session_id) = history;
    }

    #[inline]
    fn append_turn(&self, session_id: &str, role: Role, content: &str) {
        self.lock().entry(session_id).push(Turn::new(role, content));
    }

    #[inline]
    fn clear(&self, session_id: &str) -> bool {
        let mut sessions = self.lock();
        if sessions.histories.remove(session_id).is_some() {
            sessions.order.retain(|id| id != session_id);
            debug!("Cleared session {}", session_id);
            true
        } else {
            false
        }
    }

    #[inline]
    fn evict_if_over_capacity(&self, max_sessions: usize, keep: usize) -> usize {
        let mut sessions = self.lock();
        let total = sessions.order.len();
        if total <= max_sessions {
            return 0;
        }

        let removed = total.saturating_sub(keep);
        let evicted: Vec<String> = sessions.order.drain(..removed).collect();
        for session_id in &evicted {
            sessions.histories.remove(session_id);
        }

        info!("Evicted {} sessions, {} remain", removed, sessions.order.len());
        removed
    }

    #[inline]
    fn len(&self) -> usize {
        self.lock().order.len()
    }

    #[inline]
    fn session_ids(&self, limit: usize) -> Vec<String> {
        self.lock().order.iter().take(limit).cloned().collect()
    }
}
