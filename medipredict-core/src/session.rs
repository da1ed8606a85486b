//! Browser session lifecycle: sign-in state and flash messages.
//!
//! Sessions are keyed by a random `Uuid` carried in a cookie and live only in
//! memory; a restart signs everybody out.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Category of a flash message, used as the CSS class when rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Danger,
}

/// A one-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Danger,
            message: message.into(),
        }
    }
}

/// A single browser session.
#[derive(Debug, Clone)]
pub struct WebSession {
    pub session_id: Uuid,
    pub account_id: Option<i64>,
    pub flashes: Vec<Flash>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Manages browser sessions.
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: HashMap<Uuid, WebSession>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an anonymous session.
    pub fn create_session(&mut self) -> Uuid {
        let now = Utc::now();
        let session_id = Uuid::new_v4();
        self.sessions.insert(
            session_id,
            WebSession {
                session_id,
                account_id: None,
                flashes: Vec::new(),
                created_at: now,
                updated_at: now,
            },
        );
        session_id
    }

    /// Return `id` if it names a live session. Unknown ids are not stored.
    pub fn resolve(&mut self, id: Option<Uuid>) -> Option<Uuid> {
        let id = id.filter(|id| self.sessions.contains_key(id))?;
        self.touch(&id);
        Some(id)
    }

    /// Move the session at `old` to a new id and return it. The old id stops
    /// resolving. An unknown `old` yields a new anonymous session.
    pub fn rotate(&mut self, old: &Uuid) -> Uuid {
        let Some(mut session) = self.sessions.remove(old) else {
            return self.create_session();
        };
        let session_id = Uuid::new_v4();
        session.session_id = session_id;
        session.updated_at = Utc::now();
        self.sessions.insert(session_id, session);
        session_id
    }

    fn touch(&mut self, session_id: &Uuid) {
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.updated_at = Utc::now();
        }
    }

    /// Attach an account to the session.
    pub fn login(&mut self, session_id: &Uuid, account_id: i64) -> bool {
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.account_id = Some(account_id);
            session.updated_at = Utc::now();
            return true;
        }
        false
    }

    /// Detach the account. Returns `true` if someone was signed in.
    pub fn logout(&mut self, session_id: &Uuid) -> bool {
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.updated_at = Utc::now();
            return session.account_id.take().is_some();
        }
        false
    }

    /// Signed-in account for the session, if any.
    pub fn current_user(&self, session_id: &Uuid) -> Option<i64> {
        self.sessions.get(session_id).and_then(|s| s.account_id)
    }

    pub fn push_flash(&mut self, session_id: &Uuid, flash: Flash) {
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.flashes.push(flash);
        }
    }

    /// Drain pending flash messages.
    pub fn take_flashes(&mut self, session_id: &Uuid) -> Vec<Flash> {
        self.sessions
            .get_mut(session_id)
            .map(|s| std::mem::take(&mut s.flashes))
            .unwrap_or_default()
    }

    pub fn get(&self, session_id: &Uuid) -> Option<&WebSession> {
        self.sessions.get(session_id)
    }

    /// Count signed-in sessions.
    pub fn active_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.account_id.is_some())
            .count()
    }

    /// Total sessions (signed in or anonymous).
    pub fn total_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drop sessions idle for longer than `ttl`. Returns how many were removed.
    pub fn expire_idle(&mut self, ttl: Duration) -> usize {
        let cutoff = Utc::now() - ttl;
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.updated_at >= cutoff);
        before - self.sessions.len()
    }
}
