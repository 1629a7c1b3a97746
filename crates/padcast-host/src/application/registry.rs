//! Session registry: the operator-visible snapshot of active sessions.
//!
//! The router owns the real [`ClientSession`](crate::application::session)
//! map exclusively on the receive thread.  Operator threads never touch it;
//! instead the router mirrors the presentation-relevant fields into this
//! registry, which lives behind a `Mutex` shared with the service surface.

use std::collections::HashMap;
use std::net::SocketAddr;

/// Presentation snapshot of one active session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub client_id: u32,
    pub label: String,
    pub color: &'static str,
    /// Slot index, 1-based.
    pub slot: usize,
    /// Last source address, diagnostics only.
    pub addr: SocketAddr,
    pub latency_ms: f64,
    pub jitter_ms: f64,
    pub rate_hz: f64,
    pub last_sequence: u16,
    /// True when the session has no working pad and input is only logged.
    pub degraded: bool,
}

/// In-memory registry of all active sessions, keyed by client identifier.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<u32, SessionSnapshot>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or updates a session snapshot.
    pub fn upsert(&mut self, snapshot: SessionSnapshot) {
        self.sessions.insert(snapshot.client_id, snapshot);
    }

    /// Removes a session from the registry.
    pub fn remove(&mut self, client_id: u32) {
        self.sessions.remove(&client_id);
    }

    /// Returns a snapshot of all sessions, ordered by slot.
    pub fn all(&self) -> Vec<SessionSnapshot> {
        let mut sessions: Vec<_> = self.sessions.values().cloned().collect();
        sessions.sort_by_key(|s| s.slot);
        sessions
    }

    /// Returns the snapshot for a specific client.
    pub fn get(&self, client_id: u32) -> Option<&SessionSnapshot> {
        self.sessions.get(&client_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
