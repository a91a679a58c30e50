//! Per-host session and pacing state
//!
//! One `DomainSession` per host lives for the whole batch. Sessions are handed
//! out behind an async mutex so that attempts against the same host observe and
//! update cookies and timestamps in strict order.

mod domain_session;

pub use domain_session::DomainSession;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A session shared between the batch coordinator and fetch attempts
pub type SharedSession = Arc<tokio::sync::Mutex<DomainSession>>;

/// Registry of per-host sessions for one batch run
#[derive(Debug, Default)]
pub struct SessionPool {
    sessions: Mutex<HashMap<String, SharedSession>>,
}

impl SessionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `host`, creating it on first use
    pub fn session_for(&self, host: &str) -> SharedSession {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(DomainSession::new(host))))
            .clone()
    }

    /// Number of hosts with a session
    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
