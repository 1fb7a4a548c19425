//! Session status lookups.

use super::TorrentDownloader;
use crate::error::{Error, Result};
use crate::types::{SessionId, SessionInfo};

impl TorrentDownloader {
    /// Snapshot of one session started by this process
    pub async fn session_info(&self, session_id: &str) -> Result<SessionInfo> {
        let id = SessionId::parse(session_id)
            .ok_or_else(|| Error::InvalidSessionId(session_id.to_string()))?;

        self.registry
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    /// All sessions started by this process, oldest first
    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> =
            self.registry.sessions.read().await.values().cloned().collect();
        sessions.sort_by_key(|s| s.created_at);
        sessions
    }

    /// Number of sessions that have not reached a terminal state
    pub async fn active_session_count(&self) -> usize {
        self.registry.active_sessions.lock().await.len()
    }
}
