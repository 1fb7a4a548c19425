//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;

use super::TorrentDownloader;

/// How long shutdown waits for cancelled sessions to unwind
const SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

impl TorrentDownloader {
    /// Gracefully shut down the downloader
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new sessions
    /// 2. Cancels all active sessions (using their cancellation tokens)
    /// 3. Waits for them to unwind with a timeout (30 seconds), so every
    ///    stream is closed and every engine client torn down
    /// 4. Emits [`Event::Shutdown`]
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new sessions
        self.registry
            .accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);
        if let Some(limit) = &self.registry.concurrent_limit {
            limit.close();
        }
        tracing::info!("Stopped accepting new downloads");

        // 2. Cancel all active sessions
        self.cancel_all().await;

        // 3. Wait for active sessions to finish with timeout
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_sessions()).await {
            Ok(()) => tracing::info!("All active sessions stopped"),
            Err(_) => tracing::warn!(
                "Timeout waiting for sessions to stop, proceeding with shutdown"
            ),
        }

        // 4. Emit shutdown event
        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Signal cancellation to every active session
    pub(crate) async fn cancel_all(&self) {
        let active = self.registry.active_sessions.lock().await;
        tracing::debug!(active_count = active.len(), "Cancelling all active sessions");

        for (id, token) in active.iter() {
            tracing::debug!(session_id = %id, "Signaling cancellation");
            token.cancel();
        }
    }

    /// Wait until the active-session map is empty
    async fn wait_for_active_sessions(&self) {
        loop {
            let active_count = self.active_session_count().await;
            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "Waiting for active sessions to stop");
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}
