//! Per-session engine ownership.

use super::{RetrievalEngine, RetrievalHandle};
use crate::error::{Error, Result};
use crate::types::{SessionId, Source};
use std::sync::Arc;

/// A retrieval handle owned by exactly one session
///
/// Created by [`EngineSession::submit`]; the engine client is torn down by
/// [`EngineSession::close`], or in the background if the session is dropped
/// without being closed.
pub struct EngineSession {
    session_id: SessionId,
    handle: Arc<dyn RetrievalHandle>,
    closed: bool,
}

impl EngineSession {
    /// Submit a source to a new engine client
    ///
    /// Engine refusals (corrupt descriptor, unresolvable magnet) become
    /// [`Error::EngineRejected`]. Peer discovery starts as soon as this
    /// returns; the file list is not awaited here.
    pub async fn submit(
        engine: &dyn RetrievalEngine,
        session_id: SessionId,
        source: &Source,
    ) -> Result<Self> {
        match engine.submit(source).await {
            Ok(handle) => {
                tracing::info!(
                    session_id = %session_id,
                    source = ?source.kind(),
                    "Torrent added to engine"
                );
                Ok(Self {
                    session_id,
                    handle,
                    closed: false,
                })
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "Engine rejected torrent source"
                );
                Err(Error::EngineRejected { reason: e.0 })
            }
        }
    }

    /// The live handle
    pub fn handle(&self) -> &Arc<dyn RetrievalHandle> {
        &self.handle
    }

    /// Tear down the engine client
    pub async fn close(mut self) {
        self.closed = true;
        self.handle.destroy().await;
        tracing::debug!(session_id = %self.session_id, "Engine client destroyed");
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        tracing::warn!(
            session_id = %self.session_id,
            "Engine session dropped without close, destroying in background"
        );
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let handle = Arc::clone(&self.handle);
            runtime.spawn(async move { handle.destroy().await });
        }
    }
}
