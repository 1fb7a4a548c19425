//! Retrieval engine seam.
//!
//! The peer-to-peer engine is an external collaborator. The orchestrator only
//! needs three things from it:
//! - [`RetrievalEngine::submit`]: create a fresh client and add a magnet link
//!   or descriptor file, returning a live handle
//! - [`RetrievalHandle::files`]: the handle's file list, populated
//!   asynchronously as metadata resolves
//! - [`RetrievalHandle::open_stream`]: a readable byte stream per file
//!
//! [`EngineSession`] wraps a handle so that engine teardown happens exactly
//! once per session.

mod session;

#[cfg(feature = "rqbit")]
pub mod rqbit;

pub use session::EngineSession;

use crate::types::Source;
use std::sync::Arc;
use tokio::io::AsyncRead;

/// Readable byte stream for one torrent file
pub type FileStream = Box<dyn AsyncRead + Send + Unpin>;

/// One file listed by a retrieval handle
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineFile {
    /// Position in the torrent's file list
    pub index: usize,
    /// Path relative to the torrent root, `/`-separated
    pub path: String,
    /// File length in bytes, when known
    pub length: Option<u64>,
}

/// Byte-level progress reported by a handle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineProgress {
    /// Bytes verified so far
    pub downloaded_bytes: u64,
    /// Total torrent size, once metadata is known
    pub total_bytes: Option<u64>,
}

impl EngineProgress {
    /// Progress percentage (0.0 to 100.0), if the total is known
    pub fn percent(&self) -> Option<f32> {
        match self.total_bytes {
            Some(0) => Some(100.0),
            Some(total) => Some((self.downloaded_bytes as f64 / total as f64 * 100.0) as f32),
            None => None,
        }
    }
}

/// The engine refused a source
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct EngineError(pub String);

/// Factory for per-session engine clients
///
/// Implementations must construct a new client for every call so that
/// sockets and peers are never shared between sessions.
#[async_trait::async_trait]
pub trait RetrievalEngine: Send + Sync {
    /// Start a client, add `source` and return the live handle
    ///
    /// Returns once the engine has accepted the source; the file list may
    /// still be empty at that point.
    async fn submit(
        &self,
        source: &Source,
    ) -> std::result::Result<Arc<dyn RetrievalHandle>, EngineError>;
}

/// Live view of one torrent inside an engine client
#[async_trait::async_trait]
pub trait RetrievalHandle: Send + Sync {
    /// Snapshot of the files discovered so far
    fn files(&self) -> Vec<EngineFile>;

    /// Open a readable stream over one file's bytes
    async fn open_stream(&self, file: &EngineFile) -> std::io::Result<FileStream>;

    /// Current byte progress
    fn progress(&self) -> EngineProgress;

    /// Tear down the engine client owning this handle
    async fn destroy(&self);
}
