//! Per-session workspace directories
//!
//! Every session writes into its own directory `<download_dir>/<session_id>`.
//! Directories are created once and never reused for another session.

use crate::error::{Error, Result};
use crate::types::SessionId;
use std::path::PathBuf;

/// A freshly created session workspace
#[derive(Clone, Debug)]
pub struct Workspace {
    /// Session the workspace belongs to
    pub session_id: SessionId,
    /// Absolute path of the workspace directory
    pub path: PathBuf,
}

/// Allocates and resolves session workspaces under a base directory
#[derive(Clone, Debug)]
pub struct WorkspaceManager {
    base_dir: PathBuf,
}

impl WorkspaceManager {
    /// Manage workspaces below `base_dir` (created lazily with the first workspace)
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Create the directory for a new session
    ///
    /// Failure is fatal for the session and is not retried.
    pub async fn create_workspace(&self) -> Result<Workspace> {
        self.create_workspace_for(SessionId::generate()).await
    }

    /// Create the directory for an already allocated session id
    pub async fn create_workspace_for(&self, session_id: SessionId) -> Result<Workspace> {
        let path = std::path::absolute(self.base_dir.join(session_id.as_str())).map_err(|e| {
            Error::WorkspaceCreationFailed {
                path: self.base_dir.join(session_id.as_str()),
                reason: e.to_string(),
            }
        })?;

        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| Error::WorkspaceCreationFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(session_id = %session_id, path = %path.display(), "Workspace created");
        Ok(Workspace { session_id, path })
    }

    /// Map an externally supplied session id back to its workspace directory
    ///
    /// Rejects ids that are not opaque tokens with [`Error::InvalidSessionId`]
    /// and returns [`Error::WorkspaceNotFound`] when no directory exists.
    pub async fn resolve_workspace(&self, session_id: &str) -> Result<Workspace> {
        let id = SessionId::parse(session_id)
            .ok_or_else(|| Error::InvalidSessionId(session_id.to_string()))?;
        let path = std::path::absolute(self.base_dir.join(id.as_str()))?;

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(Workspace {
                session_id: id,
                path,
            }),
            _ => Err(Error::WorkspaceNotFound {
                session_id: session_id.to_string(),
            }),
        }
    }
}
