//! Archive building for an existing session workspace.

use super::TorrentDownloader;
use crate::archive::{self, ArchiveStream};
use crate::error::Result;
use crate::types::Event;

impl TorrentDownloader {
    /// Build (or rebuild) the zip archive of a session's workspace
    ///
    /// `session_id` is the externally supplied token. Malformed tokens fail
    /// with `InvalidSessionId`, unknown ones with `WorkspaceNotFound`. The
    /// workspace does not need to belong to a session of this process, so
    /// archives can still be fetched after a restart.
    pub async fn archive(&self, session_id: &str) -> Result<ArchiveStream> {
        let workspace = self.workspaces.resolve_workspace(session_id).await?;
        let archive = archive::build_archive(&workspace.path, &self.config.archive).await?;

        tracing::info!(
            session_id = %workspace.session_id,
            size_bytes = archive.len,
            "Archive ready"
        );
        self.emit_event(Event::ArchiveReady {
            session_id: workspace.session_id,
            size_bytes: archive.len,
        });

        Ok(archive)
    }
}
