//! One download session, from source submission to materialized files.

use super::TorrentDownloader;
use super::background_tasks::{spawn_completion_tracker, spawn_progress_reporter};
use crate::engine::{EngineSession, RetrievalHandle};
use crate::error::{Error, Result};
use crate::magnet;
use crate::materialize::Materializer;
use crate::readiness;
use crate::types::{Event, SessionId, SessionInfo, SessionState, Source};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;

/// Result of a completed session
#[derive(Clone, Debug)]
pub struct SessionOutcome {
    /// Identifier of the new session (names its workspace)
    pub session_id: SessionId,
    /// Absolute paths of the written files, in torrent file-list order
    pub files: Vec<PathBuf>,
}

impl TorrentDownloader {
    /// Download every file of `source` into a fresh session workspace
    ///
    /// Magnet links are validated before the engine is contacted. The call
    /// returns once all files are written, or with the first failure.
    /// Cancelling `cancel` (a client disconnect) aborts every transfer and
    /// yields [`Error::Aborted`] or an aborted [`Error::Transfer`]; files
    /// already written stay on disk.
    ///
    /// The session's engine client is torn down exactly once on every path.
    pub async fn download(&self, source: Source, cancel: CancellationToken) -> Result<SessionOutcome> {
        if !self.registry.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        if let Source::Magnet(link) = &source
            && !magnet::is_valid_magnet_link(link)
        {
            tracing::warn!(identifier = %link, "Rejected invalid magnet link");
            return Err(Error::InvalidIdentifier(link.clone()));
        }

        let _permit = match &self.registry.concurrent_limit {
            Some(limit) => {
                let acquired = tokio::select! {
                    permit = Arc::clone(limit).acquire_owned() => permit,
                    _ = cancel.cancelled() => return Err(Error::Aborted),
                };
                Some(acquired.map_err(|_| Error::ShuttingDown)?)
            }
            None => None,
        };

        let session_id = SessionId::generate();
        let name = match &source {
            Source::Magnet(link) => magnet::display_name(link),
            Source::DescriptorFile(_) => None,
        };
        let session_cancel = cancel.child_token();

        self.register_session(&session_id, &source, name.clone(), &session_cancel)
            .await?;
        self.emit_event(Event::SessionCreated {
            session_id: session_id.clone(),
            name: name.clone(),
        });
        tracing::info!(
            session_id = %session_id,
            source = ?source.kind(),
            name = name.as_deref().unwrap_or(""),
            "Download session started"
        );

        let result = self
            .run_with_time_limit(&session_id, &source, &session_cancel)
            .await;

        self.finish_session(&session_id, &result).await;

        result.map(|files| SessionOutcome { session_id, files })
    }

    async fn run_with_time_limit(
        &self,
        session_id: &SessionId,
        source: &Source,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>> {
        let work = self.run_session(session_id, source, cancel);
        tokio::pin!(work);

        let Some(limit) = self.config.download.max_session_duration else {
            return work.await;
        };

        tokio::select! {
            result = &mut work => result,
            _ = tokio::time::sleep(limit) => {
                tracing::warn!(
                    session_id = %session_id,
                    limit_secs = limit.as_secs(),
                    "Session exceeded maximum duration, cancelling"
                );
                cancel.cancel();
                // Let the session unwind so streams close and the engine is torn down
                let _ = work.await;
                Err(Error::SessionTimedOut { seconds: limit.as_secs() })
            }
        }
    }

    async fn run_session(
        &self,
        session_id: &SessionId,
        source: &Source,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>> {
        let engine_session =
            EngineSession::submit(self.engine.as_ref(), session_id.clone(), source).await?;
        let handle = Arc::clone(engine_session.handle());

        let result = self.materialize_session(session_id, handle, cancel).await;

        engine_session.close().await;
        result
    }

    async fn materialize_session(
        &self,
        session_id: &SessionId,
        handle: Arc<dyn RetrievalHandle>,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>> {
        let files = readiness::await_files(handle.as_ref(), &self.config.readiness, cancel).await?;
        tracing::info!(session_id = %session_id, files = files.len(), "Torrent files listed");
        self.emit_event(Event::FilesListed {
            session_id: session_id.clone(),
            count: files.len(),
        });

        let workspace = self
            .workspaces
            .create_workspace_for(session_id.clone())
            .await?;
        self.set_session_state(session_id, SessionState::Materializing)
            .await;

        let (report_tx, report_rx) = tokio::sync::mpsc::unbounded_channel();
        let tracker = spawn_completion_tracker(self.clone(), session_id.clone(), report_rx);

        let progress_cancel = cancel.child_token();
        let progress = spawn_progress_reporter(
            session_id.clone(),
            Arc::clone(&handle),
            self.event_tx.clone(),
            self.config.events.progress_interval,
            progress_cancel.clone(),
        );

        let materializer =
            Materializer::new(self.config.archive.file_name.clone()).with_reports(report_tx);
        let result = materializer
            .materialize(handle, &files, &workspace.path, cancel)
            .await;

        // Closing the report channel lets the tracker drain and exit
        drop(materializer);
        progress_cancel.cancel();
        let _ = progress.await;
        let _ = tracker.await;

        result
    }

    /// Record a new session and its cancellation token
    ///
    /// The intake flag is checked under the active-session lock, so a session
    /// either registers before shutdown cancels the active set or is refused.
    pub(super) async fn register_session(
        &self,
        session_id: &SessionId,
        source: &Source,
        name: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        {
            let mut active = self.registry.active_sessions.lock().await;
            if !self.registry.accepting_new.load(Ordering::SeqCst) {
                return Err(Error::ShuttingDown);
            }
            active.insert(session_id.clone(), cancel.clone());
        }

        let info = SessionInfo {
            session_id: session_id.clone(),
            state: SessionState::Created,
            source: source.kind(),
            name,
            files: Vec::new(),
            error: None,
            created_at: chrono::Utc::now(),
            finished_at: None,
        };
        self.registry
            .sessions
            .write()
            .await
            .insert(session_id.clone(), info);
        Ok(())
    }

    pub(crate) async fn set_session_state(&self, session_id: &SessionId, state: SessionState) {
        if let Some(info) = self.registry.sessions.write().await.get_mut(session_id) {
            info.state = state;
        }
    }

    async fn finish_session(&self, session_id: &SessionId, result: &Result<Vec<PathBuf>>) {
        let (state, error) = match result {
            Ok(files) => {
                tracing::info!(session_id = %session_id, files = files.len(), "Download complete");
                self.emit_event(Event::SessionComplete {
                    session_id: session_id.clone(),
                    files: files.len(),
                });
                (SessionState::Complete, None)
            }
            Err(e) if e.is_abort() => {
                tracing::info!(session_id = %session_id, "Download aborted by client");
                self.emit_event(Event::SessionAborted {
                    session_id: session_id.clone(),
                });
                (SessionState::Aborted, Some(e.to_string()))
            }
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Download failed");
                self.emit_event(Event::SessionFailed {
                    session_id: session_id.clone(),
                    error: e.to_string(),
                });
                (SessionState::Failed, Some(e.to_string()))
            }
        };

        if let Some(info) = self.registry.sessions.write().await.get_mut(session_id) {
            info.state = state;
            info.error = error;
            info.finished_at = Some(chrono::Utc::now());
        }
        self.registry.active_sessions.lock().await.remove(session_id);
    }
}
