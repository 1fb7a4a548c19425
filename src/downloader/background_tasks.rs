//! Background tasks for progress reporting and file completion tracking.

use super::TorrentDownloader;
use crate::engine::RetrievalHandle;
use crate::materialize::FileReport;
use crate::types::{Event, FileTaskStatus, SessionId};
use std::sync::Arc;
use std::time::Duration;

/// Spawn a background task that periodically reports download progress.
///
/// Progress is read from the engine handle, logged at debug level and
/// broadcast as [`Event::Progress`] until `cancel_token` fires.
pub(crate) fn spawn_progress_reporter(
    session_id: SessionId,
    handle: Arc<dyn RetrievalHandle>,
    event_tx: tokio::sync::broadcast::Sender<Event>,
    interval: Duration,
    cancel_token: tokio_util::sync::CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let progress = handle.progress();
                    let Some(percent) = progress.percent() else {
                        continue;
                    };

                    tracing::debug!(session_id = %session_id, "Downloaded: {:.2}%", percent);

                    event_tx
                        .send(Event::Progress {
                            session_id: session_id.clone(),
                            percent,
                            downloaded_bytes: progress.downloaded_bytes,
                            total_bytes: progress.total_bytes,
                        })
                        .ok();
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }
    })
}

/// Spawn a background task that records finished files in the session registry.
///
/// Runs until every sender of `reports` is dropped.
pub(crate) fn spawn_completion_tracker(
    downloader: TorrentDownloader,
    session_id: SessionId,
    mut reports: tokio::sync::mpsc::UnboundedReceiver<FileReport>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(report) = reports.recv().await {
            if report.status != FileTaskStatus::Done {
                continue;
            }

            let file_name = report
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if let Some(info) = downloader
                .registry
                .sessions
                .write()
                .await
                .get_mut(&session_id)
            {
                info.files.push(file_name.clone());
            }

            downloader.emit_event(Event::FileCompleted {
                session_id: session_id.clone(),
                file_name,
            });
        }
    })
}
