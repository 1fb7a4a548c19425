//! Core downloader implementation split into focused submodules.
//!
//! The `TorrentDownloader` struct and its methods are organized by domain:
//! - [`session`] - One download session, from source submission to materialized files
//! - [`archive`] - Archive building for an existing workspace
//! - [`queries`] - Session status lookups
//! - [`lifecycle`] - Shutdown coordination
//! - [`background_tasks`] - Progress reporting and file completion tracking

mod archive;
mod background_tasks;
mod lifecycle;
mod queries;
mod session;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use session::SessionOutcome;

use crate::config::Config;
use crate::engine::RetrievalEngine;
use crate::error::{Error, Result};
use crate::types::{Event, SessionId, SessionInfo};
use crate::workspace::WorkspaceManager;

/// Session bookkeeping shared by all clones of the downloader
#[derive(Clone)]
pub(crate) struct SessionRegistry {
    /// Snapshot of every session accepted by this process
    pub(crate) sessions:
        std::sync::Arc<tokio::sync::RwLock<std::collections::HashMap<SessionId, SessionInfo>>>,
    /// Cancellation tokens of sessions that have not reached a terminal state
    pub(crate) active_sessions: std::sync::Arc<
        tokio::sync::Mutex<
            std::collections::HashMap<SessionId, tokio_util::sync::CancellationToken>,
        >,
    >,
    /// Limits concurrently running sessions when `max_concurrent_sessions` is set
    pub(crate) concurrent_limit: Option<std::sync::Arc<tokio::sync::Semaphore>>,
    /// Flag to indicate whether new sessions are accepted (set to false during shutdown)
    pub(crate) accepting_new: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct TorrentDownloader {
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: std::sync::Arc<Config>,
    /// Retrieval engine factory; every session gets its own client
    pub(crate) engine: std::sync::Arc<dyn RetrievalEngine>,
    /// Per-session workspace directories
    pub(crate) workspaces: WorkspaceManager,
    /// Session registry and cancellation map
    pub(crate) registry: SessionRegistry,
}

impl TorrentDownloader {
    /// Create a new TorrentDownloader instance
    ///
    /// Validates the configuration, creates the download and upload
    /// directories and sets up the event broadcast channel.
    pub async fn new(config: Config, engine: std::sync::Arc<dyn RetrievalEngine>) -> Result<Self> {
        config.validate()?;

        for (dir, what) in [
            (&config.download.download_dir, "download"),
            (&config.download.upload_dir, "upload"),
        ] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create {} directory '{}': {}",
                        what,
                        dir.display(),
                        e
                    ),
                ))
            })?;
        }

        let (event_tx, _rx) = tokio::sync::broadcast::channel(config.events.buffer);

        let registry = SessionRegistry {
            sessions: std::sync::Arc::new(tokio::sync::RwLock::new(
                std::collections::HashMap::new(),
            )),
            active_sessions: std::sync::Arc::new(tokio::sync::Mutex::new(
                std::collections::HashMap::new(),
            )),
            concurrent_limit: config
                .download
                .max_concurrent_sessions
                .map(|n| std::sync::Arc::new(tokio::sync::Semaphore::new(n))),
            accepting_new: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true)),
        };

        tracing::info!(
            download_dir = %config.download.download_dir.display(),
            max_concurrent_sessions = ?config.download.max_concurrent_sessions,
            "Torrent downloader initialized"
        );

        Ok(Self {
            event_tx,
            workspaces: WorkspaceManager::new(config.download.download_dir.clone()),
            config: std::sync::Arc::new(config),
            engine,
            registry,
        })
    }

    /// Subscribe to session events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events
    /// independently. A subscriber that falls behind by more than the
    /// configured buffer receives `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use torrent_dl::TorrentDownloader;
    /// # async fn example(downloader: TorrentDownloader) {
    /// let mut events = downloader.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         tracing::info!(?event, "session event");
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> std::sync::Arc<Config> {
        std::sync::Arc::clone(&self.config)
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(self: &std::sync::Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
