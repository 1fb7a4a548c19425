//! # torrent-dl
//!
//! Session-scoped torrent download orchestrator with an HTTP API.
//!
//! A client submits a magnet link or a `.torrent` file; the downloader waits
//! for the retrieval engine to list the torrent's files, streams every file
//! concurrently into a fresh per-session workspace and returns the session
//! id. The same id later retrieves the workspace bundled as a zip archive.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use torrent_dl::{Config, TorrentDownloader, types::Source};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(engine: Arc<dyn torrent_dl::engine::RetrievalEngine>) -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = TorrentDownloader::new(Config::default(), engine).await?;
//!
//! // Subscribe to events
//! let mut events = downloader.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//! });
//!
//! let magnet = "magnet:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056".to_string();
//! let outcome = downloader
//!     .download(Source::Magnet(magnet), CancellationToken::new())
//!     .await?;
//! let archive = downloader.archive(outcome.session_id.as_str()).await?;
//! println!("{} bytes at {}", archive.len, archive.path.display());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Zip archive building for session workspaces
pub mod archive;
/// Configuration types
pub mod config;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Retrieval engine abstraction
pub mod engine;
/// Error types
pub mod error;
/// Magnet link validation
pub mod magnet;
/// Concurrent file materialization
pub mod materialize;
/// File-list readiness polling
pub mod readiness;
/// Core types and events
pub mod types;
/// Per-session workspace directories
pub mod workspace;

use std::sync::Arc;

// Re-export commonly used types
pub use archive::ArchiveStream;
pub use config::Config;
pub use downloader::{SessionOutcome, TorrentDownloader};
pub use engine::{RetrievalEngine, RetrievalHandle};
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus, TransferError};
pub use types::{Event, SessionId, SessionInfo, SessionState, Source};

/// Serve the REST API until a termination signal arrives, then shut down gracefully.
///
/// On SIGTERM/SIGINT (Ctrl+C elsewhere) active sessions are cancelled first so
/// their requests complete, then the server stops accepting connections and
/// waits for in-flight responses.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use torrent_dl::{Config, TorrentDownloader, run_with_shutdown};
///
/// # async fn example(engine: Arc<dyn torrent_dl::RetrievalEngine>) -> Result<(), Box<dyn std::error::Error>> {
/// let downloader = Arc::new(TorrentDownloader::new(Config::default(), engine).await?);
///
/// // Run with automatic signal handling
/// run_with_shutdown(downloader).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_with_shutdown(downloader: Arc<TorrentDownloader>) -> Result<()> {
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(api::serve_with_shutdown(
        Arc::clone(&downloader),
        downloader.get_config(),
        async move {
            stop_rx.await.ok();
        },
    ));

    tokio::select! {
        _ = wait_for_signal() => {}
        result = &mut server => {
            // Server exited on its own (bind failure or I/O error)
            return result.map_err(|e| Error::ApiServerError(e.to_string()))?;
        }
    }

    downloader.shutdown().await?;
    stop_tx.send(()).ok();

    server
        .await
        .map_err(|e| Error::ApiServerError(e.to_string()))?
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
