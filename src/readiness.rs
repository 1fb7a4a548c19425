//! Readiness polling for a handle's file list
//!
//! Torrent metadata (and so the file list) arrives from the swarm some time
//! after the engine accepts a source. [`await_files`] checks the handle at a
//! fixed interval, for a bounded number of checks, until the list is
//! non-empty.
//!
//! # Example
//!
//! ```no_run
//! use torrent_dl::config::ReadinessConfig;
//! use torrent_dl::readiness::await_files;
//! use tokio_util::sync::CancellationToken;
//! # use torrent_dl::engine::RetrievalHandle;
//!
//! # async fn example(handle: &dyn RetrievalHandle) -> torrent_dl::Result<()> {
//! let config = ReadinessConfig::default();
//! let files = await_files(handle, &config, &CancellationToken::new()).await?;
//! println!("{} files listed", files.len());
//! # Ok(())
//! # }
//! ```

use crate::config::ReadinessConfig;
use crate::engine::{EngineFile, RetrievalHandle};
use crate::error::{Error, Result};
use tokio_util::sync::CancellationToken;

/// Wait until `handle` lists at least one file
///
/// Performs at most `config.max_attempts` checks, sleeping `config.delay`
/// between consecutive checks. Success on the N-th check returns after
/// `(N - 1) * delay`; when every check comes back empty the result is
/// [`Error::NoFilesAvailable`]. Cancelling `cancel` during a wait returns
/// [`Error::Aborted`] without performing further checks.
pub async fn await_files(
    handle: &dyn RetrievalHandle,
    config: &ReadinessConfig,
    cancel: &CancellationToken,
) -> Result<Vec<EngineFile>> {
    let max_attempts = config.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        if cancel.is_cancelled() {
            return Err(Error::Aborted);
        }

        let files = handle.files();
        if !files.is_empty() {
            tracing::debug!(attempt, files = files.len(), "File list available");
            return Ok(files);
        }

        if attempt == max_attempts {
            break;
        }

        tracing::info!(
            attempt,
            max_attempts,
            delay_ms = config.delay.as_millis() as u64,
            "Torrent does not contain any files yet, retrying"
        );

        tokio::select! {
            _ = tokio::time::sleep(config.delay) => {}
            _ = cancel.cancelled() => return Err(Error::Aborted),
        }
    }

    tracing::warn!(max_attempts, "No files listed after maximum retries");
    Err(Error::NoFilesAvailable {
        attempts: max_attempts,
    })
}
