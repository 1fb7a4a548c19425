//! Concurrent file materialization
//!
//! Streams every file of a retrieval handle into the session workspace, one
//! task per file. The batch resolves when all tasks have finished: success
//! only if every file was written, otherwise the first failure or abort.
//! Files that completed before a failure stay on disk.

use crate::archive::is_archive_temp;
use crate::engine::{EngineFile, RetrievalHandle};
use crate::error::{Error, Result, TransferError};
use crate::types::FileTaskStatus;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Characters that may not appear in a destination file name
const ILLEGAL_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Maximum number of suffixes tried when disambiguating a file name
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Status change of one file task
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileReport {
    /// Destination path inside the workspace
    pub path: PathBuf,
    /// New status
    pub status: FileTaskStatus,
}

/// Replace characters that are illegal in file names with `-`
///
/// Nested torrent paths are flattened (`dir/a.txt` becomes `dir-a.txt`).
/// Names that would be empty or refer to a directory (`.`, `..`) fall back
/// to `file-<index>`.
pub fn sanitize_filename(relative_path: &str, index: usize) -> String {
    let name: String = relative_path
        .chars()
        .map(|c| if ILLEGAL_CHARS.contains(&c) { '-' } else { c })
        .collect();

    if name.is_empty() || name == "." || name == ".." {
        format!("file-{index}")
    } else {
        name
    }
}

/// Compute one destination path per file, in file-list order
///
/// Later files whose sanitized name is already taken (by an earlier file, by
/// `reserved_name` the session archive, or by one of its temp names) get a
/// numeric suffix: `name (1).ext`, `name (2).ext`, ...
pub fn plan_destinations(files: &[EngineFile], workspace: &Path, reserved_name: &str) -> Vec<PathBuf> {
    let mut taken: HashSet<String> = HashSet::from([reserved_name.to_string()]);

    files
        .iter()
        .map(|file| {
            let name = unique_name(sanitize_filename(&file.path, file.index), |candidate| {
                taken.contains(candidate) || is_archive_temp(candidate, reserved_name)
            });
            taken.insert(name.clone());
            workspace.join(name)
        })
        .collect()
}

fn unique_name(name: String, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(&name) {
        return name;
    }

    let path = Path::new(&name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name.as_str());
    let extension = path.extension().and_then(|e| e.to_str());

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let candidate = match extension {
            Some(ext) => format!("{stem} ({i}).{ext}"),
            None => format!("{stem} ({i})"),
        };
        if !is_taken(&candidate) {
            return candidate;
        }
    }

    // Every suffix is taken; fall back to a random tag
    format!("{stem} ({:08x})", rand::random::<u32>())
}

/// Streams a handle's files into a workspace
#[derive(Clone, Debug)]
pub struct Materializer {
    reserved_name: String,
    reports: Option<mpsc::UnboundedSender<FileReport>>,
}

impl Materializer {
    /// Materializer that keeps `reserved_name` free for the session archive
    pub fn new(reserved_name: impl Into<String>) -> Self {
        Self {
            reserved_name: reserved_name.into(),
            reports: None,
        }
    }

    /// Send a [`FileReport`] for every file status change
    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<FileReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Write every file of `handle` into `workspace`
    ///
    /// All files stream concurrently. The first failed or aborted file
    /// cancels its siblings; every task is joined before returning so no
    /// stream or destination file is still open afterwards. On success the
    /// absolute destination paths are returned in file-list order.
    ///
    /// Cancelling `cancel` aborts every in-flight transfer with
    /// "Download aborted".
    pub async fn materialize(
        &self,
        handle: Arc<dyn RetrievalHandle>,
        files: &[EngineFile],
        workspace: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>> {
        if files.is_empty() {
            return Err(Error::NoFilesAvailable { attempts: 0 });
        }

        let destinations = plan_destinations(files, workspace, &self.reserved_name);
        let batch = cancel.child_token();
        let mut tasks = JoinSet::new();

        for (position, (file, destination)) in files.iter().zip(&destinations).enumerate() {
            let handle = Arc::clone(&handle);
            let file = file.clone();
            let destination = destination.clone();
            let token = batch.child_token();
            let reports = self.reports.clone();

            tasks.spawn(async move {
                let result = transfer_file(handle, file, destination, token, reports).await;
                (position, result)
            });
        }

        let mut written: Vec<Option<PathBuf>> = vec![None; files.len()];
        let mut first_error: Option<TransferError> = None;

        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok((position, Ok(path))) => {
                    written[position] = Some(path);
                    continue;
                }
                Ok((_, Err(e))) => e,
                Err(join_error) => TransferError::Failed {
                    path: workspace.to_path_buf(),
                    reason: format!("transfer task failed: {join_error}"),
                },
            };

            if first_error.is_none() {
                batch.cancel();
                first_error = Some(outcome);
            }
        }

        if let Some(e) = first_error {
            return Err(e.into());
        }

        Ok(written.into_iter().flatten().collect())
    }
}

async fn transfer_file(
    handle: Arc<dyn RetrievalHandle>,
    file: EngineFile,
    destination: PathBuf,
    cancel: CancellationToken,
    reports: Option<mpsc::UnboundedSender<FileReport>>,
) -> std::result::Result<PathBuf, TransferError> {
    let report = |status: FileTaskStatus| {
        if let Some(tx) = &reports {
            let _ = tx.send(FileReport {
                path: destination.clone(),
                status,
            });
        }
    };

    let failed = |reason: std::io::Error| TransferError::Failed {
        path: destination.clone(),
        reason: reason.to_string(),
    };

    let copy = async {
        let mut reader = handle.open_stream(&file).await.map_err(failed)?;
        let mut writer = tokio::fs::File::create(&destination)
            .await
            .map_err(failed)?;
        report(FileTaskStatus::Streaming);

        let bytes = tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(failed)?;
        writer.flush().await.map_err(failed)?;
        Ok::<u64, TransferError>(bytes)
    };

    // Dropping `copy` on cancellation closes both streams
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransferError::Aborted { path: destination.clone() }),
        result = copy => result,
    };

    match result {
        Ok(bytes) => {
            tracing::info!(file = %destination.display(), bytes, "File download complete");
            report(FileTaskStatus::Done);
            Ok(destination)
        }
        Err(e @ TransferError::Aborted { .. }) => {
            tracing::info!(file = %destination.display(), "File transfer aborted");
            report(FileTaskStatus::Aborted);
            Err(e)
        }
        Err(e) => {
            tracing::error!(file = %destination.display(), error = %e, "File transfer failed");
            report(FileTaskStatus::Failed);
            Err(e)
        }
    }
}
