//! Session archive builder
//!
//! Bundles the regular files at the top level of a workspace into one flat
//! deflate-compressed zip. Each build writes next to the files under its own
//! `<name>.<tag>.partial` and renames into place when complete, so concurrent
//! builds of one workspace never share a temp file. The archive and any temp
//! files are excluded from later builds.

use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// A finished archive ready to be sent as a response body
pub struct ArchiveStream {
    /// Byte stream over the archive file
    pub stream: ReaderStream<tokio::fs::File>,
    /// Archive size in bytes
    pub len: u64,
    /// Location of the archive inside the workspace
    pub path: PathBuf,
}

/// Build the workspace archive and return its path
///
/// Repeat calls replace the previous archive. Fails with
/// [`Error::WorkspaceNotFound`] when `workspace` is not a directory and with
/// [`Error::ArchiveWriteFailed`] on any encoding or I/O error.
pub async fn build_archive_file(workspace: &Path, config: &ArchiveConfig) -> Result<PathBuf> {
    match tokio::fs::metadata(workspace).await {
        Ok(meta) if meta.is_dir() => {}
        _ => {
            return Err(Error::WorkspaceNotFound {
                session_id: workspace
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            });
        }
    }

    let workspace = workspace.to_path_buf();
    let file_name = config.file_name.clone();
    let level = config.compression_level;

    tokio::task::spawn_blocking(move || write_archive(&workspace, &file_name, level))
        .await
        .map_err(write_failed)?
}

/// Build the workspace archive and open it for streaming
pub async fn build_archive(workspace: &Path, config: &ArchiveConfig) -> Result<ArchiveStream> {
    let path = build_archive_file(workspace, config).await?;
    let file = tokio::fs::File::open(&path).await.map_err(write_failed)?;
    let len = file.metadata().await.map_err(write_failed)?.len();

    Ok(ArchiveStream {
        stream: ReaderStream::new(file),
        len,
        path,
    })
}

fn write_failed(e: impl std::fmt::Display) -> Error {
    Error::ArchiveWriteFailed {
        reason: e.to_string(),
    }
}

fn partial_name(file_name: &str) -> String {
    format!("{file_name}.{:016x}.partial", rand::random::<u64>())
}

/// Whether `name` is an in-progress archive temp file for `file_name`
///
/// Matches `<file_name>.<hex>.partial` and the untagged `<file_name>.partial`.
pub(crate) fn is_archive_temp(name: &str, file_name: &str) -> bool {
    let Some(middle) = name
        .strip_prefix(file_name)
        .and_then(|rest| rest.strip_suffix(".partial"))
    else {
        return false;
    };

    middle.is_empty()
        || middle
            .strip_prefix('.')
            .is_some_and(|tag| !tag.is_empty() && tag.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Regular files directly under `workspace`, excluding the archive itself
fn archive_entries(workspace: &Path, file_name: &str) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();

    for entry in std::fs::read_dir(workspace).map_err(write_failed)? {
        let entry = entry.map_err(write_failed)?;
        let name = entry.file_name();
        if name == file_name
            || name.to_str().is_some_and(|n| is_archive_temp(n, file_name))
        {
            continue;
        }
        if entry.file_type().map_err(write_failed)?.is_file() {
            entries.push(entry.path());
        } else {
            debug!(path = ?entry.path(), "skipping non-file workspace entry");
        }
    }

    entries.sort();
    Ok(entries)
}

fn write_archive(workspace: &Path, file_name: &str, level: i32) -> Result<PathBuf> {
    let entries = archive_entries(workspace, file_name)?;
    let target = workspace.join(file_name);
    let partial = workspace.join(partial_name(file_name));

    let result = write_entries(&partial, &entries, level)
        .and_then(|()| std::fs::rename(&partial, &target).map_err(write_failed));

    if let Err(e) = result {
        warn!(archive = ?target, error = %e, "archive build failed");
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }

    info!(archive = ?target, entries = entries.len(), "archive created");
    Ok(target)
}

fn write_entries(partial: &Path, entries: &[PathBuf], level: i32) -> Result<()> {
    let mut zip = ZipWriter::new(File::create(partial).map_err(write_failed)?);

    for path in entries {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let mut source = File::open(path).map_err(write_failed)?;
        let size = source.metadata().map_err(write_failed)?.len();

        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(level))
            .large_file(size >= u64::from(u32::MAX));

        zip.start_file(name, options).map_err(write_failed)?;
        std::io::copy(&mut source, &mut zip).map_err(write_failed)?;
    }

    let file = zip.finish().map_err(write_failed)?;
    file.sync_all().map_err(write_failed)?;
    Ok(())
}
