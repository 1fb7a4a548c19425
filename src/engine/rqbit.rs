//! librqbit-backed retrieval engine.
//!
//! Every submission starts its own [`librqbit::Session`] in a scratch
//! directory, so peers, sockets and piece storage are never shared between
//! download sessions. Descriptor files are added before `submit` returns.
//! Magnet links are parsed before `submit` returns, then added in a
//! background task that resolves their metadata from the swarm; the handle
//! lists no files until that finishes.

use super::{EngineError, EngineFile, EngineProgress, FileStream, RetrievalEngine, RetrievalHandle};
use crate::types::Source;
use librqbit::{AddTorrent, AddTorrentOptions, Magnet, ManagedTorrent, Session};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

/// Engine factory creating one librqbit session per submission
#[derive(Clone, Debug)]
pub struct RqbitEngine {
    scratch_dir: PathBuf,
}

/// Parse a magnet link the way the engine will when adding it
fn check_magnet(link: &str) -> std::result::Result<(), EngineError> {
    Magnet::parse(link)
        .map(|_| ())
        .map_err(|e| EngineError(format!("invalid magnet link: {e:#}")))
}

impl RqbitEngine {
    /// Keep each session's piece storage in a sub-directory of `scratch_dir`
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }
}

#[async_trait::async_trait]
impl RetrievalEngine for RqbitEngine {
    async fn submit(
        &self,
        source: &Source,
    ) -> std::result::Result<Arc<dyn RetrievalHandle>, EngineError> {
        // Reject links the engine cannot parse before any session starts
        if let Source::Magnet(link) = source {
            check_magnet(link)?;
        }

        let scratch = self
            .scratch_dir
            .join(format!("{:032x}", rand::random::<u128>()));
        tokio::fs::create_dir_all(&scratch)
            .await
            .map_err(|e| EngineError(format!("cannot create {}: {}", scratch.display(), e)))?;

        let session = match Session::new(scratch.clone()).await {
            Ok(session) => session,
            Err(e) => {
                remove_scratch(&scratch).await;
                return Err(EngineError(format!("failed to start engine: {e:#}")));
            }
        };

        let torrent = Arc::new(OnceLock::new());
        let add_task = match source {
            // Descriptor files carry their metadata, so the add fails fast on corrupt input
            Source::DescriptorFile(path) => {
                let added = match tokio::fs::read(path).await {
                    Ok(bytes) => add_torrent(&session, AddTorrent::from_bytes(bytes)).await,
                    Err(e) => Err(EngineError(format!(
                        "cannot read {}: {}",
                        path.display(),
                        e
                    ))),
                };
                match added {
                    Ok(handle) => {
                        torrent.set(handle).ok();
                        None
                    }
                    Err(e) => {
                        session.stop().await;
                        remove_scratch(&scratch).await;
                        return Err(e);
                    }
                }
            }
            // Magnet metadata comes from the swarm; the file list stays empty until then
            Source::Magnet(link) => {
                let add = AddTorrent::from_url(link.clone());
                let session = Arc::clone(&session);
                let torrent = Arc::clone(&torrent);
                let task = tokio::spawn(async move {
                    match add_torrent(&session, add).await {
                        Ok(handle) => {
                            torrent.set(handle).ok();
                        }
                        Err(e) => tracing::warn!(error = %e, "Engine failed to add magnet link"),
                    }
                });
                Some(task.abort_handle())
            }
        };

        Ok(Arc::new(RqbitHandle {
            session,
            torrent,
            add_task,
            scratch,
        }))
    }
}

async fn add_torrent(
    session: &Arc<Session>,
    add: AddTorrent<'static>,
) -> std::result::Result<Arc<ManagedTorrent>, EngineError> {
    let options = AddTorrentOptions {
        overwrite: true,
        ..Default::default()
    };
    let response = session
        .add_torrent(add, Some(options))
        .await
        .map_err(|e| EngineError(format!("{e:#}")))?;
    let handle = response
        .into_handle()
        .ok_or_else(|| EngineError("engine returned no torrent handle".to_string()))?;

    tracing::debug!(info_hash = %handle.info_hash().as_string(), "Torrent metadata resolved");
    Ok(handle)
}

/// One torrent inside its own librqbit session
struct RqbitHandle {
    session: Arc<Session>,
    torrent: Arc<OnceLock<Arc<ManagedTorrent>>>,
    add_task: Option<tokio::task::AbortHandle>,
    scratch: PathBuf,
}

#[async_trait::async_trait]
impl RetrievalHandle for RqbitHandle {
    fn files(&self) -> Vec<EngineFile> {
        let Some(torrent) = self.torrent.get() else {
            return Vec::new();
        };

        torrent
            .with_metadata(|metadata| {
                metadata
                    .file_infos
                    .iter()
                    .enumerate()
                    .map(|(index, info)| EngineFile {
                        index,
                        path: info
                            .relative_filename
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy())
                            .collect::<Vec<_>>()
                            .join("/"),
                        length: Some(info.len),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn open_stream(&self, file: &EngineFile) -> std::io::Result<FileStream> {
        let torrent = self
            .torrent
            .get()
            .ok_or_else(|| std::io::Error::other("torrent metadata not resolved"))?;

        let stream = Arc::clone(torrent)
            .stream(file.index)
            .map_err(|e| std::io::Error::other(format!("{e:#}")))?;
        Ok(Box::new(stream))
    }

    fn progress(&self) -> EngineProgress {
        match self.torrent.get() {
            Some(torrent) => {
                let stats = torrent.stats();
                EngineProgress {
                    downloaded_bytes: stats.progress_bytes,
                    total_bytes: Some(stats.total_bytes),
                }
            }
            None => EngineProgress::default(),
        }
    }

    async fn destroy(&self) {
        if let Some(task) = &self.add_task {
            task.abort();
        }
        self.session.stop().await;
        remove_scratch(&self.scratch).await;
    }
}

async fn remove_scratch(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_dir_all(path).await {
        tracing::debug!(path = %path.display(), error = %e, "Failed to remove engine scratch directory");
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::test_helpers::TEST_MAGNET;

    #[test]
    fn well_formed_magnet_passes_engine_check() {
        assert!(check_magnet(TEST_MAGNET).is_ok());
    }

    #[test]
    fn unparseable_info_hash_is_rejected() {
        // 36 hex characters: neither a 40-char hex nor a 32-char base32 hash
        let odd_length = "magnet:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d5";
        // 32 characters outside the base32 alphabet
        let not_base32 = "magnet:?xt=urn:btih:00000000000000000000000000000000";

        for link in [odd_length, not_base32] {
            let err = check_magnet(link).unwrap_err();
            assert!(err.0.starts_with("invalid magnet link"), "{link}: {err}");
        }
    }

    #[tokio::test]
    async fn submit_rejects_unparseable_magnet_without_creating_a_session() {
        let temp_dir = tempfile::tempdir().unwrap();
        let engine = RqbitEngine::new(temp_dir.path().join("engine"));
        let source = Source::Magnet(
            "magnet:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d5".to_string(),
        );

        let result = engine.submit(&source).await;

        assert!(result.is_err());
        assert!(!temp_dir.path().join("engine").exists());
    }
}
