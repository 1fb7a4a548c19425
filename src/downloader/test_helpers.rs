//! Scripted in-memory retrieval engine shared by unit tests.

use crate::config::Config;
use crate::downloader::TorrentDownloader;
use crate::engine::{
    EngineError, EngineFile, EngineProgress, FileStream, RetrievalEngine, RetrievalHandle,
};
use crate::types::Source;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tempfile::tempdir;
use tokio::io::{AsyncRead, ReadBuf};

/// How a scripted file's stream behaves once opened
#[derive(Clone, Copy, Debug)]
pub(crate) enum FileBehavior {
    /// Deliver every byte then EOF
    Complete,
    /// Deliver this many bytes then fail with a read error
    FailAfter(usize),
    /// Deliver every byte then never finish
    Stall,
}

pub(crate) struct ScriptedFile {
    pub(crate) path: String,
    pub(crate) content: Vec<u8>,
    pub(crate) behavior: FileBehavior,
}

impl ScriptedFile {
    pub(crate) fn new(path: &str, content: &[u8], behavior: FileBehavior) -> Self {
        Self {
            path: path.to_string(),
            content: content.to_vec(),
            behavior,
        }
    }
}

/// Handle whose file list appears on a chosen check
pub(crate) struct ScriptedHandle {
    files: Vec<ScriptedFile>,
    /// 1-based check on which files become visible (None = never)
    ready_on_check: Option<u32>,
    checks: AtomicU32,
    destroyed: AtomicU32,
    open_streams: Arc<AtomicUsize>,
    progress: Mutex<EngineProgress>,
}

impl ScriptedHandle {
    pub(crate) fn with_files(files: Vec<ScriptedFile>, ready_on_check: Option<u32>) -> Arc<Self> {
        let total = files.iter().map(|f| f.content.len() as u64).sum();
        Arc::new(Self {
            files,
            ready_on_check,
            checks: AtomicU32::new(0),
            destroyed: AtomicU32::new(0),
            open_streams: Arc::new(AtomicUsize::new(0)),
            progress: Mutex::new(EngineProgress {
                downloaded_bytes: 0,
                total_bytes: Some(total),
            }),
        })
    }

    /// Files listed on the first check, all streams complete
    pub(crate) fn ready(files: Vec<(&str, Vec<u8>)>) -> Arc<Self> {
        Self::ready_on_check(1, files)
    }

    pub(crate) fn ready_on_check(check: u32, files: Vec<(&str, Vec<u8>)>) -> Arc<Self> {
        let files = files
            .into_iter()
            .map(|(path, content)| ScriptedFile::new(path, &content, FileBehavior::Complete))
            .collect();
        Self::with_files(files, Some(check))
    }

    pub(crate) fn never_ready() -> Arc<Self> {
        Self::with_files(Vec::new(), None)
    }

    pub(crate) fn checks(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }

    pub(crate) fn destroy_count(&self) -> u32 {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Streams opened and not yet dropped
    pub(crate) fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    pub(crate) fn set_downloaded(&self, bytes: u64) {
        if let Ok(mut progress) = self.progress.lock() {
            progress.downloaded_bytes = bytes;
        }
    }

    fn listing(&self) -> Vec<EngineFile> {
        self.files
            .iter()
            .enumerate()
            .map(|(index, f)| EngineFile {
                index,
                path: f.path.clone(),
                length: Some(f.content.len() as u64),
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl RetrievalHandle for ScriptedHandle {
    fn files(&self) -> Vec<EngineFile> {
        let check = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
        match self.ready_on_check {
            Some(ready) if check >= ready => self.listing(),
            _ => Vec::new(),
        }
    }

    async fn open_stream(&self, file: &EngineFile) -> io::Result<FileStream> {
        let scripted = self
            .files
            .get(file.index)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))?;
        self.open_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedStream {
            data: scripted.content.clone(),
            pos: 0,
            behavior: scripted.behavior,
            _guard: OpenGuard(Arc::clone(&self.open_streams)),
        }))
    }

    fn progress(&self) -> EngineProgress {
        self.progress.lock().map(|p| *p).unwrap_or_default()
    }

    async fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

struct OpenGuard(Arc<AtomicUsize>);

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct ScriptedStream {
    data: Vec<u8>,
    pos: usize,
    behavior: FileBehavior,
    _guard: OpenGuard,
}

impl ScriptedStream {
    fn fill(&mut self, limit: usize, buf: &mut ReadBuf<'_>) {
        let end = limit.min(self.pos + buf.remaining());
        buf.put_slice(&self.data[self.pos..end]);
        self.pos = end;
    }
}

impl AsyncRead for ScriptedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let len = this.data.len();
        match this.behavior {
            FileBehavior::Complete => {
                this.fill(len, buf);
                Poll::Ready(Ok(()))
            }
            FileBehavior::FailAfter(n) => {
                let limit = n.min(len);
                if this.pos < limit {
                    this.fill(limit, buf);
                    Poll::Ready(Ok(()))
                } else {
                    Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        "peer connection reset",
                    )))
                }
            }
            FileBehavior::Stall => {
                if this.pos < len {
                    this.fill(len, buf);
                    Poll::Ready(Ok(()))
                } else {
                    Poll::Pending
                }
            }
        }
    }
}

/// Engine returning a prepared handle (or a rejection) for every submission
pub(crate) struct ScriptedEngine {
    handle: Option<Arc<ScriptedHandle>>,
    reject: Option<String>,
    submissions: AtomicUsize,
    sources: Mutex<Vec<Source>>,
}

impl ScriptedEngine {
    pub(crate) fn new(handle: Arc<ScriptedHandle>) -> Self {
        Self {
            handle: Some(handle),
            reject: None,
            submissions: AtomicUsize::new(0),
            sources: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn rejecting(reason: &str) -> Self {
        Self {
            handle: None,
            reject: Some(reason.to_string()),
            submissions: AtomicUsize::new(0),
            sources: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub(crate) fn sources(&self) -> Vec<Source> {
        self.sources.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl RetrievalEngine for ScriptedEngine {
    async fn submit(
        &self,
        source: &Source,
    ) -> std::result::Result<Arc<dyn RetrievalHandle>, EngineError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut sources) = self.sources.lock() {
            sources.push(source.clone());
        }
        if let Some(reason) = &self.reject {
            return Err(EngineError(reason.clone()));
        }
        match &self.handle {
            Some(handle) => Ok(Arc::clone(handle) as Arc<dyn RetrievalHandle>),
            None => Err(EngineError("no handle scripted".into())),
        }
    }
}

/// Test configuration rooted in a temp dir with a fast readiness budget
pub(crate) fn test_config(root: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.download.download_dir = root.join("downloads");
    config.download.upload_dir = root.join("uploads");
    config.readiness.max_attempts = 3;
    config.readiness.delay = Duration::from_millis(10);
    config.events.progress_interval = Duration::from_millis(20);
    config
}

/// Downloader backed by `engine`, with its directories in a fresh temp dir.
/// Returns the downloader, the engine and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader_with(
    engine: ScriptedEngine,
    configure: impl FnOnce(&mut Config),
) -> (TorrentDownloader, Arc<ScriptedEngine>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    configure(&mut config);

    let engine = Arc::new(engine);
    let downloader = TorrentDownloader::new(config, engine.clone() as Arc<dyn RetrievalEngine>)
        .await
        .unwrap();
    (downloader, engine, temp_dir)
}

pub(crate) async fn create_test_downloader(
    engine: ScriptedEngine,
) -> (TorrentDownloader, Arc<ScriptedEngine>, tempfile::TempDir) {
    create_test_downloader_with(engine, |_| {}).await
}

pub(crate) const TEST_MAGNET: &str =
    "magnet:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056&dn=Test+Torrent";
