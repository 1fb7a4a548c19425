//! Application state for the API server

use crate::{Config, TorrentDownloader};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the downloader instance and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The main TorrentDownloader instance
    pub downloader: Arc<TorrentDownloader>,

    /// Configuration (upload directory, archive name, size limits)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(downloader: Arc<TorrentDownloader>, config: Arc<Config>) -> Self {
        Self { downloader, config }
    }
}
