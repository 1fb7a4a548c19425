//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`torrents`] - Download sessions and archive retrieval
//! - [`system`] - Health, events, OpenAPI

use serde::{Deserialize, Serialize};

mod system;
mod torrents;

// Re-export all handlers so `routes::function_name` continues to work
pub use system::*;
pub use torrents::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Request body for POST /torrents/download
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    /// Magnet link of the torrent to download
    pub magnet_link: String,
}

/// Response for a finished download session
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    /// Human-readable status message
    pub message: String,
    /// Identifier to request the session's archive with
    pub session_id: String,
}

/// Request body for POST /torrents/zip
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRequest {
    /// Session identifier returned by a download
    pub session_id: String,
}
