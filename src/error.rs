//! Error types for torrent-dl
//!
//! This module provides the error taxonomy for the download orchestrator:
//! - Client input errors (invalid magnet link, bad upload, malformed session id)
//! - Engine errors (the retrieval engine refused the source)
//! - Session errors (no files listed, workspace failures, transfer failures, aborts)
//! - Archive errors
//!
//! Every variant maps to an HTTP status and a machine-readable code through
//! [`ToHttpStatus`], and converts into the [`ApiError`] body returned by the API.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for torrent-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for torrent-dl
#[derive(Debug, Error)]
pub enum Error {
    /// The magnet link failed syntactic validation (the engine was never contacted)
    #[error("Invalid magnet link provided.")]
    InvalidIdentifier(String),

    /// The uploaded descriptor file is missing or has the wrong extension
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    /// The session identifier is not an opaque token
    #[error("invalid session id: {0}")]
    InvalidSessionId(String),

    /// The retrieval engine could not parse or accept the source
    #[error("Invalid magnet link or error adding torrent: {reason}")]
    EngineRejected {
        /// Engine-provided reason
        reason: String,
    },

    /// The handle never listed any file within the readiness budget
    #[error("Maximum retries reached. Torrent does not contain any files ({attempts} checks).")]
    NoFilesAvailable {
        /// Number of checks performed
        attempts: u32,
    },

    /// The session workspace directory could not be created
    #[error("failed to create workspace {path}: {reason}")]
    WorkspaceCreationFailed {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying filesystem error
        reason: String,
    },

    /// No workspace exists for the session
    #[error("Download directory not found")]
    WorkspaceNotFound {
        /// The session identifier that was looked up
        session_id: String,
    },

    /// No session with this identifier is known to the running process
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A per-file transfer failed or was aborted
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// The session was cancelled before materialization started
    #[error("Download aborted")]
    Aborted,

    /// The session exceeded the configured maximum duration
    #[error("download exceeded the maximum session duration of {seconds}s")]
    SessionTimedOut {
        /// Configured limit in seconds
        seconds: u64,
    },

    /// Encoding or I/O failure while building the archive
    #[error("failed to write archive: {reason}")]
    ArchiveWriteFailed {
        /// Underlying error
        reason: String,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download_dir")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Shutdown in progress - not accepting new sessions
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error is a client-directed abort rather than a fault
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            Error::Aborted | Error::Transfer(TransferError::Aborted { .. })
        )
    }
}

/// Per-file transfer errors, aggregated by the materializer
#[derive(Debug, Error)]
pub enum TransferError {
    /// Reading from the engine or writing to disk failed
    #[error("failed to download {path}: {reason}")]
    Failed {
        /// Destination file
        path: PathBuf,
        /// The reason the transfer failed
        reason: String,
    },

    /// The session was cancelled while the file was streaming
    #[error("Download aborted")]
    Aborted {
        /// Destination file that was being written
        path: PathBuf,
    },
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "message": "Download directory not found",
///   "error": {
///     "code": "workspace_not_found",
///     "message": "Download directory not found",
///     "details": { "session_id": "0f3a..." }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Human-readable message (kept at the top level for simple clients)
    pub message: String,
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "invalid_identifier")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            message: message.clone(),
            error: ErrorDetail {
                code: code.into(),
                message,
                details: None,
            },
        }
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::InvalidIdentifier(_) => 400,
            Error::InvalidUpload(_) => 400,
            Error::InvalidSessionId(_) => 400,
            Error::EngineRejected { .. } => 400,
            Error::Config { .. } => 400,

            // 404 Not Found
            Error::WorkspaceNotFound { .. } => 404,
            Error::SessionNotFound(_) => 404,

            // 500 Internal Server Error - retry exhaustion, I/O, transfer faults.
            // Aborts share the status: the client that cancelled never reads it.
            Error::NoFilesAvailable { .. } => 500,
            Error::WorkspaceCreationFailed { .. } => 500,
            Error::Transfer(_) => 500,
            Error::Aborted => 500,
            Error::ArchiveWriteFailed { .. } => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,

            // 504 Gateway Timeout - the swarm stalled past the session budget
            Error::SessionTimedOut { .. } => 504,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::InvalidIdentifier(_) => "invalid_identifier",
            Error::InvalidUpload(_) => "invalid_upload",
            Error::InvalidSessionId(_) => "invalid_session_id",
            Error::EngineRejected { .. } => "engine_rejected",
            Error::NoFilesAvailable { .. } => "no_files_available",
            Error::WorkspaceCreationFailed { .. } => "workspace_creation_failed",
            Error::WorkspaceNotFound { .. } => "workspace_not_found",
            Error::SessionNotFound(_) => "session_not_found",
            Error::Transfer(e) => match e {
                TransferError::Failed { .. } => "file_transfer_failed",
                TransferError::Aborted { .. } => "download_aborted",
            },
            Error::Aborted => "download_aborted",
            Error::SessionTimedOut { .. } => "session_timed_out",
            Error::ArchiveWriteFailed { .. } => "archive_write_failed",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();

        // Add contextual details for specific error types
        let details = match &error {
            Error::NoFilesAvailable { attempts } => Some(serde_json::json!({
                "attempts": attempts,
            })),
            Error::WorkspaceNotFound { session_id } => Some(serde_json::json!({
                "session_id": session_id,
            })),
            Error::Transfer(TransferError::Failed { path, reason }) => Some(serde_json::json!({
                "path": path,
                "reason": reason,
            })),
            Error::Transfer(TransferError::Aborted { path }) => Some(serde_json::json!({
                "path": path,
            })),
            Error::SessionTimedOut { seconds } => Some(serde_json::json!({
                "limit_seconds": seconds,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        let mut api_error = ApiError::new(code, error.to_string());
        api_error.error.details = details;
        api_error
    }
}
