//! Core types for torrent-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// Opaque identifier of one download session
///
/// Generated from 128 random bits and rendered as 32 lowercase hex characters.
/// The same string names the session's workspace directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random session identifier
    pub fn generate() -> Self {
        Self(format!("{:032x}", rand::random::<u128>()))
    }

    /// Accept an externally supplied identifier if it is an opaque token
    ///
    /// Tokens are 1-64 characters of `[A-Za-z0-9_-]`; anything containing a
    /// path separator, a dot or other punctuation is rejected so it can be
    /// joined onto the downloads directory without escaping it.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= 64
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        valid.then(|| Self(raw.to_string()))
    }

    /// Borrow the identifier as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a session's content comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// A validated magnet link
    Magnet(String),
    /// A descriptor (.torrent) file on local disk
    DescriptorFile(PathBuf),
}

impl Source {
    /// Kind of source, for session info and logs
    pub fn kind(&self) -> SourceKind {
        match self {
            Source::Magnet(_) => SourceKind::Magnet,
            Source::DescriptorFile(_) => SourceKind::DescriptorFile,
        }
    }
}

/// Source kind without the payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Magnet link
    Magnet,
    /// Uploaded descriptor file
    DescriptorFile,
}

/// Session lifecycle state
///
/// `Created → Materializing → Complete | Failed | Aborted`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Workspace allocated, waiting for the engine's file list
    Created,
    /// Files are being streamed to disk
    Materializing,
    /// Every file was written
    Complete,
    /// A transfer or setup step failed
    Failed,
    /// The client disconnected or the service shut down
    Aborted,
}

impl SessionState {
    /// Whether the session has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Complete | SessionState::Failed | SessionState::Aborted
        )
    }
}

/// Status of one file transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileTaskStatus {
    /// Not started
    Pending,
    /// Bytes are flowing from the engine to disk
    Streaming,
    /// Fully written and flushed
    Done,
    /// Read or write error
    Failed,
    /// Cancelled mid-stream
    Aborted,
}

/// Snapshot of a session for status queries
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionInfo {
    /// Session identifier
    #[schema(value_type = String)]
    pub session_id: SessionId,
    /// Current lifecycle state
    pub state: SessionState,
    /// Magnet or uploaded descriptor
    pub source: SourceKind,
    /// Display name taken from the magnet link, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Files written so far (base names inside the workspace)
    pub files: Vec<String>,
    /// Error message for failed or aborted sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the session was accepted
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
    /// When the session reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Event emitted during a session's lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Session accepted and workspace created
    SessionCreated {
        /// Session ID
        #[schema(value_type = String)]
        session_id: SessionId,
        /// Display name from the magnet link
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// The engine listed the torrent's files
    FilesListed {
        /// Session ID
        #[schema(value_type = String)]
        session_id: SessionId,
        /// Number of files
        count: usize,
    },

    /// Periodic download progress
    Progress {
        /// Session ID
        #[schema(value_type = String)]
        session_id: SessionId,
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
        /// Bytes downloaded so far
        downloaded_bytes: u64,
        /// Total bytes, when known
        #[serde(skip_serializing_if = "Option::is_none")]
        total_bytes: Option<u64>,
    },

    /// One file finished writing
    FileCompleted {
        /// Session ID
        #[schema(value_type = String)]
        session_id: SessionId,
        /// Base name inside the workspace
        file_name: String,
    },

    /// Every file was written
    SessionComplete {
        /// Session ID
        #[schema(value_type = String)]
        session_id: SessionId,
        /// Number of files written
        files: usize,
    },

    /// The session failed
    SessionFailed {
        /// Session ID
        #[schema(value_type = String)]
        session_id: SessionId,
        /// Error message
        error: String,
    },

    /// The session was cancelled
    SessionAborted {
        /// Session ID
        #[schema(value_type = String)]
        session_id: SessionId,
    },

    /// An archive was built for the session
    ArchiveReady {
        /// Session ID
        #[schema(value_type = String)]
        session_id: SessionId,
        /// Archive size in bytes
        size_bytes: u64,
    },

    /// Service shutting down
    Shutdown,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_32_hex_chars_and_distinct() {
        let a = SessionId::generate();
        let b = SessionId::generate();

        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
        assert_eq!(SessionId::parse(a.as_str()), Some(a.clone()));
    }

    #[test]
    fn parse_accepts_uuid_style_tokens() {
        assert!(SessionId::parse("0b7c5a2e-4f1d-4c1e-9a3b-2d6f8e9a1c3b").is_some());
        assert!(SessionId::parse("session_01").is_some());
    }

    #[test]
    fn parse_rejects_traversal_and_separators() {
        let too_long = "x".repeat(65);
        for raw in [
            "",
            "..",
            "../etc",
            "a/b",
            "a\\b",
            "abc.def",
            "with space",
            "%2e%2e",
            too_long.as_str(),
        ] {
            assert!(SessionId::parse(raw).is_none(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn terminal_states() {
        assert!(!SessionState::Created.is_terminal());
        assert!(!SessionState::Materializing.is_terminal());
        assert!(SessionState::Complete.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(SessionState::Aborted.is_terminal());
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::FilesListed {
            session_id: SessionId::parse("abc").unwrap(),
            count: 3,
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "files_listed");
        assert_eq!(json["session_id"], "abc");
        assert_eq!(json["count"], 3);
    }
}
