//! Configuration types for torrent-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Download behavior configuration (directories, session limits)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Base directory holding one sub-directory per session (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Directory where uploaded descriptor files are staged (default: "./uploads")
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Accepted descriptor file extensions, without the dot (default: ["torrent"])
    #[serde(default = "default_upload_extensions")]
    pub allowed_upload_extensions: Vec<String>,

    /// Maximum number of sessions materializing at once (None = unlimited)
    #[serde(default)]
    pub max_concurrent_sessions: Option<usize>,

    /// Upper bound on a single session's duration (None = no limit)
    ///
    /// Materialization otherwise runs for as long as the swarm keeps
    /// delivering bytes.
    #[serde(default, with = "optional_duration_serde")]
    #[schema(value_type = Option<u64>)]
    pub max_session_duration: Option<Duration>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            upload_dir: default_upload_dir(),
            allowed_upload_extensions: default_upload_extensions(),
            max_concurrent_sessions: None,
            max_session_duration: None,
        }
    }
}

/// Readiness polling configuration
///
/// The engine resolves torrent metadata asynchronously; the poller checks the
/// handle's file list at a fixed interval until it is non-empty.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadinessConfig {
    /// Number of file-list checks before giving up (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between checks in milliseconds (default: 2000)
    #[serde(default = "default_poll_delay", with = "duration_millis_serde")]
    #[schema(value_type = u64)]
    pub delay: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay: default_poll_delay(),
        }
    }
}

/// Archive output configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ArchiveConfig {
    /// Name of the archive written inside the workspace (default: "downloaded_files.zip")
    #[serde(default = "default_archive_name")]
    pub file_name: String,

    /// Deflate level 0-9 (default: 9)
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            file_name: default_archive_name(),
            compression_level: default_compression_level(),
        }
    }
}

/// Main configuration for TorrentDownloader
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Directories and session limits
    #[serde(default)]
    pub download: DownloadConfig,

    /// File-list readiness polling
    #[serde(default)]
    pub readiness: ReadinessConfig,

    /// Archive naming and compression
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Event bus settings
    #[serde(default)]
    pub events: EventConfig,

    /// API and external server integration
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Base downloads directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PORT` and `DOWNLOAD_DIR` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = lookup("PORT") {
            let port: u16 = port.trim().parse().map_err(|_| Error::Config {
                message: format!("PORT must be a port number, got {port:?}"),
                key: Some("PORT".into()),
            })?;
            self.server.api.bind_address.set_port(port);
        }
        if let Some(dir) = lookup("DOWNLOAD_DIR")
            && !dir.trim().is_empty()
        {
            self.download.download_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Reject settings the orchestrator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.readiness.max_attempts == 0 {
            return Err(Error::Config {
                message: "max_attempts must be at least 1".into(),
                key: Some("readiness.max_attempts".into()),
            });
        }
        if !(0..=9).contains(&self.archive.compression_level) {
            return Err(Error::Config {
                message: format!(
                    "compression_level must be between 0 and 9, got {}",
                    self.archive.compression_level
                ),
                key: Some("archive.compression_level".into()),
            });
        }
        let name = &self.archive.file_name;
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(Error::Config {
                message: format!("archive file_name must be a plain file name, got {name:?}"),
                key: Some("archive.file_name".into()),
            });
        }
        if self.download.max_concurrent_sessions == Some(0) {
            return Err(Error::Config {
                message: "max_concurrent_sessions must be at least 1 when set".into(),
                key: Some("download.max_concurrent_sessions".into()),
            });
        }
        if self.events.buffer == 0 {
            return Err(Error::Config {
                message: "event buffer must be at least 1".into(),
                key: Some("events.buffer".into()),
            });
        }
        Ok(())
    }
}

/// Event bus configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EventConfig {
    /// Broadcast channel capacity (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub buffer: usize,

    /// Interval between progress events in milliseconds (default: 1000)
    #[serde(default = "default_progress_interval", with = "duration_millis_serde")]
    #[schema(value_type = u64)]
    pub progress_interval: Duration,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            buffer: default_event_buffer(),
            progress_interval: default_progress_interval(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:5000)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,

    /// Maximum accepted size of an uploaded descriptor file in bytes (default: 10 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

// Default value functions
fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_upload_extensions() -> Vec<String> {
    vec!["torrent".into()]
}

fn default_max_attempts() -> u32 {
    5
}

fn default_poll_delay() -> Duration {
    Duration::from_millis(2000)
}

fn default_archive_name() -> String {
    "downloaded_files.zip".into()
}

fn default_compression_level() -> i32 {
    9
}

fn default_event_buffer() -> usize {
    1000
}

fn default_progress_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

// Duration serialization helper (milliseconds)
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Optional Duration serialization helper (seconds)
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
