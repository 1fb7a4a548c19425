//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the torrent-dl REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the torrent-dl REST API
///
/// The OpenAPI document can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "torrent-dl REST API",
        version = "0.1.0",
        description = "Download torrents from magnet links or .torrent files into per-session workspaces and fetch them as zip archives",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development server")
    ),
    paths(
        // Torrents
        crate::api::routes::download_magnet,
        crate::api::routes::upload_torrent,
        crate::api::routes::archive_session,
        crate::api::routes::archive_session_by_id,
        crate::api::routes::list_sessions,
        crate::api::routes::get_session,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::SessionInfo,
        crate::types::SessionState,
        crate::types::SourceKind,
        crate::types::FileTaskStatus,
        crate::types::Event,

        // Config types from config.rs
        crate::config::Config,
        crate::config::DownloadConfig,
        crate::config::ReadinessConfig,
        crate::config::ArchiveConfig,
        crate::config::EventConfig,
        crate::config::ServerIntegrationConfig,
        crate::config::ApiConfig,

        // API request/response types from routes
        crate::api::routes::DownloadRequest,
        crate::api::routes::DownloadResponse,
        crate::api::routes::ArchiveRequest,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "torrents", description = "Download sessions - Start downloads from magnet links or uploads and fetch zip archives"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events"),
    )
)]
pub struct ApiDoc;
