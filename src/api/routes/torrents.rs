//! Download session and archive handlers.

use super::{ArchiveRequest, DownloadRequest, DownloadResponse};
use crate::api::AppState;
use crate::downloader::SessionOutcome;
use crate::error::{Error, Result};
use crate::types::Source;
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Multipart field names accepted for the uploaded descriptor file
const UPLOAD_FIELDS: [&str; 2] = ["torrent", "file"];

/// POST /torrents/download - Download a torrent from a magnet link
#[utoipa::path(
    post,
    path = "/torrents/download",
    tag = "torrents",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "All files downloaded", body = DownloadResponse),
        (status = 400, description = "Invalid magnet link or rejected by the engine", body = crate::error::ApiError),
        (status = 500, description = "No files listed, transfer or I/O failure", body = crate::error::ApiError),
        (status = 503, description = "Service shutting down", body = crate::error::ApiError),
        (status = 504, description = "Session exceeded its maximum duration", body = crate::error::ApiError)
    )
)]
pub async fn download_magnet(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Response {
    download_response(run_session(&state, Source::Magnet(request.magnet_link), None).await)
}

/// POST /torrents/upload - Download a torrent from an uploaded .torrent file
#[utoipa::path(
    post,
    path = "/torrents/upload",
    tag = "torrents",
    request_body(content = String, description = "Multipart form with a `torrent` (or `file`) field", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "All files downloaded", body = DownloadResponse),
        (status = 400, description = "Missing or invalid descriptor file", body = crate::error::ApiError),
        (status = 500, description = "No files listed, transfer or I/O failure", body = crate::error::ApiError),
        (status = 503, description = "Service shutting down", body = crate::error::ApiError)
    )
)]
pub async fn upload_torrent(State(state): State<AppState>, multipart: Multipart) -> Response {
    let staged = match stage_upload(&state, multipart).await {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected torrent upload");
            return e.into_response();
        }
    };

    let source = Source::DescriptorFile(staged.clone());
    download_response(run_session(&state, source, Some(staged)).await)
}

/// POST /torrents/zip - Archive a session's files
#[utoipa::path(
    post,
    path = "/torrents/zip",
    tag = "torrents",
    request_body = ArchiveRequest,
    responses(
        (status = 200, description = "Zip archive of the session workspace", content_type = "application/zip"),
        (status = 400, description = "Malformed session id", body = crate::error::ApiError),
        (status = 404, description = "No workspace for this session", body = crate::error::ApiError),
        (status = 500, description = "Archive could not be written", body = crate::error::ApiError)
    )
)]
pub async fn archive_session(
    State(state): State<AppState>,
    Json(request): Json<ArchiveRequest>,
) -> Response {
    archive_response(&state, &request.session_id).await
}

/// GET /torrents/zip/:session_id - Archive a session's files
#[utoipa::path(
    get,
    path = "/torrents/zip/{session_id}",
    tag = "torrents",
    params(
        ("session_id" = String, Path, description = "Session identifier returned by a download")
    ),
    responses(
        (status = 200, description = "Zip archive of the session workspace", content_type = "application/zip"),
        (status = 400, description = "Malformed session id", body = crate::error::ApiError),
        (status = 404, description = "No workspace for this session", body = crate::error::ApiError),
        (status = 500, description = "Archive could not be written", body = crate::error::ApiError)
    )
)]
pub async fn archive_session_by_id(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    archive_response(&state, &session_id).await
}

/// GET /torrents/sessions - List sessions started by this process
#[utoipa::path(
    get,
    path = "/torrents/sessions",
    tag = "torrents",
    responses(
        (status = 200, description = "All known sessions, oldest first", body = Vec<crate::types::SessionInfo>)
    )
)]
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.downloader.list_sessions().await)
}

/// GET /torrents/sessions/:session_id - Get one session
#[utoipa::path(
    get,
    path = "/torrents/sessions/{session_id}",
    tag = "torrents",
    params(
        ("session_id" = String, Path, description = "Session identifier")
    ),
    responses(
        (status = 200, description = "Session information", body = crate::types::SessionInfo),
        (status = 400, description = "Malformed session id", body = crate::error::ApiError),
        (status = 404, description = "Session not found", body = crate::error::ApiError)
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.downloader.session_info(&session_id).await {
        Ok(info) => (StatusCode::OK, Json(info)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Run a session on its own task, cancelling it if the client goes away
///
/// The handler future is dropped when the client disconnects; the drop guard
/// then cancels the session, which still runs to its terminal state and
/// removes `staged_upload` afterwards.
async fn run_session(
    state: &AppState,
    source: Source,
    staged_upload: Option<PathBuf>,
) -> Result<SessionOutcome> {
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let downloader = Arc::clone(&state.downloader);

    let task = tokio::spawn(async move {
        let result = downloader.download(source, cancel).await;
        if let Some(path) = staged_upload
            && let Err(e) = tokio::fs::remove_file(&path).await
        {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged upload");
        }
        result
    });

    let result = task
        .await
        .map_err(|e| Error::Other(format!("download task failed: {e}")))?;
    guard.disarm();
    result
}

fn download_response(result: Result<SessionOutcome>) -> Response {
    match result {
        Ok(outcome) => (
            StatusCode::OK,
            Json(DownloadResponse {
                message: "Torrent downloaded successfully".to_string(),
                session_id: outcome.session_id.to_string(),
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn archive_response(state: &AppState, session_id: &str) -> Response {
    match state.downloader.archive(session_id).await {
        Ok(archive) => {
            let disposition = format!("attachment; filename={}", state.config.archive.file_name);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/zip".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                    (header::CONTENT_LENGTH, archive.len.to_string()),
                ],
                Body::from_stream(archive.stream),
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!(session_id, error = %e, "Archive request failed");
            e.into_response()
        }
    }
}

/// Write the uploaded descriptor file to the upload directory
///
/// Returns the staged path, named with a random token so concurrent uploads
/// of the same file never collide.
async fn stage_upload(state: &AppState, mut multipart: Multipart) -> Result<PathBuf> {
    let allowed = &state.config.download.allowed_upload_extensions;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(Error::InvalidUpload(e.to_string())),
        };

        if !field
            .name()
            .is_some_and(|name| UPLOAD_FIELDS.iter().any(|f| *f == name))
        {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let Some(extension) = allowed_extension(&file_name, allowed) else {
            return Err(Error::InvalidUpload(format!(
                "{file_name:?} is not a .torrent file"
            )));
        };

        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidUpload(e.to_string()))?;
        if bytes.is_empty() {
            return Err(Error::InvalidUpload(format!("{file_name:?} is empty")));
        }

        let staged = state.config.download.upload_dir.join(format!(
            "{:032x}.{extension}",
            rand::random::<u128>()
        ));
        tokio::fs::write(&staged, &bytes).await?;

        tracing::debug!(
            file_name = %file_name,
            staged = %staged.display(),
            size = bytes.len(),
            "Torrent upload staged"
        );
        return Ok(staged);
    }

    Err(Error::InvalidUpload(
        "no torrent file in request (expected field 'torrent')".to_string(),
    ))
}

/// Lowercased extension of `file_name` if it is one of `allowed`
fn allowed_extension(file_name: &str, allowed: &[String]) -> Option<String> {
    let extension = std::path::Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    allowed
        .iter()
        .any(|a| a.eq_ignore_ascii_case(&extension))
        .then_some(extension)
}
