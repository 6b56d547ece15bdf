//! File transfer routes
//!
//! Endpoints:
//! - GET /api/v1/files - List stored files
//! - POST /api/v1/files - Upload (multipart: `filename` text field, then `file` data)
//! - GET /api/v1/files/:id - Download by id

use std::io;

use axum::{
    body::Body,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    middleware,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use uuid::Uuid;

use super::limits::{admit_streaming, admit_unary};
use crate::error::{Result, TransferError};
use crate::state::AppState;
use crate::storage::FileRecord;
use crate::transfer::{DownloadFrame, UploadMessage, UploadPhase, UploadReceipt};

/// Create the files router
pub fn router(state: AppState) -> Router<AppState> {
    let streaming = middleware::from_fn_with_state(state.clone(), admit_streaming);
    let unary = middleware::from_fn_with_state(state, admit_unary);

    Router::new()
        .route(
            "/api/v1/files",
            get(list_files)
                .route_layer(unary)
                .merge(post(upload_file).route_layer(streaming.clone())),
        )
        .route(
            "/api/v1/files/:id",
            get(download_file).route_layer(streaming),
        )
        .layer(DefaultBodyLimit::disable())
}

// ============================================================================
// List
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileItem {
    pub id: Uuid,
    pub name: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FileRecord> for FileItem {
    fn from(record: FileRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            size: record.size,
            created_at: record.modified_at,
            updated_at: record.modified_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub files: Vec<FileItem>,
}

/// GET /api/v1/files
async fn list_files(State(state): State<AppState>) -> Result<Json<ListResponse>> {
    let records = state.transfer().list().await?;
    Ok(Json(ListResponse {
        files: records.into_iter().map(FileItem::from).collect(),
    }))
}

// ============================================================================
// Upload
// ============================================================================

/// POST /api/v1/files
///
/// Multipart fields are replayed as upload messages: a `filename` text field
/// becomes the filename message, and the body of a `file` (or `chunk`) field
/// becomes chunk messages. When no `filename` field precedes the data, the
/// part's own filename is used.
async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadReceipt>)> {
    let mut upload = state.transfer().start_upload();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(upload.fail(transport_error(e)).await),
        };

        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("filename") => {
                let name = match field.text().await {
                    Ok(name) => name,
                    Err(e) => return Err(upload.fail(transport_error(e)).await),
                };
                upload.accept(UploadMessage::Filename(name)).await?;
            }
            Some("file") | Some("chunk") => {
                let mut field = field;
                if upload.phase() == UploadPhase::AwaitFilename {
                    if let Some(name) = field.file_name().map(str::to_owned) {
                        upload.accept(UploadMessage::Filename(name)).await?;
                    }
                }
                loop {
                    match field.chunk().await {
                        Ok(Some(chunk)) => upload.accept(UploadMessage::Chunk(chunk)).await?,
                        Ok(None) => break,
                        Err(e) => return Err(upload.fail(transport_error(e)).await),
                    }
                }
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unknown multipart field");
            }
        }
    }

    let receipt = upload.finish().await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

fn transport_error(e: MultipartError) -> TransferError {
    TransferError::Io(io::Error::other(e))
}

// ============================================================================
// Download
// ============================================================================

/// GET /api/v1/files/:id
///
/// The metadata frame becomes the response headers; chunk frames stream as the body.
async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let mut frames = state.transfer().download(&id).await?;

    let name = match frames.next().await {
        Some(Ok(DownloadFrame::Info { name })) => name,
        Some(Err(e)) => return Err(e),
        _ => return Err(io::Error::other("download did not start with file info").into()),
    };

    let body = frames.map(|frame| match frame {
        Ok(DownloadFrame::Chunk(chunk)) => Ok(chunk),
        Ok(DownloadFrame::Info { .. }) => Err(io::Error::other("unexpected info frame")),
        Err(e) => Err(io::Error::other(e)),
    });

    let content_type = mime_guess::from_path(&name)
        .first_or_octet_stream()
        .to_string();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, content_disposition(&name))
        .body(Body::from_stream(body))
        .map_err(|e| TransferError::Io(io::Error::other(e)))
}

/// `attachment` disposition with an ASCII fallback and the exact UTF-8 name
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(name)
    )
}
