//! Workbook upload and preview.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Map};

use super::types::{PreviewRequest, PreviewResponse, UploadResponse};
use super::{api_error, ApiError, AppState};
use crate::tools::{ExecutionContext, Observation};

const ALLOWED_EXTENSIONS: &[&str] = &["xlsx", "xls"];
const PREVIEW_ROWS: u64 = 10;

/// Reduce an uploaded filename to a safe basename.
pub(super) fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .trim()
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => c,
            c if c.is_whitespace() => '_',
            _ => '\0',
        })
        .filter(|&c| c != '\0')
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

pub(super) fn has_allowed_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Resolve a client-supplied path to an existing file inside the upload directory.
pub(super) fn resolve_upload(state: &AppState, file_path: Option<&str>) -> Result<PathBuf, ApiError> {
    let invalid = || api_error(StatusCode::BAD_REQUEST, "File not found or path is invalid.");
    let path = file_path.filter(|p| !p.trim().is_empty()).ok_or_else(invalid)?;
    let resolved = PathBuf::from(path).canonicalize().map_err(|_| invalid())?;
    if !resolved.is_file() || !resolved.starts_with(&state.upload_dir) {
        return Err(invalid());
    }
    Ok(resolved)
}

/// `POST /api/upload`
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let original = field.file_name().unwrap_or_default().to_string();
        if original.is_empty() {
            return Err(api_error(StatusCode::BAD_REQUEST, "No selected file"));
        }
        let filename = sanitize_filename(&original)
            .filter(|name| has_allowed_extension(name))
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "File type not allowed"))?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
        let destination = state.upload_dir.join(&filename);
        tokio::fs::write(&destination, &bytes).await.map_err(|e| {
            tracing::error!("Failed to store upload {}: {}", destination.display(), e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

        tracing::info!(file = %filename, size = bytes.len(), "Stored upload");
        return Ok(Json(UploadResponse {
            success: true,
            file_path: destination.to_string_lossy().into_owned(),
        }));
    }
    Err(api_error(StatusCode::BAD_REQUEST, "No file part"))
}

/// `POST /api/preview`
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let path = resolve_upload(&state, req.file_path.as_deref())?;
    let context = ExecutionContext::new(&path, &state.chart_dir, &state.file_dir);

    let mut params = Map::new();
    params.insert("limit".to_string(), json!(PREVIEW_ROWS));
    match state.agent.tools().execute("read_rows", &params, &context).await {
        Observation::Success(data) => Ok(Json(PreviewResponse {
            success: true,
            data,
        })),
        Observation::Error { error } => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, error)),
    }
}
