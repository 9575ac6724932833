//! HTTP API for uploading workbooks and running agent tasks.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `POST /api/upload` - Upload an `.xlsx` / `.xls` workbook (multipart field `file`)
//! - `POST /api/preview` - First rows of an uploaded workbook
//! - `POST /api/agent` - Run a task and return the answer, steps and artifacts
//! - `GET /static/*` - Generated charts and workbooks

mod files;
mod routes;
mod tasks;
pub mod types;

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

pub use routes::{router, serve, AppState};

/// Error half of every handler result: a status plus `{"error": "..."}`.
pub type ApiError = (StatusCode, Json<Value>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}
