//! Router construction and server startup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::types::HealthResponse;
use super::{files, tasks};
use crate::agent::Agent;
use crate::config::Config;
use crate::llm::{LlmClient, OpenAiCompatClient};
use crate::tools::ToolRegistry;

/// Uploads larger than this are rejected.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub agent: Agent,
    /// Absolute upload directory; every request path must resolve inside it
    pub upload_dir: PathBuf,
    /// Absolute chart output directory handed to the agent
    pub chart_dir: PathBuf,
    /// Absolute workbook output directory handed to the agent
    pub file_dir: PathBuf,
}

impl AppState {
    /// Create the working directories and wire the agent to `llm`.
    pub fn new(config: Config, llm: Arc<dyn LlmClient>) -> std::io::Result<Self> {
        let upload_dir = ensure_dir(&config.upload_dir)?;
        let chart_dir = ensure_dir(&config.chart_output_dir())?;
        let file_dir = ensure_dir(&config.file_output_dir())?;
        let agent = Agent::new(llm, Arc::new(ToolRegistry::builtin()));

        Ok(Self {
            config,
            agent,
            upload_dir,
            chart_dir,
            file_dir,
        })
    }
}

fn ensure_dir(path: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(path)?;
    path.canonicalize()
}

/// Build the router for the given state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/upload", post(files::upload))
        .route("/api/preview", post(files::preview))
        .route("/api/agent", post(tasks::run_agent))
        .nest_service("/static", static_files)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let llm = Arc::new(OpenAiCompatClient::from_config(&config)?);
    info!("Using model {} at {}", llm.model(), config.llm.base_url);

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, llm)?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
