//! Agent task endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::files::resolve_upload;
use super::types::{AgentRequest, AgentResponse};
use super::{api_error, ApiError, AppState};

/// `POST /api/agent`
///
/// Output directories are chosen by the server; the request only names the
/// instruction and the uploaded workbook.
pub async fn run_agent(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AgentRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
    let prompt = req
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Prompt and file_path are required."))?;
    if req.file_path.as_deref().map_or(true, |p| p.trim().is_empty()) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Prompt and file_path are required.",
        ));
    }
    let file_path = resolve_upload(&state, req.file_path.as_deref())?;

    let outcome = state
        .agent
        .run_task(prompt, &file_path, &state.chart_dir, &state.file_dir)
        .await;
    tracing::info!(
        steps = outcome.steps.len(),
        observations = outcome.observations.len(),
        "Agent task finished"
    );

    Ok(Json(AgentResponse::from_outcome(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::config::Config;
    use crate::llm::{ChatMessage, LlmClient, LlmError};
    use crate::tools::{Sheet, Table, Workbook, Cell};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct ScriptedLlm(Mutex<VecDeque<String>>);

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat_completion(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
            self.0.lock().unwrap().pop_front().ok_or(LlmError::EmptyResponse)
        }
    }

    struct Server {
        base: String,
        upload: String,
        _dir: TempDir,
    }

    async fn start(turns: Vec<Value>) -> Server {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new("key".into(), "model".into(), dir.path().join("static"));
        config.upload_dir = dir.path().join("uploads");

        let llm = Arc::new(ScriptedLlm(Mutex::new(
            turns.into_iter().map(|t| t.to_string()).collect(),
        )));
        let state = Arc::new(AppState::new(config, llm).unwrap());

        let upload = state.upload_dir.join("sales.xlsx");
        Workbook {
            sheets: vec![Sheet::new(
                "Data",
                Table::new(
                    vec!["Region".into(), "Revenue".into()],
                    vec![
                        vec![Cell::Text("North".into()), Cell::Number(10.0)],
                        vec![Cell::Text("South".into()), Cell::Number(20.0)],
                    ],
                ),
            )],
        }
        .save(&upload)
        .unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        Server {
            base: format!("http://{}", addr),
            upload: upload.to_string_lossy().into_owned(),
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let server = start(vec![]).await;
        let body: Value = reqwest::get(format!("{}/api/health", server.base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn preview_returns_rows() {
        let server = start(vec![]).await;
        let response = reqwest::Client::new()
            .post(format!("{}/api/preview", server.base))
            .json(&json!({ "file_path": server.upload }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["data"][1], json!({ "Region": "South", "Revenue": 20 }));
    }

    #[tokio::test]
    async fn paths_outside_uploads_are_rejected() {
        let server = start(vec![]).await;
        let response = reqwest::Client::new()
            .post(format!("{}/api/preview", server.base))
            .json(&json!({ "file_path": "/etc/hostname" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "File not found or path is invalid.");
    }

    #[tokio::test]
    async fn agent_requires_prompt_and_file() {
        let server = start(vec![]).await;
        let response = reqwest::Client::new()
            .post(format!("{}/api/agent", server.base))
            .json(&json!({ "prompt": "  " }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn agent_run_exposes_artifacts() {
        let server = start(vec![
            json!({
                "thought": "sort it",
                "tool_call": {
                    "tool_name": "sort_data",
                    "parameters": { "output_filename": "sorted.xlsx", "sort_by_column": "Revenue", "ascending": false }
                }
            }),
            json!({ "thought": "done", "final_answer": "Sorted into sorted.xlsx." }),
        ])
        .await;

        let body: Value = reqwest::Client::new()
            .post(format!("{}/api/agent", server.base))
            .json(&json!({ "prompt": "Sort by revenue", "file_path": server.upload }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["answer"], "Sorted into sorted.xlsx.");
        assert_eq!(body["final_thought"], "done");
        assert_eq!(body["steps"][0]["tool_call"]["tool_name"], "sort_data");
        assert_eq!(body["steps"].as_array().unwrap().len(), 1);
        assert_eq!(
            body["artifacts"],
            json!([{ "type": "file", "url": "/static/outputs/sorted.xlsx", "filename": "sorted.xlsx" }])
        );

        let download = reqwest::get(format!("{}/static/outputs/sorted.xlsx", server.base))
            .await
            .unwrap();
        assert_eq!(download.status(), 200);
    }
}
