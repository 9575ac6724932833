//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::agent::{StepRecord, TaskOutcome};
use crate::tools::Observation;

/// Request to preview the first rows of an uploaded workbook.
#[derive(Debug, Clone, Deserialize)]
pub struct PreviewRequest {
    pub file_path: Option<String>,
}

/// Preview rows as header-keyed objects.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewResponse {
    pub success: bool,
    pub data: serde_json::Value,
}

/// Response after a successful upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub success: bool,

    /// Server-side path to pass back in later requests
    pub file_path: String,
}

/// Request to run an agent task.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentRequest {
    /// The natural-language instruction
    pub prompt: Option<String>,

    /// Workbook to operate on, as returned by the upload endpoint
    pub file_path: Option<String>,
}

/// A generated file the client can download or display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    Chart { url: String },
    File { url: String, filename: String },
}

/// Task result plus web-accessible artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_thought: Option<String>,
    pub steps: Vec<StepRecord>,
    pub observations: Vec<Observation>,
    pub artifacts: Vec<Artifact>,
}

impl AgentResponse {
    pub fn from_outcome(outcome: TaskOutcome) -> Self {
        let artifacts = artifacts_from(&outcome.observations);
        Self {
            answer: outcome.answer,
            final_thought: outcome.final_thought,
            steps: outcome.steps,
            observations: outcome.observations,
            artifacts,
        }
    }
}

/// Charts and workbooks reported by successful observations.
pub fn artifacts_from(observations: &[Observation]) -> Vec<Artifact> {
    let mut artifacts = Vec::new();
    for observation in observations {
        if observation.get("success").and_then(|v| v.as_bool()) != Some(true) {
            continue;
        }
        if let Some(name) = observation.get("chart_path").and_then(|v| v.as_str()).and_then(base_name) {
            artifacts.push(Artifact::Chart {
                url: format!("/static/charts/{}", name),
            });
        }
        if let Some(name) = observation.get("output_file").and_then(|v| v.as_str()).and_then(base_name) {
            artifacts.push(Artifact::File {
                url: format!("/static/outputs/{}", name),
                filename: name,
            });
        }
    }
    artifacts
}

fn base_name(path: &str) -> Option<String> {
    std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn artifacts_come_from_successful_observations() {
        let observations = vec![
            Observation::Success(json!({ "success": true, "chart_path": "/srv/static/charts/c.svg" })),
            Observation::Success(json!({ "success": true, "output_file": "/srv/static/outputs/out.xlsx" })),
            Observation::Success(json!({ "result": 20.0, "processed_rows": 3 })),
            Observation::error("Tool 'x' does not exist."),
        ];
        assert_eq!(
            artifacts_from(&observations),
            vec![
                Artifact::Chart {
                    url: "/static/charts/c.svg".into()
                },
                Artifact::File {
                    url: "/static/outputs/out.xlsx".into(),
                    filename: "out.xlsx".into()
                },
            ]
        );
    }

    #[test]
    fn artifact_wire_shape() {
        let file = Artifact::File {
            url: "/static/outputs/a.xlsx".into(),
            filename: "a.xlsx".into(),
        };
        assert_eq!(
            serde_json::to_value(file).unwrap(),
            json!({ "type": "file", "url": "/static/outputs/a.xlsx", "filename": "a.xlsx" })
        );
    }
}
