//! Trusted, caller-owned execution context.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

/// File locations supplied by the caller for one task. Never shown to the LLM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub file_path: PathBuf,
    pub chart_output_dir: PathBuf,
    pub file_output_dir: PathBuf,
}

impl ExecutionContext {
    pub fn new(
        file_path: impl AsRef<Path>,
        chart_output_dir: impl AsRef<Path>,
        file_output_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            chart_output_dir: chart_output_dir.as_ref().to_path_buf(),
            file_output_dir: file_output_dir.as_ref().to_path_buf(),
        }
    }

    /// The context as injectable tool parameters.
    pub fn to_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("file_path".into(), path_value(&self.file_path));
        params.insert("chart_output_dir".into(), path_value(&self.chart_output_dir));
        params.insert("file_output_dir".into(), path_value(&self.file_output_dir));
        params
    }
}

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}
