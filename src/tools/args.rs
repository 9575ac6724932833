//! Typed access to projected tool parameters.

use serde_json::{Map, Value};

use super::workbook::Cell;
use super::ToolError;

/// The parameters a tool actually receives after projection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs {
    params: Map<String, Value>,
}

impl ToolArgs {
    pub fn new(params: Map<String, Value>) -> Self {
        Self { params }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    fn present(&self, key: &str) -> Option<&Value> {
        self.params.get(key).filter(|v| !v.is_null())
    }

    /// Any non-null value.
    pub fn value(&self, key: &str) -> Result<&Value, ToolError> {
        self.present(key)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    /// A required string.
    pub fn str(&self, key: &str) -> Result<&str, ToolError> {
        self.value(key)?
            .as_str()
            .ok_or_else(|| ToolError::invalid(key, "expected a string"))
    }

    pub fn opt_str(&self, key: &str) -> Result<Option<&str>, ToolError> {
        match self.present(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(ToolError::invalid(key, "expected a string")),
        }
    }

    /// A non-negative integer, also accepted as a numeric string.
    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize, ToolError> {
        let Some(value) = self.present(key) else {
            return Ok(default);
        };
        let parsed = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        parsed
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| ToolError::invalid(key, format!("expected a non-negative integer, got {}", value)))
    }

    /// A boolean, also accepted as `"true"` / `"false"`.
    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ToolError> {
        match self.present(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                other => Err(ToolError::invalid(key, format!("expected a boolean, got '{}'", other))),
            },
            Some(other) => Err(ToolError::invalid(key, format!("expected a boolean, got {}", other))),
        }
    }

    /// A list of strings; a single string is treated as a one-element list.
    pub fn str_list(&self, key: &str) -> Result<Vec<String>, ToolError> {
        match self.value(key)? {
            Value::String(s) => Ok(vec![s.clone()]),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(ToolError::invalid(key, format!("expected strings, got {}", other))),
                })
                .collect(),
            other => Err(ToolError::invalid(key, format!("expected a list of strings, got {}", other))),
        }
    }

    pub fn opt_str_list(&self, key: &str) -> Result<Option<Vec<String>>, ToolError> {
        if self.present(key).is_none() {
            return Ok(None);
        }
        self.str_list(key).map(Some)
    }

    /// A scalar cell value supplied by the LLM.
    pub fn cell(&self, key: &str) -> Result<Cell, ToolError> {
        Ok(Cell::from_json(self.value(key)?))
    }
}
