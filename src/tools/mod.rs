//! Tool registry and dispatcher.
//!
//! Every tool is a unit struct implementing [`Tool`]. Its [`ToolSpec`] is the only
//! description of parameters the LLM ever sees; [`Tool::accepted_params`] is the
//! wider, static signature the dispatcher projects the merged parameters onto, so
//! trusted context (`file_path`, output directories) reaches the tool without ever
//! appearing in the schema.

mod args;
mod chart;
mod columns;
mod condition;
mod context;
mod error;
mod inspect;
mod observation;
mod reshape;
mod rows;
mod sheets;
mod workbook;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

pub use args::ToolArgs;
pub use context::ExecutionContext;
pub use error::ToolError;
pub use observation::Observation;
pub use workbook::{safe_output_path, Cell, Sheet, Table, Workbook};

/// JSON type of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    Array,
}

/// One parameter as surfaced to the LLM.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamType,
    pub description: &'static str,
    /// Legal values (for arrays: legal item values)
    pub allowed: Option<&'static [&'static str]>,
    pub required: bool,
}

impl ParamSpec {
    fn with_kind(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            allowed: None,
            required: false,
        }
    }

    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::with_kind(name, ParamType::String, description)
    }

    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::with_kind(name, ParamType::Integer, description)
    }

    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self::with_kind(name, ParamType::Boolean, description)
    }

    /// An array of strings.
    pub fn list(name: &'static str, description: &'static str) -> Self {
        Self::with_kind(name, ParamType::Array, description)
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.allowed = Some(values);
        self
    }

    fn to_schema(&self) -> Value {
        let mut property = json!({
            "type": self.kind,
            "description": self.description,
        });
        if let Some(values) = self.allowed {
            match self.kind {
                ParamType::Array => {
                    property["items"] = json!({ "type": "string", "enum": values });
                }
                _ => property["enum"] = json!(values),
            }
        } else if self.kind == ParamType::Array {
            property["items"] = json!({ "type": "string" });
        }
        property
    }
}

/// `sheet_name` as every tool declares it.
fn sheet_param() -> ParamSpec {
    ParamSpec::string(
        "sheet_name",
        "The name of the sheet to use. Defaults to the active sheet.",
    )
}

/// `output_filename` for tools that write a new workbook.
fn output_param(example: &'static str) -> ParamSpec {
    ParamSpec::string("output_filename", example).required()
}

/// Declarative description of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
}

impl ToolSpec {
    /// Render as a function-style JSON schema.
    pub fn to_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.to_string(), p.to_schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        })
    }
}

/// A spreadsheet operation the agent can invoke.
pub trait Tool: Send + Sync {
    /// Schema surfaced to the LLM.
    fn spec(&self) -> ToolSpec;

    /// Every parameter name the implementation reads, context keys included.
    fn accepted_params(&self) -> &'static [&'static str];

    /// Run the operation. Blocking; called off the async runtime.
    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError>;
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Tool '{0}' is registered more than once")]
    DuplicateTool(String),
}

/// Process-wide, read-only catalog of tools.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    /// Registry with every built-in spreadsheet tool.
    pub fn builtin() -> Self {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(inspect::GetDataSummary),
            Arc::new(inspect::ReadRows),
            Arc::new(inspect::GetUniqueValues),
            Arc::new(inspect::ColumnAggregate),
            Arc::new(rows::FilterRows),
            Arc::new(rows::SortData),
            Arc::new(columns::AddColumnFromFormula),
            Arc::new(reshape::CreatePivotTable),
            Arc::new(chart::CreateChart),
            Arc::new(columns::DeleteColumns),
            Arc::new(columns::RenameColumn),
            Arc::new(rows::HandleDuplicates),
            Arc::new(columns::FillMissingValues),
            Arc::new(columns::StringManipulationInColumn),
            Arc::new(inspect::ListSheets),
            Arc::new(reshape::LookupAndMergeColumns),
            Arc::new(reshape::GroupByAndAggregate),
            Arc::new(columns::ConditionalValueColumn),
            Arc::new(sheets::CreateSheet),
            Arc::new(sheets::DeleteSheet),
            Arc::new(sheets::DuplicateSheet),
            Arc::new(sheets::ApplyConditionalFormatting),
        ];
        let index = tools
            .iter()
            .enumerate()
            .map(|(i, tool)| (tool.spec().name, i))
            .collect();
        Self { tools, index }
    }

    /// Build a registry from an explicit tool list.
    pub fn from_tools(tools: Vec<Arc<dyn Tool>>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(tools.len());
        for (i, tool) in tools.iter().enumerate() {
            let name = tool.spec().name;
            if index.insert(name, i).is_some() {
                return Err(RegistryError::DuplicateTool(name.to_string()));
            }
        }
        Ok(Self { tools, index })
    }

    /// Schemas in registration order.
    pub fn list_schemas(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool. Never fails: resolution and execution errors become
    /// error observations.
    pub async fn execute(
        &self,
        name: &str,
        declared: &Map<String, Value>,
        context: &ExecutionContext,
    ) -> Observation {
        let Some(tool) = self.resolve(name) else {
            tracing::warn!(tool = %name, "Unknown tool requested");
            return Observation::error(format!("Tool '{}' does not exist.", name));
        };

        let args = project_params(tool.accepted_params(), declared, context);
        tracing::info!(tool = %name, params = ?args.keys().collect::<Vec<_>>(), "Executing tool");

        let joined = tokio::task::spawn_blocking(move || tool.run(&args)).await;
        match joined {
            Ok(Ok(value)) => Observation::Success(value),
            Ok(Err(e)) => {
                tracing::debug!(tool = %name, error = %e, "Tool failed");
                Observation::error(format!("Tool '{}' failed with error: {}", name, e))
            }
            Err(e) => Observation::error(format!("Tool '{}' failed with error: {}", name, e)),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Merge context and declared parameters (declared wins), then keep only the
/// keys the tool accepts.
fn project_params(
    accepted: &[&str],
    declared: &Map<String, Value>,
    context: &ExecutionContext,
) -> ToolArgs {
    let mut merged = context.to_params();
    for (key, value) in declared {
        merged.insert(key.clone(), value.clone());
    }
    merged.retain(|key, _| accepted.contains(&key.as_str()));
    ToolArgs::new(merged)
}
