//! System prompt for the agent.

use serde_json::Value;

use crate::tools::ToolRegistry;

/// Build the system prompt from the registered tool schemas.
///
/// The prompt depends only on the registry, so it is identical for every task.
pub fn build_system_prompt(tools: &ToolRegistry) -> String {
    let schemas = Value::Array(tools.list_schemas().iter().map(|s| s.to_schema()).collect());

    format!(
        r#"You are a smart agent that can solve user requests by breaking them down into a series of steps using the available tools.

Here is the list of tools available to you in a JSON schema format:
{schemas:#}

You must respond in a specific JSON format with two possible keys:
1. `thought`: Your reasoning and plan for the next step.
2. `tool_call`: The specific tool to execute for this step, as an object with `tool_name` and `parameters`. The `tool_name` must be one of the names from the schema. The `parameters` must adhere to the schema for that tool.

OR

1. `thought`: Your reasoning for why you are finished.
2. `final_answer`: A concise, natural language response to the user's original request, based on your observations.

A key first step for many tasks is to use `get_data_summary` to understand the file's structure before trying to access columns.
After receiving an "Observation", you must decide on the next step: either another `tool_call` or a `final_answer`."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_every_tool_and_the_contract() {
        let registry = ToolRegistry::builtin();
        let prompt = build_system_prompt(&registry);
        for spec in registry.list_schemas() {
            assert!(prompt.contains(&format!("\"name\": \"{}\"", spec.name)), "{}", spec.name);
        }
        assert!(prompt.contains("`thought`"));
        assert!(prompt.contains("`tool_call`"));
        assert!(prompt.contains("`final_answer`"));
        assert!(prompt.contains("get_data_summary"));
        assert!(!prompt.contains("file_output_dir"));
    }

    #[test]
    fn schema_block_is_machine_readable() {
        let prompt = build_system_prompt(&ToolRegistry::builtin());
        let start = prompt.find('[').unwrap();
        let end = prompt.find("\n]").unwrap() + 2;
        let schemas: Vec<Value> = serde_json::from_str(&prompt[start..end]).unwrap();
        assert_eq!(schemas.len(), 22);
        assert_eq!(schemas[0]["name"], "get_data_summary");
    }

    #[test]
    fn prompt_is_stable() {
        let registry = ToolRegistry::builtin();
        assert_eq!(build_system_prompt(&registry), build_system_prompt(&registry));
    }
}
