//! Parsing of one LLM turn into a structured decision.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Thought used when the model omits one.
pub const DEFAULT_THOUGHT: &str = "(No thought provided)";

/// A tool the model asked to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub parameters: Map<String, Value>,
}

/// What the model decided to do this turn.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentDecision {
    ToolCall(ToolInvocation),
    FinalAnswer(String),
}

/// A parsed turn. `decision` is `None` when the model gave neither a tool call
/// nor a final answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTurn {
    pub thought: String,
    pub decision: Option<AgentDecision>,
}

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("Response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Response is not a JSON object")]
    NotAnObject,

    #[error("Malformed tool_call: {0}")]
    MalformedToolCall(String),
}

/// Parse the raw text of one model turn.
///
/// A non-null `final_answer` wins over any `tool_call` in the same turn. A
/// `tool_call` that is null or an empty object counts as absent.
pub fn parse_decision(raw: &str) -> Result<ParsedTurn, DecisionError> {
    let value: Value = serde_json::from_str(raw.trim())?;
    let Value::Object(mut turn) = value else {
        return Err(DecisionError::NotAnObject);
    };

    let thought = match turn.remove("thought") {
        None | Some(Value::Null) => DEFAULT_THOUGHT.to_string(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    };

    if let Some(answer) = turn.remove("final_answer").filter(|v| !v.is_null()) {
        let text = match answer {
            Value::String(s) => s,
            other => other.to_string(),
        };
        return Ok(ParsedTurn {
            thought,
            decision: Some(AgentDecision::FinalAnswer(text)),
        });
    }

    let decision = match turn.remove("tool_call") {
        None | Some(Value::Null) => None,
        Some(Value::Object(call)) if call.is_empty() => None,
        Some(Value::Object(call)) => Some(AgentDecision::ToolCall(tool_invocation(call)?)),
        Some(other) => {
            return Err(DecisionError::MalformedToolCall(format!(
                "expected an object, got {}",
                other
            )))
        }
    };
    Ok(ParsedTurn { thought, decision })
}

/// A missing or non-string `tool_name` is kept as its JSON text so the
/// registry reports it as an unknown tool and the model can correct itself.
fn tool_invocation(mut call: Map<String, Value>) -> Result<ToolInvocation, DecisionError> {
    let tool_name = match call.remove("tool_name") {
        Some(Value::String(name)) => name,
        Some(other) => other.to_string(),
        None => Value::Null.to_string(),
    };
    let parameters = match call.remove("parameters") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(params)) => params,
        Some(other) => {
            return Err(DecisionError::MalformedToolCall(format!(
                "'parameters' must be an object, got {}",
                other
            )))
        }
    };
    Ok(ToolInvocation {
        tool_name,
        parameters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_turn() {
        let turn = parse_decision(
            r#"{"thought": "look first", "tool_call": {"tool_name": "get_data_summary", "parameters": {"sheet_name": "Data"}}}"#,
        )
        .unwrap();
        assert_eq!(turn.thought, "look first");
        let Some(AgentDecision::ToolCall(call)) = turn.decision else {
            panic!("expected a tool call");
        };
        assert_eq!(call.tool_name, "get_data_summary");
        assert_eq!(Value::Object(call.parameters), json!({ "sheet_name": "Data" }));
    }

    #[test]
    fn final_answer_wins_over_tool_call() {
        let turn = parse_decision(
            r#"{"final_answer": "20.0", "tool_call": {"tool_name": "read_rows", "parameters": {}}}"#,
        )
        .unwrap();
        assert_eq!(turn.thought, DEFAULT_THOUGHT);
        assert_eq!(turn.decision, Some(AgentDecision::FinalAnswer("20.0".into())));
    }

    #[test]
    fn null_final_answer_is_absent() {
        let turn = parse_decision(
            r#"{"thought": "t", "final_answer": null, "tool_call": {"tool_name": "list_sheets"}}"#,
        )
        .unwrap();
        assert!(matches!(
            turn.decision,
            Some(AgentDecision::ToolCall(ToolInvocation { ref tool_name, ref parameters }))
                if tool_name == "list_sheets" && parameters.is_empty()
        ));
    }

    #[test]
    fn empty_tool_call_is_no_decision() {
        for raw in [r#"{"thought": "hmm"}"#, r#"{"tool_call": {}}"#, r#"{"tool_call": null}"#] {
            assert_eq!(parse_decision(raw).unwrap().decision, None, "{raw}");
        }
    }

    #[test]
    fn nameless_tool_call_keeps_its_json_name() {
        let name = |raw: &str| match parse_decision(raw).unwrap().decision {
            Some(AgentDecision::ToolCall(call)) => call.tool_name,
            other => panic!("expected a tool call, got {:?}", other),
        };
        assert_eq!(name(r#"{"tool_call": {"parameters": {}}}"#), "null");
        assert_eq!(name(r#"{"tool_call": {"tool_name": 7}}"#), "7");
    }

    #[test]
    fn malformed_turns() {
        assert!(matches!(parse_decision("not json"), Err(DecisionError::InvalidJson(_))));
        assert!(matches!(parse_decision("[1, 2]"), Err(DecisionError::NotAnObject)));
        assert!(matches!(
            parse_decision(r#"{"tool_call": {"tool_name": "x", "parameters": [1]}}"#),
            Err(DecisionError::MalformedToolCall(_))
        ));
    }
}
