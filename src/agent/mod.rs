//! Agent module - the ReAct loop that drives the spreadsheet tools.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Seed the transcript with the system prompt and the user request
//! 2. Ask the LLM for one JSON turn: a `thought` plus a `tool_call` or a `final_answer`
//! 3. If the turn requests a tool, execute it and feed the observation back
//! 4. Repeat until a final answer arrives or the step budget is spent

mod agent_loop;
mod decision;
mod prompt;

pub use agent_loop::{
    Agent, StepRecord, TaskOutcome, MAX_STEPS, NO_ACTION_ANSWER, STUCK_ANSWER,
    UNEXPECTED_ERROR_ANSWER,
};
pub use decision::{parse_decision, AgentDecision, DecisionError, ParsedTurn, ToolInvocation};
pub use prompt::build_system_prompt;
