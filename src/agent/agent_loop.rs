//! Core agent loop implementation.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::llm::{ChatMessage, LlmClient};
use crate::tools::{ExecutionContext, Observation, ToolRegistry};

use super::decision::{parse_decision, AgentDecision, ToolInvocation};
use super::prompt::build_system_prompt;

/// LLM turns allowed per task.
pub const MAX_STEPS: usize = 5;

pub const UNEXPECTED_ERROR_ANSWER: &str = "I encountered an unexpected error.";
pub const NO_ACTION_ANSWER: &str = "I am not sure how to proceed.";
pub const STUCK_ANSWER: &str = "I seem to be stuck in a loop.";

/// One tool iteration of the loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub thought: String,
    pub tool_call: ToolInvocation,
    /// Serialized observation, exactly as it was shown to the model
    pub observation: String,
}

/// Result of a task. Always well-formed, whatever went wrong inside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutcome {
    pub answer: String,
    /// Thought of the turn that gave the final answer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_thought: Option<String>,
    pub steps: Vec<StepRecord>,
    pub observations: Vec<Observation>,
    #[serde(skip)]
    pub transcript: Vec<ChatMessage>,
}

/// The spreadsheet agent.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
}

impl Agent {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>) -> Self {
        let system_prompt = build_system_prompt(&tools);
        Self {
            llm,
            tools,
            system_prompt,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run a task against one workbook.
    ///
    /// Generated charts go to `chart_output_dir` and generated workbooks to
    /// `file_output_dir`; neither path is ever shown to the model.
    pub async fn run_task(
        &self,
        instruction: &str,
        file_path: impl AsRef<Path>,
        chart_output_dir: impl AsRef<Path>,
        file_output_dir: impl AsRef<Path>,
    ) -> TaskOutcome {
        let context = ExecutionContext::new(file_path, chart_output_dir, file_output_dir);
        tracing::info!(file = %context.file_path.display(), "New task: {}", instruction);

        let mut run = TaskRun {
            transcript: vec![
                ChatMessage::system(self.system_prompt.clone()),
                ChatMessage::user(format!(
                    "User Request: \"{}\"\nFile to be used: \"{}\"",
                    instruction,
                    context.file_path.display()
                )),
            ],
            steps: Vec::new(),
            observations: Vec::new(),
            final_thought: None,
        };

        for iteration in 0..MAX_STEPS {
            tracing::debug!("Agent iteration {}", iteration + 1);

            let raw = match self.llm.chat_completion(&run.transcript).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::error!("LLM call failed: {}", e);
                    return run.finish(UNEXPECTED_ERROR_ANSWER);
                }
            };
            // The raw turn is kept even if it fails to parse.
            run.transcript.push(ChatMessage::assistant(raw.clone()));

            let turn = match parse_decision(&raw) {
                Ok(turn) => turn,
                Err(e) => {
                    tracing::warn!("Could not parse LLM turn: {}", e);
                    return run.finish(UNEXPECTED_ERROR_ANSWER);
                }
            };
            tracing::debug!(thought = %turn.thought, "LLM turn parsed");

            let call = match turn.decision {
                Some(AgentDecision::FinalAnswer(answer)) => {
                    tracing::info!(steps = run.steps.len(), "Task finished with a final answer");
                    run.final_thought = Some(turn.thought);
                    return run.finish(answer);
                }
                Some(AgentDecision::ToolCall(call)) => call,
                None => {
                    tracing::warn!("LLM gave neither a tool call nor a final answer");
                    return run.finish(NO_ACTION_ANSWER);
                }
            };

            let observation = self
                .tools
                .execute(&call.tool_name, &call.parameters, &context)
                .await;
            let text = observation.to_text();
            tracing::debug!(tool = %call.tool_name, "Observation: {}", truncate_for_log(&text, 1000));

            run.transcript.push(ChatMessage::user(format!("Observation: {}", text)));
            run.observations.push(observation);
            run.steps.push(StepRecord {
                thought: turn.thought,
                tool_call: call,
                observation: text,
            });
        }

        tracing::warn!("Step budget of {} exhausted", MAX_STEPS);
        run.finish(STUCK_ANSWER)
    }
}

/// Mutable state of one task; dropped when the task returns.
struct TaskRun {
    transcript: Vec<ChatMessage>,
    steps: Vec<StepRecord>,
    observations: Vec<Observation>,
    final_thought: Option<String>,
}

impl TaskRun {
    fn finish(self, answer: impl Into<String>) -> TaskOutcome {
        TaskOutcome {
            answer: answer.into(),
            final_thought: self.final_thought,
            steps: self.steps,
            observations: self.observations,
            transcript: self.transcript,
        }
    }
}

/// Truncate a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, Role};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays scripted turns, then repeats `fallback` forever.
    struct ScriptedLlm {
        turns: Mutex<VecDeque<Result<String, LlmError>>>,
        fallback: String,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(turns: Vec<Result<String, LlmError>>, fallback: &str) -> Arc<Self> {
            Arc::new(Self {
                turns: Mutex::new(turns.into()),
                fallback: fallback.to_string(),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat_completion(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.turns.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(self.fallback.clone()))
        }
    }

    const UNKNOWN_TOOL_TURN: &str =
        r#"{"thought": "try", "tool_call": {"tool_name": "teleport", "parameters": {}}}"#;

    fn agent(llm: Arc<ScriptedLlm>) -> Agent {
        Agent::new(llm, Arc::new(ToolRegistry::builtin()))
    }

    async fn run(agent: &Agent) -> TaskOutcome {
        agent
            .run_task("Do something", "/data/in.xlsx", "/out/charts", "/out/files")
            .await
    }

    #[tokio::test]
    async fn never_more_than_five_llm_calls() {
        let llm = ScriptedLlm::new(vec![], UNKNOWN_TOOL_TURN);
        let outcome = run(&agent(llm.clone())).await;

        assert_eq!(llm.calls(), MAX_STEPS);
        assert_eq!(outcome.answer, STUCK_ANSWER);
        assert_eq!(outcome.final_thought, None);
        assert_eq!(outcome.steps.len(), MAX_STEPS);
        assert_eq!(outcome.observations.len(), MAX_STEPS);
    }

    #[tokio::test]
    async fn first_turn_final_answer() {
        let llm = ScriptedLlm::new(
            vec![Ok(r#"{"thought": "easy", "final_answer": "Nothing to do."}"#.into())],
            UNKNOWN_TOOL_TURN,
        );
        let outcome = run(&agent(llm.clone())).await;

        assert_eq!(llm.calls(), 1);
        assert_eq!(outcome.answer, "Nothing to do.");
        assert_eq!(outcome.final_thought.as_deref(), Some("easy"));
        assert!(outcome.steps.is_empty());
        assert!(outcome.observations.is_empty());
    }

    #[tokio::test]
    async fn malformed_turn_aborts_and_is_kept_in_transcript() {
        let llm = ScriptedLlm::new(vec![Ok("definitely not json".into())], UNKNOWN_TOOL_TURN);
        let outcome = run(&agent(llm.clone())).await;

        assert_eq!(llm.calls(), 1);
        assert_eq!(outcome.answer, UNEXPECTED_ERROR_ANSWER);
        let last = outcome.transcript.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "definitely not json");
    }

    #[tokio::test]
    async fn missing_decision_stops_early() {
        let llm = ScriptedLlm::new(vec![Ok(r#"{"thought": "hmm"}"#.into())], UNKNOWN_TOOL_TURN);
        let outcome = run(&agent(llm.clone())).await;

        assert_eq!(llm.calls(), 1);
        assert_eq!(outcome.answer, NO_ACTION_ANSWER);
        assert!(outcome.steps.is_empty());
    }

    #[tokio::test]
    async fn unknown_tool_is_fed_back_as_observation() {
        let llm = ScriptedLlm::new(
            vec![
                Ok(UNKNOWN_TOOL_TURN.into()),
                Ok(r#"{"thought": "give up", "final_answer": "That tool does not exist."}"#.into()),
            ],
            UNKNOWN_TOOL_TURN,
        );
        let outcome = run(&agent(llm.clone())).await;

        assert_eq!(llm.calls(), 2);
        assert_eq!(outcome.steps.len(), 1);
        assert_eq!(
            outcome.observations[0],
            Observation::error("Tool 'teleport' does not exist.")
        );

        let step = &outcome.steps[0];
        assert_eq!(step.thought, "try");
        assert_eq!(step.tool_call.tool_name, "teleport");
        assert_eq!(step.observation, r#"{"error":"Tool 'teleport' does not exist."}"#);
        assert_eq!(outcome.final_thought.as_deref(), Some("give up"));

        // system, user, assistant, observation, assistant
        assert_eq!(outcome.transcript.len(), 5);
        assert_eq!(outcome.transcript[3].role, Role::User);
        assert_eq!(
            outcome.transcript[3].content,
            r#"Observation: {"error":"Tool 'teleport' does not exist."}"#
        );
    }

    #[tokio::test]
    async fn nameless_tool_call_is_fed_back_for_correction() {
        let llm = ScriptedLlm::new(
            vec![
                Ok(r#"{"thought": "oops", "tool_call": {"parameters": {"limit": 3}}}"#.into()),
                Ok(r#"{"thought": "fixed", "final_answer": "Done."}"#.into()),
            ],
            UNKNOWN_TOOL_TURN,
        );
        let outcome = run(&agent(llm.clone())).await;

        assert_eq!(llm.calls(), 2);
        assert_eq!(outcome.answer, "Done.");
        assert_eq!(
            outcome.observations,
            vec![Observation::error("Tool 'null' does not exist.")]
        );
    }

    #[tokio::test]
    async fn transport_failure_degrades_gracefully() {
        let llm = ScriptedLlm::new(vec![Err(LlmError::EmptyResponse)], UNKNOWN_TOOL_TURN);
        let outcome = run(&agent(llm.clone())).await;

        assert_eq!(outcome.answer, UNEXPECTED_ERROR_ANSWER);
        assert_eq!(outcome.transcript.len(), 2);
    }

    #[tokio::test]
    async fn transcript_is_seeded_with_prompt_and_request() {
        let llm = ScriptedLlm::new(vec![Ok(r#"{"final_answer": "ok"}"#.into())], UNKNOWN_TOOL_TURN);
        let agent = agent(llm);
        let outcome = run(&agent).await;

        assert_eq!(outcome.transcript[0].role, Role::System);
        assert_eq!(outcome.transcript[0].content, build_system_prompt(agent.tools()));
        assert_eq!(
            outcome.transcript[1].content,
            "User Request: \"Do something\"\nFile to be used: \"/data/in.xlsx\""
        );
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("ééé", 3), "é... [truncated]");
    }
}
