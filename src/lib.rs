//! # Sheet Agent
//!
//! A natural-language agent that drives a bounded sequence of spreadsheet
//! operations against an Excel file.
//!
//! This library provides:
//! - A ReAct-style agent loop that asks an LLM for one structured decision per turn
//! - A static registry of spreadsheet tools with machine-readable schemas
//! - A dispatcher that injects trusted execution context into every tool call
//! - An HTTP API for file upload, preview and task submission
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Seed a transcript with a system prompt rendered from the tool registry
//! 2. Call the LLM and parse its reply as `thought` + `tool_call` or `final_answer`
//! 3. Dispatch the tool call and append the observation as a user turn
//! 4. Repeat until a final answer arrives or the step budget (5) is spent
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sheet_agent::{agent::Agent, config::Config, llm::OpenAiCompatClient, tools::ToolRegistry};
//!
//! let config = Config::from_env()?;
//! let llm = Arc::new(OpenAiCompatClient::from_config(&config)?);
//! let agent = Agent::new(llm, Arc::new(ToolRegistry::builtin()));
//! let outcome = agent
//!     .run_task("What is the average Revenue?", "uploads/sales.xlsx", "static/charts", "static/outputs")
//!     .await;
//! println!("{}", outcome.answer);
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod tools;

pub use config::Config;
