//! Pipeline Agents
//!
//! Each agent performs one stage of the orchestration pipeline: the planner
//! turns a prompt into a structured plan, the coder produces implementation
//! text, the verifier runs quality checks, and the executor performs the
//! final build/deploy step. The orchestrator depends only on the `Agent`
//! contract, never on concrete agent types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod coder;
pub mod executor;
pub mod planner;
pub mod verifier;

pub use coder::CoderAgent;
pub use executor::ExecutorAgent;
pub use planner::PlannerAgent;
pub use verifier::VerifierAgent;

/// The four pipeline stages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Planner,
    Coder,
    Verifier,
    Executor,
}

impl AgentType {
    pub fn as_str(&self) -> &str {
        match self {
            AgentType::Planner => "planner",
            AgentType::Coder => "coder",
            AgentType::Verifier => "verifier",
            AgentType::Executor => "executor",
        }
    }

    /// Parse a stage name as stored in the trace log
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planner" => Some(AgentType::Planner),
            "coder" => Some(AgentType::Coder),
            "verifier" => Some(AgentType::Verifier),
            "executor" => Some(AgentType::Executor),
            _ => None,
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input consumed by one agent invocation
#[derive(Debug, Clone)]
pub struct AgentInput {
    /// The original user prompt for the run
    pub prompt: String,

    /// Output of the upstream stage (plan for the coder, code for the
    /// verifier and executor) or retrieved memory notes for the planner
    pub upstream: Option<String>,

    /// Task grouping key for the run
    pub project_id: i64,
}

impl AgentInput {
    pub fn new(prompt: impl Into<String>, project_id: i64) -> Self {
        Self {
            prompt: prompt.into(),
            upstream: None,
            project_id,
        }
    }

    pub fn with_upstream(mut self, upstream: impl Into<String>) -> Self {
        self.upstream = Some(upstream.into());
        self
    }
}

/// Structured outcome of one agent invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Whether the stage succeeded
    pub success: bool,

    /// Stage output on success (plan, code, verification or execution summary)
    pub result: Option<String>,

    /// Failure description on error
    pub error: Option<String>,

    /// The stage that should run next, if any. `None` marks a terminal stage.
    pub next_agent: Option<AgentType>,
}

impl AgentResponse {
    /// Successful outcome advancing to `next`
    pub fn ok(result: impl Into<String>, next: Option<AgentType>) -> Self {
        Self {
            success: true,
            result: Some(result.into()),
            error: None,
            next_agent: next,
        }
    }

    /// Failed outcome with no forward edge
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            next_agent: None,
        }
    }

    /// Failed outcome that still names a stage an operator could re-drive
    pub fn fail_with_next(error: impl Into<String>, next: AgentType) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            next_agent: Some(next),
        }
    }
}

/// Common contract for all pipeline stages.
///
/// An invocation never panics and never returns a transport-level error:
/// provider failures are captured and reported through `AgentResponse`.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Which pipeline stage this agent implements
    fn agent_type(&self) -> AgentType;

    /// Run the stage against the given input
    async fn invoke(&self, input: &AgentInput) -> AgentResponse;
}
