//! Coder Agent
//!
//! Second pipeline stage: produces implementation text from the prompt and
//! the planner's output. Also the target of the verifier's backward edge
//! when quality checks fail.

use crate::agents::{Agent, AgentInput, AgentResponse, AgentType};
use crate::llm::LlmProvider;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

const CODER_ROLE: &str = "You are the implementation stage of a build pipeline. \
Write the complete implementation for the user's request. Export a usable \
surface, keep types precise, and handle errors explicitly. Output only code.";

pub struct CoderAgent {
    llm: Arc<dyn LlmProvider>,
}

impl CoderAgent {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Agent for CoderAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Coder
    }

    async fn invoke(&self, input: &AgentInput) -> AgentResponse {
        let user_prompt = match &input.upstream {
            Some(plan) => format!("{}\n\nFollow this plan:\n{}", input.prompt, plan),
            None => input.prompt.clone(),
        };

        debug!(
            "Coder invoked for project {} (plan attached: {})",
            input.project_id,
            input.upstream.is_some()
        );

        match self.llm.generate(CODER_ROLE, &user_prompt).await {
            Ok(code) => AgentResponse::ok(code, Some(AgentType::Verifier)),
            Err(e) => {
                warn!("Coder generation failed: {}", e);
                AgentResponse::fail(format!("code generation failed: {e}"))
            }
        }
    }
}
