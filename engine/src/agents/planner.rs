//! Planner Agent
//!
//! First pipeline stage: turns the user's prompt into a structured textual
//! plan for the coder. When memory notes are supplied upstream they are
//! folded into the request so prior outcomes inform the plan.

use crate::agents::{Agent, AgentInput, AgentResponse, AgentType};
use crate::llm::LlmProvider;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

const PLANNER_ROLE: &str = "You are the planning stage of a build pipeline. \
Break the user's request into a short, numbered implementation plan. \
Each step states what to build and how to tell it is done. \
Output only the plan, no commentary.";

pub struct PlannerAgent {
    llm: Arc<dyn LlmProvider>,
}

impl PlannerAgent {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Planner
    }

    async fn invoke(&self, input: &AgentInput) -> AgentResponse {
        let user_prompt = match &input.upstream {
            Some(notes) => format!(
                "{}\n\nRelevant knowledge from earlier runs:\n{}",
                input.prompt, notes
            ),
            None => input.prompt.clone(),
        };

        debug!(
            "Planner invoked for project {} ({} prompt chars)",
            input.project_id,
            user_prompt.len()
        );

        match self.llm.generate(PLANNER_ROLE, &user_prompt).await {
            Ok(plan) => AgentResponse::ok(plan, Some(AgentType::Coder)),
            Err(e) => {
                warn!("Planner generation failed: {}", e);
                AgentResponse::fail(format!("plan generation failed: {e}"))
            }
        }
    }
}
