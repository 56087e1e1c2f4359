//! Executor Agent
//!
//! Terminal pipeline stage: hands the verified code to the execution
//! backend and records the structured outcome. Never names a next stage.

use crate::agents::{Agent, AgentInput, AgentResponse, AgentType};
use crate::runner::ExecutionBackend;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ExecutorAgent {
    backend: Arc<dyn ExecutionBackend>,
}

impl ExecutorAgent {
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Agent for ExecutorAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Executor
    }

    async fn invoke(&self, input: &AgentInput) -> AgentResponse {
        let code = input.upstream.as_deref().unwrap_or("");

        match self.backend.run(code, input.project_id).await {
            Ok(summary) => {
                info!(
                    "Executor finished for project {} via {}",
                    input.project_id,
                    self.backend.name()
                );
                AgentResponse::ok(summary, None)
            }
            Err(e) => {
                warn!("Executor failed for project {}: {}", input.project_id, e);
                AgentResponse::fail(format!("execution failed: {e}"))
            }
        }
    }
}
