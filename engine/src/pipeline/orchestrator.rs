//! Pipeline Orchestrator
//!
//! Sequences the four agents for one orchestration run. Each stage consumes
//! the previous stage's output, so stages never run in parallel; distinct
//! runs share no mutable state and may proceed concurrently.
//!
//! A verifier failure ends the run after three records. The verifier's
//! response still names the coder as its `next_agent`, but the driver does
//! not loop back within one run; re-driving with amended input is the
//! caller's decision.

use crate::agents::{Agent, AgentInput, AgentResponse, AgentType};
use crate::db::TraceRepository;
use crate::ids::{IdGenerator, UuidGenerator};
use crate::memory::{MemoryContext, MemoryEntry};
use crate::pipeline::trace::{AgentTaskRecord, TaskStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default per-stage timeout
const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(120);

/// States of one orchestration run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Planning,
    Coding,
    Verifying,
    Executing,
    Done,
    Aborted,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Aborted)
    }
}

/// Memory attachment for a run: which subject learns from it
struct MemoryBinding {
    context: Arc<MemoryContext>,
    subject_id: i64,
}

/// Drives the pipeline state machine over the four agents
pub struct Orchestrator {
    planner: Arc<dyn Agent>,
    coder: Arc<dyn Agent>,
    verifier: Arc<dyn Agent>,
    executor: Arc<dyn Agent>,
    ids: Arc<dyn IdGenerator>,
    stage_timeout: Duration,
    memory: Option<MemoryBinding>,
    trace_log: Option<TraceRepository>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        planner: Arc<dyn Agent>,
        coder: Arc<dyn Agent>,
        verifier: Arc<dyn Agent>,
        executor: Arc<dyn Agent>,
    ) -> Self {
        Self {
            planner,
            coder,
            verifier,
            executor,
            ids: Arc::new(UuidGenerator),
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            memory: None,
            trace_log: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Inject a deterministic id generator (tests, tooling)
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Override the per-stage timeout
    pub fn with_stage_timeout(mut self, stage_timeout: Duration) -> Self {
        self.stage_timeout = stage_timeout;
        self
    }

    /// Attach a memory context; the subject is consulted before planning
    /// and learns from the run outcome afterwards
    pub fn with_memory(mut self, context: Arc<MemoryContext>, subject_id: i64) -> Self {
        self.memory = Some(MemoryBinding {
            context,
            subject_id,
        });
        self
    }

    /// Durably log every finalized task record (best effort)
    pub fn with_trace_log(mut self, trace_log: TraceRepository) -> Self {
        self.trace_log = Some(trace_log);
        self
    }

    /// Observe this token at stage boundaries; an in-flight stage is
    /// allowed to finish before cancellation takes effect
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the pipeline for one prompt.
    ///
    /// Returns the trace in stage-invocation order: planner, coder,
    /// verifier, executor. A failed stage ends the run, so the trace length
    /// tells where it stopped. The call itself never fails; failures are
    /// reported through the last record's status and error.
    pub async fn orchestrate(&self, prompt: &str, project_id: i64) -> Vec<AgentTaskRecord> {
        info!("Orchestration run starting for project {}", project_id);

        let mut trace = Vec::new();
        let notes = self.memory_notes(prompt, project_id).await;

        let mut state = PipelineState::Planning;
        let mut plan: Option<String> = None;
        let mut code: Option<String> = None;

        while !state.is_terminal() {
            if self.cancel.is_cancelled() {
                info!("Orchestration cancelled at stage boundary");
                break;
            }

            let (agent, upstream) = match state {
                PipelineState::Planning => (&self.planner, notes.clone()),
                PipelineState::Coding => (&self.coder, plan.clone()),
                PipelineState::Verifying => (&self.verifier, code.clone()),
                PipelineState::Executing => (&self.executor, code.clone()),
                PipelineState::Done | PipelineState::Aborted => break,
            };

            let response = self
                .run_stage(agent.as_ref(), prompt, upstream, project_id, &mut trace)
                .await;

            state = match (state, response.success) {
                (PipelineState::Planning, true) => {
                    plan = response.result;
                    PipelineState::Coding
                }
                (PipelineState::Coding, true) => {
                    code = response.result;
                    PipelineState::Verifying
                }
                (PipelineState::Verifying, true) => PipelineState::Executing,
                // The executor is terminal regardless of outcome
                (PipelineState::Executing, _) => PipelineState::Done,
                // Any other failure aborts the run
                _ => PipelineState::Aborted,
            };
        }

        self.learn_from_trace(prompt, project_id, &trace).await;

        info!(
            "Orchestration run for project {} produced {} record(s), final state {:?}",
            project_id,
            trace.len(),
            state
        );

        trace
    }

    /// Invoke one agent with a timeout, finalize and log its task record
    async fn run_stage(
        &self,
        agent: &dyn Agent,
        prompt: &str,
        upstream: Option<String>,
        project_id: i64,
        trace: &mut Vec<AgentTaskRecord>,
    ) -> AgentResponse {
        let record = AgentTaskRecord::running(
            self.ids.next_id(),
            project_id,
            agent.agent_type(),
            prompt,
        );
        info!("Stage {} running (task {})", agent.agent_type(), record.id);

        let mut input = AgentInput::new(prompt, project_id);
        input.upstream = upstream;

        let response = match timeout(self.stage_timeout, agent.invoke(&input)).await {
            Ok(response) => response,
            Err(_) => {
                warn!(
                    "Stage {} timed out after {}s",
                    agent.agent_type(),
                    self.stage_timeout.as_secs()
                );
                AgentResponse::fail(format!(
                    "stage timed out after {}s",
                    self.stage_timeout.as_secs()
                ))
            }
        };

        let record = if response.success {
            record.complete(response.result.clone())
        } else {
            record.fail(
                response
                    .error
                    .clone()
                    .unwrap_or_else(|| "stage failed".to_string()),
            )
        };

        if let Some(log) = &self.trace_log {
            // Best effort: a logging failure never fails the run
            if let Err(e) = log.insert(&record).await {
                warn!("Failed to persist task record {}: {:#}", record.id, e);
            }
        }

        trace.push(record);
        response
    }

    /// Fetch prior knowledge for the prompt, formatted for the planner
    async fn memory_notes(&self, prompt: &str, project_id: i64) -> Option<String> {
        let binding = self.memory.as_ref()?;

        match binding
            .context
            .get_context_for_task(binding.subject_id, Some(project_id), prompt)
            .await
        {
            Ok(entries) if !entries.is_empty() => Some(format_notes(&entries)),
            Ok(_) => None,
            Err(e) => {
                warn!("Memory lookup failed, planning without context: {}", e);
                None
            }
        }
    }

    /// Persist the run outcome as a solution or error memory
    async fn learn_from_trace(&self, prompt: &str, project_id: i64, trace: &[AgentTaskRecord]) {
        let Some(binding) = &self.memory else {
            return;
        };
        let Some(last) = trace.last() else {
            return;
        };

        let succeeded = last.agent_type == AgentType::Executor
            && last.status == TaskStatus::Completed;
        let result_text = last
            .result
            .clone()
            .or_else(|| last.error.clone())
            .unwrap_or_default();

        if let Err(e) = binding
            .context
            .learn_from_execution(
                binding.subject_id,
                Some(project_id),
                prompt,
                &result_text,
                succeeded,
            )
            .await
        {
            warn!("Failed to record run outcome in memory: {}", e);
        }
    }
}

fn format_notes(entries: &[MemoryEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("- [{}] {}", e.kind, e.value))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIdGenerator;
    use async_trait::async_trait;

    /// Agent returning a canned response
    struct StubAgent {
        ty: AgentType,
        response: AgentResponse,
    }

    #[async_trait]
    impl Agent for StubAgent {
        fn agent_type(&self) -> AgentType {
            self.ty
        }

        async fn invoke(&self, _input: &AgentInput) -> AgentResponse {
            self.response.clone()
        }
    }

    /// Agent that never finishes within a test-sized timeout
    struct SlowAgent {
        ty: AgentType,
    }

    #[async_trait]
    impl Agent for SlowAgent {
        fn agent_type(&self) -> AgentType {
            self.ty
        }

        async fn invoke(&self, _input: &AgentInput) -> AgentResponse {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            AgentResponse::ok("never", None)
        }
    }

    fn ok_agent(ty: AgentType, result: &str, next: Option<AgentType>) -> Arc<dyn Agent> {
        Arc::new(StubAgent {
            ty,
            response: AgentResponse::ok(result, next),
        })
    }

    fn fail_agent(ty: AgentType, error: &str) -> Arc<dyn Agent> {
        Arc::new(StubAgent {
            ty,
            response: AgentResponse::fail(error),
        })
    }

    fn happy_orchestrator() -> Orchestrator {
        Orchestrator::new(
            ok_agent(AgentType::Planner, "plan", Some(AgentType::Coder)),
            ok_agent(AgentType::Coder, "code", Some(AgentType::Verifier)),
            ok_agent(AgentType::Verifier, "checked", Some(AgentType::Executor)),
            ok_agent(AgentType::Executor, "deployed", None),
        )
        .with_ids(Arc::new(SequentialIdGenerator::new("task")))
    }

    #[tokio::test]
    async fn test_full_success_yields_four_ordered_records() {
        let trace = happy_orchestrator().orchestrate("build a todo list", 42).await;

        assert_eq!(trace.len(), 4);
        let order: Vec<AgentType> = trace.iter().map(|r| r.agent_type).collect();
        assert_eq!(
            order,
            vec![
                AgentType::Planner,
                AgentType::Coder,
                AgentType::Verifier,
                AgentType::Executor
            ]
        );
        assert!(trace.iter().all(|r| r.status == TaskStatus::Completed));
        assert!(trace.iter().all(|r| r.completed_at.is_some()));
        assert_eq!(trace[3].result.as_deref(), Some("deployed"));
    }

    #[tokio::test]
    async fn test_failing_planner_yields_one_record() {
        let orchestrator = Orchestrator::new(
            fail_agent(AgentType::Planner, "provider down"),
            ok_agent(AgentType::Coder, "code", Some(AgentType::Verifier)),
            ok_agent(AgentType::Verifier, "checked", Some(AgentType::Executor)),
            ok_agent(AgentType::Executor, "deployed", None),
        );

        let trace = orchestrator.orchestrate("build", 42).await;
        assert_eq!(trace.len(), 1);
        assert_eq!(trace[0].status, TaskStatus::Failed);
        assert_eq!(trace[0].error.as_deref(), Some("provider down"));
    }

    #[tokio::test]
    async fn test_failing_coder_yields_two_records() {
        let orchestrator = Orchestrator::new(
            ok_agent(AgentType::Planner, "plan", Some(AgentType::Coder)),
            fail_agent(AgentType::Coder, "generation failed"),
            ok_agent(AgentType::Verifier, "checked", Some(AgentType::Executor)),
            ok_agent(AgentType::Executor, "deployed", None),
        );

        let trace = orchestrator.orchestrate("build", 42).await;
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[1].agent_type, AgentType::Coder);
        assert_eq!(trace[1].status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_failing_verifier_stops_before_executor() {
        let verifier: Arc<dyn Agent> = Arc::new(StubAgent {
            ty: AgentType::Verifier,
            response: AgentResponse::fail_with_next("no error handling", AgentType::Coder),
        });
        let orchestrator = Orchestrator::new(
            ok_agent(AgentType::Planner, "plan", Some(AgentType::Coder)),
            ok_agent(AgentType::Coder, "code", Some(AgentType::Verifier)),
            verifier,
            ok_agent(AgentType::Executor, "deployed", None),
        );

        let trace = orchestrator.orchestrate("build", 42).await;
        assert_eq!(trace.len(), 3);
        assert_eq!(trace[2].agent_type, AgentType::Verifier);
        assert_eq!(trace[2].status, TaskStatus::Failed);
        assert!(trace.iter().all(|r| r.agent_type != AgentType::Executor));
    }

    #[tokio::test]
    async fn test_executor_failure_still_ends_run_with_four_records() {
        let orchestrator = Orchestrator::new(
            ok_agent(AgentType::Planner, "plan", Some(AgentType::Coder)),
            ok_agent(AgentType::Coder, "code", Some(AgentType::Verifier)),
            ok_agent(AgentType::Verifier, "checked", Some(AgentType::Executor)),
            fail_agent(AgentType::Executor, "deploy refused"),
        );

        let trace = orchestrator.orchestrate("build", 42).await;
        assert_eq!(trace.len(), 4);
        assert_eq!(trace[3].status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_stage_timeout_recorded_as_failure() {
        let orchestrator = Orchestrator::new(
            Arc::new(SlowAgent {
                ty: AgentType::Planner,
            }),
            ok_agent(AgentType::Coder, "code", Some(AgentType::Verifier)),
            ok_agent(AgentType::Verifier, "checked", Some(AgentType::Executor)),
            ok_agent(AgentType::Executor, "deployed", None),
        )
        .with_stage_timeout(Duration::from_millis(20));

        let trace = orchestrator.orchestrate("build", 42).await;
        assert_eq!(trace.len(), 1);
        assert_eq!(trace[0].status, TaskStatus::Failed);
        assert!(trace[0].error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_cancellation_observed_at_stage_boundary() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let trace = happy_orchestrator()
            .with_cancellation(cancel)
            .orchestrate("build", 42)
            .await;

        assert!(trace.is_empty());
    }

    #[test]
    fn test_only_done_and_aborted_are_terminal() {
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::Aborted.is_terminal());
        for state in [
            PipelineState::Planning,
            PipelineState::Coding,
            PipelineState::Verifying,
            PipelineState::Executing,
        ] {
            assert!(!state.is_terminal());
        }
    }

    #[tokio::test]
    async fn test_deterministic_ids_in_order() {
        let trace = happy_orchestrator().orchestrate("build", 42).await;
        let ids: Vec<&str> = trace.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["task-1", "task-2", "task-3", "task-4"]);
    }
}
