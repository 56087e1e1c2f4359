// Maestro Agent Engine
// Runs one orchestration pass for the prompt given on the command line.

use maestro_engine::agents::{CoderAgent, ExecutorAgent, PlannerAgent, VerifierAgent};
use maestro_engine::config::Config;
use maestro_engine::db::Database;
use maestro_engine::embedding::HashEmbedder;
use maestro_engine::ids::UuidGenerator;
use maestro_engine::llm::chat::ChatProvider;
use maestro_engine::llm::LlmProvider;
use maestro_engine::memory::{MemoryContext, MemoryStore};
use maestro_engine::pipeline::Orchestrator;
use maestro_engine::runner::DryRunBackend;
use maestro_engine::telemetry::{init_telemetry, init_telemetry_with_level};
use std::sync::Arc;
use std::time::Duration;

// Single-operator deployment: one subject owns the memory, runs group
// under one project until multi-tenancy lands in the service layer.
const DEFAULT_SUBJECT_ID: i64 = 1;
const DEFAULT_PROJECT_ID: i64 = 1;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize basic telemetry first (before config is loaded)
    init_telemetry();

    let prompt: String = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if prompt.trim().is_empty() {
        anyhow::bail!("usage: maestro <prompt>");
    }

    let config = Config::load_or_create()?;

    // Re-initialize telemetry with config-driven log level
    // (only takes effect if RUST_LOG env var is not set)
    init_telemetry_with_level(&config.core.log_level);

    tracing::info!("Maestro Engine v{}", env!("CARGO_PKG_VERSION"));

    let db = Database::new(&config.core.data_dir.join("maestro.db")).await?;

    let llm: Arc<dyn LlmProvider> = Arc::new(ChatProvider::with_timeout(
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        Duration::from_secs(config.llm.request_timeout_secs),
    ));
    if !llm.check_health().await {
        tracing::warn!(
            "Chat endpoint at {} is not responding; the run will likely fail at planning",
            config.llm.base_url
        );
    }

    let store = Arc::new(MemoryStore::new(
        db.pool().clone(),
        Arc::new(HashEmbedder::new(config.memory.embedding_dimension)),
        Arc::new(UuidGenerator),
        config.memory.clone(),
    ));
    let context = Arc::new(MemoryContext::with_limit(
        Arc::clone(&store),
        config.memory.context_limit,
    ));

    let orchestrator = Orchestrator::new(
        Arc::new(PlannerAgent::new(Arc::clone(&llm))),
        Arc::new(CoderAgent::new(llm)),
        Arc::new(VerifierAgent::new()),
        Arc::new(ExecutorAgent::new(Arc::new(DryRunBackend))),
    )
    .with_stage_timeout(Duration::from_secs(config.pipeline.stage_timeout_secs))
    .with_memory(context, DEFAULT_SUBJECT_ID)
    .with_trace_log(db.traces());

    let trace = orchestrator.orchestrate(&prompt, DEFAULT_PROJECT_ID).await;

    for record in &trace {
        match (&record.result, &record.error) {
            (Some(result), _) => {
                println!("[{}] {}\n{}\n", record.agent_type, record.status.as_str(), result)
            }
            (None, Some(error)) => {
                println!("[{}] {}\n{}\n", record.agent_type, record.status.as_str(), error)
            }
            (None, None) => println!("[{}] {}\n", record.agent_type, record.status.as_str()),
        }
    }

    db.close().await?;
    Ok(())
}
