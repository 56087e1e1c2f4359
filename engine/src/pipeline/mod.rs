//! Orchestration Pipeline
//!
//! Drives the planner → coder → verifier → executor state machine for one
//! prompt, producing an ordered execution trace and, optionally, feeding
//! the memory subsystem before and after the run.

pub mod orchestrator;
pub mod trace;

pub use orchestrator::{Orchestrator, PipelineState};
pub use trace::{AgentTaskRecord, TaskStatus};
