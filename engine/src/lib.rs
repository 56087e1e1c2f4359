//! Maestro Engine Library
//!
//! This library provides the core functionality of the Maestro engine:
//! the agent orchestration pipeline and the long-term memory subsystem.
//! It is used by both the maestro binary and integration tests.

/// Configuration management module
pub mod config;

/// Database persistence module
pub mod db;

/// Embedding provider and similarity scoring
pub mod embedding;

/// Id allocation module
pub mod ids;

/// LLM provider abstraction layer
pub mod llm;

/// Long-term memory subsystem
pub mod memory;

/// Pipeline agents (planner, coder, verifier, executor)
pub mod agents;

/// Execution backend for the final pipeline stage
pub mod runner;

/// Orchestration pipeline state machine
pub mod pipeline;

/// Telemetry and Observability
pub mod telemetry;
