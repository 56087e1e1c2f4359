//! Configuration management
//!
//! This module handles loading, validation, and management of the Maestro
//! configuration. Configuration is stored in TOML format at
//! ~/.maestro/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Data directory, log level
//! - **llm**: Chat endpoint and model for the generation capability
//! - **memory**: Retrieval tunables (relevance floor, limits, dimension)
//! - **pipeline**: Stage timeout for agent invocations
//!
//! The memory tunables default to the engine's fixed constants (floor 0.3,
//! retrieval limit 10, context limit 5, dimension 384) and exist so
//! deployments can adjust them without a rebuild.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// LLM provider configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Memory subsystem tunables
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Data directory holding the SQLite database (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the chat endpoint
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model name passed to the endpoint
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            request_timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Memory subsystem tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Embedding dimensionality; constant across all entries in a store
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    /// Minimum similarity (exclusive) for a text query to match an entry
    #[serde(default = "default_relevance_floor")]
    pub relevance_floor: f32,

    /// Default entry cap for retrieval calls
    #[serde(default = "default_retrieval_limit")]
    pub retrieval_limit: usize,

    /// Entry cap when assembling task context
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: default_embedding_dimension(),
            relevance_floor: default_relevance_floor(),
            retrieval_limit: default_retrieval_limit(),
            context_limit: default_context_limit(),
        }
    }
}

/// Pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Per-stage timeout in seconds; an elapsed stage is recorded as failed
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout_secs(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.maestro/data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_llm_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_llm_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    300
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_relevance_floor() -> f32 {
    0.3
}

fn default_retrieval_limit() -> usize {
    10
}

fn default_context_limit() -> usize {
    5
}

fn default_stage_timeout_secs() -> u64 {
    120
}

impl Config {
    /// Default config file location: ~/.maestro/config.toml
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".maestro")
            .join("config.toml")
    }

    /// Load the configuration from the default location, creating it with
    /// default values if it doesn't exist yet.
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_at(&Self::default_path())
    }

    /// Load the configuration from an explicit path, creating it with
    /// default values if it doesn't exist yet.
    pub fn load_or_create_at(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let mut config: Self =
            toml::from_str(&raw).context("Failed to parse config TOML")?;

        config.core.data_dir = expand_tilde(&config.core.data_dir);
        config.validate()?;

        Ok(config)
    }

    /// Write the configuration to the given path, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let raw = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, raw)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        Ok(())
    }

    /// Validate tunables that would silently break retrieval if out of range
    pub fn validate(&self) -> Result<()> {
        if self.memory.embedding_dimension == 0 {
            anyhow::bail!("memory.embedding_dimension must be greater than zero");
        }
        if !(-1.0..=1.0).contains(&self.memory.relevance_floor) {
            anyhow::bail!("memory.relevance_floor must lie in [-1, 1]");
        }
        if self.pipeline.stage_timeout_secs == 0 {
            anyhow::bail!("pipeline.stage_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

/// Expand a leading ~ to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
