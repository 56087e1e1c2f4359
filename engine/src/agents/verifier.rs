//! Verifier Agent
//!
//! Third pipeline stage: runs a fixed set of deterministic quality checks
//! against the coder's output. A clean pass hands off to the executor; any
//! issue fails the stage and names the coder as the stage to re-drive —
//! the only backward edge in the pipeline.

use crate::agents::{Agent, AgentInput, AgentResponse, AgentType};
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

/// How many loosely-typed markers are tolerated before flagging
const LOOSE_TYPE_LIMIT: usize = 3;

pub struct VerifierAgent {
    declaration_re: Regex,
    loose_type_re: Regex,
    error_handling_re: Regex,
}

impl VerifierAgent {
    pub fn new() -> Self {
        Self {
            declaration_re: Regex::new(r"\b(export|pub|function|fn|def|class)\b")
                .expect("declaration pattern is valid"),
            loose_type_re: Regex::new(r":\s*any\b").expect("loose-type pattern is valid"),
            error_handling_re: Regex::new(r"\b(try|catch|except|rescue)\b|Result<|unwrap_or|map_err")
                .expect("error-handling pattern is valid"),
        }
    }

    /// Run all quality checks, returning one message per issue found
    fn run_checks(&self, code: &str) -> Vec<String> {
        let mut issues = Vec::new();

        if code.trim().is_empty() || !self.declaration_re.is_match(code) {
            issues.push("no exported functions or declarations found".to_string());
        }

        let loose_count = self.loose_type_re.find_iter(code).count();
        if loose_count > LOOSE_TYPE_LIMIT {
            issues.push(format!(
                "loosely typed values used {} times (limit {})",
                loose_count, LOOSE_TYPE_LIMIT
            ));
        }

        if !self.error_handling_re.is_match(code) {
            issues.push("no error handling detected".to_string());
        }

        issues
    }
}

impl Default for VerifierAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for VerifierAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Verifier
    }

    async fn invoke(&self, input: &AgentInput) -> AgentResponse {
        let code = input.upstream.as_deref().unwrap_or("");
        let issues = self.run_checks(code);

        debug!(
            "Verifier found {} issue(s) for project {}",
            issues.len(),
            input.project_id
        );

        if issues.is_empty() {
            AgentResponse::ok(
                format!("verification passed ({} bytes checked)", code.len()),
                Some(AgentType::Executor),
            )
        } else {
            AgentResponse::fail_with_next(issues.join("\n"), AgentType::Coder)
        }
    }
}
