//! What the model says and what the environment answers.
//!
//! [`AgentDecision`] is the structured object the model emits each step. Its
//! JSON Schema is generated with `schemars` and enforced with `jsonschema`
//! before deserialization, so a malformed reply produces a model-readable
//! error instead of a half-filled struct. [`ActionResult`] is the outcome of
//! one executed action, and [`StepInfo`] locates the step in the run.

use crate::error::{ContextError, Result};
use crate::json_schema_for;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// The model's structured decision for one step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgentDecision {
    /// Free-form reasoning. Never recorded in the ledger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    /// Verdict on whether the previous goal was achieved.
    pub evaluation_previous_goal: String,
    /// What the agent wants to remember going forward.
    pub memory: String,
    /// What the agent intends to do next.
    pub next_goal: String,
    /// Actions to execute, opaque to this crate.
    #[serde(default)]
    pub action: Vec<Value>,
}

impl AgentDecision {
    /// Parse a raw model reply into a decision.
    ///
    /// Markdown code fences around the JSON are stripped. The payload is
    /// validated against the generated schema first; every violation is
    /// reported with its instance path in [`ContextError::SchemaViolation`].
    /// Unparseable JSON yields [`ContextError::InvalidOutput`].
    pub fn parse(raw: &str) -> Result<Self> {
        let body = strip_code_fences(raw);
        let value: Value = serde_json::from_str(body).map_err(|e| {
            ContextError::InvalidOutput(format!(
                "model output is not valid JSON: {e}. \
                 Respond with a single JSON object matching the output schema."
            ))
        })?;

        let schema = json_schema_for::<Self>();
        if let Ok(validator) = jsonschema::validator_for(&schema) {
            let errors: Vec<String> = validator
                .iter_errors(&value)
                .map(|e| {
                    let path = e.instance_path().to_string();
                    let path = if path.is_empty() { "(root)".to_string() } else { path };
                    format!("  - {path}: {e}")
                })
                .collect();
            if !errors.is_empty() {
                debug!("Decision failed validation with {} error(s)", errors.len());
                return Err(ContextError::SchemaViolation(errors.join("\n")));
            }
        }

        Ok(serde_json::from_value(value)?)
    }
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_lang, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Outcome of one executed action.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionResult {
    pub error: Option<String>,
    /// Condensed note that survives into the ledger.
    pub long_term_memory: Option<String>,
    pub extracted_content: Option<String>,
    /// Show `extracted_content` to the model for the next step only.
    pub include_extracted_content_only_once: bool,
}

impl ActionResult {
    /// Content that goes into the ledger verbatim.
    pub fn extracted(content: impl Into<String>) -> Self {
        Self {
            extracted_content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Content shown once in the read buffer and kept out of the ledger.
    pub fn read_once(content: impl Into<String>) -> Self {
        Self {
            extracted_content: Some(content.into()),
            include_extracted_content_only_once: true,
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_memory(mut self, memory: impl Into<String>) -> Self {
        self.long_term_memory = Some(memory.into());
        self
    }
}

/// Position of the current step within the run. `step_number` is zero-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInfo {
    pub step_number: u32,
    pub max_steps: u32,
}

impl StepInfo {
    pub fn new(step_number: u32, max_steps: u32) -> Self {
        Self {
            step_number,
            max_steps,
        }
    }
}
