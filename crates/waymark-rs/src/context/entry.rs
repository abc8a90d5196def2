//! Ledger entries: one immutable narrative record per agent step.
//!
//! An entry is either an error marker, a system marker (initialization,
//! follow-up instructions), or the model's own narrative for the step
//! (evaluation, memory, next goal) plus the aggregated action outcome.
//! Error and system marker are mutually exclusive; the builder and the
//! deserializer both reject entries that set both.

use crate::error::{ContextError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// Text of the seed entry every ledger starts with.
pub const SEED_MESSAGE: &str = "Agent initialized";

/// A single step's record in the execution ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawHistoryEntry")]
pub struct HistoryEntry {
    step_number: Option<u32>,
    evaluation_previous_goal: Option<String>,
    memory: Option<String>,
    next_goal: Option<String>,
    action_results: Option<String>,
    error: Option<String>,
    system_message: Option<String>,
}

impl HistoryEntry {
    pub fn builder() -> HistoryEntryBuilder {
        HistoryEntryBuilder::default()
    }

    /// The step-0 initialization entry.
    pub fn seed() -> Self {
        Self::system_marker(Some(0), SEED_MESSAGE)
    }

    /// An entry carrying only a system marker.
    pub fn system_marker(step_number: Option<u32>, text: impl Into<String>) -> Self {
        Self {
            system_message: Some(text.into()),
            ..Self::empty(step_number)
        }
    }

    /// An entry carrying only an error.
    pub fn failure(step_number: Option<u32>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::empty(step_number)
        }
    }

    /// A narrative entry from the model's own account of a step. Cannot
    /// conflict, so construction is infallible.
    pub fn narrative(
        step_number: Option<u32>,
        evaluation_previous_goal: Option<String>,
        memory: Option<String>,
        next_goal: Option<String>,
        action_results: Option<String>,
    ) -> Self {
        Self {
            evaluation_previous_goal,
            memory,
            next_goal,
            action_results,
            ..Self::empty(step_number)
        }
    }

    fn empty(step_number: Option<u32>) -> Self {
        Self {
            step_number,
            evaluation_previous_goal: None,
            memory: None,
            next_goal: None,
            action_results: None,
            error: None,
            system_message: None,
        }
    }

    pub fn step_number(&self) -> Option<u32> {
        self.step_number
    }

    pub fn evaluation_previous_goal(&self) -> Option<&str> {
        self.evaluation_previous_goal.as_deref()
    }

    pub fn memory(&self) -> Option<&str> {
        self.memory.as_deref()
    }

    pub fn next_goal(&self) -> Option<&str> {
        self.next_goal.as_deref()
    }

    pub fn action_results(&self) -> Option<&str> {
        self.action_results.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn system_message(&self) -> Option<&str> {
        self.system_message.as_deref()
    }

    /// Tag name wrapping this entry: `step_{n}` or `step_unknown`.
    pub fn tag(&self) -> String {
        match self.step_number {
            Some(n) => format!("step_{n}"),
            None => "step_unknown".to_string(),
        }
    }

    /// Render the entry as a tagged block.
    pub fn render(&self) -> std::result::Result<String, fmt::Error> {
        let mut out = String::new();
        write!(out, "{self}")?;
        Ok(out)
    }

    fn write_body(&self, f: &mut impl Write) -> fmt::Result {
        if let Some(error) = non_empty(&self.error) {
            return f.write_str(error);
        }
        if let Some(system) = non_empty(&self.system_message) {
            return f.write_str(system);
        }

        let parts = [
            &self.evaluation_previous_goal,
            &self.memory,
            &self.next_goal,
            &self.action_results,
        ];
        let mut first = true;
        for part in parts.into_iter().filter_map(non_empty) {
            if !first {
                f.write_char('\n')?;
            }
            f.write_str(part)?;
            first = false;
        }
        Ok(())
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag();
        writeln!(f, "<{tag}>")?;
        self.write_body(f)?;
        write!(f, "\n</{tag}>")
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

// ── Builder ────────────────────────────────────────────────────────

/// Builder for [`HistoryEntry`]. [`build`](Self::build) enforces that error
/// and system marker are not both set.
#[derive(Debug, Default, Clone)]
pub struct HistoryEntryBuilder {
    step_number: Option<u32>,
    evaluation_previous_goal: Option<String>,
    memory: Option<String>,
    next_goal: Option<String>,
    action_results: Option<String>,
    error: Option<String>,
    system_message: Option<String>,
}

impl HistoryEntryBuilder {
    pub fn step(mut self, n: u32) -> Self {
        self.step_number = Some(n);
        self
    }

    pub fn evaluation(mut self, text: impl Into<String>) -> Self {
        self.evaluation_previous_goal = Some(text.into());
        self
    }

    pub fn memory(mut self, text: impl Into<String>) -> Self {
        self.memory = Some(text.into());
        self
    }

    pub fn next_goal(mut self, text: impl Into<String>) -> Self {
        self.next_goal = Some(text.into());
        self
    }

    pub fn action_results(mut self, text: impl Into<String>) -> Self {
        self.action_results = Some(text.into());
        self
    }

    pub fn error(mut self, text: impl Into<String>) -> Self {
        self.error = Some(text.into());
        self
    }

    pub fn system_message(mut self, text: impl Into<String>) -> Self {
        self.system_message = Some(text.into());
        self
    }

    pub fn build(self) -> Result<HistoryEntry> {
        if self.error.is_some() && self.system_message.is_some() {
            return Err(ContextError::ConflictingEntry {
                step: self.step_number,
            });
        }
        Ok(HistoryEntry {
            step_number: self.step_number,
            evaluation_previous_goal: self.evaluation_previous_goal,
            memory: self.memory,
            next_goal: self.next_goal,
            action_results: self.action_results,
            error: self.error,
            system_message: self.system_message,
        })
    }
}

/// Unvalidated wire form; deserialization goes through the builder.
#[derive(Deserialize)]
struct RawHistoryEntry {
    #[serde(default)]
    step_number: Option<u32>,
    #[serde(default)]
    evaluation_previous_goal: Option<String>,
    #[serde(default)]
    memory: Option<String>,
    #[serde(default)]
    next_goal: Option<String>,
    #[serde(default)]
    action_results: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    system_message: Option<String>,
}

impl TryFrom<RawHistoryEntry> for HistoryEntry {
    type Error = ContextError;

    fn try_from(raw: RawHistoryEntry) -> Result<Self> {
        HistoryEntryBuilder {
            step_number: raw.step_number,
            evaluation_previous_goal: raw.evaluation_previous_goal,
            memory: raw.memory,
            next_goal: raw.next_goal,
            action_results: raw.action_results,
            error: raw.error,
            system_message: raw.system_message,
        }
        .build()
    }
}
