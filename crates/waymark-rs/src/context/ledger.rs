//! The execution ledger: an append-only sequence of [`HistoryEntry`] records
//! and its length-bounded rendering.
//!
//! The ledger never drops entries. A configured [`HistoryCap`] only limits
//! what [`HistoryLedger::describe`] shows: the seed entry stays visible for
//! orientation, the newest `cap - 1` entries stay visible for recency, and the
//! middle collapses into a single omission marker carrying the exact count of
//! hidden entries.

use crate::agent::{ActionResult, AgentDecision, StepInfo};
use crate::context::entry::HistoryEntry;
use crate::error::{ContextError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::{debug, warn};

/// Error recorded when a step produced no parseable decision.
pub const FORMAT_FAILURE: &str = "Agent failed to output in the right format.";

/// Errors longer than this many chars are shortened to head + tail.
pub const MAX_ERROR_CHARS: usize = 200;

/// Chars kept from each end of a shortened error.
pub const ERROR_EDGE_CHARS: usize = 100;

/// Joins the head and tail of a shortened error.
pub const ERROR_ELLIPSIS: &str = "......";

/// Line substituted for an entry that failed to render.
pub const RENDER_FALLBACK: &str = "<sys>[history entry could not be rendered]</sys>";

// ── HistoryCap ─────────────────────────────────────────────────────

/// Maximum number of ledger entries shown in the rendered description.
///
/// Must be strictly greater than [`HistoryCap::MIN_EXCLUSIVE`]: one slot is
/// reserved for the seed entry and the rest for the tail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct HistoryCap(usize);

impl HistoryCap {
    pub const MIN_EXCLUSIVE: usize = 5;

    pub fn new(cap: usize) -> Result<Self> {
        if cap > Self::MIN_EXCLUSIVE {
            Ok(Self(cap))
        } else {
            Err(ContextError::InvalidHistoryCap { cap })
        }
    }

    /// Validate an optional cap; `None` means unbounded.
    pub fn from_option(cap: Option<usize>) -> Result<Option<Self>> {
        cap.map(Self::new).transpose()
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl TryFrom<usize> for HistoryCap {
    type Error = ContextError;

    fn try_from(cap: usize) -> Result<Self> {
        Self::new(cap)
    }
}

impl From<HistoryCap> for usize {
    fn from(cap: HistoryCap) -> usize {
        cap.0
    }
}

// ── HistoryLedger ──────────────────────────────────────────────────

/// Append-only step history plus the one-shot read buffer of the current step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryLedger {
    entries: Vec<HistoryEntry>,
    #[serde(default)]
    cap: Option<HistoryCap>,
    /// One-shot content from the latest step. Rebuilt on every
    /// [`record`](Self::record), never carried into the next step.
    #[serde(default)]
    read_state: String,
}

impl HistoryLedger {
    /// Create a ledger holding only the seed entry.
    ///
    /// Fails with [`ContextError::InvalidHistoryCap`] when `max_history_items`
    /// is `Some(n)` with `n <= 5`.
    pub fn new(max_history_items: Option<usize>) -> Result<Self> {
        Ok(Self::with_cap(HistoryCap::from_option(max_history_items)?))
    }

    pub fn with_cap(cap: Option<HistoryCap>) -> Self {
        Self {
            entries: vec![HistoryEntry::seed()],
            cap,
            read_state: String::new(),
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn cap(&self) -> Option<HistoryCap> {
        self.cap
    }

    /// One-shot read content collected by the latest [`record`](Self::record).
    pub fn read_state(&self) -> &str {
        &self.read_state
    }

    /// Render the ledger, applying the omission policy when a cap is set and
    /// exceeded.
    pub fn describe(&self) -> String {
        let total = self.entries.len();
        match self.cap.map(HistoryCap::get) {
            Some(cap) if total > cap => {
                let omitted = total - cap;
                let recent = cap - 1;

                let mut blocks = Vec::with_capacity(cap + 1);
                blocks.extend(self.entries.first().map(render_or_placeholder));
                blocks.push(omission_marker(omitted));
                blocks.extend(self.entries[total - recent..].iter().map(render_or_placeholder));
                blocks.join("\n")
            }
            _ => self
                .entries
                .iter()
                .map(render_or_placeholder)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Fold one step's outcome into the ledger.
    ///
    /// Resets the read buffer, aggregates the action results, and appends at
    /// most one entry: the model's narrative when a decision is present, an
    /// initial-actions entry for step 0, or the formatting-failure marker for
    /// later steps. Returns the appended entry, if any.
    pub fn record(
        &mut self,
        decision: Option<&AgentDecision>,
        results: &[ActionResult],
        step_info: Option<&StepInfo>,
    ) -> Option<&HistoryEntry> {
        let step_number = step_info.map(|s| s.step_number);

        self.read_state.clear();
        let mut action_results = String::new();
        let mut read_idx = 0;

        for result in results {
            let extracted = result.extracted_content.as_deref().filter(|s| !s.is_empty());

            if result.include_extracted_content_only_once
                && let Some(content) = extracted
            {
                self.read_state.push_str(&format!(
                    "<read_state_{read_idx}>\n{content}\n</read_state_{read_idx}>\n"
                ));
                read_idx += 1;
                debug!("Added extracted_content to read_state: {content}");
            }

            if let Some(memory) = result.long_term_memory.as_deref().filter(|s| !s.is_empty()) {
                action_results.push_str(memory);
                action_results.push('\n');
                debug!("Added long_term_memory to action_results: {memory}");
            } else if let Some(content) = extracted
                && !result.include_extracted_content_only_once
            {
                action_results.push_str(content);
                action_results.push('\n');
                debug!("Added extracted_content to action_results: {content}");
            }

            if let Some(error) = result.error.as_deref().filter(|s| !s.is_empty()) {
                let error_text = truncate_error(error);
                action_results.push_str(&error_text);
                action_results.push('\n');
                debug!("Added error to action_results: {error_text}");
            }
        }

        self.read_state = self.read_state.trim_matches('\n').to_string();

        let action_results = (!action_results.is_empty())
            .then(|| format!("Result:\n{action_results}").trim_matches('\n').to_string());

        let entry = match (decision, step_number) {
            (Some(d), _) => Some(HistoryEntry::narrative(
                step_number,
                Some(d.evaluation_previous_goal.clone()),
                Some(d.memory.clone()),
                Some(d.next_goal.clone()),
                action_results,
            )),
            (None, Some(0)) if action_results.is_some() => Some(HistoryEntry::narrative(
                Some(0),
                None,
                None,
                None,
                action_results,
            )),
            (None, Some(n)) if n > 0 => Some(HistoryEntry::failure(Some(n), FORMAT_FAILURE)),
            _ => None,
        };

        match entry {
            Some(entry) => {
                debug!(
                    "Ledger: appended {} entry ({} total)",
                    entry.tag(),
                    self.entries.len() + 1
                );
                self.entries.push(entry);
                self.entries.last()
            }
            None => {
                debug!("Ledger: step {step_number:?} produced no entry");
                None
            }
        }
    }
}

/// The single line standing in for the hidden middle of the ledger.
pub fn omission_marker(omitted: usize) -> String {
    format!("<sys>[... {omitted} previous steps omitted...]</sys>")
}

/// Shorten an error to its first and last [`ERROR_EDGE_CHARS`] chars when it
/// exceeds [`MAX_ERROR_CHARS`].
pub fn truncate_error(error: &str) -> Cow<'_, str> {
    let len = error.chars().count();
    if len <= MAX_ERROR_CHARS {
        return Cow::Borrowed(error);
    }
    let head: String = error.chars().take(ERROR_EDGE_CHARS).collect();
    let tail: String = error.chars().skip(len - ERROR_EDGE_CHARS).collect();
    Cow::Owned(format!("{head}{ERROR_ELLIPSIS}{tail}"))
}

fn render_or_placeholder(entry: &HistoryEntry) -> String {
    entry.render().unwrap_or_else(|e| {
        warn!("Failed to render history entry {}: {e}", entry.tag());
        RENDER_FALLBACK.to_string()
    })
}
