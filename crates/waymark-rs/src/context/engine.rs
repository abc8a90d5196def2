//! The per-step context engine.
//!
//! [`ContextEngine`] owns the task text, the [`HistoryLedger`], the
//! [`MessageSlots`], and the active redaction configuration. Each step, the
//! agent loop hands it the fresh environment snapshot together with the
//! previous step's decision and results via [`StepInput`]; the engine folds
//! the outcome into the ledger, rebuilds the state message, redacts it, and
//! returns the ordered `[system, state, context...]` sequence.
//!
//! The engine is synchronous and performs no I/O. One instance serves one
//! control loop; callers serialize step calls. To abandon a step atomically,
//! take a [`snapshot`](ContextEngine::snapshot) before it and
//! [`restore`](ContextEngine::restore) afterwards.

use crate::Message;
use crate::agent::prompt::StateMessage;
use crate::agent::{ActionResult, AgentDecision, EngineConfig, StepInfo};
use crate::context::entry::HistoryEntry;
use crate::context::layout::MessageSlots;
use crate::context::ledger::HistoryLedger;
use crate::context::redaction::SensitiveData;
use crate::error::Result;
use crate::state::EnvironmentState;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

const INITIAL_REQUEST_OPEN: &str = "<initial_user_request>";
const INITIAL_REQUEST_CLOSE: &str = "</initial_user_request>";

/// Everything mutable an engine carries across steps, including the active
/// redaction configuration (a per-step override replaces it).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub task: String,
    pub ledger: HistoryLedger,
    pub slots: MessageSlots,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitive_data: Option<SensitiveData>,
    /// Disclosure text for the URL of the latest build.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sensitive_description: String,
}

/// Inputs for one [`ContextEngine::build_step_messages`] call.
#[derive(Debug, Clone, Copy)]
pub struct StepInput<'a> {
    pub state: &'a EnvironmentState,
    /// The model's decision from the previous step; `None` when its output
    /// could not be parsed (or on the very first step).
    pub decision: Option<&'a AgentDecision>,
    pub results: &'a [ActionResult],
    pub step_info: Option<StepInfo>,
    /// Replaces the active redaction configuration from this step on.
    pub sensitive_data: Option<&'a SensitiveData>,
    pub available_file_paths: &'a [String],
    pub page_actions: Option<&'a str>,
}

impl<'a> StepInput<'a> {
    pub fn new(state: &'a EnvironmentState) -> Self {
        Self {
            state,
            decision: None,
            results: &[],
            step_info: None,
            sensitive_data: None,
            available_file_paths: &[],
            page_actions: None,
        }
    }

    pub fn with_decision(mut self, decision: impl Into<Option<&'a AgentDecision>>) -> Self {
        self.decision = decision.into();
        self
    }

    pub fn with_results(mut self, results: &'a [ActionResult]) -> Self {
        self.results = results;
        self
    }

    pub fn with_step(mut self, step_info: StepInfo) -> Self {
        self.step_info = Some(step_info);
        self
    }

    pub fn with_sensitive_data(mut self, data: &'a SensitiveData) -> Self {
        self.sensitive_data = Some(data);
        self
    }

    pub fn with_file_paths(mut self, paths: &'a [String]) -> Self {
        self.available_file_paths = paths;
        self
    }

    pub fn with_page_actions(mut self, actions: &'a str) -> Self {
        self.page_actions = Some(actions);
        self
    }
}

/// Maintains the ledger and slots and assembles each step's messages.
#[derive(Debug, Clone)]
pub struct ContextEngine {
    config: EngineConfig,
    state: EngineState,
    last_input_messages: Vec<Message>,
}

impl ContextEngine {
    /// Create an engine with a seeded ledger and the system slot pinned.
    ///
    /// Fails with [`ContextError::InvalidHistoryCap`](crate::ContextError::InvalidHistoryCap)
    /// when `config.max_history_items` is `Some(n)` with `n <= 5`.
    pub fn new(task: impl Into<String>, system: Message, config: EngineConfig) -> Result<Self> {
        let ledger = HistoryLedger::new(config.max_history_items)?;
        let state = EngineState {
            task: task.into(),
            ledger,
            slots: MessageSlots::with_system(system),
            sensitive_data: None,
            sensitive_description: String::new(),
        };
        Ok(Self::with_state(state, config))
    }

    /// Resume from a previously captured [`EngineState`]. A state without a
    /// redaction configuration picks up `config.sensitive_data`.
    pub fn with_state(mut state: EngineState, config: EngineConfig) -> Self {
        if state.sensitive_data.is_none() {
            state.sensitive_data = config.sensitive_data.clone();
        }
        Self {
            config,
            state,
            last_input_messages: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn task(&self) -> &str {
        &self.state.task
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.state.ledger
    }

    pub fn slots(&self) -> &MessageSlots {
        &self.state.slots
    }

    /// The redaction configuration in force, after any override.
    pub fn sensitive_data(&self) -> Option<&SensitiveData> {
        self.state.sensitive_data.as_ref()
    }

    /// Disclosure text computed during the latest build.
    pub fn sensitive_description(&self) -> &str {
        &self.state.sensitive_description
    }

    /// The sequence returned by the latest [`get_messages`](Self::get_messages).
    pub fn last_input_messages(&self) -> &[Message] {
        &self.last_input_messages
    }

    /// Build the message sequence for the next model call.
    ///
    /// Clears step-scoped notices, records the previous step in the ledger,
    /// refreshes the disclosure for the snapshot's URL, renders and redacts
    /// the new state message, and swaps it into the state slot.
    pub fn build_step_messages(&mut self, input: StepInput<'_>) -> Vec<Message> {
        self.state.slots.clear_context();

        self.state
            .ledger
            .record(input.decision, input.results, input.step_info.as_ref());

        if let Some(data) = input.sensitive_data {
            self.state.sensitive_data = Some(data.clone());
        }
        self.state.sensitive_description = self
            .state
            .sensitive_data
            .as_ref()
            .map(|data| data.describe(Some(input.state.url.as_str())))
            .unwrap_or_default();

        let history = self.state.ledger.describe();
        let disclosure = Some(self.state.sensitive_description.as_str()).filter(|d| !d.is_empty());
        let prompt = StateMessage::new(&self.state.task, &history, input.state, &self.config)
            .with_read_state(self.state.ledger.read_state())
            .with_step_info(input.step_info.as_ref())
            .with_sensitive_description(disclosure)
            .with_file_paths(input.available_file_paths)
            .with_page_actions(input.page_actions);
        let with_image = prompt.attaches_screenshot();
        let mut message = prompt.to_message();

        redact_message(self.state.sensitive_data.as_ref(), &mut message);
        self.state.slots.replace_state(message);

        debug!(
            "Built state message for step {:?} ({} ledger entries, screenshot: {with_image})",
            input.step_info.map(|s| s.step_number),
            self.state.ledger.len()
        );

        self.get_messages().to_vec()
    }

    /// The current `[system, state, context...]` sequence. Also remembered as
    /// the last input messages.
    pub fn get_messages(&mut self) -> &[Message] {
        self.last_input_messages = self.state.slots.to_messages();
        debug!("{}", log_summary(&self.last_input_messages));
        for msg in &self.last_input_messages {
            trace!("[{}] {}", msg.role, msg.text());
        }
        &self.last_input_messages
    }

    /// Append a notice to the context slot for the current step only
    /// (retry instructions, validation errors, timeout warnings).
    pub fn add_context_message(&mut self, mut message: Message) {
        redact_message(self.state.sensitive_data.as_ref(), &mut message);
        self.state.slots.push_context(message);
    }

    /// Fold a new user instruction into the running task.
    ///
    /// The original task is wrapped in `<initial_user_request>` the first
    /// time only. The instruction is appended to the task and recorded in the
    /// ledger as a system marker.
    pub fn add_followup_task(&mut self, new_task: &str) {
        let followup = format!(
            "<follow_up_user_request> {} </follow_up_user_request>",
            new_task.trim()
        );
        if !self.state.task.contains(INITIAL_REQUEST_OPEN) {
            self.state.task = format!(
                "{INITIAL_REQUEST_OPEN}{}{INITIAL_REQUEST_CLOSE}",
                self.state.task
            );
        }
        self.state.task.push('\n');
        self.state.task.push_str(&followup);
        self.state
            .ledger
            .push(HistoryEntry::system_marker(None, followup));
        debug!("Added follow-up task ({} ledger entries)", self.state.ledger.len());
    }

    /// Capture the mutable state for a later [`restore`](Self::restore).
    pub fn snapshot(&self) -> EngineState {
        self.state.clone()
    }

    /// Replace the mutable state wholesale, redaction configuration included.
    pub fn restore(&mut self, state: EngineState) {
        debug!(
            "Restoring engine state ({} -> {} ledger entries)",
            self.state.ledger.len(),
            state.ledger.len()
        );
        self.state = state;
    }
}

fn redact_message(data: Option<&SensitiveData>, message: &mut Message) {
    let Some(data) = data else {
        return;
    };
    let redactor = data.redactor();
    if redactor.is_empty() {
        return;
    }
    message.map_text(|text| redactor.apply(text).into_owned());
}

fn log_summary(messages: &[Message]) -> String {
    let chars: usize = messages.iter().map(|m| m.text().chars().count()).sum();
    let images: usize = messages.iter().map(|m| m.images().len()).sum();
    format!(
        "LLM message list: {} messages, {chars} chars, {images} images",
        messages.len()
    )
}
