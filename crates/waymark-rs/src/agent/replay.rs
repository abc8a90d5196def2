//! Offline replay of a recorded agent session.
//!
//! A [`Transcript`] is a JSON file holding the task, the engine settings, and
//! for each step the environment snapshot the agent observed plus the
//! decision and results that led to it. Replaying it through a fresh
//! [`ContextEngine`] reproduces the exact message sequences the model would
//! have been sent, which makes prompt regressions reviewable without a
//! browser or a model.
//!
//! ```json
//! {
//!   "task": "Find the cheapest kettle",
//!   "config": {"max_history_items": 10},
//!   "steps": [
//!     {"state": {"url": "https://shop.example", "title": "Shop"}},
//!     {
//!       "state": {"url": "https://shop.example/kettles", "title": "Kettles"},
//!       "raw_output": "{\"evaluation_previous_goal\": \"ok\", \"memory\": \"\", \"next_goal\": \"sort\"}",
//!       "results": [{"extracted_content": "Clicked Kettles"}]
//!     }
//!   ]
//! }
//! ```

use crate::Message;
use crate::agent::{ActionResult, AgentDecision, EngineConfig, StepInfo, SystemPrompt};
use crate::context::{ContextEngine, SensitiveData, StepInput};
use crate::error::Result;
use crate::state::EnvironmentState;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

const DEFAULT_MAX_STEPS: u32 = 100;

fn default_max_steps() -> u32 {
    DEFAULT_MAX_STEPS
}

/// A recorded session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub task: String,
    #[serde(default)]
    pub system: SystemPrompt,
    #[serde(default)]
    pub config: EngineConfig,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default)]
    pub steps: Vec<TranscriptStep>,
}

/// One recorded step. `decision`/`raw_output` and `results` describe the
/// previous step, whose actions produced `state`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptStep {
    pub state: EnvironmentState,
    /// Already-parsed decision. Takes precedence over `raw_output`.
    pub decision: Option<AgentDecision>,
    /// The model's verbatim reply, parsed and schema-checked during replay.
    pub raw_output: Option<String>,
    pub results: Vec<ActionResult>,
    /// New user instruction received before this step.
    pub followup: Option<String>,
    /// Notices added to the context slot after the state is built.
    pub context: Vec<String>,
    pub sensitive_data: Option<SensitiveData>,
    pub available_file_paths: Vec<String>,
    pub page_actions: Option<String>,
}

impl TranscriptStep {
    /// The decision for this step, plus a notice for the model when the raw
    /// output failed to parse.
    fn resolve_decision(&self, step: usize) -> (Option<AgentDecision>, Option<String>) {
        if let Some(decision) = &self.decision {
            return (Some(decision.clone()), None);
        }
        match self.raw_output.as_deref().map(AgentDecision::parse) {
            Some(Ok(decision)) => (Some(decision), None),
            Some(Err(e)) => {
                warn!("Step {step}: model output rejected: {e}");
                (None, Some(format!("Your previous output could not be used: {e}")))
            }
            None => (None, None),
        }
    }
}

impl Transcript {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Build the engine this transcript starts from.
    pub fn engine(&self) -> Result<ContextEngine> {
        ContextEngine::new(self.task.clone(), self.system.build(), self.config.clone())
    }

    /// Run every step and return the message sequence sent at each one.
    pub fn replay(&self) -> Result<Vec<Vec<Message>>> {
        let mut engine = self.engine()?;
        let mut turns = Vec::with_capacity(self.steps.len());

        for (i, step) in self.steps.iter().enumerate() {
            if let Some(followup) = step.followup.as_deref() {
                engine.add_followup_task(followup);
            }

            let (decision, notice) = step.resolve_decision(i);
            let step_number = u32::try_from(i).unwrap_or(u32::MAX);

            let mut input = StepInput::new(&step.state)
                .with_decision(decision.as_ref())
                .with_results(&step.results)
                .with_step(StepInfo::new(step_number, self.max_steps))
                .with_file_paths(&step.available_file_paths);
            if let Some(data) = &step.sensitive_data {
                input = input.with_sensitive_data(data);
            }
            if let Some(actions) = step.page_actions.as_deref() {
                input = input.with_page_actions(actions);
            }
            engine.build_step_messages(input);

            for text in notice.iter().chain(&step.context) {
                engine.add_context_message(Message::user(text.as_str()));
            }
            turns.push(engine.get_messages().to_vec());
        }

        debug!(
            "Replayed {} steps, final ledger has {} entries",
            self.steps.len(),
            engine.ledger().len()
        );
        Ok(turns)
    }
}
