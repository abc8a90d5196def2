//! Agent-facing types around the context engine.
//!
//! - [`output`]: [`AgentDecision`] (the model's structured reply, parsed and
//!   schema-checked), [`ActionResult`], and [`StepInfo`].
//! - [`config`]: [`EngineConfig`] with defaults and builder methods.
//! - [`prompt`]: [`SystemPrompt`] for the system slot and the
//!   [`StateMessage`](prompt::StateMessage) renderer for the state slot.
//! - [`replay`]: [`Transcript`] for re-running a recorded session offline.

pub mod config;
pub mod output;
pub mod prompt;
pub mod replay;

pub use config::EngineConfig;
pub use output::{ActionResult, AgentDecision, StepInfo};
pub use prompt::SystemPrompt;
pub use replay::Transcript;
