//! Convenience re-exports for common `waymark-rs` types.
//!
//! Meant to be glob-imported by agent step loops:
//!
//! ```ignore
//! use waymark_rs::prelude::*;
//! ```
//!
//! Lower-level pieces (domain-pattern matching, tagged section builder,
//! transcript replay) are left out. Import those from their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{
    ContentPart, ContextError, Message, MessageContent, MessageRole, VisionDetail,
    json_schema_for,
};

// ── Context engine ──────────────────────────────────────────────────
pub use crate::context::{
    ContextEngine, EngineState, HistoryCap, HistoryEntry, HistoryLedger, MessageSlots,
    SensitiveData, SensitiveValue, StepInput,
};

// ── Agent-facing types ──────────────────────────────────────────────
pub use crate::agent::{ActionResult, AgentDecision, EngineConfig, StepInfo, SystemPrompt};

// ── Environment snapshot ────────────────────────────────────────────
pub use crate::state::{EnvironmentState, InteractiveElement, PageInfo, TabInfo};
