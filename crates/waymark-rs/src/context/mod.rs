//! Context maintenance: the execution ledger, message slots, redaction, and
//! the engine that ties them together.
//!
//! The model sees the same three-part request on every step:
//!
//! 1. **[`layout`]**: [`MessageSlots`] holds the pinned system prompt, the
//!    current-state message, and step-scoped notices, emitted in that order.
//!
//! 2. **[`ledger`]**: [`HistoryLedger`] accumulates one [`HistoryEntry`]
//!    per step and renders a bounded view: the seed entry, an omission
//!    marker, and the freshest tail.
//!
//! 3. **[`redaction`]**: [`SensitiveData`] swaps secret values for
//!    `<secret>key</secret>` placeholders before text leaves the process.
//!
//! 4. **[`engine`]**: [`ContextEngine`] runs the per-step build: record the
//!    previous outcome, render the state message, redact, and return the
//!    ordered sequence.

pub mod engine;
pub mod entry;
pub mod layout;
pub mod ledger;
pub mod redaction;

// Re-export commonly used items at the module level.
pub use engine::{ContextEngine, EngineState, StepInput};
pub use entry::{HistoryEntry, HistoryEntryBuilder};
pub use layout::MessageSlots;
pub use ledger::{HistoryCap, HistoryLedger};
pub use redaction::{SensitiveData, SensitiveValue};
