//! Three-slot message layout.
//!
//! Structures every model request as three slots, always emitted in this
//! order:
//! 1. **System**: the system prompt. Set once at construction, never
//!    replaced. Serves as prompt cache anchor.
//! 2. **State**: a single user message carrying the task, the bounded
//!    ledger, and the live environment snapshot. Replaced wholesale each step.
//! 3. **Context**: transient notices for the current step only (retry
//!    instructions, validation errors, timeout warnings). Cleared at the start
//!    of every build cycle.
//!
//! Absent slots are skipped, never rendered as empty placeholders.

use crate::Message;
use serde::{Deserialize, Serialize};

/// Ordered container for the system, state, and context slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageSlots {
    /// System prompt. Assigned once, never modified.
    system: Option<Message>,

    /// Current-state message for this step.
    state: Option<Message>,

    /// Step-scoped notices, in insertion order.
    #[serde(default)]
    context: Vec<Message>,
}

impl MessageSlots {
    /// Create slots with the system prompt pinned.
    pub fn with_system(system: Message) -> Self {
        Self {
            system: Some(system),
            ..Self::default()
        }
    }

    /// Replace the state slot, returning the previous state message.
    pub fn replace_state(&mut self, msg: Message) -> Option<Message> {
        self.state.replace(msg)
    }

    /// Append a step-scoped notice to the context slot.
    pub fn push_context(&mut self, msg: Message) {
        self.context.push(msg);
    }

    /// Drop all context notices. Called at the start of every build cycle.
    pub fn clear_context(&mut self) {
        self.context.clear();
    }

    /// Build the complete message list for a model request:
    /// `[system?, state?, ...context]`.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut msgs = Vec::with_capacity(self.len());
        msgs.extend(self.system.iter().cloned());
        msgs.extend(self.state.iter().cloned());
        msgs.extend(self.context.iter().cloned());
        msgs
    }

    pub fn system(&self) -> Option<&Message> {
        self.system.as_ref()
    }

    pub fn state(&self) -> Option<&Message> {
        self.state.as_ref()
    }

    pub fn context(&self) -> &[Message] {
        &self.context
    }

    /// Number of messages [`to_messages`](Self::to_messages) would return.
    pub fn len(&self) -> usize {
        usize::from(self.system.is_some()) + usize::from(self.state.is_some()) + self.context.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageRole;
    use proptest::prelude::*;

    #[test]
    fn new_slots_empty() {
        let slots = MessageSlots::default();
        assert!(slots.is_empty());
        assert!(slots.to_messages().is_empty());
    }

    #[test]
    fn renders_system_state_context_in_order() {
        let mut slots = MessageSlots::with_system(Message::system("sys"));
        slots.push_context(Message::user("retry notice"));
        slots.replace_state(Message::user("state 1"));
        slots.push_context(Message::user("timeout notice"));

        let texts: Vec<String> = slots.to_messages().iter().map(Message::text).collect();
        assert_eq!(texts, ["sys", "state 1", "retry notice", "timeout notice"]);
    }

    #[test]
    fn replace_state_swaps_wholesale() {
        let mut slots = MessageSlots::with_system(Message::system("sys"));
        assert!(slots.replace_state(Message::user("one")).is_none());
        let previous = slots.replace_state(Message::user("two"));
        assert_eq!(previous.map(|m| m.text()).as_deref(), Some("one"));
        assert_eq!(slots.len(), 2);
        assert_eq!(slots.state().map(Message::text).as_deref(), Some("two"));
    }

    #[test]
    fn clear_context_keeps_other_slots() {
        let mut slots = MessageSlots::with_system(Message::system("sys"));
        slots.replace_state(Message::user("state"));
        slots.push_context(Message::user("notice"));
        slots.clear_context();
        assert_eq!(slots.len(), 2);
        assert!(slots.context().is_empty());
    }

    proptest! {
        #[test]
        fn ordering_holds_for_any_slot_combination(
            has_system in any::<bool>(),
            has_state in any::<bool>(),
            context_count in 0usize..6,
        ) {
            let mut slots = if has_system {
                MessageSlots::with_system(Message::system("sys"))
            } else {
                MessageSlots::default()
            };
            if has_state {
                slots.replace_state(Message::user("state"));
            }
            for i in 0..context_count {
                slots.push_context(Message::assistant_text(format!("ctx {i}")));
            }

            let msgs = slots.to_messages();
            prop_assert_eq!(msgs.len(), usize::from(has_system) + usize::from(has_state) + context_count);
            prop_assert_eq!(msgs.len(), slots.len());

            let mut idx = 0;
            if has_system {
                prop_assert_eq!(&msgs[idx].role, &MessageRole::System);
                idx += 1;
            }
            if has_state {
                prop_assert_eq!(msgs[idx].text(), "state");
                idx += 1;
            }
            for i in 0..context_count {
                prop_assert_eq!(msgs[idx + i].text(), format!("ctx {i}"));
            }
        }
    }
}
