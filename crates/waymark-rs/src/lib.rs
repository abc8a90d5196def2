//! Bounded, ordered conversational context for long-running LLM agents.
//!
//! `waymark-rs` maintains everything an agent sends to its model on each
//! step. The core abstraction is the [`ContextEngine`](context::ContextEngine).
//! It owns a growing execution ledger, three fixed message slots, and the
//! redaction configuration, and turns the latest environment snapshot plus the
//! previous step's outcome into a single ordered message sequence.
//!
//! # Getting started
//!
//! ```
//! use waymark_rs::prelude::*;
//!
//! let system = SystemPrompt::new().build();
//! let config = EngineConfig::default().with_max_history_items(Some(20));
//! let mut engine = ContextEngine::new("Find the cheapest flight to Lisbon", system, config)?;
//!
//! let state = EnvironmentState::new("https://flights.example.com", "Flights");
//! let messages = engine.build_step_messages(StepInput::new(&state).with_step(StepInfo::new(0, 50)));
//!
//! assert_eq!(messages.len(), 2); // system + current state
//! # Ok::<(), waymark_rs::ContextError>(())
//! ```
//!
//! # Where to find things
//!
//! - **Per-step message assembly:** [`ContextEngine`](context::ContextEngine).
//!   and [`StepInput`](context::StepInput).
//! - **Execution history:** [`HistoryEntry`](context::HistoryEntry) and the
//!   capped rendering in [`HistoryLedger`](context::HistoryLedger).
//! - **Slot ordering:** [`MessageSlots`](context::MessageSlots).
//! - **Secrets:** [`SensitiveData`](context::SensitiveData) and
//!   [`match_url_with_domain_pattern`](context::redaction::match_url_with_domain_pattern).
//! - **Model-facing types:** [`AgentDecision`](agent::AgentDecision),
//!   [`ActionResult`](agent::ActionResult), and the
//!   [`EnvironmentState`](state::EnvironmentState) snapshot.
//! - **Logging:** [`LoggingConfig`](logging::LoggingConfig), installed once by
//!   the binary. The library only emits `tracing` events.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`context`] | Ledger, slots, redaction, and the engine that ties them together |
//! | [`agent`] | Decision/outcome types, engine config, prompt assembly, transcript replay |
//! | [`state`] | Environment snapshot consumed from the automation layer |
//! | [`logging`] | Explicit logging sink configuration |

pub mod agent;
pub mod context;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod state;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use error::{ContextError, Result};

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`.
///
/// Used to describe (and validate) the decision object the model must emit
/// on every step.
///
/// # Example
///
/// ```
/// use waymark_rs::json_schema_for;
/// use waymark_rs::agent::AgentDecision;
///
/// let schema = json_schema_for::<AgentDecision>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"next_goal".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Image detail level requested from vision-capable models.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VisionDetail {
    #[default]
    Auto,
    Low,
    High,
}

/// An image reference inside a multimodal message.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ImageUrl {
    /// `data:` URL or remote URL.
    pub url: String,
    #[serde(default)]
    pub detail: VisionDetail,
    pub media_type: String,
}

/// One part of a multimodal message body.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// A base64-encoded PNG screenshot.
    pub fn png(base64: &str, detail: VisionDetail) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:image/png;base64,{base64}"),
                detail,
                media_type: "image/png".to_string(),
            },
        }
    }
}

/// Message body: plain text or an ordered list of parts.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A role-tagged message, ready to submit to a completion call.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: MessageContent,
    /// Hint for providers that support prompt caching.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cache: bool,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: MessageContent::Text(content.into()),
            cache: true,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(content.into()),
            cache: false,
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Parts(parts),
            cache: false,
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(content.into()),
            cache: false,
        }
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// All text in the message, parts joined by newlines. Images are skipped.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Image parts attached to the message.
    pub fn images(&self) -> Vec<&ImageUrl> {
        match &self.content {
            MessageContent::Text(_) => Vec::new(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::ImageUrl { image_url } => Some(image_url),
                    ContentPart::Text { .. } => None,
                })
                .collect(),
        }
    }

    /// Rewrite every text part in place. Image parts are left untouched.
    pub fn map_text(&mut self, mut f: impl FnMut(&str) -> String) {
        match &mut self.content {
            MessageContent::Text(t) => *t = f(t),
            MessageContent::Parts(parts) => {
                for part in parts.iter_mut() {
                    if let ContentPart::Text { text } = part {
                        *text = f(text);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.text(), "hello");
        assert!(sys.cache);

        let user = Message::user("world");
        assert_eq!(user.role, MessageRole::User);
        assert!(!user.cache);

        let assist = Message::assistant_text("prefill");
        assert_eq!(assist.role, MessageRole::Assistant);
        assert_eq!(assist.text(), "prefill");
    }

    #[test]
    fn parts_text_skips_images() {
        let msg = Message::user_parts(vec![
            ContentPart::text("state"),
            ContentPart::text("Current screenshot:"),
            ContentPart::png("AAAA", VisionDetail::Low),
        ]);
        assert_eq!(msg.text(), "state\nCurrent screenshot:");
        let images = msg.images();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].url, "data:image/png;base64,AAAA");
        assert_eq!(images[0].detail, VisionDetail::Low);
    }

    #[test]
    fn map_text_leaves_images_alone() {
        let mut msg = Message::user_parts(vec![
            ContentPart::text("pw=hunter2"),
            ContentPart::png("hunter2", VisionDetail::Auto),
        ]);
        msg.map_text(|t| t.replace("hunter2", "***"));
        assert_eq!(msg.text(), "pw=***");
        assert_eq!(msg.images()[0].url, "data:image/png;base64,hunter2");
    }

    #[test]
    fn serializes_role_tagged_content() {
        let msg = Message::user_parts(vec![ContentPart::text("hi")]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["type"], "text");
        assert!(json.get("cache").is_none());

        let sys = serde_json::to_value(Message::system("s")).unwrap();
        assert_eq!(sys["content"], "s");
        assert_eq!(sys["cache"], true);
    }
}
