//! Configuration for the [`ContextEngine`](crate::context::ContextEngine).
//!
//! Every field has a default, so a config can be built with builder methods
//! or deserialized from a sparse JSON object.
//!
//! # Examples
//!
//! ```
//! use waymark_rs::agent::EngineConfig;
//! use waymark_rs::VisionDetail;
//!
//! let config = EngineConfig::default()
//!     .with_max_history_items(Some(30))
//!     .with_vision(true)
//!     .with_vision_detail(VisionDetail::Low);
//! assert_eq!(config.max_clickable_elements_length, 40_000);
//! ```
//!
//! ```
//! use waymark_rs::agent::EngineConfig;
//!
//! let config: EngineConfig = serde_json::from_str(r#"{"use_vision": false}"#).unwrap();
//! assert!(!config.use_vision);
//! assert!(config.max_history_items.is_none());
//! ```

use crate::VisionDetail;
use crate::context::SensitiveData;
use serde::{Deserialize, Serialize};

/// Default char budget for the interactive-element listing.
pub const DEFAULT_MAX_ELEMENTS_LENGTH: usize = 40_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ledger entries shown to the model. `None` shows everything; otherwise
    /// must be greater than 5 (checked when the engine is built).
    pub max_history_items: Option<usize>,
    /// Attach the current screenshot to the state message.
    pub use_vision: bool,
    pub vision_detail: VisionDetail,
    /// Element attributes shown in the listing. Empty uses the built-in set.
    pub include_attributes: Vec<String>,
    /// Char budget for the element listing.
    pub max_clickable_elements_length: usize,
    pub include_recent_events: bool,
    /// Initial secrets to redact from outbound text. A step override replaces
    /// them inside the engine state, not here.
    pub sensitive_data: Option<SensitiveData>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_history_items: None,
            use_vision: true,
            vision_detail: VisionDetail::Auto,
            include_attributes: Vec::new(),
            max_clickable_elements_length: DEFAULT_MAX_ELEMENTS_LENGTH,
            include_recent_events: false,
            sensitive_data: None,
        }
    }
}

impl EngineConfig {
    pub fn with_max_history_items(mut self, max: Option<usize>) -> Self {
        self.max_history_items = max;
        self
    }

    pub fn with_vision(mut self, use_vision: bool) -> Self {
        self.use_vision = use_vision;
        self
    }

    pub fn with_vision_detail(mut self, detail: VisionDetail) -> Self {
        self.vision_detail = detail;
        self
    }

    pub fn with_include_attributes(mut self, attributes: Vec<String>) -> Self {
        self.include_attributes = attributes;
        self
    }

    pub fn with_max_clickable_elements_length(mut self, max: usize) -> Self {
        self.max_clickable_elements_length = max;
        self
    }

    pub fn with_recent_events(mut self, include: bool) -> Self {
        self.include_recent_events = include;
        self
    }

    /// Set the redaction configuration. An empty map is stored as `None`.
    pub fn with_sensitive_data(mut self, data: SensitiveData) -> Self {
        self.sensitive_data = (!data.is_empty()).then_some(data);
        self
    }
}
