//! Logging sink configuration.
//!
//! The library only emits `tracing` events. A binary builds one
//! [`LoggingConfig`] at startup and calls [`LoggingConfig::init`] once; nothing
//! else installs or mutates the global subscriber.
//!
//! [`CapturedLogs`] is an in-memory sink that can be installed next to the
//! formatter (or alone, in tests) to inspect what was logged.

use crate::error::{ContextError, Result};
use std::sync::{Arc, Mutex};
use tracing::{Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// Output format of the stderr formatter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

/// Explicit logging setup, installed once per process.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `warn` or `waymark_rs=debug`.
    pub filter: String,
    pub format: LogFormat,
    pub ansi: bool,
    /// Also record events into this buffer.
    pub capture: Option<CapturedLogs>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
            format: LogFormat::default(),
            ansi: true,
            capture: None,
        }
    }
}

impl LoggingConfig {
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    pub fn with_capture(mut self, capture: CapturedLogs) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.filter)
            .map_err(|e| ContextError::Logging(format!("invalid filter '{}': {e}", self.filter)))
    }

    /// Install the global subscriber: filter, stderr formatter, and the
    /// optional capture layer. Fails if a global subscriber already exists.
    pub fn init(&self) -> Result<()> {
        let registry = tracing_subscriber::registry()
            .with(self.env_filter()?)
            .with(self.capture.as_ref().map(CapturedLogs::layer));

        let fmt = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(self.ansi);
        let result = match self.format {
            LogFormat::Pretty => registry.with(fmt.pretty()).try_init(),
            LogFormat::Compact => registry.with(fmt.compact()).try_init(),
            LogFormat::Json => registry.with(fmt.json()).try_init(),
        };
        result.map_err(|e| ContextError::Logging(e.to_string()))
    }
}

// ── Capture ────────────────────────────────────────────────────────

/// One recorded event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// Shared buffer of recorded events. Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<CapturedEvent>>>);

impl CapturedLogs {
    pub fn new() -> Self {
        Self::default()
    }

    /// A layer that records into this buffer.
    pub fn layer(&self) -> CaptureLayer {
        CaptureLayer { sink: self.clone() }
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&self) -> Vec<CapturedEvent> {
        let mut events = self.0.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *events)
    }

    /// Number of recorded events at exactly `level`.
    pub fn count(&self, level: Level) -> usize {
        let events = self.0.lock().unwrap_or_else(|e| e.into_inner());
        events.iter().filter(|e| e.level == level).count()
    }

    /// Whether any event at `level` mentions `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        let events = self.0.lock().unwrap_or_else(|e| e.into_inner());
        events
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }

    fn push(&self, event: CapturedEvent) {
        if let Ok(mut events) = self.0.lock() {
            events.push(event);
        }
    }
}

/// [`Layer`] feeding a [`CapturedLogs`] buffer.
pub struct CaptureLayer {
    sink: CapturedLogs,
}

impl<S: Subscriber + for<'a> LookupSpan<'a>> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut message = visitor.message;
        if !visitor.fields.is_empty() {
            let extras: Vec<String> = visitor
                .fields
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            if message.is_empty() {
                message = extras.join(" ");
            } else {
                message = format!("{message} {{{}}}", extras.join(", "));
            }
        }

        self.sink.push(CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message,
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = rendered;
        } else {
            self.fields.push((field.name().to_string(), rendered));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SensitiveData;

    fn with_capture<T>(f: impl FnOnce() -> T) -> (T, CapturedLogs) {
        let logs = CapturedLogs::new();
        let subscriber = tracing_subscriber::registry().with(logs.layer());
        let out = tracing::subscriber::with_default(subscriber, f);
        (out, logs)
    }

    #[test]
    fn captures_message_and_fields() {
        let ((), logs) = with_capture(|| {
            tracing::warn!(step = 3, "ledger entry skipped");
            tracing::debug!("plain");
        });
        let events = logs.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].level, Level::WARN);
        assert_eq!(events[0].message, "ledger entry skipped {step=3}");
        assert_eq!(events[1].message, "plain");
        assert!(logs.drain().is_empty());
    }

    #[test]
    fn redaction_miss_is_advisory_only() {
        let data = SensitiveData::new()
            .with_secret("pin", "")
            .with_scoped_secret("bank.example", "otp", "");
        let (out, logs) = with_capture(|| data.redact("code 1234"));
        assert_eq!(out, "code 1234");
        assert_eq!(logs.count(Level::WARN), 1);
        assert!(logs.contains(Level::WARN, "No valid entries"));
        assert_eq!(logs.count(Level::ERROR), 0);
    }

    #[test]
    fn unsafe_pattern_logs_warning() {
        let data = SensitiveData::new().with_scoped_secret("https://example.*", "k", "v");
        let ((), logs) = with_capture(|| {
            data.placeholders(Some("https://example.com"));
        });
        assert!(logs.contains(Level::WARN, "Wildcard TLDs"));
    }

    #[test]
    fn rejects_invalid_filter() {
        let config = LoggingConfig::default().with_filter("waymark_rs=notalevel");
        assert!(matches!(config.env_filter(), Err(ContextError::Logging(_))));
        assert!(LoggingConfig::default().env_filter().is_ok());
    }
}
