//! Secret redaction for outbound model text.
//!
//! Operators register secrets under placeholder keys. Before any text reaches
//! the model, every literal occurrence of a configured secret value is replaced
//! with `<secret>{key}</secret>`. The model only ever learns the keys, via the
//! disclosure text produced by [`SensitiveData::describe`].
//!
//! Two configuration shapes are accepted, mirroring the JSON operators write:
//!
//! ```json
//! {
//!   "otp_seed": "JBSWY3DP",
//!   "https://*.bank.example": { "bank_user": "alice", "bank_pass": "hunter2" }
//! }
//! ```
//!
//! Every non-empty value is redacted on every page, whatever its scope: text
//! recorded on one site is re-sent on later steps from other sites. The
//! domain pattern of a scoped entry only decides whether its keys are
//! disclosed to the model on the current URL. Values are applied in
//! configuration order, so list more specific values before values they
//! contain.

use crate::state::is_new_tab_page;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use tracing::{trace, warn};
use url::Url;

/// A configured secret: either global or scoped to a domain pattern.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensitiveValue {
    /// Legacy form: one secret that applies everywhere.
    Plain(String),
    /// Placeholder key → secret, only on URLs matching the outer pattern.
    Scoped(IndexMap<String, String>),
}

/// Ordered redaction configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensitiveData(IndexMap<String, SensitiveValue>);

impl SensitiveData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret that applies on every page.
    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), SensitiveValue::Plain(value.into()));
        self
    }

    /// Register a secret whose key is only offered on URLs matching
    /// `domain_pattern`.
    pub fn with_scoped_secret(
        mut self,
        domain_pattern: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let slot = self
            .0
            .entry(domain_pattern.into())
            .or_insert_with(|| SensitiveValue::Scoped(IndexMap::new()));
        match slot {
            SensitiveValue::Scoped(map) => {
                map.insert(key.into(), value.into());
            }
            SensitiveValue::Plain(_) => {
                *slot = SensitiveValue::Scoped(IndexMap::from([(key.into(), value.into())]));
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Placeholder keys the model may cite on `current_url`, sorted.
    pub fn placeholders(&self, current_url: Option<&str>) -> BTreeSet<&str> {
        let mut keys = BTreeSet::new();
        for (key_or_pattern, value) in &self.0 {
            match value {
                SensitiveValue::Plain(_) => {
                    keys.insert(key_or_pattern.as_str());
                }
                SensitiveValue::Scoped(map) => {
                    if current_url
                        .is_some_and(|url| match_url_with_domain_pattern(url, key_or_pattern))
                    {
                        keys.extend(map.keys().map(String::as_str));
                    }
                }
            }
        }
        keys
    }

    /// Disclosure text listing the available placeholder keys (never values)
    /// and how to reference them. Empty when no keys are available.
    pub fn describe(&self, current_url: Option<&str>) -> String {
        let placeholders = self.placeholders(current_url);
        if placeholders.is_empty() {
            return String::new();
        }
        let list = placeholders
            .iter()
            .map(|k| format!("'{k}'"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Here are placeholders for sensitive data:\n[{list}]\n\
             To use them, write <secret>the placeholder name</secret>"
        )
    }

    /// Collect every configured `(key, value)` pair, plain and scoped alike,
    /// in configuration order, skipping empty values.
    pub fn redactor(&self) -> Redactor<'_> {
        let mut pairs = Vec::new();
        for (key_or_pattern, value) in &self.0 {
            match value {
                SensitiveValue::Plain(secret) => {
                    if !secret.is_empty() {
                        pairs.push((key_or_pattern.as_str(), secret.as_str()));
                    }
                }
                SensitiveValue::Scoped(map) => pairs.extend(
                    map.iter()
                        .filter(|(_, v)| !v.is_empty())
                        .map(|(k, v)| (k.as_str(), v.as_str())),
                ),
            }
        }
        if pairs.is_empty() && !self.is_empty() {
            warn!("No valid entries found in sensitive_data");
        }
        Redactor { pairs }
    }

    /// One-off convenience for [`redactor`](Self::redactor) + [`Redactor::apply`].
    pub fn redact<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.redactor().apply(text)
    }
}

/// The configured secrets, ready to apply to many texts.
#[derive(Debug, Clone)]
pub struct Redactor<'a> {
    pairs: Vec<(&'a str, &'a str)>,
}

impl Redactor<'_> {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Replace every configured secret value with its placeholder tag.
    /// Returns the input unchanged (borrowed) when nothing matches.
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        let mut out = Cow::Borrowed(text);
        for (key, secret) in &self.pairs {
            if out.contains(secret) {
                out = Cow::Owned(out.replace(secret, &placeholder_tag(key)));
                trace!("Redacted value for placeholder '{key}'");
            }
        }
        out
    }
}

/// The tag substituted for a secret registered under `key`.
pub fn placeholder_tag(key: &str) -> String {
    format!("<secret>{key}</secret>")
}

// ── Domain patterns ────────────────────────────────────────────────

/// Check whether `url` matches a domain pattern.
///
/// - A pattern without a scheme defaults to `https`. The scheme part may be a
///   glob (`http*://example.com`).
/// - `*` matches any host. `*.example.com` matches `example.com` and every
///   subdomain of it.
/// - Ports and paths in the pattern are ignored.
/// - New-tab pages and URLs without a host never match.
/// - Overly broad patterns (wildcard TLDs, several wildcards) never match.
pub fn match_url_with_domain_pattern(url: &str, domain_pattern: &str) -> bool {
    if is_new_tab_page(url) {
        return false;
    }
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let scheme = parsed.scheme().to_ascii_lowercase();
    let Some(host) = parsed.host_str().map(str::to_ascii_lowercase) else {
        return false;
    };

    let pattern = domain_pattern.to_ascii_lowercase();
    let (pattern_scheme, rest) = pattern.split_once("://").unwrap_or(("https", pattern.as_str()));
    let rest = rest.split('/').next().unwrap_or(rest);
    let pattern_domain = match rest.split_once(':') {
        Some((domain, _port)) if !domain.is_empty() => domain,
        _ => rest,
    };

    if !glob_matches(pattern_scheme, &scheme) {
        return false;
    }
    if pattern_domain == "*" || host == pattern_domain {
        return true;
    }
    if !pattern_domain.contains('*') {
        return false;
    }

    if pattern_domain.matches("*.").count() > 1 || pattern_domain.matches(".*").count() > 1 {
        warn!("Multiple wildcards in domain pattern '{domain_pattern}' are not supported");
        return false;
    }
    if pattern_domain.ends_with(".*") {
        warn!("Wildcard TLDs in domain pattern '{domain_pattern}' are not supported");
        return false;
    }
    if pattern_domain.replace("*.", "").contains('*') {
        warn!("Embedded wildcards in domain pattern '{domain_pattern}' are not supported");
        return false;
    }

    match pattern_domain.strip_prefix("*.") {
        Some(parent) => host == parent || host.ends_with(&format!(".{parent}")),
        None => false,
    }
}

fn glob_matches(pattern: &str, text: &str) -> bool {
    glob::Pattern::new(pattern).is_ok_and(|p| p.matches(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bank_data() -> SensitiveData {
        SensitiveData::new()
            .with_secret("api_key", "sk-123456")
            .with_scoped_secret("https://*.bank.example", "bank_user", "alice")
            .with_scoped_secret("https://*.bank.example", "bank_pass", "hunter2")
    }

    #[test]
    fn domain_patterns() {
        assert!(match_url_with_domain_pattern("https://example.com/a", "example.com"));
        assert!(match_url_with_domain_pattern("https://example.com:8443/", "example.com:443"));
        assert!(!match_url_with_domain_pattern("http://example.com", "example.com"));
        assert!(match_url_with_domain_pattern("http://example.com", "http*://example.com"));
        assert!(match_url_with_domain_pattern("https://a.b.example.com", "*.example.com"));
        assert!(match_url_with_domain_pattern("https://example.com", "*.example.com"));
        assert!(!match_url_with_domain_pattern("https://notexample.com", "*.example.com"));
        assert!(!match_url_with_domain_pattern("https://sub.example.com", "example.com"));
        assert!(match_url_with_domain_pattern("https://anything.org", "*"));
    }

    #[test]
    fn unsafe_and_degenerate_patterns_never_match() {
        assert!(!match_url_with_domain_pattern("https://example.com", "example.*"));
        assert!(!match_url_with_domain_pattern("https://a.b.example.com", "*.*.example.com"));
        assert!(!match_url_with_domain_pattern("https://exaample.com", "exa*mple.com"));
        assert!(!match_url_with_domain_pattern("about:blank", "*"));
        assert!(!match_url_with_domain_pattern("not a url", "*"));
    }

    #[test]
    fn scoped_secrets_are_redacted_on_every_page() {
        let data = bank_data();
        let redacted = data.redact("login alice / hunter2 with sk-123456");
        assert_eq!(
            redacted,
            "login <secret>bank_user</secret> / <secret>bank_pass</secret> with <secret>api_key</secret>"
        );

        // Off-domain the keys are not offered, but values are still hidden.
        assert!(data.describe(Some("https://news.example/")).contains("['api_key']"));
        assert!(!data.describe(Some("https://news.example/")).contains("bank_pass"));
    }

    #[test]
    fn no_match_returns_borrowed_input() {
        let data = bank_data();
        let out = data.redact("nothing secret here");
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn empty_values_are_skipped() {
        let data = SensitiveData::new().with_secret("blank", "");
        let redactor = data.redactor();
        assert!(redactor.is_empty());
        assert_eq!(redactor.apply("a b c"), "a b c");
    }

    #[test]
    fn configuration_order_decides_overlaps() {
        let specific_first = SensitiveData::new()
            .with_secret("full", "hunter22")
            .with_secret("short", "hunter");
        assert_eq!(
            specific_first.redact("pw hunter22"),
            "pw <secret>full</secret>"
        );

        let general_first = SensitiveData::new()
            .with_secret("short", "hunter")
            .with_secret("full", "hunter22");
        assert_eq!(
            general_first.redact("pw hunter22"),
            "pw <secret>short</secret>22"
        );
    }

    #[test]
    fn disclosure_lists_sorted_keys_never_values() {
        let data = bank_data();
        let text = data.describe(Some("https://bank.example/"));
        assert!(text.contains("['api_key', 'bank_pass', 'bank_user']"));
        assert!(text.contains("<secret>the placeholder name</secret>"));
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("alice"));

        let elsewhere = data.describe(Some("https://other.example/"));
        assert!(elsewhere.contains("['api_key']"));

        assert_eq!(SensitiveData::new().describe(None), "");
    }

    #[test]
    fn deserializes_both_shapes_in_order() {
        let json = r#"{
            "otp": "123456",
            "https://*.bank.example": {"bank_user": "alice"}
        }"#;
        let data: SensitiveData = serde_json::from_str(json).unwrap();
        assert_eq!(
            data,
            SensitiveData::new()
                .with_secret("otp", "123456")
                .with_scoped_secret("https://*.bank.example", "bank_user", "alice")
        );
    }

    proptest! {
        #[test]
        fn every_occurrence_is_replaced(
            secret in "[A-Z]{6,12}",
            fillers in proptest::collection::vec("[0-9 ]{0,8}", 1..8),
        ) {
            let mut text = String::new();
            for filler in &fillers {
                text.push_str(filler);
                text.push_str(&secret);
            }
            let occurrences = fillers.len();

            let data = SensitiveData::new().with_secret("pw", secret.clone());
            let out = data.redact(&text);

            prop_assert!(!out.contains(&secret));
            prop_assert_eq!(out.matches("<secret>pw</secret>").count(), occurrences);
        }
    }
}
