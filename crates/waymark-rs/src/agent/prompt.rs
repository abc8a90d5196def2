//! Prompt assembly: the system slot and the per-step state message.
//!
//! [`SystemPrompt`] renders the fixed instructions placed in the system slot.
//! [`StateMessage`] renders the current-state slot body from the ledger
//! description, the read buffer, and the environment snapshot. Both are built
//! from XML-style tagged sections via [`TaggedSections`].

use crate::agent::{EngineConfig, StepInfo};
use crate::state::{EnvironmentState, is_new_tab_page};
use crate::{ContentPart, Message};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Default cap on actions per step, substituted into the system template.
pub const DEFAULT_MAX_ACTIONS: usize = 10;

/// Label preceding the attached screenshot.
pub const SCREENSHOT_LABEL: &str = "Current screenshot:";

const SYSTEM_TEMPLATE: &str = "\
You are an AI agent designed to operate in an iterative loop to automate browser tasks. \
Your ultimate goal is accomplishing the task provided in <user_request>.

<input>
At every step, your input will consist of:
1. <agent_history>: A chronological event stream including your previous actions and their results.
2. <agent_state>: Current <user_request>, <sensitive_data> placeholders, and <step_info>.
3. <browser_state>: Current URL, open tabs, and interactive elements indexed for actions.
4. <read_state>: Content you asked to read in the previous step. Shown only once.
5. Screenshot of the current viewport, when vision is enabled.
</input>

<agent_history>
Each step is wrapped in <step_{step_number}> tags with your evaluation, memory, next goal, \
and the results of the actions you took. Older steps may be omitted; a <sys> line states how many.
</agent_history>

<user_request>
The user request is the ultimate objective. A <follow_up_user_request> supersedes earlier \
instructions where they conflict; keep working toward both.
</user_request>

<sensitive_data>
Secrets are never shown to you. Where you need one, write <secret>the placeholder name</secret> \
and the value will be substituted when the action runs.
</sensitive_data>

<output>
You must respond with valid JSON in this exact format:
{
  \"thinking\": \"Structured reasoning about the current state.\",
  \"evaluation_previous_goal\": \"One-sentence verdict on your last action: success, failure, or uncertain.\",
  \"memory\": \"1-3 sentences of progress to remember.\",
  \"next_goal\": \"The next immediate goal and how to reach it, in one sentence.\",
  \"action\": [{\"action_name\": {\"parameter\": \"value\"}}]
}
The action list must contain between 1 and {max_actions} actions.
</output>";

// ── System prompt ──────────────────────────────────────────────────

/// Settings for the system-slot message.
///
/// # Example
///
/// ```
/// use waymark_rs::agent::SystemPrompt;
///
/// let text = SystemPrompt::new()
///     .with_max_actions(3)
///     .with_extend("Never submit payment forms.")
///     .render();
/// assert!(text.contains("between 1 and 3 actions"));
/// assert!(text.ends_with("\nNever submit payment forms."));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemPrompt {
    pub max_actions_per_step: usize,
    /// Replaces the built-in template entirely.
    pub override_system_message: Option<String>,
    /// Appended to the prompt on a new line.
    pub extend_system_message: Option<String>,
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self {
            max_actions_per_step: DEFAULT_MAX_ACTIONS,
            override_system_message: None,
            extend_system_message: None,
        }
    }
}

impl SystemPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_actions(mut self, max: usize) -> Self {
        self.max_actions_per_step = max;
        self
    }

    pub fn with_override(mut self, text: impl Into<String>) -> Self {
        self.override_system_message = Some(text.into());
        self
    }

    pub fn with_extend(mut self, text: impl Into<String>) -> Self {
        self.extend_system_message = Some(text.into());
        self
    }

    pub fn render(&self) -> String {
        let mut prompt = match &self.override_system_message {
            Some(text) if !text.is_empty() => text.clone(),
            _ => SYSTEM_TEMPLATE.replace("{max_actions}", &self.max_actions_per_step.to_string()),
        };
        if let Some(extra) = self.extend_system_message.as_deref().filter(|s| !s.is_empty()) {
            prompt.push('\n');
            prompt.push_str(extra);
        }
        prompt
    }

    /// The system-slot message, marked cacheable.
    pub fn build(&self) -> Message {
        Message::system(self.render())
    }
}

// ── Tagged sections ────────────────────────────────────────────────

/// Builder for `<tag>…</tag>` blocks joined by newlines.
///
/// Sections whose body is empty after trimming surrounding newlines are
/// skipped, except those added with [`section_always`](Self::section_always).
///
/// ```
/// use waymark_rs::agent::prompt::TaggedSections;
///
/// let text = TaggedSections::new()
///     .section("user_request", "Book a table")
///     .section_opt("sensitive_data", None::<String>)
///     .section("step_info", "Step 1. Maximum steps: 5")
///     .build();
/// assert_eq!(
///     text,
///     "<user_request>\nBook a table\n</user_request>\n<step_info>\nStep 1. Maximum steps: 5\n</step_info>"
/// );
/// ```
#[derive(Debug, Default, Clone)]
pub struct TaggedSections {
    blocks: Vec<String>,
}

impl TaggedSections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(self, tag: &str, content: impl AsRef<str>) -> Self {
        let body = content.as_ref().trim_matches('\n');
        if body.trim().is_empty() {
            self
        } else {
            self.section_always(tag, body)
        }
    }

    /// Append a section even when its body is empty.
    pub fn section_always(mut self, tag: &str, content: impl AsRef<str>) -> Self {
        let body = content.as_ref().trim_matches('\n');
        self.blocks.push(format!("<{tag}>\n{body}\n</{tag}>"));
        self
    }

    pub fn section_opt(self, tag: &str, content: Option<impl AsRef<str>>) -> Self {
        match content {
            Some(c) => self.section(tag, c),
            None => self,
        }
    }

    /// Insert a blank line between the previous and the next section.
    pub fn blank_line(mut self) -> Self {
        self.blocks.push(String::new());
        self
    }

    pub fn build(self) -> String {
        self.blocks.join("\n")
    }
}

// ── State message ──────────────────────────────────────────────────

/// Everything that goes into one step's current-state message.
#[derive(Debug, Clone)]
pub struct StateMessage<'a> {
    task: &'a str,
    history: &'a str,
    read_state: &'a str,
    state: &'a EnvironmentState,
    config: &'a EngineConfig,
    step_info: Option<&'a StepInfo>,
    sensitive_description: Option<&'a str>,
    available_file_paths: &'a [String],
    page_actions: Option<&'a str>,
    date: Option<NaiveDate>,
}

impl<'a> StateMessage<'a> {
    pub fn new(
        task: &'a str,
        history: &'a str,
        state: &'a EnvironmentState,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            task,
            history,
            read_state: "",
            state,
            config,
            step_info: None,
            sensitive_description: None,
            available_file_paths: &[],
            page_actions: None,
            date: None,
        }
    }

    pub fn with_read_state(mut self, read_state: &'a str) -> Self {
        self.read_state = read_state;
        self
    }

    pub fn with_step_info(mut self, step_info: Option<&'a StepInfo>) -> Self {
        self.step_info = step_info;
        self
    }

    pub fn with_sensitive_description(mut self, description: Option<&'a str>) -> Self {
        self.sensitive_description = description;
        self
    }

    pub fn with_file_paths(mut self, paths: &'a [String]) -> Self {
        self.available_file_paths = paths;
        self
    }

    pub fn with_page_actions(mut self, actions: Option<&'a str>) -> Self {
        self.page_actions = actions;
        self
    }

    /// Pin the date shown in `<step_info>` (defaults to today, local time).
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Whether the screenshot will be attached.
    ///
    /// A blank new tab at step 0 with a single tab open carries no visual
    /// information, so it is sent as text only.
    pub fn attaches_screenshot(&self) -> bool {
        let blank_start = is_new_tab_page(&self.state.url)
            && self.step_info.is_some_and(|s| s.step_number == 0)
            && self.state.tabs.len() == 1;
        self.config.use_vision && !blank_start && self.state.screenshot.is_some()
    }

    fn agent_state(&self) -> String {
        let date = self.date.unwrap_or_else(|| Local::now().date_naive());
        let mut step_info = String::new();
        if let Some(info) = self.step_info {
            step_info.push_str(&format!(
                "Step {}. Maximum steps: {}\n",
                u64::from(info.step_number) + 1,
                info.max_steps
            ));
        }
        step_info.push_str(&format!("Current date: {}", date.format("%Y-%m-%d")));

        let file_paths = (!self.available_file_paths.is_empty()).then(|| {
            format!(
                "{}\nUse absolute full paths when referencing these files.",
                self.available_file_paths.join("\n")
            )
        });

        TaggedSections::new()
            .section_always("user_request", self.task)
            .section_opt("sensitive_data", self.sensitive_description)
            .section("step_info", step_info)
            .section_opt("available_file_paths", file_paths)
            .build()
    }

    /// Full text of the state message.
    pub fn render(&self) -> String {
        let browser_state = self.state.describe(
            &self.config.include_attributes,
            self.config.max_clickable_elements_length,
            self.config.include_recent_events,
        );

        let mut text = TaggedSections::new()
            .section_always("agent_history", self.history)
            .blank_line()
            .section("agent_state", self.agent_state())
            .section("browser_state", browser_state)
            .section("read_state", self.read_state.trim())
            .section_opt("page_specific_actions", self.page_actions)
            .build();
        text.push('\n');
        text
    }

    /// The state-slot message, with the screenshot attached when allowed.
    pub fn to_message(&self) -> Message {
        let text = self.render();
        let screenshot = self
            .state
            .screenshot
            .as_deref()
            .filter(|_| self.attaches_screenshot());

        let msg = match screenshot {
            Some(b64) => Message::user_parts(vec![
                ContentPart::text(text),
                ContentPart::text(SCREENSHOT_LABEL),
                ContentPart::png(b64, self.config.vision_detail),
            ]),
            None => Message::user(text),
        };
        msg.with_cache(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TabInfo;
    use crate::{MessageContent, VisionDetail};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn system_prompt_substitutes_max_actions() {
        let text = SystemPrompt::new().render();
        assert!(text.contains("between 1 and 10 actions"));
        assert!(!text.contains("{max_actions}"));
    }

    #[test]
    fn override_replaces_template_and_extend_appends() {
        let prompt = SystemPrompt::new()
            .with_override("Only answer in French.")
            .with_extend("Be brief.");
        assert_eq!(prompt.render(), "Only answer in French.\nBe brief.");
        let msg = prompt.build();
        assert!(msg.cache);
    }

    #[test]
    fn sections_skip_empty_bodies() {
        let text = TaggedSections::new()
            .section("a", "\n\n")
            .section_always("b", "")
            .section("c", "\nbody\n")
            .build();
        assert_eq!(text, "<b>\n\n</b>\n<c>\nbody\n</c>");
    }

    #[test]
    fn state_message_layout() {
        let config = EngineConfig::default();
        let state = EnvironmentState::new("https://a.example", "A");
        let step = StepInfo::new(2, 10);
        let paths = vec!["/tmp/report.csv".to_string()];
        let text = StateMessage::new("Find the price", "<step_0>\nAgent initialized\n</step_0>", &state, &config)
            .with_step_info(Some(&step))
            .with_sensitive_description(Some("Here are placeholders"))
            .with_file_paths(&paths)
            .with_read_state("<read_state_0>\nbody\n</read_state_0>")
            .with_page_actions(Some("upload_file"))
            .with_date(date())
            .render();

        assert!(text.starts_with(
            "<agent_history>\n<step_0>\nAgent initialized\n</step_0>\n</agent_history>\n\n<agent_state>\n\
             <user_request>\nFind the price\n</user_request>\n\
             <sensitive_data>\nHere are placeholders\n</sensitive_data>\n\
             <step_info>\nStep 3. Maximum steps: 10\nCurrent date: 2024-03-09\n</step_info>\n\
             <available_file_paths>\n/tmp/report.csv\nUse absolute full paths when referencing these files.\n</available_file_paths>\n\
             </agent_state>\n<browser_state>\n"
        ));
        assert!(text.contains("</browser_state>\n<read_state>\n<read_state_0>\nbody\n</read_state_0>\n</read_state>\n"));
        assert!(text.ends_with("<page_specific_actions>\nupload_file\n</page_specific_actions>\n"));
    }

    #[test]
    fn final_step_number_does_not_overflow() {
        let config = EngineConfig::default();
        let state = EnvironmentState::new("https://a.example", "A");
        let step = StepInfo::new(u32::MAX, u32::MAX);
        let text = StateMessage::new("t", "h", &state, &config)
            .with_step_info(Some(&step))
            .with_date(date())
            .render();
        assert!(text.contains("Step 4294967296. Maximum steps: 4294967295\n"));
    }

    #[test]
    fn optional_sections_absent_when_empty() {
        let config = EngineConfig::default();
        let state = EnvironmentState::new("https://a.example", "A");
        let text = StateMessage::new("t", "h", &state, &config).with_date(date()).render();
        assert!(!text.contains("<sensitive_data>"));
        assert!(!text.contains("<read_state>"));
        assert!(!text.contains("<available_file_paths>"));
        assert!(!text.contains("<page_specific_actions>"));
        assert!(text.contains("<step_info>\nCurrent date: 2024-03-09\n</step_info>"));
    }

    #[test]
    fn screenshot_attached_with_label_and_detail() {
        let config = EngineConfig::default().with_vision_detail(VisionDetail::High);
        let state = EnvironmentState::new("https://a.example", "A").with_screenshot("QUJD");
        let step = StepInfo::new(1, 5);
        let msg = StateMessage::new("t", "h", &state, &config)
            .with_step_info(Some(&step))
            .to_message();

        let MessageContent::Parts(parts) = &msg.content else {
            panic!("expected multimodal content");
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1], ContentPart::text(SCREENSHOT_LABEL));
        let images = msg.images();
        assert_eq!(images[0].url, "data:image/png;base64,QUJD");
        assert_eq!(images[0].detail, VisionDetail::High);
    }

    #[test]
    fn vision_disabled_or_blank_start_is_text_only() {
        let no_vision = EngineConfig::default().with_vision(false);
        let state = EnvironmentState::new("https://a.example", "A").with_screenshot("QUJD");
        let msg = StateMessage::new("t", "h", &state, &no_vision).to_message();
        assert!(matches!(msg.content, MessageContent::Text(_)));

        let config = EngineConfig::default();
        let blank = EnvironmentState::new("about:blank", "")
            .with_screenshot("QUJD")
            .with_tab(TabInfo::new("T1", "about:blank", ""));
        let step0 = StepInfo::new(0, 5);
        let message = StateMessage::new("t", "h", &blank, &config).with_step_info(Some(&step0));
        assert!(!message.attaches_screenshot());

        let step1 = StepInfo::new(1, 5);
        let later = StateMessage::new("t", "h", &blank, &config).with_step_info(Some(&step1));
        assert!(later.attaches_screenshot());
    }
}
