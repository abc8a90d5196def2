//! Environment snapshot handed over by the automation layer each step.
//!
//! The snapshot is plain data: URL, title, an optional base64 screenshot, the
//! indexed interactive elements, the open tabs, and scroll geometry. This
//! module only knows how to describe it as text for the model.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// URLs the browser shows for a fresh, empty tab.
pub const NEW_TAB_URLS: [&str; 4] = [
    "about:blank",
    "chrome://new-tab-page/",
    "chrome://new-tab-page",
    "chrome://newtab/",
];

/// Attributes rendered in the element listing when none are configured.
pub const DEFAULT_INCLUDE_ATTRIBUTES: &[&str] = &[
    "title",
    "type",
    "checked",
    "name",
    "role",
    "value",
    "placeholder",
    "data-date-format",
    "alt",
    "aria-label",
    "aria-expanded",
    "data-state",
    "aria-checked",
];

const PDF_NOTICE: &str = "PDF viewer cannot be rendered. In this page, DO NOT use the \
    extract_structured_data action as PDF content cannot be rendered. Use the read_file \
    action on the downloaded PDF in available_file_paths to read the full content.";

pub fn is_new_tab_page(url: &str) -> bool {
    NEW_TAB_URLS.contains(&url)
}

/// One element the model can act on, addressed by its index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractiveElement {
    pub tag_name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attributes: IndexMap<String, String>,
}

impl InteractiveElement {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// `[index]<tag attr=value ...>text />`, showing only `include` attributes.
    fn describe(&self, index: u32, include: &[&str]) -> String {
        let mut line = format!("[{index}]<{}", self.tag_name);
        for name in include {
            if let Some(value) = self.attributes.get(*name).filter(|v| !v.is_empty()) {
                line.push_str(&format!(" {name}={value}"));
            }
        }
        line.push('>');
        line.push_str(self.text.trim());
        line.push_str(" />");
        line
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub target_id: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
}

impl TabInfo {
    pub fn new(target_id: impl Into<String>, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            url: url.into(),
            title: title.into(),
        }
    }

    fn short_id(&self) -> String {
        last_chars(&self.target_id, 4)
    }
}

/// Scroll geometry of the current page, in CSS pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub viewport_height: u32,
    pub page_height: u32,
    pub pixels_above: u32,
    pub pixels_below: u32,
}

impl PageInfo {
    fn pages(&self, pixels: u32) -> f64 {
        if self.viewport_height == 0 {
            0.0
        } else {
            f64::from(pixels) / f64::from(self.viewport_height)
        }
    }

    pub fn pages_above(&self) -> f64 {
        self.pages(self.pixels_above)
    }

    pub fn pages_below(&self) -> f64 {
        self.pages(self.pixels_below)
    }

    pub fn total_pages(&self) -> f64 {
        self.pages(self.page_height)
    }
}

/// The environment as observed at the start of a step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentState {
    pub url: String,
    pub title: String,
    /// Base64-encoded PNG of the viewport.
    pub screenshot: Option<String>,
    pub elements: BTreeMap<u32, InteractiveElement>,
    pub tabs: Vec<TabInfo>,
    pub page_info: Option<PageInfo>,
    pub recent_events: Option<String>,
    pub is_pdf_viewer: bool,
}

impl EnvironmentState {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_screenshot(mut self, base64: impl Into<String>) -> Self {
        self.screenshot = Some(base64.into());
        self
    }

    pub fn with_element(mut self, index: u32, element: InteractiveElement) -> Self {
        self.elements.insert(index, element);
        self
    }

    pub fn with_tab(mut self, tab: TabInfo) -> Self {
        self.tabs.push(tab);
        self
    }

    pub fn with_page_info(mut self, page_info: PageInfo) -> Self {
        self.page_info = Some(page_info);
        self
    }

    /// The tab showing this page, when exactly one tab matches URL and title.
    pub fn current_tab(&self) -> Option<&TabInfo> {
        let mut matching = self
            .tabs
            .iter()
            .filter(|t| t.url == self.url && t.title == self.title);
        match (matching.next(), matching.next()) {
            (Some(tab), None) => Some(tab),
            _ => None,
        }
    }

    /// One line per interactive element, in index order.
    pub fn element_listing(&self, include_attributes: &[String]) -> String {
        let include: Vec<&str> = if include_attributes.is_empty() {
            DEFAULT_INCLUDE_ATTRIBUTES.to_vec()
        } else {
            include_attributes.iter().map(String::as_str).collect()
        };
        self.elements
            .iter()
            .map(|(index, element)| element.describe(*index, &include))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Text body of the `<browser_state>` section.
    ///
    /// The element listing is cut to `max_element_chars` chars. Scroll
    /// position decides whether the listing is framed with page boundary
    /// markers or with "pages above/below" hints.
    pub fn describe(
        &self,
        include_attributes: &[String],
        max_element_chars: usize,
        include_recent_events: bool,
    ) -> String {
        let mut elements = self.element_listing(include_attributes);
        let truncated_note = if elements.chars().count() > max_element_chars {
            elements = elements.chars().take(max_element_chars).collect();
            format!(" (truncated to {max_element_chars} characters)")
        } else {
            String::new()
        };

        let (above, below) = self
            .page_info
            .map_or((0.0, 0.0), |p| (p.pages_above(), p.pages_below()));

        let page_info_text = self
            .page_info
            .map(|p| {
                format!(
                    "<page_info>{:.1} pages above, {:.1} pages below, {:.1} total pages</page_info>\n",
                    p.pages_above(),
                    p.pages_below(),
                    p.total_pages()
                )
            })
            .unwrap_or_default();

        let elements = if elements.is_empty() {
            "empty page".to_string()
        } else {
            let head = if above > 0.0 {
                format!(
                    "... {above:.1} pages above - scroll to see more or extract structured data if you are looking for specific information ..."
                )
            } else {
                "[Start of page]".to_string()
            };
            let tail = if below > 0.0 {
                format!(
                    "... {below:.1} pages below - scroll to see more or extract structured data if you are looking for specific information ..."
                )
            } else {
                "[End of page]".to_string()
            };
            format!("{head}\n{elements}\n{tail}")
        };

        let mut location = format!("Current URL: {}\nTitle: {}\n", self.url, self.title);
        if let Some(tab) = self.current_tab() {
            location.push_str(&format!("Current tab: {}\n", tab.short_id()));
        }

        let tabs: String = self
            .tabs
            .iter()
            .map(|t| {
                let title: String = t.title.chars().take(30).collect();
                format!("Tab {}: {} - {title}\n", t.short_id(), t.url)
            })
            .collect();

        let recent_events = match &self.recent_events {
            Some(events) if include_recent_events && !events.is_empty() => {
                format!("Recent browser events: {events}\n")
            }
            _ => String::new(),
        };

        let pdf_notice = if self.is_pdf_viewer {
            format!("{PDF_NOTICE}\n\n")
        } else {
            String::new()
        };

        format!(
            "{location}Available tabs:\n{tabs}\n{page_info_text}\n\
             {recent_events}{pdf_notice}Elements you can interact with inside the viewport{truncated_note}:\n\
             {elements}\n"
        )
    }
}

fn last_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(n)).collect()
}
