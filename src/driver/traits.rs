use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;

/// Element selector for storefront controls
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Select by `data-test` attribute
    TestId(String),
    /// Raw CSS selector
    Css(String),
    /// Select by ARIA role and accessible name
    Role { role: String, name: String },
    /// Select an element of `tag` containing `text`
    HasText { tag: String, text: String },
}

impl Selector {
    pub fn test_id(name: &str) -> Self {
        Selector::TestId(name.to_string())
    }

    pub fn css(css: &str) -> Self {
        Selector::Css(css.to_string())
    }

    pub fn role(role: &str, name: &str) -> Self {
        Selector::Role {
            role: role.to_string(),
            name: name.to_string(),
        }
    }

    pub fn has_text(tag: &str, text: &str) -> Self {
        Selector::HasText {
            tag: tag.to_string(),
            text: text.to_string(),
        }
    }

    /// Convert to a Playwright selector string
    pub fn to_playwright(&self) -> String {
        match self {
            Selector::TestId(id) => format!("[data-test=\"{}\"]", id),
            Selector::Css(css) => css.clone(),
            Selector::Role { role, name } => format!("role={}[name=\"{}\"]", role, name),
            Selector::HasText { tag, text } => format!("{}:has-text(\"{}\")", tag, text),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_playwright())
    }
}

/// Browser automation primitives used by the workflows.
///
/// One instance drives exactly one isolated browser session. Every call is
/// a suspension point that completes (or times out) before the next one.
#[async_trait]
pub trait UiDriver: Send + Sync {
    /// Navigate the page to an absolute URL
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Replace the value of an input; an empty value clears it
    async fn fill(&self, selector: &Selector, value: &str) -> Result<()>;

    /// Click an element
    async fn click(&self, selector: &Selector) -> Result<()>;

    /// Choose an `<option>` by value or label
    async fn select_option(&self, selector: &Selector, value: &str) -> Result<()>;

    /// Wait for an element to become visible
    ///
    /// # Returns
    /// True if the element became visible, false if the timeout elapsed
    async fn wait_for_visible(&self, selector: &Selector, timeout_ms: u64) -> Result<bool>;

    /// Text content of an element, or empty string if not found
    async fn text_content(&self, selector: &Selector) -> Result<String>;

    /// Save a full-page screenshot, creating parent directories
    async fn screenshot(&self, path: &Path) -> Result<()>;

    /// URL currently shown by the page
    async fn current_url(&self) -> Result<String>;

    /// Check if an element is visible right now
    async fn is_visible(&self, selector: &Selector) -> Result<bool>;

    /// Install a pre-authenticated session artifact so that later page loads
    /// start logged in
    async fn inject_session(&self, artifact: &Path) -> Result<()>;

    /// Close the session; the driver must not be used afterwards
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Opens one isolated browser session per test case
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn UiDriver>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_to_playwright() {
        assert_eq!(
            Selector::test_id("first-name").to_playwright(),
            r#"[data-test="first-name"]"#
        );
        assert_eq!(
            Selector::role("button", "Register").to_playwright(),
            r#"role=button[name="Register"]"#
        );
        assert_eq!(
            Selector::has_text("p", "already logged in").to_playwright(),
            r#"p:has-text("already logged in")"#
        );
        assert_eq!(
            Selector::css(".alert.alert-danger").to_string(),
            ".alert.alert-danger"
        );
    }
}
