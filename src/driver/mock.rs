//! In-memory driver for exercising workflows without a browser.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::traits::{SessionFactory, Selector, UiDriver};

/// A call made against the driver, selectors in Playwright form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Navigate(String),
    Fill(String, String),
    Click(String),
    Select(String, String),
    WaitFor(String),
    Screenshot(PathBuf),
    InjectSession(PathBuf),
    Close,
}

#[derive(Debug, Clone, Default)]
pub struct MockState {
    pub url: String,
    pub visible: HashSet<String>,
    /// `data-test` controls are present unless hidden
    pub hidden: HashSet<String>,
    pub texts: HashMap<String, String>,
    /// Clicking the key selector moves the page to the value URL
    pub click_navigates: HashMap<String, String>,
    /// Any call on these selectors fails
    pub broken: HashSet<String>,
    pub calls: Vec<DriverCall>,
}

impl MockState {
    fn is_visible(&self, selector: &str) -> bool {
        self.visible.contains(selector)
            || (selector.starts_with("[data-test=") && !self.hidden.contains(selector))
    }
}

/// Scriptable driver that records every call
#[derive(Debug, Clone, Default)]
pub struct RecordingDriver {
    state: Arc<Mutex<MockState>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_state(state: MockState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Make an element visible with the given text
    pub fn show(self, selector: &Selector, text: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.visible.insert(selector.to_playwright());
            state.texts.insert(selector.to_playwright(), text.to_string());
        }
        self
    }

    pub fn hide(self, selector: &Selector) -> Self {
        self.state
            .lock()
            .unwrap()
            .hidden
            .insert(selector.to_playwright());
        self
    }

    pub fn navigate_on_click(self, selector: &Selector, url: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .click_navigates
            .insert(selector.to_playwright(), url.to_string());
        self
    }

    pub fn break_selector(self, selector: &Selector) -> Self {
        self.state
            .lock()
            .unwrap()
            .broken
            .insert(selector.to_playwright());
        self
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clicked(&self, selector: &Selector) -> bool {
        self.calls()
            .contains(&DriverCall::Click(selector.to_playwright()))
    }

    /// Selectors touched by fill/click/select, in order
    pub fn touched(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DriverCall::Fill(s, _) | DriverCall::Click(s) | DriverCall::Select(s, _) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: DriverCall) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let target = match &call {
            DriverCall::Fill(s, _)
            | DriverCall::Click(s)
            | DriverCall::Select(s, _)
            | DriverCall::WaitFor(s) => Some(s.clone()),
            _ => None,
        };
        state.calls.push(call);
        if let Some(target) = target {
            if state.broken.contains(&target) {
                anyhow::bail!("element {} is detached", target);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UiDriver for RecordingDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.record(DriverCall::Navigate(url.to_string()))?;
        self.state.lock().unwrap().url = url.to_string();
        Ok(())
    }

    async fn fill(&self, selector: &Selector, value: &str) -> Result<()> {
        self.record(DriverCall::Fill(selector.to_playwright(), value.to_string()))
    }

    async fn click(&self, selector: &Selector) -> Result<()> {
        let sel = selector.to_playwright();
        self.record(DriverCall::Click(sel.clone()))?;
        let mut state = self.state.lock().unwrap();
        if let Some(url) = state.click_navigates.get(&sel).cloned() {
            state.url = url;
        }
        Ok(())
    }

    async fn select_option(&self, selector: &Selector, value: &str) -> Result<()> {
        self.record(DriverCall::Select(selector.to_playwright(), value.to_string()))
    }

    async fn wait_for_visible(&self, selector: &Selector, _timeout_ms: u64) -> Result<bool> {
        let sel = selector.to_playwright();
        let visible = self.state.lock().unwrap().is_visible(&sel);
        self.record(DriverCall::WaitFor(sel))?;
        Ok(visible)
    }

    async fn text_content(&self, selector: &Selector) -> Result<String> {
        let state = self.state.lock().unwrap();
        Ok(state
            .texts
            .get(&selector.to_playwright())
            .cloned()
            .unwrap_or_default())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.record(DriverCall::Screenshot(path.to_path_buf()))
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn is_visible(&self, selector: &Selector) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .is_visible(&selector.to_playwright()))
    }

    async fn inject_session(&self, artifact: &Path) -> Result<()> {
        self.record(DriverCall::InjectSession(artifact.to_path_buf()))
    }

    async fn close(&self) -> Result<()> {
        self.record(DriverCall::Close)
    }
}

/// Hands out a fresh copy of a template driver per session
pub struct MockSessionFactory {
    template: MockState,
    failing_sessions: HashSet<usize>,
    opened_count: AtomicUsize,
    opened: Mutex<Vec<RecordingDriver>>,
}

impl MockSessionFactory {
    pub fn new(template: RecordingDriver) -> Self {
        let template = template.state.lock().unwrap().clone();
        Self {
            template,
            failing_sessions: HashSet::new(),
            opened_count: AtomicUsize::new(0),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Fail the n-th (0-based) `open_session` call
    pub fn fail_session(mut self, index: usize) -> Self {
        self.failing_sessions.insert(index);
        self
    }

    pub fn opened(&self) -> Vec<RecordingDriver> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn open_session(&self) -> Result<Box<dyn UiDriver>> {
        let index = self.opened_count.fetch_add(1, Ordering::SeqCst);
        if self.failing_sessions.contains(&index) {
            anyhow::bail!("browser context {} could not be created", index);
        }
        let driver = RecordingDriver::from_state(self.template.clone());
        self.opened.lock().unwrap().push(driver.clone());
        Ok(Box::new(driver))
    }
}
