//! Harness configuration
//!
//! Resolved once at startup and passed into the runner; nothing else reads the
//! environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::driver::web::{BrowserType, WebDriverConfig};

pub const LOCAL_CONFIG_FILE: &str = "lumi-ddt.yaml";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Storefront root, e.g. `http://localhost:4200/#/`
    pub base_url: String,
    pub credentials: Credentials,
    /// Pre-authenticated session saved from an earlier login
    pub session_artifact: PathBuf,
    /// Product page used to populate the cart
    pub product_path: String,
    pub screenshot_dir: PathBuf,
    /// Pattern the URL must match after a successful registration
    pub login_destination: String,
    pub timeouts: Timeouts,
    /// Test cases run concurrently
    pub workers: usize,
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Wait for a control before interacting with it
    pub action_ms: u64,
    /// Wait for a success/error banner
    pub message_ms: u64,
    /// Wait for the post-registration redirect
    pub navigation_ms: u64,
    /// Pause after submitting the registration form
    pub settle_ms: u64,
    /// Whole-case budget; unlimited when unset
    pub case_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub browser_type: BrowserType,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4200/#/".to_string(),
            credentials: Credentials::default(),
            session_artifact: PathBuf::from("auth.json"),
            product_path: "product/1".to_string(),
            screenshot_dir: PathBuf::from("screenshots"),
            login_destination: "#/auth/login".to_string(),
            timeouts: Timeouts::default(),
            workers: 1,
            browser: BrowserConfig::default(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            email: "customer2@practicesoftwaretesting.com".to_string(),
            password: "welcome01".to_string(),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            action_ms: 10000,
            message_ms: 5000,
            navigation_ms: 5000,
            settle_ms: 1500,
            case_ms: None,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        let web = WebDriverConfig::default();
        Self {
            browser_type: web.browser_type,
            headless: web.headless,
            viewport_width: web.viewport_width,
            viewport_height: web.viewport_height,
        }
    }
}

impl HarnessConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Otherwise `./lumi-ddt.yaml`, then
    /// `~/.lumi-tester/ddt.yaml` are tried before falling back to defaults.
    /// Environment overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_locations().into_iter().find(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    log::debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn default_locations() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".lumi-tester").join("ddt.yaml"));
        }
        paths
    }

    /// Apply `LUMI_*` overrides from a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("LUMI_BASE_URL") {
            self.base_url = url;
        }
        if let Some(headless) = lookup("LUMI_HEADLESS") {
            self.browser.headless = headless == "true" || headless == "1";
        }
        if let Some(email) = lookup("LUMI_LOGIN_EMAIL") {
            self.credentials.email = email;
        }
        if let Some(password) = lookup("LUMI_LOGIN_PASSWORD") {
            self.credentials.password = password;
        }
    }

    /// Absolute storefront URL for a route, e.g. `url("checkout")`
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn web_driver_config(&self) -> WebDriverConfig {
        WebDriverConfig {
            browser_type: self.browser.browser_type,
            headless: self.browser.headless,
            viewport_width: self.browser.viewport_width,
            viewport_height: self.browser.viewport_height,
        }
    }
}
