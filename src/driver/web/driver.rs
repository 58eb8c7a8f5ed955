//! Web Driver implementation using Playwright
//!
//! One browser is launched per run; every test case gets its own context and
//! page so that cookies and storage never leak between cases.

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use playwright::api::{Browser, BrowserContext, Page, Viewport};
use playwright::Playwright;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::driver::common::session_init_script;
use crate::driver::traits::{SessionFactory, Selector, UiDriver};

/// Web browser type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserType {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

/// Web Driver configuration
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub browser_type: BrowserType,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            browser_type: BrowserType::Chromium,
            headless: false,
            viewport_width: 1280,
            viewport_height: 720,
        }
    }
}

/// Shared browser that hands out isolated sessions
pub struct WebSessionFactory {
    #[allow(dead_code)]
    playwright: Arc<Playwright>,
    browser: Arc<Browser>,
    config: WebDriverConfig,
}

impl WebSessionFactory {
    /// Initialize Playwright and launch the configured browser
    pub async fn launch(config: WebDriverConfig) -> Result<Self> {
        let playwright = Playwright::initialize()
            .await
            .context("Failed to initialize Playwright")?;

        let browser = match config.browser_type {
            BrowserType::Chromium => launch_chromium_browser(&playwright.chromium(), &config).await?,
            BrowserType::Firefox => {
                playwright
                    .firefox()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
            BrowserType::Webkit => {
                playwright
                    .webkit()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
        };

        Ok(Self {
            playwright: Arc::new(playwright),
            browser: Arc::new(browser),
            config,
        })
    }

    /// Close the browser once every session is done
    pub async fn shutdown(&self) -> Result<()> {
        self.browser.close().await?;
        Ok(())
    }
}

#[async_trait]
impl SessionFactory for WebSessionFactory {
    async fn open_session(&self) -> Result<Box<dyn UiDriver>> {
        let context = self
            .browser
            .context_builder()
            .build()
            .await
            .context("Failed to create browser context")?;
        let page = context.new_page().await?;

        page.set_viewport_size(Viewport {
            width: self.config.viewport_width as i32,
            height: self.config.viewport_height as i32,
        })
        .await?;

        Ok(Box::new(WebDriver {
            context: Arc::new(context),
            page: Arc::new(Mutex::new(page)),
        }))
    }
}

/// Web Driver using Playwright, bound to one browser context
pub struct WebDriver {
    context: Arc<BrowserContext>,
    page: Arc<Mutex<Page>>,
}

#[async_trait]
impl UiDriver for WebDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        let page = self.page.lock().await;
        page.goto_builder(url)
            .goto()
            .await
            .with_context(|| format!("Failed to navigate to {}", url))?;
        Ok(())
    }

    async fn fill(&self, selector: &Selector, value: &str) -> Result<()> {
        let page = self.page.lock().await;
        let sel = selector.to_playwright();
        page.fill_builder(&sel, value)
            .fill()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fill {}: {:?}", sel, e))?;
        Ok(())
    }

    async fn click(&self, selector: &Selector) -> Result<()> {
        let page = self.page.lock().await;
        let sel = selector.to_playwright();
        match page.click_builder(&sel).click().await {
            Ok(_) => Ok(()),
            Err(e) => {
                log::debug!("Click failed for selector '{}': {:?}", sel, e);
                Err(anyhow::anyhow!("Failed to click: {}. Error: {:?}", sel, e))
            }
        }
    }

    async fn select_option(&self, selector: &Selector, value: &str) -> Result<()> {
        let page = self.page.lock().await;
        let sel = selector.to_playwright();
        let mut builder = page.select_option_builder(&sel);
        builder = builder.add_value(value.to_string());
        builder
            .select_option()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to select '{}' in {}: {:?}", value, sel, e))?;
        Ok(())
    }

    async fn wait_for_visible(&self, selector: &Selector, timeout_ms: u64) -> Result<bool> {
        let page = self.page.lock().await;
        let sel = selector.to_playwright();

        let result = page
            .wait_for_selector_builder(&sel)
            .timeout(timeout_ms as f64)
            .wait_for_selector()
            .await;

        Ok(result.is_ok())
    }

    async fn text_content(&self, selector: &Selector) -> Result<String> {
        let page = self.page.lock().await;
        let sel = selector.to_playwright();
        let js = "el => el.textContent || ''";

        match page
            .evaluate_on_selector::<String, _>(&sel, js, None::<String>)
            .await
        {
            Ok(text) => Ok(text),
            Err(_) => Ok(String::new()),
        }
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let page = self.page.lock().await;
        let path_buf = PathBuf::from(path);

        if let Some(parent) = path_buf.parent() {
            std::fs::create_dir_all(parent)?;
        }

        page.screenshot_builder()
            .path(path_buf)
            .full_page(true)
            .screenshot()
            .await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let page = self.page.lock().await;
        Ok(page.url()?)
    }

    async fn is_visible(&self, selector: &Selector) -> Result<bool> {
        let page = self.page.lock().await;
        let sel = selector.to_playwright();
        match page.query_selector(&sel).await? {
            Some(el) => Ok(el.is_visible().await?),
            None => Ok(false),
        }
    }

    async fn inject_session(&self, artifact: &Path) -> Result<()> {
        let content = std::fs::read_to_string(artifact)
            .with_context(|| format!("Failed to read session artifact: {}", artifact.display()))?;
        let script = session_init_script(&content)?;
        self.context
            .add_init_script(&script)
            .await
            .context("Failed to install session script")?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.context.close().await?;
        Ok(())
    }
}

/// Launch a new Chromium browser, preferring an installed Chrome
async fn launch_chromium_browser(
    chromium: &playwright::api::BrowserType,
    config: &WebDriverConfig,
) -> Result<Browser> {
    let mut launcher = chromium.launcher();
    launcher = launcher.headless(config.headless);

    let env_path = std::env::var("PLAYWRIGHT_CHROMIUM_EXECUTABLE_PATH")
        .ok()
        .map(PathBuf::from);

    let system_path = if env_path.is_none() {
        find_system_browser()
    } else {
        None
    };

    if let Some(ref path) = env_path {
        println!("{} Using browser from env: {}", "🌐".blue(), path.display());
        launcher = launcher.executable(path);
    } else if let Some(ref path) = system_path {
        println!(
            "{} Using discovered browser: {}",
            "🌐".blue(),
            path.display()
        );
        launcher = launcher.executable(path);
    } else {
        log::info!("No browser executable found, using Playwright's bundled Chromium");
    }

    let args: Vec<String> = [
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
        "--ignore-certificate-errors",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    launcher = launcher.args(&args);

    Ok(launcher.launch().await?)
}

fn find_system_browser() -> Option<PathBuf> {
    let common_paths = [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    common_paths
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
}
