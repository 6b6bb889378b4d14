//! `browser` method: render the page in headless Chromium.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::sync::Mutex;

use ax_engine::{Content, Outcome, RunConfig, Strategy};

use super::dom::visible_text;

/// Environment variable pointing at a Chromium binary.
pub const CHROMIUM_PATH_ENV: &str = "AX_CHROMIUM_PATH";

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        let candidates = [
            home.join(".ax/chromium/chrome-linux64/chrome"),
            home.join(".ax/chromium/chrome"),
        ];
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Renders pages with a single lazily launched Chromium instance.
pub struct BrowserStrategy {
    browser: Mutex<Option<Browser>>,
    navigation_timeout: Duration,
}

impl BrowserStrategy {
    pub fn new(navigation_timeout: Duration) -> Self {
        Self {
            browser: Mutex::new(None),
            navigation_timeout,
        }
    }

    async fn launch() -> Result<Browser> {
        let chrome_path = find_chromium()
            .with_context(|| format!("Chromium not found. Set {CHROMIUM_PATH_ENV}."))?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-blink-features=AutomationControlled")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        tracing::info!("Launched headless Chromium");
        Ok(browser)
    }

    /// Rendered HTML of `url`.
    async fn render(&self, url: &str) -> Result<String> {
        let mut guard = self.browser.lock().await;
        if guard.is_none() {
            *guard = Some(Self::launch().await?);
        }
        let Some(browser) = guard.as_ref() else {
            bail!("browser unavailable");
        };

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        let navigation = tokio::time::timeout(self.navigation_timeout, async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            page.content().await
        })
        .await;

        if let Err(e) = page.close().await {
            tracing::warn!("Failed to close page for {url}: {e}");
        }

        match navigation {
            Ok(Ok(html)) => Ok(html),
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!(
                "navigation timed out after {:.1}s",
                self.navigation_timeout.as_secs_f64()
            ),
        }
    }

    /// Close Chromium if it was started.
    pub async fn shutdown(&self) {
        if let Some(mut browser) = self.browser.lock().await.take() {
            if let Err(e) = browser.close().await {
                tracing::warn!("Failed to close Chromium: {e}");
            }
            if let Err(e) = browser.wait().await {
                tracing::warn!("Failed waiting for Chromium to exit: {e}");
            }
        }
    }
}

#[async_trait]
impl Strategy for BrowserStrategy {
    async fn attempt(&self, url: &str, config: &RunConfig) -> Result<Outcome> {
        if config.fill_forms {
            tracing::debug!("Form filling requested for {url}; rendering only");
        }

        let html = match self.render(url).await {
            Ok(html) => html,
            Err(e) => return Ok(Outcome::failure(format!("{e:#}"))),
        };
        if config.expect_form && !html.to_lowercase().contains("<form") {
            tracing::debug!("Expected a form on {url} but none was rendered");
        }

        Ok(Outcome::success(Content::Text(visible_text(&html))))
    }
}
