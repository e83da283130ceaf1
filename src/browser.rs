//! Browser automation boundary.
//!
//! Scraping code talks to [`BrowserSession`] only. The production
//! implementation drives a W3C WebDriver server through `thirtyfour`; tests
//! use [`fake::FakeBrowser`], which serves canned HTML.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thirtyfour::prelude::*;
use thirtyfour::FirefoxCapabilities;
use thirtyfour::common::capabilities::firefox::FirefoxPreferences;
use thiserror::Error;

use crate::config::ScraperConfig;

#[cfg(test)]
pub mod fake;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
// Slack on top of the driver's own timeout before we give up on the call.
const TIMEOUT_GRACE: Duration = Duration::from_secs(5);
// Selectors and relative dates are matched against English markup.
const ACCEPT_LANGUAGES: &str = "en-US, en";

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to start browser session: {0}")]
    Launch(String),
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("webdriver error: {0}")]
    Driver(String),
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// One live browser tab. Callers must `close` it on every exit path.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Resolves once at least one element matches `selector`.
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError>;

    /// Outer HTML of every element matching `selector`, in document order.
    async fn query_all(&mut self, selector: &str) -> Result<Vec<String>, BrowserError>;

    /// Clicks the first visible match. `Ok(false)` when nothing showed up.
    async fn click_if_visible(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, BrowserError>;

    async fn save_screenshot(&mut self, path: &Path) -> Result<(), BrowserError>;

    async fn close(&mut self) -> Result<(), BrowserError>;
}

// --- WebDriver implementation ---

pub struct WebDriverLauncher {
    server_url: String,
    headless: bool,
}

impl WebDriverLauncher {
    pub fn new(server_url: impl Into<String>, headless: bool) -> Self {
        Self {
            server_url: server_url.into(),
            headless,
        }
    }

    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(config.webdriver_url.clone(), config.headless)
    }

    fn capabilities(&self) -> Result<FirefoxCapabilities, BrowserError> {
        let launch_error = |e: WebDriverError| BrowserError::Launch(e.to_string());

        let mut caps = DesiredCapabilities::firefox();
        if self.headless {
            caps.set_headless().map_err(launch_error)?;
        }
        let mut prefs = FirefoxPreferences::new();
        prefs
            .set("intl.accept_languages", ACCEPT_LANGUAGES)
            .map_err(launch_error)?;
        caps.set_preferences(prefs).map_err(launch_error)?;
        Ok(caps)
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let caps = self.capabilities()?;

        let driver = WebDriver::new(self.server_url.as_str(), caps)
            .await
            .map_err(|e| {
                BrowserError::Launch(format!(
                    "{} (is a WebDriver server running at {}?)",
                    e, self.server_url
                ))
            })?;

        Ok(Box::new(WebDriverSession {
            driver: Some(driver),
        }))
    }
}

pub struct WebDriverSession {
    driver: Option<WebDriver>,
}

impl WebDriverSession {
    fn driver(&self) -> Result<&WebDriver, BrowserError> {
        self.driver
            .as_ref()
            .ok_or_else(|| BrowserError::Driver("session already closed".to_string()))
    }
}

fn driver_error(e: WebDriverError) -> BrowserError {
    BrowserError::Driver(e.to_string())
}

/// A query that ran out of time is a timeout; any other driver failure is not.
fn wait_error(selector: &str, timeout: Duration, e: WebDriverError) -> BrowserError {
    match e {
        WebDriverError::NoSuchElement(_) | WebDriverError::Timeout(_) => BrowserError::Timeout {
            what: selector.to_string(),
            after: timeout,
        },
        other => driver_error(other),
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let driver = self.driver()?;
        driver
            .set_page_load_timeout(timeout)
            .await
            .map_err(driver_error)?;

        match tokio::time::timeout(timeout + TIMEOUT_GRACE, driver.goto(url)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(BrowserError::Timeout {
                what: format!("page load of {}", url),
                after: timeout,
            }),
        }
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let driver = self.driver()?;
        let query = driver
            .query(By::Css(selector))
            .wait(timeout, POLL_INTERVAL);

        match tokio::time::timeout(timeout + TIMEOUT_GRACE, query.first()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(wait_error(selector, timeout, e)),
            Err(_) => Err(BrowserError::Timeout {
                what: selector.to_string(),
                after: timeout,
            }),
        }
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<String>, BrowserError> {
        let driver = self.driver()?;
        let elements = driver
            .find_all(By::Css(selector))
            .await
            .map_err(driver_error)?;

        let mut html = Vec::with_capacity(elements.len());
        for element in elements {
            // Elements can go stale between lookup and read; skip those.
            if let Ok(outer) = element.outer_html().await {
                html.push(outer);
            }
        }
        Ok(html)
    }

    async fn click_if_visible(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, BrowserError> {
        let driver = self.driver()?;
        let query = driver
            .query(By::Css(selector))
            .wait(timeout, POLL_INTERVAL);
        let attempt = async {
            let element = match query.first().await {
                Ok(element) => element,
                Err(_) => return Ok(false),
            };
            if !element.is_displayed().await.unwrap_or(false) {
                return Ok(false);
            }
            element.click().await.map_err(driver_error)?;
            Ok::<bool, BrowserError>(true)
        };

        match tokio::time::timeout(timeout + TIMEOUT_GRACE, attempt).await {
            Ok(result) => result,
            Err(_) => Err(BrowserError::Timeout {
                what: format!("click on {}", selector),
                after: timeout,
            }),
        }
    }

    async fn save_screenshot(&mut self, path: &Path) -> Result<(), BrowserError> {
        let driver = self.driver()?;
        driver.screenshot(path).await.map_err(driver_error)
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        match self.driver.take() {
            Some(driver) => driver.quit().await.map_err(driver_error),
            None => Ok(()),
        }
    }
}
