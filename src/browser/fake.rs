//! In-memory browser serving canned HTML, for exercising scraping logic.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{BrowserError, BrowserLauncher, BrowserSession};

#[derive(Debug, Clone)]
enum FakePage {
    Html(String),
    Unreachable(String),
    Hangs,
    // Loads, then every driver call on the page fails.
    Broken(String),
}

#[derive(Debug, Default, Clone)]
pub struct FakeLog {
    pub opened: usize,
    pub closed: usize,
    pub visited: Vec<String>,
    pub clicked: Vec<String>,
    pub screenshots: Vec<PathBuf>,
}

#[derive(Default)]
pub struct FakeBrowser {
    pages: HashMap<String, FakePage>,
    fail_launch: bool,
    log: Arc<Mutex<FakeLog>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages
            .insert(url.to_string(), FakePage::Html(html.to_string()));
        self
    }

    pub fn with_unreachable(mut self, url: &str, reason: &str) -> Self {
        self.pages
            .insert(url.to_string(), FakePage::Unreachable(reason.to_string()));
        self
    }

    pub fn with_broken_session(mut self, url: &str, reason: &str) -> Self {
        self.pages
            .insert(url.to_string(), FakePage::Broken(reason.to_string()));
        self
    }

    pub fn with_hanging(mut self, url: &str) -> Self {
        self.pages.insert(url.to_string(), FakePage::Hangs);
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn log(&self) -> FakeLog {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserLauncher for FakeBrowser {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        if self.fail_launch {
            return Err(BrowserError::Launch("no browser available".to_string()));
        }
        self.log.lock().unwrap().opened += 1;
        Ok(Box::new(FakeSession {
            pages: self.pages.clone(),
            current: None,
            broken: None,
            log: Arc::clone(&self.log),
        }))
    }
}

struct FakeSession {
    pages: HashMap<String, FakePage>,
    current: Option<String>,
    broken: Option<String>,
    log: Arc<Mutex<FakeLog>>,
}

impl FakeSession {
    fn select(&self, selector: &str) -> Result<Vec<String>, BrowserError> {
        let selector = Selector::parse(selector)
            .map_err(|e| BrowserError::Driver(format!("invalid selector: {:?}", e)))?;
        if let Some(reason) = &self.broken {
            return Err(BrowserError::Driver(reason.clone()));
        }
        let Some(html) = &self.current else {
            return Ok(Vec::new());
        };
        let document = Html::parse_document(html);
        Ok(document.select(&selector).map(|el| el.html()).collect())
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.log.lock().unwrap().visited.push(url.to_string());
        self.broken = None;
        match self.pages.get(url) {
            Some(FakePage::Html(html)) => {
                self.current = Some(html.clone());
                Ok(())
            }
            Some(FakePage::Broken(reason)) => {
                self.current = None;
                self.broken = Some(reason.clone());
                Ok(())
            }
            Some(FakePage::Unreachable(reason)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: reason.clone(),
            }),
            Some(FakePage::Hangs) => Err(BrowserError::Timeout {
                what: format!("page load of {}", url),
                after: timeout,
            }),
            None => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "no such page".to_string(),
            }),
        }
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        if self.select(selector)?.is_empty() {
            return Err(BrowserError::Timeout {
                what: selector.to_string(),
                after: timeout,
            });
        }
        Ok(())
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<String>, BrowserError> {
        self.select(selector)
    }

    async fn click_if_visible(
        &mut self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<bool, BrowserError> {
        if self.select(selector)?.is_empty() {
            return Ok(false);
        }
        self.log.lock().unwrap().clicked.push(selector.to_string());
        Ok(true)
    }

    async fn save_screenshot(&mut self, path: &Path) -> Result<(), BrowserError> {
        self.log.lock().unwrap().screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.log.lock().unwrap().closed += 1;
        Ok(())
    }
}
