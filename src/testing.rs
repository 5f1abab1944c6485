// src/testing.rs

//! Scripted browsing context for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use scraper::Html;
use tokio::sync::broadcast;

use crate::error::{AppError, Result};
use crate::services::navigator::{BrowsingContext, LoadEvent, NavigationId};
use crate::utils::parse_selector;

/// A site made of fixed pages.
///
/// Clicking swaps the document in place (the URL stays), the way the portal
/// opens item details inside the course page.
pub(crate) struct FakeSite {
    pages: HashMap<String, String>,
    clicks: HashMap<String, String>,
    /// Per URL, which visits (1-based) fail
    failing_visits: HashMap<String, HashSet<usize>>,
    state: Mutex<SiteState>,
    loads: broadcast::Sender<LoadEvent>,
    next_navigation: AtomicU64,
}

struct SiteState {
    url: String,
    source: String,
    visits: HashMap<String, usize>,
    history: Vec<String>,
    clicked: Vec<String>,
}

impl FakeSite {
    /// A site showing `start_url`, whose page contains `<div id="home">`.
    pub fn new(start_url: &str) -> Self {
        let home = r#"<div id="home"></div>"#.to_string();
        Self {
            pages: HashMap::from([(start_url.to_string(), home.clone())]),
            clicks: HashMap::new(),
            failing_visits: HashMap::new(),
            state: Mutex::new(SiteState {
                url: start_url.to_string(),
                source: home,
                visits: HashMap::new(),
                history: Vec::new(),
                clicked: Vec::new(),
            }),
            loads: broadcast::channel(16).0,
            next_navigation: AtomicU64::new(1),
        }
    }

    /// Serve `html` at `url`; the start page can be replaced this way too.
    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        let state = self.state.get_mut().unwrap();
        if state.url == url {
            state.source = html.to_string();
        }
        self
    }

    /// Show `html` after a click on `selector`.
    pub fn on_click(mut self, selector: &str, html: &str) -> Self {
        self.clicks.insert(selector.to_string(), html.to_string());
        self
    }

    /// Make the `visit`-th navigation to `url` fail.
    pub fn fail_visit(mut self, url: &str, visit: usize) -> Self {
        self.failing_visits
            .entry(url.to_string())
            .or_default()
            .insert(visit);
        self
    }

    /// Every navigation started, in order.
    pub fn history(&self) -> Vec<String> {
        self.state.lock().unwrap().history.clone()
    }

    /// Every successful click, in order.
    pub fn clicked(&self) -> Vec<String> {
        self.state.lock().unwrap().clicked.clone()
    }

    pub fn url(&self) -> String {
        self.state.lock().unwrap().url.clone()
    }
}

#[async_trait]
impl BrowsingContext for FakeSite {
    async fn current_url(&self) -> Result<String> {
        Ok(self.url())
    }

    fn subscribe_loads(&self) -> broadcast::Receiver<LoadEvent> {
        self.loads.subscribe()
    }

    async fn start_navigation(&self, url: &str) -> Result<NavigationId> {
        let id = self.next_navigation.fetch_add(1, Ordering::Relaxed);
        let event = {
            let mut state = self.state.lock().unwrap();
            state.history.push(url.to_string());
            let visit = {
                let count = state.visits.entry(url.to_string()).or_insert(0);
                *count += 1;
                *count
            };
            let broken = self
                .failing_visits
                .get(url)
                .is_some_and(|visits| visits.contains(&visit));

            match self.pages.get(url) {
                Some(html) if !broken => {
                    state.url = url.to_string();
                    state.source = html.clone();
                    LoadEvent::Complete {
                        id,
                        url: url.to_string(),
                    }
                }
                _ => LoadEvent::Failed {
                    id,
                    message: format!("404 for {url}"),
                },
            }
        };
        let _ = self.loads.send(event);
        Ok(id)
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().source.clone())
    }

    async fn query_present(&self, selector: &str) -> Result<bool> {
        let selector = parse_selector(selector)?;
        let source = self.state.lock().unwrap().source.clone();
        let document = Html::parse_document(&source);
        Ok(document.select(&selector).next().is_some())
    }

    async fn click(&self, selector: &str) -> Result<bool> {
        if !self.query_present(selector).await? {
            return Ok(false);
        }
        let Some(html) = self.clicks.get(selector) else {
            return Err(AppError::navigation(self.url(), "click handler failed"));
        };
        let mut state = self.state.lock().unwrap();
        state.source = html.clone();
        state.clicked.push(selector.to_string());
        Ok(true)
    }
}
