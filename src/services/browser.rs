// src/services/browser.rs

//! HTTP-backed browsing context.
//!
//! Each navigation is a GET; a click follows the clicked element's `href`.
//! Client-side handlers are not run, so items that only open through script
//! report "nothing to click" and are recorded as item failures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use scraper::{Html, Selector};
use tokio::sync::broadcast;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::BrowserConfig;
use crate::services::navigator::{BrowsingContext, LoadEvent, NavigationId};
use crate::utils::parse_selector;

const LOAD_CHANNEL_CAPACITY: usize = 16;

#[derive(Default)]
struct PageState {
    url: Option<Url>,
    source: String,
}

/// A browsing context that loads pages with `reqwest`.
pub struct HttpBrowser {
    client: reqwest::Client,
    page: Mutex<PageState>,
    loads: broadcast::Sender<LoadEvent>,
    next_navigation: AtomicU64,
}

impl HttpBrowser {
    /// Build the client, attaching the configured session cookie to every request.
    pub fn new(config: &BrowserConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = config.cookie.as_deref().filter(|c| !c.trim().is_empty()) {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| AppError::config(format!("browser.cookie: {e}")))?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            page: Mutex::new(PageState::default()),
            loads: broadcast::channel(LOAD_CHANNEL_CAPACITY).0,
            next_navigation: AtomicU64::new(1),
        })
    }

    /// The underlying client, carrying the session cookie.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    fn page(&self) -> MutexGuard<'_, PageState> {
        self.page.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn fetch(&self, url: Url) -> Result<(Url, String)> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let landed = response.url().clone();
        let body = response.text().await?;
        Ok((landed, body))
    }

    /// Load `url`, replace the current page on success and announce the outcome.
    async fn load(&self, url: Url) -> LoadEvent {
        let id = self.next_navigation.fetch_add(1, Ordering::Relaxed);
        let event = match self.fetch(url).await {
            Ok((landed, source)) => {
                let landed_str = landed.to_string();
                *self.page() = PageState {
                    url: Some(landed),
                    source,
                };
                LoadEvent::Complete {
                    id,
                    url: landed_str,
                }
            }
            Err(e) => LoadEvent::Failed {
                id,
                message: e.to_string(),
            },
        };
        // Nobody listening is fine.
        let _ = self.loads.send(event.clone());
        event
    }

    fn with_document<T>(&self, f: impl FnOnce(&Html, Option<&Url>) -> T) -> T {
        let page = self.page();
        let document = Html::parse_document(&page.source);
        f(&document, page.url.as_ref())
    }
}

#[async_trait]
impl BrowsingContext for HttpBrowser {
    async fn current_url(&self) -> Result<String> {
        self.page()
            .url
            .as_ref()
            .map(|u| u.to_string())
            .ok_or_else(|| AppError::navigation("about:blank", "no page loaded yet"))
    }

    fn subscribe_loads(&self) -> broadcast::Receiver<LoadEvent> {
        self.loads.subscribe()
    }

    async fn start_navigation(&self, url: &str) -> Result<NavigationId> {
        let target = Url::parse(url)?;
        Ok(self.load(target).await.id())
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.page().source.clone())
    }

    async fn query_present(&self, selector: &str) -> Result<bool> {
        let selector = parse_selector(selector)?;
        Ok(self.with_document(|document, _| document.select(&selector).next().is_some()))
    }

    async fn click(&self, selector: &str) -> Result<bool> {
        let selector = parse_selector(selector)?;
        let Some(target) = self.with_document(|document, base| click_target(document, &selector, base))
        else {
            return Ok(false);
        };

        match self.load(target.clone()).await {
            LoadEvent::Complete { .. } => Ok(true),
            LoadEvent::Failed { message, .. } => Err(AppError::navigation(target, message)),
        }
    }
}

/// Where clicking the first element matching `selector` leads.
///
/// `None` when nothing matches or the element has no followable `href`.
pub fn click_target(document: &Html, selector: &Selector, base: Option<&Url>) -> Option<Url> {
    let element = document.select(selector).next()?;
    let href = element.value().attr("href")?.trim();
    if href.is_empty() || href.starts_with('#') || href.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }
    match base {
        Some(base) => base.join(href).ok(),
        None => Url::parse(href).ok(),
    }
}
