// src/services/navigator.rs

//! Navigator over a single controlled browsing context.
//!
//! The context is driven by one caller at a time: load a page and wait for
//! it, poll until an element shows up, read the page, click something.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::NavigationConfig;
use crate::services::reader::Page;

/// Identifies one navigation started on a context.
pub type NavigationId = u64;

/// Emitted by a context when a navigation settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    Complete { id: NavigationId, url: String },
    Failed { id: NavigationId, message: String },
}

impl LoadEvent {
    pub fn id(&self) -> NavigationId {
        match self {
            LoadEvent::Complete { id, .. } | LoadEvent::Failed { id, .. } => *id,
        }
    }
}

/// Primitive operations of a browsing context.
#[async_trait]
pub trait BrowsingContext: Send + Sync {
    /// URL of the page currently shown.
    async fn current_url(&self) -> Result<String>;

    /// Receive a [`LoadEvent`] for every navigation settling from now on.
    fn subscribe_loads(&self) -> broadcast::Receiver<LoadEvent>;

    /// Begin loading `url`; completion is reported as a [`LoadEvent`].
    async fn start_navigation(&self, url: &str) -> Result<NavigationId>;

    /// Markup of the page currently shown.
    async fn page_source(&self) -> Result<String>;

    /// Whether `selector` matches anything on the current page.
    async fn query_present(&self, selector: &str) -> Result<bool>;

    /// Click the first element matching `selector`.
    ///
    /// Returns `false` when nothing clickable matched.
    async fn click(&self, selector: &str) -> Result<bool>;
}

/// Waits and page access on top of a [`BrowsingContext`].
#[derive(Clone)]
pub struct Navigator {
    context: Arc<dyn BrowsingContext>,
    wait_timeout: Duration,
    poll_interval: Duration,
}

impl Navigator {
    pub fn new(context: Arc<dyn BrowsingContext>, config: &NavigationConfig) -> Self {
        Self {
            context,
            wait_timeout: config.wait_timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    pub async fn current_url(&self) -> Result<String> {
        self.context.current_url().await
    }

    /// Go to `url` and wait until the context reports the load complete.
    ///
    /// No timeout: a stalled load blocks the caller.
    pub async fn load_and_await_complete(&self, url: &str) -> Result<()> {
        // Subscribe first so the completion cannot slip past us.
        let mut loads = self.context.subscribe_loads();
        let navigation = self.context.start_navigation(url).await?;

        loop {
            match loads.recv().await {
                Ok(LoadEvent::Complete { id, url: landed }) if id == navigation => {
                    log::debug!("Loaded {}", landed);
                    return Ok(());
                }
                Ok(LoadEvent::Failed { id, message }) if id == navigation => {
                    return Err(AppError::navigation(url, message));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    log::debug!("Load listener skipped {} events", skipped);
                }
                Err(RecvError::Closed) => {
                    return Err(AppError::navigation(url, "browsing context closed"));
                }
            }
        }
    }

    /// Poll for `selector` with the configured timeout.
    pub async fn await_element_present(&self, selector: &str) -> bool {
        self.await_element_present_within(selector, self.wait_timeout)
            .await
    }

    /// Poll for `selector` until it matches or `timeout` elapses.
    ///
    /// Failed checks count as "not there yet".
    pub async fn await_element_present_within(&self, selector: &str, timeout: Duration) -> bool {
        let started = Instant::now();
        loop {
            match self.context.query_present(selector).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => log::debug!("Presence check for {} failed: {}", selector, e),
            }
            if started.elapsed() >= timeout {
                return false;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Apply a pure extraction to the current page.
    pub async fn run_in_page<T, F>(&self, extract: F) -> Result<T>
    where
        F: FnOnce(&Page) -> T,
    {
        let source = self.context.page_source().await?;
        let url = self
            .context
            .current_url()
            .await
            .ok()
            .and_then(|u| Url::parse(&u).ok());
        let page = Page::parse(&source, url);
        Ok(extract(&page))
    }

    /// Click the first element matching `selector`.
    pub async fn click(&self, selector: &str) -> Result<bool> {
        self.context.click(selector).await
    }
}
