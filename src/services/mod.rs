//! Service layer for the aggregator.
//!
//! This module contains:
//! - The browsing context seam and its waits (`Navigator`)
//! - An HTTP-backed context (`HttpBrowser`)
//! - Pure page extraction (`reader`)
//! - Status and event-log reporting (`StatusReporter`)
//! - Command handling (`Controller`)

pub mod browser;
pub mod controller;
pub mod navigator;
pub mod reader;
pub mod reporter;

pub use browser::HttpBrowser;
pub use controller::{Command, Controller, Response, ResponseStatus};
pub use navigator::{BrowsingContext, LoadEvent, NavigationId, Navigator};
pub use reader::Page;
pub use reporter::{EventLevel, LogEntry, StatusReporter, load_logs};
