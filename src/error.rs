// src/error.rs

//! Unified error handling for the aggregator.

use std::fmt;

use thiserror::Error;

/// Result type alias for aggregator operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// How far an error is allowed to travel before it is caught.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// Aborts the remaining traversal of the whole run.
    Run,
    /// Aborts the current course only.
    Course,
    /// Aborts the current item only.
    Item,
    /// Logged as a warning; the run carries on.
    Advisory,
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Key-value store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// The browsing context could not load a page
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// The landing page listed no courses
    #[error("No courses found; make sure the browser is on the portal home page")]
    NoCourses,

    /// The persisted snapshot has an unusable shape
    #[error("Stored snapshot is unreadable: {0}")]
    SnapshotUnreadable(String),

    /// A course page never rendered its item list
    #[error("Course page \"{course}\" timed out waiting for {selector}")]
    CourseTimeout { course: String, selector: String },

    /// A detail view never rendered
    #[error("Detail view for \"{title}\" timed out waiting for {selector}")]
    DetailTimeout { title: String, selector: String },

    /// The element to click for an item was not found
    #[error("No clickable element for selector: {selector}")]
    InteractionTarget { selector: String },

    /// Going back to the course listing after a detail view failed
    #[error("Return to course listing \"{course}\" failed: {message}")]
    ReturnToListing { course: String, message: String },

    /// The course listing could not be restored before the next item
    #[error("Course listing \"{course}\" is unavailable after a failed return")]
    ListingUnavailable { course: String },

    /// A run was requested while another was still in progress
    #[error("An aggregation run is already in progress")]
    AlreadyRunning,

    /// The current page is outside the portal
    #[error("Current page is not on the portal: {url}")]
    NotOnPortal { url: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a navigation error for a URL.
    pub fn navigation(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Navigation {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create an advisory return-to-listing error.
    pub fn return_to_listing(course: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::ReturnToListing {
            course: course.into(),
            message: message.to_string(),
        }
    }

    /// The traversal level this error is recovered at.
    ///
    /// Errors without a dedicated level (I/O, navigation, ...) are recovered
    /// at whatever scope raised them; they report `Item` here, the narrowest.
    pub fn scope(&self) -> ErrorScope {
        match self {
            Self::NoCourses
            | Self::SnapshotUnreadable(_)
            | Self::Config(_)
            | Self::Selector { .. }
            | Self::Storage(_)
            | Self::AlreadyRunning
            | Self::NotOnPortal { .. } => ErrorScope::Run,
            Self::CourseTimeout { .. } => ErrorScope::Course,
            Self::ReturnToListing { .. } => ErrorScope::Advisory,
            _ => ErrorScope::Item,
        }
    }
}
