// src/models/mod.rs

//! Domain models for the aggregator.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod course;
mod record;
mod selectors;
mod snapshot;
mod status;

// Re-export all public types
pub use config::{
    BrowserConfig, Config, LoggingConfig, NavigationConfig, PortalConfig,
};
pub use course::{Course, ItemSummary, ItemType};
pub use record::{AnnouncementDetail, AssignmentDetail, Attachment, IdentityKey, ItemRecord};
pub use selectors::{
    AnnouncementSelectors, AssignmentSelectors, CompiledSelectors, CourseItemSelectors,
    CourseSelectors, ItemTypeKeywords, SelectorConfig,
};
pub use snapshot::AggregatedSnapshot;
pub use status::{RunStatus, StatusName};
