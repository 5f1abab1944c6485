// src/models/status.rs

//! The single current-status cell read by the viewer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusName {
    #[default]
    Idle,
    Running,
    Error,
}

/// Current run status; every write replaces the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    pub name: StatusName,
    #[serde(default)]
    pub message: String,
}

impl RunStatus {
    pub fn new(name: StatusName, message: impl Into<String>) -> Self {
        Self {
            name,
            message: message.into(),
        }
    }

    pub fn idle(message: impl Into<String>) -> Self {
        Self::new(StatusName::Idle, message)
    }

    pub fn running(message: impl Into<String>) -> Self {
        Self::new(StatusName::Running, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(StatusName::Error, message)
    }
}
