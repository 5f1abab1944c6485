// src/lib.rs

//! coursesync library
//!
//! Collects announcements, assignments and other course items from a
//! Blackboard portal into one locally stored snapshot.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod testing;
