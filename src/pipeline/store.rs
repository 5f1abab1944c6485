// src/pipeline/store.rs

//! Working copy of the snapshot during a run.
//!
//! Seeded from the stored snapshot; new records are appended as they are
//! captured, and the identity index answers "already have it?" before an
//! item is opened.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::models::{AggregatedSnapshot, IdentityKey, ItemRecord, ItemType};

/// Records and courses accumulated by a run.
#[derive(Debug, Default)]
pub struct AggregationStore {
    announcements: Vec<ItemRecord>,
    assignments: Vec<ItemRecord>,
    others: Vec<ItemRecord>,
    courses: Vec<String>,
    known_courses: HashSet<String>,
    seen: HashSet<IdentityKey>,
}

impl AggregationStore {
    /// Start from an existing snapshot.
    ///
    /// Every stored record's key is indexed, typed by its collection when the
    /// record has no type of its own. Courses named by stored records count
    /// as known even if the course list lacks them.
    pub fn seed(snapshot: AggregatedSnapshot) -> Self {
        let mut store = Self {
            announcements: snapshot.announcements,
            assignments: snapshot.assignments,
            others: snapshot.others,
            ..Self::default()
        };

        for course in snapshot.courses {
            store.register_course(&course);
        }

        let mut keys = Vec::new();
        let mut record_courses = Vec::new();
        for (fallback, records) in store.collections() {
            for record in records {
                if let Some(key) = IdentityKey::for_record(record, fallback) {
                    keys.push(key);
                }
                if !record.course.is_empty() {
                    record_courses.push(record.course.clone());
                }
            }
        }
        store.seen.extend(keys);
        for course in record_courses {
            store.register_course(&course);
        }
        store
    }

    /// Add a course name; repeats are ignored and first-seen order is kept.
    pub fn register_course(&mut self, name: &str) -> bool {
        if self.known_courses.contains(name) {
            return false;
        }
        self.known_courses.insert(name.to_string());
        self.courses.push(name.to_string());
        true
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.seen.contains(key)
    }

    /// Append a captured record and index its key.
    pub fn append(&mut self, record: ItemRecord) {
        let kind = record.kind.unwrap_or(ItemType::Other);
        if let Some(key) = IdentityKey::for_record(&record, kind) {
            self.seen.insert(key);
        }
        match kind {
            ItemType::Announcement => self.announcements.push(record),
            ItemType::Assignment => self.assignments.push(record),
            ItemType::Other => self.others.push(record),
        }
    }

    pub fn courses(&self) -> &[String] {
        &self.courses
    }

    pub fn record_count(&self) -> usize {
        self.announcements.len() + self.assignments.len() + self.others.len()
    }

    fn collections(&self) -> [(ItemType, &[ItemRecord]); 3] {
        [
            (ItemType::Announcement, self.announcements.as_slice()),
            (ItemType::Assignment, self.assignments.as_slice()),
            (ItemType::Other, self.others.as_slice()),
        ]
    }

    /// Close the run: dedupe every collection and stamp the snapshot.
    ///
    /// Returns the snapshot and how many records were dropped.
    pub fn finish(self, now: DateTime<Utc>) -> (AggregatedSnapshot, usize) {
        let (announcements, a) = dedupe_collection(self.announcements, ItemType::Announcement);
        let (assignments, b) = dedupe_collection(self.assignments, ItemType::Assignment);
        let (others, c) = dedupe_collection(self.others, ItemType::Other);

        let snapshot = AggregatedSnapshot {
            announcements,
            assignments,
            others,
            courses: self.courses,
            last_updated: Some(now),
        };
        (snapshot, a + b + c)
    }
}

/// Keep the first record per identity key.
///
/// Records missing a course or title are dropped; kept records get their
/// resolved type written back unless they carry a stored type of their own.
pub fn dedupe_collection(records: Vec<ItemRecord>, fallback: ItemType) -> (Vec<ItemRecord>, usize) {
    let total = records.len();
    let mut seen = HashSet::new();
    let kept: Vec<ItemRecord> = records
        .into_iter()
        .filter_map(|mut record| {
            let key = IdentityKey::for_record(&record, fallback)?;
            if record.raw_type().is_none() {
                record.kind = Some(key.kind);
            }
            seen.insert(key).then_some(record)
        })
        .collect();
    let dropped = total - kept.len();
    (kept, dropped)
}
