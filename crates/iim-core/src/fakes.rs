//! In-memory tracker for tests.
//!
//! `MemoryTracker` satisfies the [`Tracker`] contract without a network and
//! records every update call so tests can assert on what would have been
//! sent.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::error::{IimError, Result};
use crate::tracker::{find_issue_key, Tracker, TrackerIssue};

/// One recorded `update_fields` call.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCall {
    pub key: String,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Default)]
pub struct MemoryTracker {
    issues: Mutex<BTreeMap<String, TrackerIssue>>,
    updates: Mutex<Vec<UpdateCall>>,
    failing: Mutex<BTreeSet<String>>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, issue: TrackerIssue) {
        self.issues.lock().unwrap().insert(issue.key.clone(), issue);
    }

    /// Make every search or update touching `key` fail with a remote error.
    pub fn fail_for(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub fn updates(&self) -> Vec<UpdateCall> {
        self.updates.lock().unwrap().clone()
    }

    pub fn issue(&self, key: &str) -> Option<TrackerIssue> {
        self.issues.lock().unwrap().get(key).cloned()
    }

    fn check(&self, key: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(key) {
            return Err(IimError::remote(key, "tracker unavailable"));
        }
        Ok(())
    }
}

impl Tracker for MemoryTracker {
    /// `key = X` queries return that issue; any other query returns all
    /// issues in key order.
    fn search(&self, jql: &str) -> Result<Vec<TrackerIssue>> {
        let issues = self.issues.lock().unwrap();
        if let Some(key) = jql.strip_prefix("key = ").and_then(find_issue_key) {
            self.check(key)?;
            return Ok(issues.get(key).cloned().into_iter().collect());
        }
        Ok(issues.values().cloned().collect())
    }

    fn update_fields(&self, key: &str, fields: &Map<String, Value>) -> Result<()> {
        self.check(key)?;
        self.updates.lock().unwrap().push(UpdateCall {
            key: key.to_string(),
            fields: fields.clone(),
        });
        let mut issues = self.issues.lock().unwrap();
        let issue = issues
            .get_mut(key)
            .ok_or_else(|| IimError::IssueNotFound(key.to_string()))?;
        for (id, value) in fields {
            issue.fields.insert(id.clone(), value.clone());
        }
        Ok(())
    }
}
