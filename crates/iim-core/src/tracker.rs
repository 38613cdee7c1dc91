use crate::error::{IimError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// TrackerIssue
// ---------------------------------------------------------------------------

/// An issue as returned by the tracker search API: its key plus the raw
/// `fields` object. Interpretation happens in [`crate::fields::FieldMap`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerIssue {
    pub key: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// The two operations every entry point needs from the issue tracker.
pub trait Tracker {
    /// Run a JQL query and return every matching issue, across all pages.
    fn search(&self, jql: &str) -> Result<Vec<TrackerIssue>>;

    /// Partially update one issue: only the given fields are touched.
    fn update_fields(&self, key: &str, fields: &Map<String, Value>) -> Result<()>;

    /// Fetch one issue by key. An unknown key is [`IimError::IssueNotFound`].
    fn get_issue(&self, key: &str) -> Result<TrackerIssue> {
        self.search(&format!("key = {key}"))?
            .into_iter()
            .find(|issue| issue.key == key)
            .ok_or_else(|| IimError::IssueNotFound(key.to_string()))
    }
}

impl<T: Tracker + ?Sized> Tracker for &T {
    fn search(&self, jql: &str) -> Result<Vec<TrackerIssue>> {
        (**self).search(jql)
    }

    fn update_fields(&self, key: &str, fields: &Map<String, Value>) -> Result<()> {
        (**self).update_fields(key, fields)
    }

    fn get_issue(&self, key: &str) -> Result<TrackerIssue> {
        (**self).get_issue(key)
    }
}

// ---------------------------------------------------------------------------
// Issue keys and queries
// ---------------------------------------------------------------------------

static ISSUE_KEY_RE: OnceLock<Regex> = OnceLock::new();

fn issue_key_re() -> &'static Regex {
    ISSUE_KEY_RE.get_or_init(|| Regex::new(r"\b([A-Z][A-Z0-9]+-[0-9]+)\b").unwrap())
}

/// First issue key (`IIM-123`) found in `text`, e.g. in a browse URL.
pub fn find_issue_key(text: &str) -> Option<&str> {
    issue_key_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

static ISSUE_REF_RE: OnceLock<Regex> = OnceLock::new();

fn issue_ref_re() -> &'static Regex {
    ISSUE_REF_RE.get_or_init(|| {
        Regex::new(r"^(?:https?://[^\s/]+(?:/[^\s?#]*)?/browse/)?([A-Z][A-Z0-9]+-[0-9]+)/?(?:[?#]\S*)?$")
            .unwrap()
    })
}

/// The issue a value refers to when the whole value is a reference: a bare
/// key (`IIM-42`) or a browse URL (`https://x.atlassian.net/browse/IIM-42`).
/// Prose that merely mentions a key is not a reference.
pub fn issue_ref(text: &str) -> Option<&str> {
    issue_ref_re()
        .captures(text.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub fn validate_issue_key(key: &str) -> Result<()> {
    match find_issue_key(key) {
        Some(found) if found == key => Ok(()),
        _ => Err(IimError::InvalidIssueKey(key.to_string())),
    }
}

/// All incidents in a project, oldest first.
pub fn incidents_jql(project: &str) -> String {
    format!(r#"project = "{project}" and issueType = "Incident" ORDER BY created ASC"#)
}

/// Fetch one issue by a key that has been checked against the key pattern.
pub fn fetch_issue<T: Tracker + ?Sized>(tracker: &T, key: &str) -> Result<TrackerIssue> {
    validate_issue_key(key)?;
    tracker.get_issue(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryTracker;

    #[test]
    fn finds_key_in_browse_url() {
        assert_eq!(
            find_issue_key("https://example.atlassian.net/browse/IIM-42"),
            Some("IIM-42")
        );
        assert_eq!(find_issue_key("[IIM-7](https://x/browse/IIM-7)"), Some("IIM-7"));
        assert_eq!(find_issue_key("no key here"), None);
    }

    #[test]
    fn issue_ref_accepts_whole_references_only() {
        assert_eq!(issue_ref(" IIM-42 "), Some("IIM-42"));
        assert_eq!(
            issue_ref("https://example.atlassian.net/browse/IIM-42"),
            Some("IIM-42")
        );
        assert_eq!(
            issue_ref("https://example.atlassian.net/jira/browse/IIM-42?focused=1"),
            Some("IIM-42")
        );
        assert_eq!(issue_ref("regression from IIM-7 config change"), None);
        assert_eq!(issue_ref("IIM-7 and IIM-8"), None);
        assert_eq!(issue_ref("https://example.com/IIM-7"), None);
    }

    #[test]
    fn rejects_keys_that_could_inject_jql() {
        assert!(validate_issue_key("IIM-1").is_ok());
        assert!(validate_issue_key("IIM-1 OR project = X").is_err());
        assert!(validate_issue_key("iim-1").is_err());
    }

    #[test]
    fn incidents_query_names_project() {
        assert_eq!(
            incidents_jql("IIM"),
            r#"project = "IIM" and issueType = "Incident" ORDER BY created ASC"#
        );
    }

    #[test]
    fn fetch_issue_reports_missing_key() {
        let tracker = MemoryTracker::new();
        let err = fetch_issue(&tracker, "IIM-9").unwrap_err();
        assert!(matches!(err, IimError::IssueNotFound(k) if k == "IIM-9"));
    }

    #[test]
    fn fetch_issue_finds_seeded_issue() {
        let tracker = MemoryTracker::new();
        tracker.insert(TrackerIssue {
            key: "IIM-9".into(),
            fields: Map::new(),
        });
        assert_eq!(fetch_issue(&tracker, "IIM-9").unwrap().key, "IIM-9");
    }
}
