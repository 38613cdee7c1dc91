use crate::fields::{FieldMap, FieldValue, IncidentField};
use crate::tracker::TrackerIssue;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

/// Links to incident report documents start with this.
pub const REPORT_DOC_PREFIX: &str = "https://docs.google.com/document";

pub const RESOLVED_STATUS: &str = "Resolved";

// ---------------------------------------------------------------------------
// Incident
// ---------------------------------------------------------------------------

/// Display projection of a tracker incident.
#[derive(Debug, Clone, Serialize)]
pub struct Incident {
    pub key: String,
    pub url: String,
    pub status: String,
    pub summary: String,
    pub severity: String,
    pub entities: Vec<String>,
    pub report_url: Option<String>,
    pub detection_method: FieldValue,
    pub declare_date: FieldValue,
    pub impact_start: FieldValue,
    pub detected: FieldValue,
    pub alerted: FieldValue,
    pub acknowledged: FieldValue,
    pub responded: FieldValue,
    pub mitigated: FieldValue,
    pub resolved: FieldValue,
}

impl Incident {
    pub fn from_issue(issue: &TrackerIssue, base_url: &str, map: &FieldMap) -> Self {
        let fields = &issue.fields;
        let read = |f: IncidentField| map.read(f, fields);

        let status = issue_status(&issue.fields).unwrap_or("unknown").to_string();
        let summary = match read(IncidentField::Title) {
            FieldValue::Empty => String::new(),
            v => v.to_string(),
        };
        let severity = match read(IncidentField::Severity) {
            FieldValue::Empty => "undetermined".to_string(),
            v => v.to_string(),
        };
        let mut entities: Vec<String> = read(IncidentField::Entities)
            .to_string()
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(String::from)
            .collect();
        if entities.is_empty() {
            entities.push("unknown".to_string());
        }
        let report_url = fields.get("description").and_then(extract_report_url);

        Self {
            key: issue.key.clone(),
            url: format!("{base_url}/browse/{}", issue.key),
            status,
            summary,
            severity,
            entities,
            report_url,
            detection_method: read(IncidentField::DetectionMethod),
            declare_date: read(IncidentField::DeclareDate),
            impact_start: read(IncidentField::ImpactStart),
            detected: read(IncidentField::Detected),
            alerted: read(IncidentField::Alerted),
            acknowledged: read(IncidentField::Acknowledged),
            responded: read(IncidentField::Responded),
            mitigated: read(IncidentField::Mitigated),
            resolved: read(IncidentField::Resolved),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.eq_ignore_ascii_case(RESOLVED_STATUS)
    }

    /// Resolved on or after `since`.
    pub fn resolved_since(&self, since: NaiveDate) -> bool {
        self.resolved.date().is_some_and(|d| d >= since)
    }

    pub fn entities_display(&self) -> String {
        self.entities.join(", ")
    }

    pub fn report_display(&self) -> &str {
        self.report_url.as_deref().unwrap_or("no doc")
    }
}

fn issue_status(fields: &serde_json::Map<String, Value>) -> Option<&str> {
    fields
        .get("status")
        .and_then(|s| s.get("name"))
        .and_then(Value::as_str)
}

// ---------------------------------------------------------------------------
// Report link extraction
// ---------------------------------------------------------------------------

fn is_report_doc(url: &str) -> bool {
    url.starts_with(REPORT_DOC_PREFIX)
}

/// Find the incident report document linked from an issue description.
///
/// The description is an Atlassian document tree. Nodes are visited depth
/// first in document order and the first report link wins, whether it is an
/// `inlineCard` or a `link` mark on a text node.
pub fn extract_report_url(description: &Value) -> Option<String> {
    let mut stack: Vec<&Value> = children(description).rev().collect();

    while let Some(node) = stack.pop() {
        match node.get("type").and_then(Value::as_str) {
            Some("inlineCard") => {
                let url = node.pointer("/attrs/url").and_then(Value::as_str);
                if let Some(url) = url.filter(|u| is_report_doc(u)) {
                    return Some(url.to_string());
                }
            }
            Some("text") => {
                let marks = node.get("marks").and_then(Value::as_array);
                for mark in marks.into_iter().flatten() {
                    if mark.get("type").and_then(Value::as_str) != Some("link") {
                        continue;
                    }
                    let href = mark.pointer("/attrs/href").and_then(Value::as_str);
                    if let Some(href) = href.filter(|h| is_report_doc(h)) {
                        return Some(href.to_string());
                    }
                }
            }
            _ => {}
        }
        stack.extend(children(node).rev());
    }

    None
}

fn children(node: &Value) -> impl DoubleEndedIterator<Item = &Value> {
    node.get("content")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
