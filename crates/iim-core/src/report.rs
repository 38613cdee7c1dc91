//! Parser for incident reports exported from the word processor as Markdown.
//!
//! Exports are not a grammar; fields are found by their label text in one of
//! three shapes:
//!
//! ```text
//! | Severity | S2 |            table row (label/value pairs)
//! **Severity:** S2             bold label
//! Severity: S2                 plain label, optionally in a list item
//! ```
//!
//! The first occurrence of each field wins. The tracker issue key comes only
//! from a labelled `Jira` / `Tracker` / `Issue` field whose whole value is a
//! key or a browse link; every such field must name the same issue.

use crate::error::{IimError, Result};
use crate::fields::{canonical, FieldValue, IncidentField};
use crate::tracker::issue_ref;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const IDENTIFIER_LABELS: &[&str] = &["jira", "jira ticket", "jira issue", "tracker", "issue"];
const PLACEHOLDERS: &[&str] = &["", "tbd", "n/a", "na", "-", "?", "unknown", "none"];

// ---------------------------------------------------------------------------
// LocalReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct LocalReport {
    pub path: PathBuf,
    pub issue_key: String,
    /// Only fields the document actually declares.
    pub values: BTreeMap<IncidentField, FieldValue>,
}

impl LocalReport {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| IimError::parse(path, format!("cannot read: {e}")))?;
        Self::parse(path, &text)
    }

    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<Self> {
        let path = path.into();
        let mut keys: Vec<String> = Vec::new();
        let mut bad_identifier: Option<String> = None;
        let mut values = BTreeMap::new();
        let mut heading_title: Option<String> = None;

        for line in text.lines() {
            let line = line.trim();
            if heading_title.is_none() {
                if let Some(caps) = h1_re().captures(line) {
                    let title = strip_title_prefix(&clean(&caps[1]));
                    if !title.is_empty() {
                        heading_title = Some(title);
                    }
                    continue;
                }
            }

            for (label, raw) in labelled_pairs(line) {
                let label = clean(&label);
                let label = label.trim_end_matches(':').trim();

                if is_identifier_label(label) {
                    let refs = identifier_refs(&raw);
                    if refs.is_empty() {
                        let value = clean(&raw);
                        if !is_placeholder(&value) {
                            bad_identifier.get_or_insert(value);
                        }
                    }
                    for key in refs {
                        if !keys.contains(&key) {
                            keys.push(key);
                        }
                    }
                    continue;
                }

                let Some(field) = IncidentField::from_label(label) else {
                    continue;
                };
                if values.contains_key(&field) {
                    continue;
                }
                let value = clean(&raw);
                if is_placeholder(&value) {
                    continue;
                }
                let parsed = FieldValue::parse(field.kind(), &value)
                    .map_err(|e| IimError::parse(&path, format!("field '{field}': {e}")))?;
                values.insert(field, parsed);
            }
        }

        if !values.contains_key(&IncidentField::Title) {
            if let Some(title) = heading_title {
                values.insert(IncidentField::Title, FieldValue::Text(title));
            }
        }

        let issue_key = match (keys.as_slice(), bad_identifier) {
            ([key], _) => key.clone(),
            ([], Some(bad)) => {
                return Err(IimError::parse(
                    &path,
                    format!("tracker field '{bad}' does not contain an issue key"),
                ))
            }
            ([], None) => return Err(IimError::MissingIdentifier { path }),
            (many, _) => {
                return Err(IimError::parse(
                    &path,
                    format!("tracker fields name different issues: {}", many.join(", ")),
                ))
            }
        };

        tracing::debug!(path = %path.display(), %issue_key, fields = values.len(), "parsed report");
        Ok(Self {
            path,
            issue_key,
            values,
        })
    }

    pub fn get(&self, field: IncidentField) -> Option<&FieldValue> {
        self.values.get(&field)
    }
}

// ---------------------------------------------------------------------------
// Line shapes
// ---------------------------------------------------------------------------

static H1_RE: OnceLock<Regex> = OnceLock::new();
static BOLD_RE: OnceLock<Regex> = OnceLock::new();
static PLAIN_RE: OnceLock<Regex> = OnceLock::new();
static BULLET_RE: OnceLock<Regex> = OnceLock::new();
static TITLE_PREFIX_RE: OnceLock<Regex> = OnceLock::new();
static LINK_RE: OnceLock<Regex> = OnceLock::new();
static ESCAPE_RE: OnceLock<Regex> = OnceLock::new();
static SEPARATOR_RE: OnceLock<Regex> = OnceLock::new();

fn h1_re() -> &'static Regex {
    H1_RE.get_or_init(|| Regex::new(r"^#\s+(.+?)\s*#*$").unwrap())
}

fn bold_re() -> &'static Regex {
    BOLD_RE.get_or_init(|| Regex::new(r"^(?:\*\*|__)(.+?)(?:\*\*|__)\s*:?\s*(.*)$").unwrap())
}

fn plain_re() -> &'static Regex {
    PLAIN_RE.get_or_init(|| Regex::new(r"^([A-Za-z][A-Za-z ]{0,40}?)\s*:\s*(.*)$").unwrap())
}

fn bullet_re() -> &'static Regex {
    BULLET_RE.get_or_init(|| Regex::new(r"^(?:[-*+]|\d+\.)\s+").unwrap())
}

fn title_prefix_re() -> &'static Regex {
    TITLE_PREFIX_RE.get_or_init(|| Regex::new(r"(?i)^incident(?:\s+report)?\s*[:\-]\s*").unwrap())
}

fn link_re() -> &'static Regex {
    LINK_RE.get_or_init(|| Regex::new(r"\[([^\]]*)\]\(([^)]*)\)").unwrap())
}

fn escape_re() -> &'static Regex {
    ESCAPE_RE.get_or_init(|| Regex::new(r"\\([\\`*_{}\[\]()#+\-.!|~<>])").unwrap())
}

fn separator_re() -> &'static Regex {
    SEPARATOR_RE.get_or_init(|| Regex::new(r"^:?-{2,}:?$").unwrap())
}

/// Label/value pairs declared on one line, values still raw.
fn labelled_pairs(line: &str) -> Vec<(String, String)> {
    if line.starts_with('|') {
        let cells: Vec<&str> = line
            .trim_matches('|')
            .split('|')
            .map(str::trim)
            .collect();
        if cells.iter().all(|c| separator_re().is_match(c)) {
            return Vec::new();
        }
        return cells
            .chunks(2)
            .filter(|pair| pair.len() == 2)
            .map(|pair| (pair[0].to_string(), pair[1].to_string()))
            .collect();
    }

    let line = bullet_re().replace(line, "");
    if let Some(caps) = bold_re().captures(&line) {
        return vec![(caps[1].to_string(), caps[2].to_string())];
    }
    if let Some(caps) = plain_re().captures(&line) {
        return vec![(caps[1].to_string(), caps[2].to_string())];
    }
    Vec::new()
}

/// Strip the Markdown decoration the exporter adds around plain values.
fn clean(raw: &str) -> String {
    let text = link_re().replace_all(raw, "$1");
    let text = escape_re().replace_all(&text, "$1");
    let text = text.replace("**", "").replace("__", "").replace("<br>", " ");
    let text = text.trim();
    let text = text
        .strip_prefix('*')
        .and_then(|t| t.strip_suffix('*'))
        .or_else(|| text.strip_prefix('_').and_then(|t| t.strip_suffix('_')))
        .unwrap_or(text);
    text.trim().to_string()
}

fn strip_title_prefix(title: &str) -> String {
    title_prefix_re().replace(title, "").trim().to_string()
}

/// Issue keys an identifier value refers to, from the value as a whole or
/// from a Markdown link's text or target. Sorted and deduplicated.
fn identifier_refs(raw: &str) -> Vec<String> {
    let mut refs = Vec::new();
    let value = clean(raw);
    if let Some(key) = issue_ref(value.trim_start_matches('<').trim_end_matches('>')) {
        refs.push(key.to_string());
    }
    for caps in link_re().captures_iter(raw) {
        for part in [clean(&caps[1]), caps[2].trim().to_string()] {
            if let Some(key) = issue_ref(&part) {
                refs.push(key.to_string());
            }
        }
    }
    refs.sort();
    refs.dedup();
    refs
}

fn is_identifier_label(label: &str) -> bool {
    IDENTIFIER_LABELS.contains(&canonical(label).as_str())
}

fn is_placeholder(value: &str) -> bool {
    PLACEHOLDERS.contains(&canonical(value).as_str())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
