//! Bring a tracker issue in line with its local incident report.
//!
//! [`compute_diff`] is pure. [`apply_diff`] is the only step with a side
//! effect, and only in [`SyncMode::Commit`].

use crate::error::Result;
use crate::fields::{FieldMap, FieldValue, IncidentField};
use crate::report::LocalReport;
use crate::tracker::{fetch_issue, Tracker, TrackerIssue};
use serde::Serialize;
use serde_json::Map;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// RemoteIssue
// ---------------------------------------------------------------------------

static EMPTY: FieldValue = FieldValue::Empty;

/// The schema fields of one tracker issue, as fetched this run.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteIssue {
    pub key: String,
    pub values: BTreeMap<IncidentField, FieldValue>,
}

impl RemoteIssue {
    pub fn from_tracker(issue: &TrackerIssue, map: &FieldMap) -> Self {
        let values = IncidentField::all()
            .iter()
            .map(|&f| (f, map.read(f, &issue.fields)))
            .filter(|(_, v)| !v.is_empty())
            .collect();
        Self {
            key: issue.key.clone(),
            values,
        }
    }

    /// Missing fields read as `Empty`.
    pub fn get(&self, field: IncidentField) -> &FieldValue {
        self.values.get(&field).unwrap_or(&EMPTY)
    }
}

// ---------------------------------------------------------------------------
// FieldDiff
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: IncidentField,
    pub old: FieldValue,
    pub new: FieldValue,
}

/// Changes needed to bring one issue in line with one report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiff {
    pub issue_key: String,
    pub changes: Vec<FieldChange>,
}

impl FieldDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Partial update body: tracker field id -> new value, changed fields only.
    pub fn update_body(&self, map: &FieldMap) -> Map<String, serde_json::Value> {
        self.changes
            .iter()
            .map(|c| (map.tracker_id(c.field).to_string(), c.new.to_tracker()))
            .collect()
    }
}

/// Compare every field the report declares against the issue.
pub fn compute_diff(local: &LocalReport, remote: &RemoteIssue) -> FieldDiff {
    let changes = local
        .values
        .iter()
        .filter_map(|(&field, new)| {
            let old = remote.get(field);
            (!new.matches(old)).then(|| FieldChange {
                field,
                old: old.clone(),
                new: new.clone(),
            })
        })
        .collect();
    FieldDiff {
        issue_key: remote.key.clone(),
        changes,
    }
}

// ---------------------------------------------------------------------------
// Applying
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    DryRun,
    Commit,
}

impl SyncMode {
    pub fn from_commit_flag(commit: bool) -> Self {
        if commit {
            SyncMode::Commit
        } else {
            SyncMode::DryRun
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// Nothing differed.
    InSync,
    /// Changes were computed but not sent.
    Pending,
    /// One update carrying every change was accepted by the tracker.
    Updated,
}

/// Send `diff` to the tracker when `mode` is commit and there is something
/// to send. At most one update call.
pub fn apply_diff<T: Tracker + ?Sized>(
    tracker: &T,
    diff: &FieldDiff,
    map: &FieldMap,
    mode: SyncMode,
) -> Result<ApplyOutcome> {
    if diff.is_empty() {
        return Ok(ApplyOutcome::InSync);
    }
    match mode {
        SyncMode::DryRun => Ok(ApplyOutcome::Pending),
        SyncMode::Commit => {
            tracker.update_fields(&diff.issue_key, &diff.update_body(map))?;
            tracing::info!(key = %diff.issue_key, fields = diff.len(), "issue updated");
            Ok(ApplyOutcome::Updated)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub path: PathBuf,
    pub diff: FieldDiff,
    pub outcome: ApplyOutcome,
}

/// Fetch the report's issue, diff it, and apply per `mode`.
pub fn reconcile<T: Tracker + ?Sized>(
    tracker: &T,
    report: &LocalReport,
    map: &FieldMap,
    mode: SyncMode,
) -> Result<Reconciliation> {
    let issue = fetch_issue(tracker, &report.issue_key)?;
    let remote = RemoteIssue::from_tracker(&issue, map);
    let diff = compute_diff(report, &remote);
    let outcome = apply_diff(tracker, &diff, map, mode)?;
    Ok(Reconciliation {
        path: report.path.clone(),
        diff,
        outcome,
    })
}

pub fn reconcile_file<T: Tracker + ?Sized>(
    tracker: &T,
    path: &Path,
    map: &FieldMap,
    mode: SyncMode,
) -> Result<Reconciliation> {
    let report = LocalReport::load(path)?;
    reconcile(tracker, &report, map, mode)
}

/// Reconcile each file independently, in order. A failure is recorded for
/// its file and the batch carries on.
pub fn reconcile_all<T: Tracker + ?Sized>(
    tracker: &T,
    paths: &[PathBuf],
    map: &FieldMap,
    mode: SyncMode,
) -> Vec<(PathBuf, Result<Reconciliation>)> {
    paths
        .iter()
        .map(|path| {
            let result = reconcile_file(tracker, path, map, mode);
            if let Err(e) = &result {
                tracing::warn!(path = %path.display(), error = %e, "report not reconciled");
            }
            (path.clone(), result)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
