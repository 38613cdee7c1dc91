use crate::error::{IimError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// IncidentField
// ---------------------------------------------------------------------------

/// The fixed schema of incident data shared by local reports and tracker
/// issues. Declaration order is the order fields are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentField {
    Title,
    Severity,
    Entities,
    DeclareDate,
    ImpactStart,
    DetectionMethod,
    Detected,
    Alerted,
    Acknowledged,
    Responded,
    Mitigated,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Choice,
    Timestamp,
}

impl IncidentField {
    pub fn all() -> &'static [IncidentField] {
        &[
            IncidentField::Title,
            IncidentField::Severity,
            IncidentField::Entities,
            IncidentField::DeclareDate,
            IncidentField::ImpactStart,
            IncidentField::DetectionMethod,
            IncidentField::Detected,
            IncidentField::Alerted,
            IncidentField::Acknowledged,
            IncidentField::Responded,
            IncidentField::Mitigated,
            IncidentField::Resolved,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IncidentField::Title => "title",
            IncidentField::Severity => "severity",
            IncidentField::Entities => "entities",
            IncidentField::DeclareDate => "declare_date",
            IncidentField::ImpactStart => "impact_start",
            IncidentField::DetectionMethod => "detection_method",
            IncidentField::Detected => "detected",
            IncidentField::Alerted => "alerted",
            IncidentField::Acknowledged => "acknowledged",
            IncidentField::Responded => "responded",
            IncidentField::Mitigated => "mitigated",
            IncidentField::Resolved => "resolved",
        }
    }

    /// Label text used for the field in exported reports. Matching is
    /// case-insensitive, see [`IncidentField::from_label`].
    pub fn label(self) -> &'static str {
        match self {
            IncidentField::Title => "Title",
            IncidentField::Severity => "Severity",
            IncidentField::Entities => "Entities",
            IncidentField::DeclareDate => "Declare date",
            IncidentField::ImpactStart => "Impact start",
            IncidentField::DetectionMethod => "Detection method",
            IncidentField::Detected => "Detected",
            IncidentField::Alerted => "Alerted",
            IncidentField::Acknowledged => "Acknowledged",
            IncidentField::Responded => "Responded",
            IncidentField::Mitigated => "Mitigated",
            IncidentField::Resolved => "Resolved",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            IncidentField::Title | IncidentField::Entities => FieldKind::Text,
            IncidentField::Severity | IncidentField::DetectionMethod => FieldKind::Choice,
            _ => FieldKind::Timestamp,
        }
    }

    pub fn default_tracker_id(self) -> &'static str {
        match self {
            IncidentField::Title => "summary",
            IncidentField::Severity => "customfield_10319",
            IncidentField::Entities => "customfield_18555",
            IncidentField::DeclareDate => "customfield_15087",
            IncidentField::ImpactStart => "customfield_15191",
            IncidentField::DetectionMethod => "customfield_12881",
            IncidentField::Detected => "customfield_12882",
            IncidentField::Alerted => "customfield_12883",
            IncidentField::Acknowledged => "customfield_12884",
            IncidentField::Responded => "customfield_12885",
            IncidentField::Mitigated => "customfield_12886",
            IncidentField::Resolved => "customfield_12887",
        }
    }

    /// Resolve a report label ("Impact Start", "declare date"). A report's
    /// `Summary` is prose, not the issue title, so it maps to nothing.
    pub fn from_label(label: &str) -> Option<IncidentField> {
        let label = canonical(label);
        match label.as_str() {
            "title" | "incident title" => Some(IncidentField::Title),
            "severity" => Some(IncidentField::Severity),
            "entities" | "affected entities" => Some(IncidentField::Entities),
            "declare date" | "declared" | "declared at" => Some(IncidentField::DeclareDate),
            "impact start" | "impact started" => Some(IncidentField::ImpactStart),
            "detection method" => Some(IncidentField::DetectionMethod),
            "detected" | "detected at" => Some(IncidentField::Detected),
            "alerted" | "alerted at" => Some(IncidentField::Alerted),
            "acknowledged" | "acknowledged at" => Some(IncidentField::Acknowledged),
            "responded" | "responded at" => Some(IncidentField::Responded),
            "mitigated" | "mitigated at" => Some(IncidentField::Mitigated),
            "resolved" | "resolved at" => Some(IncidentField::Resolved),
            _ => None,
        }
    }
}

impl fmt::Display for IncidentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IncidentField {
    type Err = IimError;

    fn from_str(s: &str) -> Result<Self> {
        IncidentField::all()
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| IimError::UnknownField(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Empty,
    Text(String),
    Choice(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Empty)
    }

    /// Parse a value written in a local report. Blank input is `Empty`;
    /// a timestamp that cannot be read is an error.
    pub fn parse(kind: FieldKind, raw: &str) -> std::result::Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(FieldValue::Empty);
        }
        match kind {
            FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
            FieldKind::Choice => Ok(FieldValue::Choice(raw.to_string())),
            FieldKind::Timestamp => {
                parse_timestamp(raw).ok_or_else(|| format!("unrecognized date/time '{raw}'"))
            }
        }
    }

    /// Read a value from tracker JSON. Tracker data is never rejected: a
    /// timestamp the parser cannot read is kept as text so it shows up in a
    /// diff rather than aborting the document.
    pub fn from_tracker(kind: FieldKind, value: &Value) -> Self {
        let text = match value {
            Value::Null => return FieldValue::Empty,
            Value::String(s) => s.trim().to_string(),
            Value::Object(obj) => match obj.get("value").or_else(|| obj.get("name")) {
                Some(Value::String(s)) => s.trim().to_string(),
                _ => return FieldValue::Empty,
            },
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(_) => return FieldValue::Text(value.to_string()),
        };
        if text.is_empty() {
            return FieldValue::Empty;
        }
        match kind {
            FieldKind::Text => FieldValue::Text(text),
            FieldKind::Choice => FieldValue::Choice(text),
            FieldKind::Timestamp => parse_timestamp(&text).unwrap_or(FieldValue::Text(text)),
        }
    }

    /// Encode for a tracker partial update.
    pub fn to_tracker(&self) -> Value {
        match self {
            FieldValue::Empty => Value::Null,
            FieldValue::Text(s) => json!(s),
            FieldValue::Choice(s) => json!({ "value": s }),
            FieldValue::Date(d) => json!(format!("{}T00:00:00.000+0000", d.format("%Y-%m-%d"))),
            FieldValue::Timestamp(t) => json!(t.format("%Y-%m-%dT%H:%M:%S%.3f+0000").to_string()),
        }
    }

    /// Type-appropriate equality used by the reconciler.
    pub fn matches(&self, other: &FieldValue) -> bool {
        use FieldValue::*;
        match (self, other) {
            (Empty, Empty) => true,
            (Text(a), Text(b)) => a == b,
            (Choice(a), Choice(b)) => canonical(a) == canonical(b),
            (Date(a), Date(b)) => a == b,
            (Date(d), Timestamp(t)) | (Timestamp(t), Date(d)) => t.date_naive() == *d,
            (Timestamp(a), Timestamp(b)) => truncate_to_minute(*a) == truncate_to_minute(*b),
            _ => false,
        }
    }

    /// The calendar day of a date or timestamp value.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            FieldValue::Timestamp(t) => Some(t.date_naive()),
            _ => None,
        }
    }

    /// A point in time; date-only values count from midnight UTC.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(t) => Some(*t),
            FieldValue::Date(d) => d.and_hms_opt(0, 0, 0).map(|n| n.and_utc()),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Empty => Ok(()),
            FieldValue::Text(s) | FieldValue::Choice(s) => f.write_str(s),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M UTC")),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::Empty => serializer.serialize_none(),
            other => serializer.collect_str(other),
        }
    }
}

/// Case-folded, whitespace-collapsed form used for choice comparison.
pub fn canonical(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn truncate_to_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M %z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse the date/time shapes seen in reports and tracker payloads.
/// Values without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<FieldValue> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(FieldValue::Timestamp(t.with_timezone(&Utc)));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(t) = DateTime::parse_from_str(raw, fmt) {
            return Some(FieldValue::Timestamp(t.with_timezone(&Utc)));
        }
    }
    let naive = raw
        .strip_suffix("UTC")
        .or_else(|| raw.strip_suffix('Z'))
        .unwrap_or(raw)
        .trim_end();
    for fmt in NAIVE_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(FieldValue::Timestamp(t.and_utc()));
        }
    }
    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .map(FieldValue::Date)
}

// ---------------------------------------------------------------------------
// FieldMap
// ---------------------------------------------------------------------------

/// Maps each incident field to the tracker field id that stores it.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMap {
    ids: BTreeMap<IncidentField, String>,
}

impl Default for FieldMap {
    fn default() -> Self {
        let ids = IncidentField::all()
            .iter()
            .map(|f| (*f, f.default_tracker_id().to_string()))
            .collect();
        Self { ids }
    }
}

impl FieldMap {
    /// Apply `field key -> tracker id` overrides from the settings file.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Result<Self> {
        let mut map = FieldMap::default();
        for (key, id) in overrides {
            let field: IncidentField = key.parse()?;
            map.ids.insert(field, id.trim().to_string());
        }
        Ok(map)
    }

    pub fn tracker_id(&self, field: IncidentField) -> &str {
        self.ids
            .get(&field)
            .map(String::as_str)
            .unwrap_or_else(|| field.default_tracker_id())
    }

    /// Read one incident field out of a tracker issue's `fields` object.
    pub fn read(&self, field: IncidentField, fields: &Map<String, Value>) -> FieldValue {
        fields
            .get(self.tracker_id(field))
            .map(|v| FieldValue::from_tracker(field.kind(), v))
            .unwrap_or(FieldValue::Empty)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
