use crate::config::ENV_URL;
use crate::error::{IimError, Result};
use crate::incident::Incident;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Severities always listed in the summary, even at zero.
pub const REPORTED_SEVERITIES: &[&str] = &["S1", "S2", "S3", "S4"];

/// How far back `iim active` looks for resolved incidents.
pub const RECENTLY_RESOLVED_DAYS: i64 = 14;

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// Friday-to-Friday reporting week, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub last_friday: NaiveDate,
    pub this_friday: NaiveDate,
}

impl Window {
    /// The window ending on the Friday of `today`'s Monday-based week.
    pub fn ending_this_week(today: NaiveDate) -> Self {
        let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        let this_friday = monday + Duration::days(4);
        Self {
            last_friday: this_friday - Duration::days(7),
            this_friday,
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.last_friday && day <= self.this_friday
    }
}

// ---------------------------------------------------------------------------
// Timings
// ---------------------------------------------------------------------------

const UNKNOWN: &str = "?";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Timings {
    /// Time to detect.
    pub ttd: String,
    /// Time to mitigate, or time so far with an "(ongoing)" suffix.
    pub ttm: String,
}

impl Timings {
    pub fn for_incident(incident: &Incident, now: DateTime<Utc>) -> Self {
        let start = incident
            .impact_start
            .instant()
            .or_else(|| incident.detected.instant());
        let Some(start) = start else {
            return Self {
                ttd: UNKNOWN.to_string(),
                ttm: UNKNOWN.to_string(),
            };
        };

        let ttd = incident
            .detected
            .instant()
            .map(|detected| humanize_duration(detected - start))
            .unwrap_or_else(|| UNKNOWN.to_string());
        let ttm = match incident.mitigated.instant() {
            Some(mitigated) => humanize_duration(mitigated - start),
            None => format!("{} (ongoing)", humanize_duration(now - start)),
        };
        Self { ttd, ttm }
    }
}

/// The two most significant of days/hours/minutes/seconds: `1d 2h`,
/// `5m 3s`, `0s`. Negative durations get a leading `-`.
pub fn humanize_duration(d: Duration) -> String {
    let total = d.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let total = total.unsigned_abs();

    let days = total / 86_400;
    let hours = total % 86_400 / 3_600;
    let minutes = total % 3_600 / 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    for (value, unit) in [(days, "d"), (hours, "h"), (minutes, "m")] {
        if value > 0 {
            parts.push(format!("{}{unit}", group_thousands(value)));
        }
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{}s", group_thousands(seconds)));
    }
    parts.truncate(2);

    format!("{sign}{}", parts.join(" "))
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

// ---------------------------------------------------------------------------
// WeeklyOverview
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct OverviewRow {
    #[serde(flatten)]
    pub incident: Incident,
    #[serde(flatten)]
    pub timings: Timings,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyOverview {
    pub title: String,
    pub window: Window,
    pub new_incidents: Vec<OverviewRow>,
    pub active_incidents: Vec<OverviewRow>,
    pub severity_counts: BTreeMap<String, usize>,
    pub new_incidents_link: Option<String>,
    pub active_incidents_link: Option<String>,
}

impl WeeklyOverview {
    pub fn build<Tz: TimeZone>(
        incidents: Vec<Incident>,
        now: DateTime<Tz>,
        base_url: &str,
        project: &str,
    ) -> Result<Self> {
        let window = Window::ending_this_week(now.date_naive());
        let now = now.with_timezone(&Utc);

        let rows: Vec<OverviewRow> = incidents
            .into_iter()
            .map(|incident| OverviewRow {
                timings: Timings::for_incident(&incident, now),
                incident,
            })
            .collect();

        let new_incidents: Vec<OverviewRow> = rows
            .iter()
            .filter(|r| {
                r.incident
                    .declare_date
                    .date()
                    .is_some_and(|d| window.contains(d))
            })
            .cloned()
            .collect();
        let active_incidents: Vec<OverviewRow> = rows
            .into_iter()
            .filter(|r| r.incident.is_active())
            .collect();

        let mut severity_counts = BTreeMap::new();
        for row in &new_incidents {
            *severity_counts
                .entry(row.incident.severity.clone())
                .or_insert(0) += 1;
        }

        let new_incidents_link = search_link(base_url, project, &keys(&new_incidents))?;
        let active_incidents_link = search_link(base_url, project, &keys(&active_incidents))?;

        Ok(Self {
            title: format!("Weekly Incident Overview: {}", window.this_friday),
            window,
            new_incidents,
            active_incidents,
            severity_counts,
            new_incidents_link,
            active_incidents_link,
        })
    }

    pub fn count(&self, severity: &str) -> usize {
        self.severity_counts.get(severity).copied().unwrap_or(0)
    }

    /// `incident_overview_YYYYMMDD.html`, dated by this Friday.
    pub fn file_name(&self) -> String {
        format!(
            "incident_overview_{}.html",
            self.window.this_friday.format("%Y%m%d")
        )
    }
}

fn keys(rows: &[OverviewRow]) -> Vec<&str> {
    rows.iter().map(|r| r.incident.key.as_str()).collect()
}

/// Tracker issue-list link showing exactly `keys`. `None` when there are
/// no keys, since `key in ()` is not valid JQL.
pub fn search_link(base_url: &str, project: &str, keys: &[&str]) -> Result<Option<String>> {
    if keys.is_empty() {
        return Ok(None);
    }
    let jql = format!(
        "project = {project} AND issuetype = Incident AND key in ({})",
        keys.join(",")
    );
    let base = format!("{base_url}/jira/software/c/projects/{project}/issues");
    let url = reqwest::Url::parse_with_params(&base, &[("jql", jql)]).map_err(|e| {
        IimError::InvalidSetting {
            name: ENV_URL,
            reason: e.to_string(),
        }
    })?;
    Ok(Some(url.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldMap;
    use crate::tracker::TrackerIssue;
    use serde_json::{json, Value};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn incident(key: &str, fields: Value) -> Incident {
        let issue = TrackerIssue {
            key: key.into(),
            fields: fields.as_object().cloned().unwrap(),
        };
        Incident::from_issue(&issue, "https://example.atlassian.net", &FieldMap::default())
    }

    #[test]
    fn window_runs_friday_to_friday() {
        // Wednesday 2025-02-05
        let w = Window::ending_this_week(day(2025, 2, 5));
        assert_eq!(w.this_friday, day(2025, 2, 7));
        assert_eq!(w.last_friday, day(2025, 1, 31));
        assert!(w.contains(day(2025, 1, 31)));
        assert!(w.contains(day(2025, 2, 7)));
        assert!(!w.contains(day(2025, 2, 8)));
    }

    #[test]
    fn window_on_sunday_uses_same_week() {
        let w = Window::ending_this_week(day(2025, 2, 9));
        assert_eq!(w.this_friday, day(2025, 2, 7));
    }

    #[test]
    fn humanizes_durations() {
        assert_eq!(humanize_duration(Duration::zero()), "0s");
        assert_eq!(humanize_duration(Duration::seconds(90)), "1m 30s");
        assert_eq!(humanize_duration(Duration::seconds(3_600)), "1h");
        assert_eq!(
            humanize_duration(Duration::days(1) + Duration::hours(2) + Duration::minutes(3)),
            "1d 2h"
        );
        assert_eq!(humanize_duration(Duration::seconds(-61)), "-1m 1s");
        assert_eq!(humanize_duration(Duration::days(1_234)), "1,234d");
    }

    #[test]
    fn timings_from_impact_start() {
        let inc = incident(
            "IIM-1",
            json!({
                "customfield_15191": "2025-02-03T10:00:00.000+0000",
                "customfield_12882": "2025-02-03T10:15:00.000+0000",
                "customfield_12886": "2025-02-03T12:30:00.000+0000",
            }),
        );
        let t = Timings::for_incident(&inc, at("2025-02-05T00:00:00Z"));
        assert_eq!(t.ttd, "15m");
        assert_eq!(t.ttm, "2h 30m");
    }

    #[test]
    fn timings_fall_back_to_detected_and_mark_ongoing() {
        let inc = incident(
            "IIM-1",
            json!({ "customfield_12882": "2025-02-03T10:00:00.000+0000" }),
        );
        let t = Timings::for_incident(&inc, at("2025-02-04T11:00:00Z"));
        assert_eq!(t.ttd, "0s");
        assert_eq!(t.ttm, "1d 1h (ongoing)");
    }

    #[test]
    fn timings_unknown_without_start() {
        let t = Timings::for_incident(&incident("IIM-1", json!({})), Utc::now());
        assert_eq!(t.ttd, "?");
        assert_eq!(t.ttm, "?");
    }

    #[test]
    fn search_link_encodes_jql() {
        let link = search_link("https://example.atlassian.net", "IIM", &["IIM-1", "IIM-2"])
            .unwrap()
            .unwrap();
        assert_eq!(
            link,
            "https://example.atlassian.net/jira/software/c/projects/IIM/issues?jql=project+%3D+IIM+AND+issuetype+%3D+Incident+AND+key+in+%28IIM-1%2CIIM-2%29"
        );
        assert_eq!(search_link("https://x", "IIM", &[]).unwrap(), None);
    }

    #[test]
    fn builds_weekly_overview() {
        let incidents = vec![
            incident(
                "IIM-1",
                json!({
                    "status": { "name": "Resolved" },
                    "customfield_10319": { "value": "S2" },
                    "customfield_15087": "2025-02-03T09:00:00.000+0000",
                }),
            ),
            incident(
                "IIM-2",
                json!({
                    "status": { "name": "Investigating" },
                    "customfield_10319": { "value": "S2" },
                    "customfield_15087": "2025-02-07T09:00:00.000+0000",
                }),
            ),
            incident(
                "IIM-3",
                json!({
                    "status": { "name": "Mitigated" },
                    "customfield_15087": "2025-01-10T09:00:00.000+0000",
                }),
            ),
        ];
        let o = WeeklyOverview::build(
            incidents,
            at("2025-02-05T12:00:00Z"),
            "https://example.atlassian.net",
            "IIM",
        )
        .unwrap();

        assert_eq!(o.title, "Weekly Incident Overview: 2025-02-07");
        assert_eq!(o.file_name(), "incident_overview_20250207.html");
        let new: Vec<_> = o.new_incidents.iter().map(|r| r.incident.key.as_str()).collect();
        assert_eq!(new, ["IIM-1", "IIM-2"]);
        let active: Vec<_> = o.active_incidents.iter().map(|r| r.incident.key.as_str()).collect();
        assert_eq!(active, ["IIM-2", "IIM-3"]);
        assert_eq!(o.count("S2"), 2);
        assert_eq!(o.count("S1"), 0);
        assert!(o.new_incidents_link.as_deref().unwrap().contains("IIM-1%2CIIM-2"));
    }
}
