use crate::overview::{OverviewRow, WeeklyOverview, REPORTED_SEVERITIES};

// Styles are inline attributes only; mail clients drop <style> blocks.
const BODY: &str = "font-family: Arial, Helvetica, sans-serif; font-size: 14px; color: #172b4d; margin: 24px;";
const TABLE: &str = "border-collapse: collapse; width: 100%; margin-bottom: 24px;";
const TH: &str = "border: 1px solid #dfe1e6; background: #f4f5f7; padding: 6px 8px; text-align: left; font-size: 12px; text-transform: uppercase;";
const TD: &str = "border: 1px solid #dfe1e6; padding: 6px 8px; vertical-align: top;";
const LINK: &str = "color: #0052cc; text-decoration: none;";
const MUTED: &str = "color: #6b778c;";

const COLUMNS: &[&str] = &[
    "Key", "Summary", "Severity", "Status", "Entities", "Report", "TTD", "TTM",
];

/// Render the weekly overview as a standalone HTML5 document.
pub fn render_overview(overview: &WeeklyOverview) -> String {
    let title = html_escape(&overview.title);

    let mut summary = String::new();
    summary.push_str(&format!(
        "      <li>New incidents: <strong>{}</strong></li>\n",
        overview.new_incidents.len()
    ));
    for severity in REPORTED_SEVERITIES {
        summary.push_str(&format!(
            "      <li>{}: {}</li>\n",
            html_escape(severity),
            overview.count(severity)
        ));
    }
    for (severity, count) in &overview.severity_counts {
        if !REPORTED_SEVERITIES.contains(&severity.as_str()) {
            summary.push_str(&format!("      <li>{}: {count}</li>\n", html_escape(severity)));
        }
    }
    summary.push_str(&format!(
        "      <li>Active incidents: <strong>{}</strong></li>\n",
        overview.active_incidents.len()
    ));

    format!(
        "<!doctype html>\n<html lang=\"en\">\n  <head>\n    <meta charset=\"utf-8\">\n    <title>{title}</title>\n  </head>\n  <body style=\"{BODY}\">\n    <h1 style=\"font-size: 22px;\">{title}</h1>\n    <p style=\"{MUTED}\">{} to {}</p>\n    <ul>\n{summary}    </ul>\n{}\n{}\n  </body>\n</html>\n",
        overview.window.last_friday,
        overview.window.this_friday,
        render_section(
            "New incidents",
            &overview.new_incidents,
            overview.new_incidents_link.as_deref()
        ),
        render_section(
            "Active incidents",
            &overview.active_incidents,
            overview.active_incidents_link.as_deref()
        ),
    )
}

fn render_section(title: &str, rows: &[OverviewRow], link: Option<&str>) -> String {
    let heading = format!("    <h2 style=\"font-size: 18px;\">{}</h2>\n", html_escape(title));
    if rows.is_empty() {
        return format!("{heading}    <p style=\"{MUTED}\">None.</p>");
    }

    let header: String = COLUMNS
        .iter()
        .map(|c| format!("<th style=\"{TH}\">{c}</th>"))
        .collect();
    let body: String = rows.iter().map(render_row).collect();
    let link = link
        .map(|href| {
            format!(
                "\n    <p><a style=\"{LINK}\" href=\"{}\">View in Jira</a></p>",
                html_escape(href)
            )
        })
        .unwrap_or_default();

    format!(
        "{heading}    <table style=\"{TABLE}\">\n      <thead><tr>{header}</tr></thead>\n      <tbody>\n{body}      </tbody>\n    </table>{link}"
    )
}

fn render_row(row: &OverviewRow) -> String {
    let inc = &row.incident;
    let report = match &inc.report_url {
        Some(url) => format!("<a style=\"{LINK}\" href=\"{}\">doc</a>", html_escape(url)),
        None => format!("<span style=\"{MUTED}\">no doc</span>"),
    };
    let cells = [
        format!(
            "<a style=\"{LINK}\" href=\"{}\">{}</a>",
            html_escape(&inc.url),
            html_escape(&inc.key)
        ),
        html_escape(&inc.summary),
        html_escape(&inc.severity),
        html_escape(&inc.status),
        html_escape(&inc.entities_display()),
        report,
        html_escape(&row.timings.ttd),
        html_escape(&row.timings.ttm),
    ];
    let cells: String = cells
        .iter()
        .map(|c| format!("<td style=\"{TD}\">{c}</td>"))
        .collect();
    format!("        <tr>{cells}</tr>\n")
}

pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldMap;
    use crate::incident::Incident;
    use crate::tracker::TrackerIssue;
    use chrono::{DateTime, Utc};
    use serde_json::{json, Value};

    fn incident(key: &str, fields: Value) -> Incident {
        let issue = TrackerIssue {
            key: key.into(),
            fields: fields.as_object().cloned().unwrap(),
        };
        Incident::from_issue(&issue, "https://example.atlassian.net", &FieldMap::default())
    }

    fn overview(incidents: Vec<Incident>) -> WeeklyOverview {
        let now: DateTime<Utc> = "2025-02-05T12:00:00Z".parse().unwrap();
        WeeklyOverview::build(incidents, now, "https://example.atlassian.net", "IIM").unwrap()
    }

    #[test]
    fn renders_title_counts_and_rows() {
        let html = render_overview(&overview(vec![incident(
            "IIM-7",
            json!({
                "summary": "Push <delays> & drops",
                "status": { "name": "Investigating" },
                "customfield_10319": { "value": "S1" },
                "customfield_15087": "2025-02-04T09:00:00.000+0000",
                "customfield_15191": "2025-02-04T08:00:00.000+0000",
                "customfield_12882": "2025-02-04T08:30:00.000+0000",
            }),
        )]));

        assert!(html.starts_with("<!doctype html>"));
        assert!(html.contains("<title>Weekly Incident Overview: 2025-02-07</title>"));
        assert!(html.contains("<li>S1: 1</li>"));
        assert!(html.contains("<li>S4: 0</li>"));
        assert!(html.contains("Push &lt;delays&gt; &amp; drops"));
        assert!(html.contains("href=\"https://example.atlassian.net/browse/IIM-7\">IIM-7</a>"));
        assert!(html.contains(">30m</td>"));
        assert!(html.contains("(ongoing)"));
        assert!(html.contains("View in Jira"));
        assert!(!html.contains("<style>"));
    }

    #[test]
    fn empty_sections_say_none() {
        let html = render_overview(&overview(Vec::new()));
        assert_eq!(html.matches("None.").count(), 2);
        assert!(!html.contains("View in Jira"));
    }

    #[test]
    fn escapes_quotes() {
        assert_eq!(html_escape(r#"a"b'c"#), "a&quot;b&#39;c");
    }
}
