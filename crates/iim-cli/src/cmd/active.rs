use crate::output::print_json;
use anyhow::Context;
use chrono::{Duration, Local};
use iim_core::incident::Incident;
use iim_core::jira::JiraClient;
use iim_core::overview::RECENTLY_RESOLVED_DAYS;
use iim_core::tracker::{incidents_jql, Tracker};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ActiveIncidents<'a> {
    recently_resolved: Vec<&'a Incident>,
    active: Vec<&'a Incident>,
}

pub fn run(config: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let settings = super::load_settings(config)?;
    let client = JiraClient::new(&settings)?;
    let issues = client
        .search(&incidents_jql(&settings.project))
        .context("failed to query incidents")?;
    let incidents: Vec<Incident> = issues
        .iter()
        .map(|issue| Incident::from_issue(issue, &settings.base_url, &settings.fields))
        .collect();

    let since = Local::now().date_naive() - Duration::days(RECENTLY_RESOLVED_DAYS);
    let report = ActiveIncidents {
        recently_resolved: incidents.iter().filter(|i| i.resolved_since(since)).collect(),
        active: incidents.iter().filter(|i| i.is_active()).collect(),
    };

    if json {
        return print_json(&report);
    }

    print_section("Recently resolved incidents", &report.recently_resolved, true);
    print_section("Active incidents", &report.active, false);
    Ok(())
}

fn print_section(title: &str, incidents: &[&Incident], with_resolved: bool) {
    println!();
    println!("# {title} ({}):", incidents.len());
    println!();
    for inc in incidents {
        println!("{}  {}  ({})", inc.key, inc.summary, inc.entities_display());
        if with_resolved {
            println!("{}", inc.resolved);
        }
        println!("{}", inc.url);
        println!("{}", inc.report_display());
        println!();
    }
}
