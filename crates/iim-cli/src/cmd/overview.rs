use crate::output::print_json;
use anyhow::Context;
use chrono::Local;
use iim_core::incident::Incident;
use iim_core::io::publish;
use iim_core::jira::JiraClient;
use iim_core::overview::WeeklyOverview;
use iim_core::render::render_overview;
use iim_core::tracker::{incidents_jql, Tracker};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct Written<'a> {
    path: &'a Path,
    overview: &'a WeeklyOverview,
}

pub fn run(config: Option<&Path>, output_dir: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let settings = super::load_settings(config)?;
    let client = JiraClient::new(&settings)?;
    let issues = client
        .search(&incidents_jql(&settings.project))
        .context("failed to query incidents")?;
    let incidents: Vec<Incident> = issues
        .iter()
        .map(|issue| Incident::from_issue(issue, &settings.base_url, &settings.fields))
        .collect();

    let overview =
        WeeklyOverview::build(incidents, Local::now(), &settings.base_url, &settings.project)?;
    let html = render_overview(&overview);

    let dir = output_dir.unwrap_or(settings.output_dir.as_path());
    let path = publish(dir, &overview.file_name(), html.as_bytes())
        .with_context(|| format!("failed to write overview to {}", dir.display()))?;
    tracing::info!(path = %path.display(), "overview written");

    if json {
        return print_json(&Written {
            path: &path,
            overview: &overview,
        });
    }
    println!("Report written to: {}", path.display());
    Ok(())
}
