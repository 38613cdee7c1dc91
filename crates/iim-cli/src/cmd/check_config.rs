use crate::output::{print_json, print_table};
use anyhow::Context;
use iim_core::config::{FileConfig, Settings, WarnLevel};
use iim_core::fields::IncidentField;
use iim_core::IimError;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ConfigReport {
    base_url: String,
    username: String,
    project: String,
    output_dir: String,
    fields: Vec<(IncidentField, String)>,
    warnings: Vec<String>,
}

pub fn run(config: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let file = FileConfig::discover(config).context("failed to load settings file")?;
    let warnings = file.validate();
    for w in &warnings {
        let tag = match w.level {
            WarnLevel::Error => "error",
            WarnLevel::Warning => "warning",
        };
        eprintln!("{tag}: {}", w.message);
    }
    let settings = Settings::from_env(&file).context("invalid configuration")?;

    let report = ConfigReport {
        base_url: settings.base_url.clone(),
        username: settings.username.clone(),
        project: settings.project.clone(),
        output_dir: settings.output_dir.display().to_string(),
        fields: IncidentField::all()
            .iter()
            .map(|&f| (f, settings.fields.tracker_id(f).to_string()))
            .collect(),
        warnings: warnings.iter().map(|w| w.message.clone()).collect(),
    };
    let errors = warnings
        .iter()
        .filter(|w| w.level == WarnLevel::Error)
        .count();

    if json {
        print_json(&report)?;
    } else {
        println!("tracker:    {}", report.base_url);
        println!("user:       {}", report.username);
        println!("project:    {}", report.project);
        println!("output dir: {}", report.output_dir);
        println!();
        let rows = report
            .fields
            .iter()
            .map(|(f, id)| vec![f.to_string(), id.clone()])
            .collect();
        print_table(&["FIELD", "TRACKER ID"], rows);
    }

    if errors > 0 {
        return Err(IimError::InvalidSetting {
            name: "config file",
            reason: format!("{errors} error(s)"),
        }
        .into());
    }
    Ok(())
}
