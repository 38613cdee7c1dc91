use super::show;
use crate::output::{print_json, print_table};
use iim_core::jira::JiraClient;
use iim_core::reconcile::{reconcile_all, ApplyOutcome, Reconciliation, SyncMode};
use iim_core::{ErrorKind, IimError};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct SyncEntry<'a> {
    path: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a Reconciliation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run(config: Option<&Path>, commit: bool, files: &[PathBuf], json: bool) -> anyhow::Result<()> {
    let settings = super::load_settings(config)?;
    let client = JiraClient::new(&settings)?;
    let mode = SyncMode::from_commit_flag(commit);

    let results = reconcile_all(&client, files, &settings.fields, mode);
    let failed = results.iter().filter(|(_, r)| r.is_err()).count();

    if json {
        let entries: Vec<SyncEntry> = results
            .iter()
            .map(|(path, r)| SyncEntry {
                path,
                result: r.as_ref().ok(),
                error: r.as_ref().err().map(|e| e.to_string()),
            })
            .collect();
        print_json(&entries)?;
    } else {
        for (path, result) in &results {
            match result {
                Ok(rec) => {
                    print_reconciliation(rec);
                    println!();
                }
                Err(e) => report_failure(path, e),
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} report(s) failed", results.len());
    }
    Ok(())
}

fn print_reconciliation(rec: &Reconciliation) {
    println!("{} -> {}", rec.path.display(), rec.diff.issue_key);
    if rec.outcome == ApplyOutcome::InSync {
        println!("  in sync");
        return;
    }

    let rows = rec
        .diff
        .changes
        .iter()
        .map(|c| vec![c.field.to_string(), show(&c.old), show(&c.new)])
        .collect();
    print_table(&["FIELD", "TRACKER", "REPORT"], rows);

    match rec.outcome {
        ApplyOutcome::Pending => println!(
            "dry run: {} change(s) not sent (use --commit)",
            rec.diff.len()
        ),
        ApplyOutcome::Updated => {
            for c in &rec.diff.changes {
                println!("updated {}", c.field);
            }
        }
        ApplyOutcome::InSync => {}
    }
}

/// Parse errors already name their file.
fn report_failure(path: &Path, e: &IimError) {
    if e.kind() == ErrorKind::Parse {
        eprintln!("error: {e}");
    } else {
        eprintln!("error: {}: {e}", path.display());
    }
}
