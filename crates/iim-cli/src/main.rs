mod cmd;
mod output;

use clap::{ArgAction, Parser, Subcommand};
use iim_core::{ErrorKind, IimError};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "iim",
    about = "Incident tracker tools: active incidents, report sync, weekly overview",
    version,
    propagate_version = true
)]
struct Cli {
    /// Settings file (default: ./iim.yaml when present)
    #[arg(long, global = true, env = "IIM_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List active and recently resolved incidents
    Active,

    /// Compare local incident reports with the tracker and optionally update it
    Sync {
        /// Send the changes to the tracker (default: dry run)
        #[arg(long)]
        commit: bool,

        /// Incident report documents
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Write the weekly HTML incident overview
    Overview {
        /// Directory for the generated file (default: incident_overviews)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Validate settings without contacting the tracker
    CheckConfig,
}

fn main() {
    // Before parsing, so `.env` can supply `IIM_CONFIG` too.
    let dotenv = iim_core::config::load_dotenv();
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Active => cmd::active::run(config, cli.json),
        Commands::Sync { commit, files } => cmd::sync::run(config, commit, &files, cli.json),
        Commands::Overview { output_dir } => {
            cmd::overview::run(config, output_dir.as_deref(), cli.json)
        }
        Commands::CheckConfig => cmd::check_config::run(config, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}

/// 2 for configuration problems, 1 for everything else.
fn exit_code(e: &anyhow::Error) -> i32 {
    let is_config = e
        .chain()
        .filter_map(|cause| cause.downcast_ref::<IimError>())
        .any(|ie| ie.kind() == ErrorKind::Config);
    if is_config {
        2
    } else {
        1
    }
}
