use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use ppidata::config::{GlobalConfig, load_config_file, save_blank_config};
use ppidata::download::Downloader;
use ppidata::error::PpidataError;
use ppidata::sources::{all_sources, ensure_all_data};

#[derive(Parser)]
#[command(name = "ppidata")]
#[command(about = "Download and cache PPI and gene ID mapping datasets (HIPPIE, BioMart, STRING, BioGRID)")]
#[command(version, author)]
struct Cli {
    /// Path to a JSON config file (may contain ~ or environment variables).
    #[arg(long, global = true, env = "PPIDATA_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Write a blank config template")]
    Init {
        /// Where to write the template; defaults to the platform config dir.
        #[arg(long, short)]
        output: Option<String>,
    },
    #[command(about = "Download all data sources required by the toolkit")]
    Setup,
    #[command(about = "Report which data sources are present locally")]
    Status,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<PpidataError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PpidataError) -> u8 {
    match error {
        PpidataError::Http(_) | PpidataError::HttpStatus { .. } => 3,
        PpidataError::HashMismatch { .. } | PpidataError::Archive(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref());

    match cli.command {
        Commands::Init { output } => {
            let path = save_blank_config(output.as_deref()).into_diagnostic()?;
            println!("Blank config created: {path}");
            println!("Edit it and use with --config or PPIDATA_CONFIG.");
            Ok(())
        }
        Commands::Setup => {
            let downloader = Downloader::new().into_diagnostic()?;
            ensure_all_data(config.as_ref(), &downloader).into_diagnostic()?;
            Ok(())
        }
        Commands::Status => {
            for source in all_sources() {
                let ready = source.is_ready(config.as_ref()).into_diagnostic()?;
                println!(
                    "{:<10} {}",
                    source.name(),
                    if ready { "ready" } else { "missing" }
                );
            }
            Ok(())
        }
    }
}

/// A config file that fails to load is reported but not fatal: the CLI
/// falls back to an empty config and the platform-default data directory.
fn resolve_config(path: Option<&str>) -> Option<GlobalConfig> {
    let path = path?;
    match load_config_file(path) {
        Ok(config) => {
            println!("Loaded config: {path}");
            Some(config)
        }
        Err(err) => {
            eprintln!("config error: {err}");
            Some(GlobalConfig::default())
        }
    }
}
