use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use evscout::extract::ScanMode;
use evscout::harness::{HarnessOptions, run_harness};
use evscout::pipeline::{ScanOptions, ValidateOptions, scan_sources, validate_configs};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "evscout", about = "Event scraper feeding a pending-approval queue")]
struct Cli {
    #[arg(long, default_value = "configs/sources")]
    config_dir: PathBuf,

    #[arg(long, default_value = "data/state/queue.json")]
    queue_path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Stop at the first strategy that yields candidates.
    Fast,
    /// Run every strategy and union the results.
    Union,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Scan {
        #[arg(long)]
        source: Option<String>,
        #[arg(long, value_enum, default_value_t = ModeArg::Fast)]
        mode: ModeArg,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, default_value_t = 4)]
        workers: usize,
    },
    Validate {
        #[arg(long)]
        source_file: Option<PathBuf>,
    },
    Harness,
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            source,
            mode,
            dry_run,
            workers,
        } => {
            let reports = scan_sources(&ScanOptions {
                config_dir: cli.config_dir,
                queue_path: cli.queue_path,
                source,
                mode: match mode {
                    ModeArg::Fast => ScanMode::Fast,
                    ModeArg::Union => ScanMode::Union,
                },
                dry_run,
                workers,
            })?;

            for report in reports {
                info!(
                    source = %report.source_key,
                    found = report.found,
                    admitted = report.admitted,
                    skipped_duplicate = report.skipped_duplicate,
                    skipped_low_confidence = report.skipped_low_confidence,
                    flagged_review = report.flagged_review,
                    suppressed_past = report.suppressed_past,
                    errored = report.errored,
                    "scan report"
                );
            }
        }
        Commands::Validate { source_file } => {
            let messages = validate_configs(&ValidateOptions {
                config_dir: Some(cli.config_dir),
                source_file,
            })?;
            for line in messages {
                println!("{line}");
            }
        }
        Commands::Harness => {
            let report = run_harness(&HarnessOptions {
                config_dir: cli.config_dir,
                queue_path: cli.queue_path,
            })?;

            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}
