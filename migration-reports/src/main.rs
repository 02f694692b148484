//! CLI collecting mailbox-migration diagnostics
//!
//! # Usage
//!
//! ```bash
//! # Collect reports for two mailboxes through the management shell
//! get-migration-reports alice@contoso.com bob@contoso.com
//!
//! # Read identities from a file and write to a custom directory
//! get-migration-reports --mailbox-file mailboxes.txt -o ./wave1-reports
//!
//! # Replay previously captured JSON documents
//! get-migration-reports alice@contoso.com --backend snapshot --snapshot-dir ./captures
//! ```

use anyhow::{bail, Context};
use clap::Parser;
use migration_reports::config::{BackendKind, Config, DEFAULT_CONFIG_FILE};
use migration_reports::records::MailboxIdentity;
use migration_reports::report::{OutcomeStatus, ReportRunner, RunReport};
use migration_reports::service::{ExchangeShell, MigrationService, SnapshotService};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "get-migration-reports")]
#[command(about = "Collect Exchange mailbox-migration diagnostics", long_about = None)]
#[command(version)]
struct Cli {
    /// Mailbox identities (UPN or alias)
    mailboxes: Vec<String>,

    /// File with one mailbox identity per line
    #[arg(long)]
    mailbox_file: Option<PathBuf>,

    /// Output directory for exports, summaries and the audit log
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Service backend
    #[arg(long, value_parser = parse_backend)]
    backend: Option<BackendKind>,

    /// Directory read by the snapshot backend
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(report) if report.has_failures() => std::process::exit(1),
        Ok(_) => {}
        Err(error) => {
            eprintln!("Error: {error:#}");
            std::process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<RunReport> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(dir) = cli.output_dir {
        config.output.directory = dir;
    }
    if let Some(backend) = cli.backend {
        config.service.backend = backend;
    }
    if let Some(dir) = cli.snapshot_dir {
        config.service.snapshot_dir = Some(dir);
    }
    config.validate()?;

    init_tracing(&config, cli.verbose);

    let mut mailboxes = Vec::new();
    for raw in &cli.mailboxes {
        mailboxes.push(MailboxIdentity::new(raw.as_str())?);
    }
    if let Some(path) = &cli.mailbox_file {
        mailboxes.extend(read_mailbox_file(path)?);
    }
    if mailboxes.is_empty() {
        bail!("No mailbox identity given (pass MAILBOX... or --mailbox-file)");
    }

    let service: Arc<dyn MigrationService> = match config.service.backend {
        BackendKind::Shell => Arc::new(ExchangeShell::new(&config.service)),
        BackendKind::Snapshot => {
            let dir = config
                .service
                .snapshot_dir
                .clone()
                .context("snapshot backend requires a snapshot directory")?;
            Arc::new(SnapshotService::new(dir))
        }
    };

    info!(
        "Collecting migration reports for {} mailbox(es) into {}",
        mailboxes.len(),
        config.output.directory.display()
    );

    let mut runner = ReportRunner::new(service, &config)
        .await
        .context("Failed to prepare output directory")?;
    let report = runner.run(&mailboxes).await?;

    print_report(&report, &config.log_path());
    Ok(report)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Ok(Config::from_file(DEFAULT_CONFIG_FILE)?),
        None => Ok(Config::default()),
    }
}

fn init_tracing(config: &Config, verbose: bool) {
    let default_level = if verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "compact" {
        registry
            .with(tracing_subscriber::fmt::layer().compact())
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

fn parse_backend(value: &str) -> Result<BackendKind, String> {
    match value {
        "shell" => Ok(BackendKind::Shell),
        "snapshot" => Ok(BackendKind::Snapshot),
        other => Err(format!("unknown backend '{}' (expected shell or snapshot)", other)),
    }
}

/// One identity per line; blank lines and `#` comments are ignored
fn read_mailbox_file(path: &Path) -> anyhow::Result<Vec<MailboxIdentity>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| MailboxIdentity::new(line).map_err(anyhow::Error::from))
        .collect()
}

fn print_report(report: &RunReport, log_path: &Path) {
    println!();
    println!("{:<40} {:<10} {:<6}", "Mailbox", "Result", "Files");
    println!("{:-<58}", "");

    for outcome in &report.outcomes {
        let mark = match outcome.status {
            OutcomeStatus::Succeeded => "✓",
            OutcomeStatus::Failed => "✗",
        };
        println!(
            "{:<40} {} {:<8} {:<6}",
            outcome.mailbox.as_str(),
            mark,
            outcome.status.to_string(),
            outcome.files.len()
        );
        if let Some(error) = &outcome.error {
            println!("    {}", error);
        }
    }

    println!(
        "\nTotal: {} succeeded, {} failed ({})",
        report.succeeded(),
        report.failed(),
        report.counts
    );
    println!("Audit log: {}", log_path.display());
}
