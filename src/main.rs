use anyhow::{Context, Result};
use cfbackup::backup::{self, BackupEnvelope, CcCreator, Replay, RestoreOptions, RestorePlan, SnapshotConfig};
use cfbackup::cc::client::CcClient;
use cfbackup::cc::target::CcTarget;
use cfbackup::config::Config;
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Snapshot and restore Cloud Foundry metadata
#[derive(Parser, Debug)]
#[command(name = "cfbackup", version = cfbackup::VERSION, about, long_about = None)]
struct Args {
    /// Cloud Controller API endpoint
    #[arg(long, global = true)]
    api: Option<String>,

    /// Bearer token (defaults to the cf CLI session)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture the current state into the snapshot file
    Snapshot {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Recreate the state recorded in the snapshot file
    Restore {
        #[arg(long)]
        file: Option<PathBuf>,
        /// Restore security groups
        #[arg(long)]
        include_security_groups: bool,
        /// Restore quota definitions
        #[arg(long)]
        include_quota_definitions: bool,
    },
    /// Show an outline of the snapshot file
    Info {
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&Path>,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let (writer, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .with_target(false)
        .init();

    tracing::debug!("cfbackup {} started with log level: {:?}", cfbackup::VERSION, level);
    if let Some(path) = log_file {
        tracing::debug!("Log file: {:?}", path);
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = setup_logging(args.log_level, args.log_file.as_deref())?;
    let mut config = Config::load();

    match args.command {
        Command::Snapshot { ref file } => {
            let path = config.backup_file(file.clone());
            let client = connect(&args, &config)?;
            run_snapshot(&client, &path).await?;
            if let Err(e) = config.set_api(&client.target.api) {
                tracing::warn!("Failed to save config: {}", e);
            }
        }
        Command::Restore {
            ref file,
            include_security_groups,
            include_quota_definitions,
        } => {
            let path = config.backup_file(file.clone());
            let options = RestoreOptions {
                include_security_groups: include_security_groups || config.include_security_groups,
                include_quota_definitions: include_quota_definitions || config.include_quota_definitions,
            };
            let client = connect(&args, &config)?;
            run_restore(&client, &path, &options).await?;
        }
        Command::Info { ref file } => {
            run_info(&config.backup_file(file.clone()))?;
        }
    }

    Ok(())
}

/// Resolve the target; a saved endpoint is the last resort
fn connect(args: &Args, config: &Config) -> Result<CcClient> {
    let target = match CcTarget::discover(args.api.as_deref(), args.token.as_deref()) {
        Ok(target) => target,
        Err(err) => match &config.api {
            Some(api) => CcTarget::new(api, args.token.clone()),
            None => return Err(err),
        },
    };
    tracing::info!("Using API endpoint {}", target.api);
    CcClient::new(target)
}

async fn run_snapshot(client: &CcClient, path: &Path) -> Result<()> {
    let envelope = backup::snapshot(client, &SnapshotConfig::default())
        .await
        .context("Snapshot failed, nothing was written")?;
    envelope.write_to(path)?;
    println!("Snapshot written to {}", path.display());
    Ok(())
}

async fn run_restore(client: &CcClient, path: &Path, options: &RestoreOptions) -> Result<()> {
    let envelope = read_envelope(path)?;
    let replay = Replay::from_envelope(&envelope).context("Snapshot file is not a valid backup")?;
    let plan = RestorePlan::build(&replay, options);
    tracing::info!("Restoring {} steps from {}", plan.len(), path.display());

    let mut creator = CcCreator::new(client);
    let (report, _) = backup::restore(&replay, &plan, &mut creator).await;

    println!(
        "Restore finished: {} created, {} associated, {} failed, {} skipped",
        report.created, report.associated, report.failed, report.skipped
    );
    Ok(())
}

fn run_info(path: &Path) -> Result<()> {
    let envelope = read_envelope(path)?;
    let replay = Replay::from_envelope(&envelope).context("Snapshot file is not a valid backup")?;

    if let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) {
        let taken: DateTime<Local> = modified.into();
        println!("Snapshot {} taken {}", path.display(), taken.format("%Y-%m-%d %H:%M:%S"));
    }
    for line in backup::summarize(&replay) {
        println!("{line}");
    }
    Ok(())
}

fn read_envelope(path: &Path) -> Result<BackupEnvelope> {
    if !path.exists() {
        anyhow::bail!(
            "Failed to read backup file {}. You can create one with `cfbackup snapshot`.",
            path.display()
        );
    }
    Ok(BackupEnvelope::read_from(path)?)
}
