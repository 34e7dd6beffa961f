//! idlecat - pipe stdin to stdout while watching for activity transitions.
//!
//! Relays standard input to standard output unchanged, classifies the stream
//! as IDLE or ACTIVE from inter-arrival gaps, and runs user-supplied shell
//! commands on qualifying transitions and on end-of-stream.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use idlecat::config::Config;
use idlecat::hooks::ShellHooks;
use idlecat::monitor::Monitor;

/// Pipe stdin to stdout while running hooks on idle/active transitions.
///
/// The stream starts IDLE. Data arriving flips it ACTIVE; silence longer
/// than the idle timeout flips it back. A transition's hook only runs when
/// the exited phase lasted at least its configured threshold.
#[derive(Parser, Debug)]
#[command(name = "idlecat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Seconds of silence before the stream is considered idle.
    #[arg(short = 't', long, value_parser = clap::value_parser!(u64).range(1..))]
    idle_timeout: Option<u64>,

    /// Minimum seconds spent idle before the idle-to-active hook fires.
    #[arg(short = 'i', long, value_parser = clap::value_parser!(u64).range(1..))]
    idle_to_active: Option<u64>,

    /// Minimum seconds spent active before the active-to-idle hook fires.
    #[arg(short = 'a', long, value_parser = clap::value_parser!(u64).range(1..))]
    active_to_idle: Option<u64>,

    /// Command to run on an idle-to-active transition.
    #[arg(short = 'I', long, value_name = "COMMAND")]
    on_active: Option<String>,

    /// Command to run on an active-to-idle transition.
    #[arg(short = 'A', long, value_name = "COMMAND")]
    on_idle: Option<String>,

    /// Command to run on end-of-stream.
    #[arg(short = 'E', long, value_name = "COMMAND")]
    on_eof: Option<String>,

    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log hook commands instead of executing them.
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    /// Overlay command-line values onto a loaded config.
    fn apply_to(&self, config: &mut Config) {
        if let Some(t) = self.idle_timeout {
            config.idle_timeout_seconds = t;
        }
        if let Some(i) = self.idle_to_active {
            config.idle_to_active_threshold_seconds = i;
        }
        if let Some(a) = self.active_to_idle {
            config.active_to_idle_threshold_seconds = a;
        }
        if self.on_active.is_some() {
            config.on_active_command = self.on_active.clone();
        }
        if self.on_idle.is_some() {
            config.on_idle_command = self.on_idle.clone();
        }
        if self.on_eof.is_some() {
            config.on_eof_command = self.on_eof.clone();
        }
        if self.dry_run {
            config.dry_run = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    let mut config =
        Config::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_to(&mut config);
    config.validate().context("Invalid configuration")?;

    debug!(
        "Starting with idle_timeout={}s idle_to_active={}s active_to_idle={}s",
        config.idle_timeout_seconds,
        config.idle_to_active_threshold_seconds,
        config.active_to_idle_threshold_seconds
    );

    let hooks = ShellHooks::new(
        config.on_active_command.clone(),
        config.on_idle_command.clone(),
        config.on_eof_command.clone(),
        config.dry_run,
    );

    let mut monitor = Monitor::new(config.thresholds(), hooks);
    monitor
        .run(tokio::io::stdin(), tokio::io::stdout())
        .await
}

/// Initialize logging with the specified level.
///
/// Stdout carries the relayed stream, so the subscriber writes to stderr.
fn init_logging(level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_new(format!("idlecat={level}")).context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}
