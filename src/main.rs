use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use tankwatch::data::duration::parse_duration;
use tankwatch::{AlarmEvent, FileSource, FleetSource, HttpSource, Monitor, MonitorHandle, Settings};

#[derive(Parser, Debug)]
#[command(name = "tankwatch")]
#[command(about = "Escalating gas-danger alarms for ship tanks")]
struct Args {
    /// Config file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fleet API base URL (overrides api.endpoint)
    #[arg(short, long, conflicts_with = "file")]
    endpoint: Option<String>,

    /// Read the fleet from a JSON document instead of the API
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Poll interval (e.g., "5s")
    #[arg(long, value_parser = duration_arg)]
    poll: Option<Duration>,

    /// Time allowed in each stage before escalating (e.g., "30s")
    #[arg(long, value_parser = duration_arg)]
    window: Option<Duration>,

    /// Suppression window after an acknowledgment (e.g., "2m")
    #[arg(long, value_parser = duration_arg)]
    cooldown: Option<Duration>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(endpoint) = &args.endpoint {
        settings.api.endpoint = endpoint.clone();
    }
    if let Some(poll) = args.poll {
        settings.poll.interval = poll;
    }
    if let Some(window) = args.window {
        settings.escalation.stage_window = window;
    }
    if let Some(cooldown) = args.cooldown {
        settings.escalation.cooldown = cooldown;
    }

    let source: Arc<dyn FleetSource> = match &args.file {
        Some(path) => Arc::new(FileSource::new(path)),
        None => Arc::new(
            HttpSource::builder()
                .endpoint(settings.api.endpoint.clone())
                .timeout(settings.api.timeout)
                .build()
                .context("Failed to create API client")?,
        ),
    };

    println!(
        "Watching {} (a = acknowledge, s = status, e = raise emergency, c = clear emergency, q = quit)",
        source.description()
    );

    let handle = Monitor::builder(source).settings(settings).build()?.start();
    run(&handle).await?;
    handle.shutdown().await;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "tankwatch=debug" } else { "tankwatch=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Print events and handle operator commands until quit or Ctrl-C.
async fn run(handle: &MonitorHandle) -> Result<()> {
    let mut events = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(AlarmEvent::Countdown { .. }) => {}
                Ok(event) => println!("{}", event),
                Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "event output lagging"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    // Keep alarming until Ctrl-C
                    stdin_open = false;
                    continue;
                };
                match line.trim() {
                    "a" | "ack" => match handle.acknowledge().await {
                        Some(ack) => println!("Acknowledged {} (stage {})", ack.key, ack.stage),
                        None => println!("Nothing to acknowledge"),
                    },
                    "s" | "status" => {
                        let status = handle.status();
                        match &status.incident {
                            Some(incident) => println!("{}", incident),
                            None => println!("No active incident ({} scans)", status.scans),
                        }
                    }
                    "e" | "emergency" => {
                        if !handle.raise_emergency().await {
                            println!("Emergency already active");
                        }
                    }
                    "c" | "clear" => {
                        if !handle.clear_emergency().await {
                            println!("Nothing to clear (acknowledge an incident emergency instead)");
                        }
                    }
                    "q" | "quit" => break,
                    "" => {}
                    other => println!("Unknown command: {}", other),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
