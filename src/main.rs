//! Stream line matches out of an object-storage text collection.
//!
//! Runs one scan and writes its event frames to stdout. Logs go to stderr.

mod error;

use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use logsift_search::{MatchMode, ScanEvent};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const CRATES: [&str; 4] = ["logsift", "logsift_config", "logsift_search", "logsift_storage"];

#[derive(Debug, Parser)]
#[command(name = "logsift", version, about)]
struct Cli {
    /// Configuration file [default: config.toml in the platform config directory]
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
    /// Text to search for
    term: String,
    /// Only search under this date segment, e.g. 2024-05-01
    #[arg(short, long, value_name = "DATE")]
    date: Option<String>,
    /// Path prefix to search [default: from configuration]
    #[arg(short, long, value_name = "PREFIX")]
    prefix: Option<String>,
    /// How lines are matched: lenient, boundary or literal [default: from configuration]
    #[arg(short, long, value_name = "MODE", value_parser = parse_mode)]
    mode: Option<MatchMode>,
    /// Events buffered between the scan and stdout
    #[arg(long, default_value_t = 64)]
    buffer: usize,
}

fn parse_mode(value: &str) -> std::result::Result<MatchMode, String> {
    value.parse::<MatchMode>().map_err(|err| (*err).to_string())
}

fn default_filter(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    CRATES.iter().map(|target| format!("{target}={level}")).collect::<Vec<_>>().join(",")
}

fn init_logging(verbose: bool) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose))))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn write_frame<W: AsyncWrite + Unpin>(out: &mut W, event: &ScanEvent) -> std::io::Result<()> {
    out.write_all(event.to_frame().as_bytes()).await?;
    out.flush().await
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = logsift_config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Setup)?;
    if let Some(mode) = cli.mode {
        config.scan.match_mode = mode;
    }
    let scanner = config.build_scanner().or_raise(|| ErrorKind::Setup)?;
    let scan = scanner
        .start_scan(Some(&cli.term), cli.date.as_deref(), cli.prefix.as_deref())
        .or_raise(|| ErrorKind::Request)?;

    let (handle, mut events) = scan.spawn(cli.buffer);
    let mut stdout = tokio::io::stdout();
    let mut failed = false;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                failed |= matches!(event, ScanEvent::Error { .. });
                if let Err(err) = write_frame(&mut stdout, &event).await {
                    tracing::info!(error = %err, "Output closed; stopping scan");
                    handle.close();
                    break;
                }
                if event.is_terminal() {
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted; stopping scan");
                handle.close();
                break;
            },
        }
    }
    if failed {
        exn::bail!(ErrorKind::ScanFailed);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}
