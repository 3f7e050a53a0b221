//! stream-gate: copy stdin to stdout only if the leading bytes validate.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use stream_gate::gate::{HeadPattern, MagicPrefix, SharedPredicate};
use stream_gate::{coerce_threshold, GateConfig, GateVerdict, GatedStream};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "stream-gate",
    version,
    about = "Pass stdin through to stdout only if its leading bytes validate"
)]
struct Cli {
    /// Leading bytes to buffer before validating (non-numeric or negative means 0)
    #[arg(short, long, env = "STREAM_GATE_BYTES")]
    bytes: Option<String>,

    /// Hex signature the stream must start with
    #[arg(long, conflicts_with = "pattern")]
    magic: Option<String>,

    /// Regex that must match somewhere in the leading bytes
    #[arg(long)]
    pattern: Option<String>,

    /// Config file (default: <config dir>/stream-gate/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print a JSON report to stderr when done
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_env("STREAM_GATE_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code(verdict: GateVerdict) -> ExitCode {
    match verdict {
        GateVerdict::Passed => ExitCode::SUCCESS,
        GateVerdict::Failed => ExitCode::from(2),
        GateVerdict::Errored => ExitCode::from(3),
        GateVerdict::Undecided => ExitCode::from(1),
    }
}

async fn run(cli: Cli) -> Result<GateVerdict> {
    let mut config = match &cli.config {
        Some(path) => GateConfig::load(path)?,
        None => GateConfig::load_or_default()?,
    };

    let predicate: Option<SharedPredicate> = if let Some(magic) = &cli.magic {
        let prefix = MagicPrefix::from_hex(magic)?;
        // Without an explicit threshold, buffer exactly the signature
        if cli.bytes.is_none() {
            config.required_bytes = prefix.len();
        }
        Some(Arc::new(prefix) as SharedPredicate)
    } else if let Some(pattern) = &cli.pattern {
        let pattern = HeadPattern::new(pattern).context("Invalid --pattern")?;
        Some(Arc::new(pattern) as SharedPredicate)
    } else {
        tracing::warn!("no predicate given, every stream will be rejected");
        None
    };

    if let Some(bytes) = &cli.bytes {
        config.required_bytes = coerce_threshold(bytes);
    }
    tracing::debug!(?config, "starting gate");

    let stream = GatedStream::new(config, predicate);
    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let report = stream.run(&mut stdin, &mut stdout).await?;

    if cli.json {
        let summary = serde_json::json!({
            "verdict": report.verdict(),
            "state": report.state,
            "completed": report.completed,
            "outcomes": report.outcome_kinds(),
            "error": report.error().map(|e| e.to_string()),
            "stats": report.stats,
            "bytes_written": report.bytes_written,
        });
        eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(report.verdict())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(verdict) => exit_code(verdict),
        Err(err) => {
            eprintln!("stream-gate: {:#}", err);
            ExitCode::from(1)
        }
    }
}
