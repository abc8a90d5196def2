//! Replay a recorded agent session and print the messages the model would
//! have received.
//!
//! # Examples
//!
//! ```sh
//! # Messages for the final step
//! waymark --transcript session.json
//!
//! # Every step, with a tighter history cap
//! waymark --transcript session.json --every-step --max-history 8
//!
//! # Machine-readable output with engine debug logs on stderr
//! waymark --transcript session.json --json --log-level waymark_rs=debug
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process;
use waymark_rs::agent::Transcript;
use waymark_rs::logging::{CapturedLogs, LogFormat, LoggingConfig};
use waymark_rs::{ContextError, Message};

/// Replay a recorded agent session through the context engine.
#[derive(Parser)]
#[command(name = "waymark", version)]
struct Cli {
    /// Transcript JSON file to replay
    #[arg(long)]
    transcript: PathBuf,

    /// Override the ledger cap from the transcript (must be > 5)
    #[arg(long)]
    max_history: Option<usize>,

    /// Print the messages for every step, not just the last
    #[arg(long)]
    every_step: bool,

    /// Print messages as JSON
    #[arg(long)]
    json: bool,

    /// Log filter directive for stderr output
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

async fn run(cli: &Cli) -> Result<String, ContextError> {
    let json = tokio::fs::read_to_string(&cli.transcript).await?;
    let mut transcript = Transcript::from_json(&json)?;
    if cli.max_history.is_some() {
        transcript.config.max_history_items = cli.max_history;
    }

    let turns = transcript.replay()?;
    let first_shown = if cli.every_step {
        0
    } else {
        turns.len().saturating_sub(1)
    };
    let shown = turns.get(first_shown..).unwrap_or_default();

    if cli.json {
        let mut out = if cli.every_step {
            serde_json::to_string_pretty(shown)?
        } else {
            serde_json::to_string_pretty(shown.last().map(Vec::as_slice).unwrap_or_default())?
        };
        out.push('\n');
        return Ok(out);
    }

    let mut out = String::new();
    for (offset, messages) in shown.iter().enumerate() {
        out.push_str(&render_turn(first_shown + offset, messages));
    }
    Ok(out)
}

fn render_turn(step: usize, messages: &[Message]) -> String {
    let mut out = format!("=== step {step} ({} messages) ===\n", messages.len());
    for msg in messages {
        out.push_str(&format!("--- {} ---\n{}\n", msg.role, msg.text()));
        for image in msg.images() {
            out.push_str(&format!(
                "[image: {}, {} chars, detail {:?}]\n",
                image.media_type,
                image.url.chars().count(),
                image.detail
            ));
        }
    }
    out
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let captured = CapturedLogs::new();
    let logging = LoggingConfig::default()
        .with_filter(&cli.log_level)
        .with_format(cli.log_format)
        .with_capture(captured.clone());
    if let Err(e) = logging.init() {
        eprintln!("Error: {e}");
        process::exit(2);
    }

    match run(&cli).await {
        Ok(output) => {
            print!("{output}");
            let warnings = captured.count(tracing::Level::WARN);
            if warnings > 0 {
                eprintln!("Replay finished with {warnings} warning(s)");
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
