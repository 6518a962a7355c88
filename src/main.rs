//! Replay harness
//!
//! Runs a recorded conversation through the decision engine. Each input line
//! is one JSON `ComprehensionSignal`; each output line is the `Decision` for
//! that turn. Logs go to stderr so stdout stays machine-readable.
//!
//! Usage:
//!   sally-sells [signals.ndjson]
//!
//! Reads stdin when no path is given. Configuration comes from
//! `SALLY_SELLS__*` environment variables (see `config::AppConfig`).

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sally_sells::adapters::{FileSessionStore, InMemorySessionStore};
use sally_sells::application::{
    ProcessTurnCommand, ProcessTurnHandler, StartSessionCommand, StartSessionHandler,
};
use sally_sells::config::{AppConfig, LoggingConfig, StorageBackend};
use sally_sells::domain::sales::{ComprehensionSignal, ObjectionRouter, PhaseCatalog, TurnPipeline};
use sally_sells::ports::SessionStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config.logging);

    let store: Arc<dyn SessionStore> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(InMemorySessionStore::new()),
        StorageBackend::File => Arc::new(FileSessionStore::new(&config.storage.base_path)),
    };
    let pipeline = Arc::new(TurnPipeline::new(
        PhaseCatalog::standard().clone(),
        ObjectionRouter::standard(),
        config.engine.thresholds(),
    )?);

    let started = StartSessionHandler::new(store.clone())
        .handle(StartSessionCommand::now())
        .await?;
    let session_id = started.state.session_id;
    let turns = ProcessTurnHandler::new(store, pipeline);

    let input: Box<dyn AsyncRead + Unpin> = match std::env::args().nth(1) {
        Some(path) => Box::new(tokio::fs::File::open(path).await?),
        None => Box::new(tokio::io::stdin()),
    };
    let mut lines = BufReader::new(input).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let signal = parse_signal(line);

        let result = turns.handle(ProcessTurnCommand::new(session_id, signal)).await?;
        let mut out = serde_json::to_string(&result.decision)?;
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;

        if result.ended {
            break;
        }
    }
    stdout.flush().await?;

    Ok(())
}

/// Unparseable lines count as an empty signal.
fn parse_signal(line: &str) -> ComprehensionSignal {
    serde_json::from_str(line).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Malformed signal, using defaults");
        ComprehensionSignal::default()
    })
}

fn init_tracing(logging: &LoggingConfig) {
    let json = logging.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let plain = (!logging.json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(logging.env_filter())
        .with(json)
        .with(plain)
        .init();
}
