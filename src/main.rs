//! warble: line-oriented stream control
//!
//! Reads one JSON request per line on stdin, `{"method": "...", "args": {...}}`,
//! and writes one JSON reply per line on stdout. Logs go to a daily file in
//! the config directory and, in debug builds, to stderr.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

use warble::audio_system::{Device, Speaker};
use warble::config::Config;
use warble::error::{AppResult, StreamError};
use warble::messaging::{CommandExecutor, EventBus, Reply};

/// One input line
#[derive(Debug, Deserialize)]
struct Envelope {
    method: String,
    #[serde(default)]
    args: Value,
}

fn initialize_tracing(config: &Config) {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = Config::log_dir().unwrap_or_else(|_| PathBuf::from("logs"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "warble.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    // stdout carries replies, so the console layer writes to stderr
    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Log directory: {}", log_dir.display());
}

fn load_config() -> AppResult<Config> {
    match std::env::args().nth(1) {
        Some(path) => Config::load_from(&PathBuf::from(&path))
            .with_context(|| format!("Failed to load config from {path}")),
        None => Config::load().context("Failed to load config"),
    }
}

/// Answer one input line
fn handle_line(executor: &CommandExecutor, line: &str) -> Reply {
    match serde_json::from_str::<Envelope>(line) {
        Ok(envelope) => executor.dispatch(&envelope.method, envelope.args),
        Err(e) => Reply::error(&StreamError::InvalidArgument(format!("malformed request: {e}"))),
    }
}

fn run(executor: &CommandExecutor) -> AppResult<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }

        let reply = handle_line(executor, &line);
        serde_json::to_writer(&mut stdout, &reply).context("Failed to encode reply")?;
        stdout.write_all(b"\n").context("Failed to write reply")?;
        stdout.flush().context("Failed to flush reply")?;
    }

    Ok(())
}

fn main() -> AppResult<()> {
    let config = load_config()?;
    initialize_tracing(&config);
    config.validate()?;

    let speaker = Speaker::init(config.sample_rate(), config.buffer_size)
        .context("Failed to open audio output")?;
    let device: Arc<dyn Device> = Arc::new(speaker);
    tracing::info!("warble {} ready at {}", env!("CARGO_PKG_VERSION"), device.sample_rate());

    let executor = CommandExecutor::new(device, EventBus::new())
        .with_default_buffered(config.default_buffered);

    let result = run(&executor);
    if let Err(e) = executor.shutdown() {
        tracing::error!("Shutdown left streams open: {}", e);
    }
    result
}
