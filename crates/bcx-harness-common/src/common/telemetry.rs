#![expect(clippy::print_stderr, reason = "Tracing not initialized yet")]

//! Tracing setup shared by the harness CLI and test binaries.
//!
//! Output is controlled through the environment:
//! - `RUST_LOG` filters events (falls back to the level passed by the caller)
//! - `BCX_LOG` appends to a file instead of a terminal stream
//! - `BCX_LOG_FORMAT` selects `text` (default) or `json`
//! - `BCX_LOG_STREAM` selects `stderr` (default) or `stdout`

use std::io::IsTerminal;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

const LOG_FILE_ENV: &str = "BCX_LOG";
const LOG_FORMAT_ENV: &str = "BCX_LOG_FORMAT";
const LOG_STREAM_ENV: &str = "BCX_LOG_STREAM";

/// Keeps the non-blocking file writer alive; drop it last.
#[derive(Debug)]
pub struct TelemetryGuard {
    _guard: Option<WorkerGuard>,
}

impl TelemetryGuard {
    fn disabled() -> Self {
        Self { _guard: None }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogStream {
    Stderr,
    Stdout,
}

impl LogStream {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("stdout") => LogStream::Stdout,
            _ => LogStream::Stderr,
        }
    }
}

/// Installs the global subscriber. A second call is a no-op and returns a
/// disabled guard, so test binaries may call it from every test.
pub fn init_tracing(default_level: &str) -> TelemetryGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let format = LogFormat::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref());
    let stream = LogStream::parse(std::env::var(LOG_STREAM_ENV).ok().as_deref());
    let log_file = std::env::var(LOG_FILE_ENV).ok().map(PathBuf::from);

    let (writer, guard, ansi) = match log_file {
        Some(path) => match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            Ok(file) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(file);
                (BoxMakeWriter::new(non_blocking), Some(guard), false)
            }
            Err(err) => {
                eprintln!(
                    "Warning: failed to open log file {}: {}",
                    path.display(),
                    err
                );
                stream_writer(LogStream::Stderr)
            }
        },
        None => stream_writer(stream),
    };

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = match format {
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_ansi(false)
                .json()
                .with_writer(writer)
                .finish(),
        ),
        LogFormat::Text => Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(ansi)
                .with_writer(writer)
                .finish(),
        ),
    };

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return TelemetryGuard::disabled();
    }

    TelemetryGuard { _guard: guard }
}

fn stream_writer(stream: LogStream) -> (BoxMakeWriter, Option<WorkerGuard>, bool) {
    match stream {
        LogStream::Stdout => (
            BoxMakeWriter::new(std::io::stdout),
            None,
            std::io::stdout().is_terminal(),
        ),
        LogStream::Stderr => (
            BoxMakeWriter::new(std::io::stderr),
            None,
            std::io::stderr().is_terminal(),
        ),
    }
}
