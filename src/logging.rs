//! Tracing configuration and log routing.
//!
//! Request milestones (uploads, summaries, flashcard runs) go to stdout through a compact
//! formatter and to a log file. When `SUMMERY_LOG_FILE` is set, logs are appended to that
//! path; otherwise the file lives at `logs/summeryai.log`. The file writer is non-blocking so
//! per-chunk debug events do not stall ingestion.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_VAR: &str = "SUMMERY_LOG_FILE";
const LOG_DIR: &str = "logs";
const LOG_FILE_NAME: &str = "summeryai.log";

/// Configure tracing subscribers for stdout and optional file logging.
///
/// `RUST_LOG` controls filtering (default `info`). The file layer keeps targets so module
/// paths (`summeryai::processing::ingest`) are visible when grepping logs; stdout omits them.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    if let Some(writer) = configure_file_writer() {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).init();
    } else {
        registry.init();
    }
}

/// Resolve the log file path, create its parent directory, and wrap it in a non‑blocking writer.
///
/// Returns `None` (after reporting on stderr) when the file cannot be opened; stdout logging
/// still works in that case.
fn configure_file_writer() -> Option<NonBlocking> {
    let path = std::env::var(LOG_FILE_VAR)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(LOG_DIR).join(LOG_FILE_NAME));

    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty())
        && let Err(err) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create log directory {}: {err}", parent.display());
        return None;
    }

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}
