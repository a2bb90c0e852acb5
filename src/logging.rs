//! Tracing setup for the extractor.
//!
//! Diagnostics go to stderr only; stdout carries nothing but the JSON report. When the
//! application logs directory is usable each run also appends to its own plain-text file.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use time::{
    OffsetDateTime, UtcOffset, format_description::BorrowedFormatItem, macros::format_description,
};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, filter::LevelFilter, fmt, fmt::time::OffsetTime, prelude::*,
    util::TryInitError,
};

use crate::app_dirs::{self, AppDirError};

/// Run logs kept in the logs directory, counting the current one.
const KEEP_LOG_FILES: usize = 10;
const FILE_STEM: &str = "waveform-extract";
const FILE_STAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]-[hour][minute][second]");
const LINE_STAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[hour]:[minute]:[second].[subsecond digits:3]");

/// Outcome of the first successful [`init`]; later calls return it unchanged.
static INSTALLED: OnceLock<Option<PathBuf>> = OnceLock::new();
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Log directory unavailable: {0}")]
    Directory(#[from] AppDirError),
    #[error("Failed to list log directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to remove old log file {path}: {source}")]
    RemoveFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to format log file timestamp: {0}")]
    FormatTime(#[from] time::error::Format),
    #[error("Failed to open log file: {0}")]
    OpenFile(#[from] InitError),
    #[error("Failed to install global tracing subscriber: {0}")]
    Install(#[from] TryInitError),
}

/// How chatty the stderr console is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Warnings and errors only.
    Quiet,
    #[default]
    Normal,
    /// Engine internals such as kernel choice and per-stage timings.
    Verbose,
}

impl Verbosity {
    /// Resolve command-line switches; `quiet` wins over `verbose`.
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, true) => Self::Verbose,
            (false, false) => Self::Normal,
        }
    }

    fn level(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::WARN,
            Self::Normal => LevelFilter::INFO,
            Self::Verbose => LevelFilter::DEBUG,
        }
    }

    /// The log file never records less than `info`.
    fn file_level(self) -> LevelFilter {
        self.level().max(LevelFilter::INFO)
    }
}

/// Install the global subscriber and return the log file path, if one could be opened.
///
/// `RUST_LOG` replaces the console level when set. A missing or unwritable logs directory
/// only disables the file; it is reported as a warning once the console is up.
pub fn init(verbosity: Verbosity) -> Result<Option<PathBuf>, LoggingError> {
    if let Some(installed) = INSTALLED.get() {
        return Ok(installed.clone());
    }

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(line_timer())
        .with_target(verbosity == Verbosity::Verbose)
        .with_filter(console_filter(verbosity));

    let (file, log_path, file_error) = match open_log_file() {
        Ok((writer, guard, path)) => {
            let _ = FILE_GUARD.set(guard);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_timer(line_timer())
                .with_writer(writer)
                .with_filter(verbosity.file_level());
            (Some(layer), Some(path), None)
        }
        Err(err) => (None, None, Some(err)),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()?;
    let _ = INSTALLED.set(log_path.clone());

    match (&log_path, file_error) {
        (Some(path), _) => tracing::debug!("Logging to {}", path.display()),
        (None, Some(err)) => tracing::warn!("Log file disabled: {err}"),
        (None, None) => {}
    }
    Ok(log_path)
}

fn console_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(verbosity.level().into())
        .from_env_lossy()
}

fn line_timer() -> OffsetTime<&'static [BorrowedFormatItem<'static>]> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, LINE_STAMP)
}

fn open_log_file() -> Result<(NonBlocking, WorkerGuard, PathBuf), LoggingError> {
    let dir = app_dirs::logs_dir()?;
    prune_logs(&dir, KEEP_LOG_FILES - 1)?;
    let name = log_file_name(
        OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()),
    )?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(&name)
        .filename_suffix("log")
        .build(&dir)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    Ok((writer, guard, dir.join(format!("{name}.log"))))
}

/// File stem for a run started at `started`; names sort in start order.
fn log_file_name(started: OffsetDateTime) -> Result<String, LoggingError> {
    Ok(format!("{FILE_STEM}-{}", started.format(FILE_STAMP)?))
}

fn is_run_log(path: &Path) -> bool {
    path.is_file()
        && path.extension().is_some_and(|ext| ext == "log")
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(FILE_STEM))
}

/// Delete the oldest run logs so at most `keep` remain; returns how many were removed.
fn prune_logs(dir: &Path, keep: usize) -> Result<usize, LoggingError> {
    let entries = fs::read_dir(dir).map_err(|source| LoggingError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut logs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_run_log(path))
        .collect();
    logs.sort();
    let excess = logs.len().saturating_sub(keep);
    for path in &logs[..excess] {
        fs::remove_file(path).map_err(|source| LoggingError::RemoveFile {
            path: path.clone(),
            source,
        })?;
    }
    Ok(excess)
}
