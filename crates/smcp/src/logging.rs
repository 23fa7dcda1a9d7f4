//! Tracing subscriber setup. Console logs always go to stderr so the stdio
//! transport keeps stdout for protocol messages; an optional rolling file
//! gets the same events.

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// When the log file starts over
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogRotation {
    /// One file, appended forever
    #[value(alias = "none")]
    Never,
    Hourly,
    #[value(alias = "time")]
    Daily,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        }
    }
}

/// File sink settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLog {
    /// Rotated files get a date suffix appended to this name
    pub path: PathBuf,
    pub rotation: LogRotation,
    /// Rotated files kept on disk; ignored for `Never`
    pub max_files: usize,
}

#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Explicit filter from the command line or `MCP_LOG_LEVEL`
    pub level: Option<String>,
    pub default_level: &'static str,
    pub json: bool,
    pub file: Option<FileLog>,
}

/// Pick the filter directive: explicit level first, then `RUST_LOG`, then the default.
pub fn filter_directive(explicit: Option<&str>, rust_log: Option<&str>, default: &str) -> String {
    explicit
        .or(rust_log)
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn fmt_layer<W>(writer: W, json: bool, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_ansi(ansi);
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

/// Open the rolling appender for `file`, creating its directory if needed.
pub fn file_appender(file: &FileLog) -> Result<RollingFileAppender> {
    let dir = file
        .path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = file
        .path
        .file_name()
        .ok_or_else(|| anyhow!("log file path {} has no file name", file.path.display()))?
        .to_string_lossy()
        .into_owned();

    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create log directory {}", dir.display()))?;

    RollingFileAppender::builder()
        .rotation(file.rotation.into())
        .filename_prefix(name)
        .max_log_files(file.max_files.max(1))
        .build(dir)
        .with_context(|| format!("cannot open log file {}", file.path.display()))
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer.
pub fn init(options: &LogOptions) -> Result<Option<WorkerGuard>> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(
        options.level.as_deref(),
        rust_log.as_deref(),
        options.default_level,
    );
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| anyhow!("invalid log filter {:?}: {}", directive, e))?;

    let mut layers = vec![fmt_layer(std::io::stderr, options.json, true)];
    let guard = match &options.file {
        Some(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(file)?);
            layers.push(fmt_layer(writer, options.json, false));
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))?;
    Ok(guard)
}
