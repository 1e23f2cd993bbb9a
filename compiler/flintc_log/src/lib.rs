//! Logging bootstrap for the flintc crates.
//!
//! Any standalone tool that links one of the compiler crates can enable the
//! `debug!`/`trace!` output those crates emit by depending on this crate and
//! calling, early in `main`:
//!
//! ```no_run
//! flintc_log::Logger::init(flintc_log::LoggerConfig::from_env("FLINTC"));
//! ```
//!
//! and then running with `FLINTC_FILTER=debug`. Keeping the setup here, out
//! of the driver crate, means a minimal test binary for, say, `flintc_opt`
//! does not have to pull in the whole compiler to get its logs.

use std::{fs::File, io::IsTerminal, path::PathBuf};
use tracing::Subscriber;
use tracing_subscriber::{
    fmt::layer, prelude::*, registry::LookupSpan, EnvFilter, Layer,
};

/// Initializes the global `tracing` subscriber for a flintc process.
pub struct Logger;

/// Where log lines are written.
pub enum LogWriter {
    Stdout,
    Stderr,
    File(PathBuf),
}

/// Configuration for [`Logger::init`], normally read from the environment.
pub struct LoggerConfig {
    /// Destination for log lines.
    pub writer: LogWriter,
    /// An `EnvFilter` directive string ("debug", "flintc_opt=trace", ...).
    /// When absent, only `INFO` and above are shown.
    pub filter: Option<String>,
    /// "always", "never" or "auto"; anything else is rejected.
    pub color: Option<String>,
    /// Show source line numbers when set to "1".
    pub line_numbers: Option<String>,
}

#[derive(Debug)]
pub enum LogError {
    /// The color value is not one of "always", "never", "auto".
    ColorNotValid(String),
    /// The log file could not be created.
    Io(std::io::Error),
    /// A global subscriber was already installed.
    AlreadyInitialized,
}

impl LoggerConfig {
    /// Reads `<prefix>_FILTER`, `<prefix>_COLOR`, `<prefix>_WRITER` and
    /// `<prefix>_LINE_NUMBERS` from the environment.
    pub fn from_env(prefix: &str) -> Self {
        let var = |suffix: &str| std::env::var(format!("{}_{}", prefix, suffix)).ok();
        let writer = match var("WRITER").as_deref() {
            Some("stdout") => LogWriter::Stdout,
            Some("stderr") | None => LogWriter::Stderr,
            Some(path) => LogWriter::File(path.into()),
        };

        LoggerConfig {
            writer,
            filter: var("FILTER"),
            color: var("COLOR"),
            line_numbers: var("LINE_NUMBERS"),
        }
    }
}

impl Logger {
    /// Installs the global subscriber described by `cfg`.
    pub fn init(cfg: LoggerConfig) -> Result<(), LogError> {
        let filter = match cfg.filter {
            Some(filter) => EnvFilter::new(filter),
            None => EnvFilter::default().add_directive(tracing::Level::INFO.into()),
        };

        let color = match cfg.color.as_deref() {
            Some("always") => true,
            Some("never") => false,
            Some("auto") | None => std::io::stderr().is_terminal(),
            Some(other) => return Err(LogError::ColorNotValid(other.to_string())),
        };

        let line_numbers = cfg.line_numbers.as_deref() == Some("1");
        let layer = Self::layer(cfg.writer, color, line_numbers)?;

        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized)
    }

    fn layer<S>(
        writer: LogWriter,
        color: bool,
        line_numbers: bool,
    ) -> Result<Box<dyn Layer<S> + Send + Sync + 'static>, LogError>
    where
        S: Subscriber,
        for<'a> S: LookupSpan<'a>,
    {
        let layer = layer()
            .with_ansi(color)
            .with_target(true)
            .with_line_number(line_numbers);

        Ok(match writer {
            LogWriter::Stdout => Box::new(layer.with_writer(std::io::stdout)),
            LogWriter::Stderr => Box::new(layer.with_writer(std::io::stderr)),
            LogWriter::File(path) => {
                let file = File::create(path).map_err(LogError::Io)?;
                Box::new(layer.with_writer(file))
            }
        })
    }
}

impl std::error::Error for LogError {}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogError::ColorNotValid(s) => write!(f, "color not valid: {}", s),
            LogError::Io(e) => write!(f, "io error: {}", e),
            LogError::AlreadyInitialized => write!(f, "subscriber already initialized"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_color_value() {
        let cfg = LoggerConfig {
            writer: LogWriter::Stderr,
            filter: None,
            color: Some("sometimes".to_string()),
            line_numbers: None,
        };
        assert!(matches!(Logger::init(cfg), Err(LogError::ColorNotValid(_))));
    }

    #[test]
    fn logs_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flintc.log");
        let cfg = LoggerConfig {
            writer: LogWriter::File(path.clone()),
            filter: Some("debug".to_string()),
            color: Some("never".to_string()),
            line_numbers: None,
        };
        // A second test may have installed the global subscriber first; the
        // file must exist either way.
        let _ = Logger::init(cfg);
        assert!(path.exists());
    }
}
