//! Process-wide logger bootstrap.
//!
//! The library only emits through the `log` facade as `key=value` event
//! lines. Binaries call [`init_logging`] once at startup to route those lines
//! to stderr.

use flexi_logger::{FlexiLoggerError, Logger, LoggerHandle};
use once_cell::sync::OnceCell;
use thiserror::Error;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();

struct LoggingState {
    spec: String,
    _logger: LoggerHandle,
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("log level cannot be empty")]
    EmptySpec,

    #[error("logging already initialized with `{active}`; refusing to switch to `{requested}`")]
    AlreadyInitialized { active: String, requested: String },

    #[error("failed to start logger: {0}")]
    Start(#[from] FlexiLoggerError),
}

/// Level used when neither a flag nor `RUST_LOG` picks one.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) { "debug" } else { "warn" }
}

/// Starts logging to stderr with a `log`-style spec such as `info` or
/// `tagmap=debug`.
///
/// Calling this again with the same spec is a no-op; a different spec is
/// rejected.
pub fn init_logging(spec: &str) -> Result<(), LoggingError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(LoggingError::EmptySpec);
    }

    let state = LOGGING_STATE.get_or_try_init(|| -> Result<LoggingState, LoggingError> {
        let logger = Logger::try_with_str(spec)?
            .log_to_stderr()
            .format(flexi_logger::default_format)
            .start()?;
        log::info!(
            "event=app_start status=ok platform={} version={}",
            std::env::consts::OS,
            env!("CARGO_PKG_VERSION")
        );
        Ok(LoggingState {
            spec: spec.to_string(),
            _logger: logger,
        })
    })?;

    if state.spec != spec {
        return Err(LoggingError::AlreadyInitialized {
            active: state.spec.clone(),
            requested: spec.to_string(),
        });
    }
    Ok(())
}

/// The active spec, if logging was initialized.
pub fn logging_status() -> Option<&'static str> {
    LOGGING_STATE.get().map(|state| state.spec.as_str())
}
