//! Global `tracing` subscriber.
//!
//! - `LOG_LEVEL`: filter directive (`info` when unset; case-insensitive, so
//!   `DEBUG` works). Full `EnvFilter` syntax such as `sleepcca=debug` is accepted.
//! - `LOG_FILE`: when set, every event is also appended to this file
//!   (no ANSI colours).
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

static INITIALISED: OnceLock<()> = OnceLock::new();

pub const LEVEL_VAR: &str = "LOG_LEVEL";
pub const FILE_VAR: &str = "LOG_FILE";

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("logging has already been initialised")]
    AlreadyInitialised,
    #[error("invalid LOG_LEVEL: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error("cannot open {}: {source}", .path.display())]
    File { path: PathBuf, source: std::io::Error },
    #[error("installing subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// `LOG_LEVEL` lower-cased, or `info`.
fn level_directive() -> String {
    std::env::var(LEVEL_VAR)
        .ok()
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "info".to_string())
}

fn log_file() -> Option<PathBuf> {
    std::env::var_os(FILE_VAR)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Install the subscriber. A second call returns `AlreadyInitialised`.
pub fn init() -> Result<(), InitError> {
    INITIALISED.set(()).map_err(|_| InitError::AlreadyInitialised)?;

    let filter = EnvFilter::try_new(level_directive())?;
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(std::io::stdout().is_terminal());

    let file_layer = match log_file() {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .map_err(|source| InitError::File { path: path.clone(), source })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| InitError::File { path: path.clone(), source })?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    Registry::default()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_an_error() {
        // Another test may already have installed the subscriber.
        let _ = init();
        assert!(matches!(init(), Err(InitError::AlreadyInitialised)));
    }
}
