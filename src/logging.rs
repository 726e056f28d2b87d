//! Logging system initialization
//!
//! The terminal belongs to the panel UI, so tracing output goes to
//! `~/.config/hopctl/hopctl.log`. The previous sessions are kept as
//! `hopctl.log.1` through `hopctl.log.5`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, EnvFilter};

/// Number of historical log files to keep
const MAX_LOG_FILES: u8 = 5;

const LOG_PREFIX: &str = "hopctl";
const LOG_SUFFIX: &str = "log";

/// Initialize the logging system
///
/// Log level defaults to INFO but can be configured via `RUST_LOG`.
pub fn init_logging(log_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(log_dir)?;

    let log_path = log_dir.join(format!("{LOG_PREFIX}.{LOG_SUFFIX}"));
    rotate_logs_on_startup(&log_path)?;

    // Rotation is handled above, once per session
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix(LOG_SUFFIX)
        .build(log_dir)
        .context("creating log file appender")?;

    let subscriber = fmt()
        .with_writer(file_appender)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("installing tracing subscriber")?;

    tracing::info!("hopctl v{} started", env!("CARGO_PKG_VERSION"));

    Ok(log_path)
}

/// Shift `hopctl.log` -> `.1` -> `.2` ..., dropping the oldest
fn rotate_logs_on_startup(log_path: &Path) -> Result<()> {
    if !log_path.exists() {
        return Ok(());
    }

    let log_dir = log_path.parent().context("log path has no parent directory")?;
    let log_name = log_path
        .file_name()
        .context("log path has no file name")?
        .to_string_lossy();

    let oldest_log = log_dir.join(format!("{log_name}.{MAX_LOG_FILES}"));
    if oldest_log.exists() {
        std::fs::remove_file(&oldest_log)?;
    }

    for i in (1..MAX_LOG_FILES).rev() {
        let current_log = log_dir.join(format!("{log_name}.{i}"));
        let next_log = log_dir.join(format!("{log_name}.{}", i + 1));

        if current_log.exists() {
            std::fs::rename(&current_log, &next_log)?;
        }
    }

    std::fs::rename(log_path, log_dir.join(format!("{log_name}.1")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_rotation_keeps_history_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("hopctl.log");

        for i in 1..=3 {
            fs::write(&log_path, format!("Session {i}")).unwrap();
            rotate_logs_on_startup(&log_path).unwrap();
        }

        assert!(!log_path.exists());
        assert_eq!(fs::read_to_string(dir.path().join("hopctl.log.1")).unwrap(), "Session 3");
        assert_eq!(fs::read_to_string(dir.path().join("hopctl.log.3")).unwrap(), "Session 1");
    }

    #[test]
    fn test_rotation_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("hopctl.log");

        for i in 1..=8 {
            fs::write(&log_path, format!("Session {i}")).unwrap();
            rotate_logs_on_startup(&log_path).unwrap();
        }

        let oldest = dir.path().join(format!("hopctl.log.{MAX_LOG_FILES}"));
        assert_eq!(fs::read_to_string(oldest).unwrap(), "Session 4");
        assert!(!dir.path().join(format!("hopctl.log.{}", MAX_LOG_FILES + 1)).exists());
    }

    #[test]
    fn test_rotation_without_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("hopctl.log");

        rotate_logs_on_startup(&log_path).unwrap();
        assert!(!dir.path().join("hopctl.log.1").exists());
    }
}
