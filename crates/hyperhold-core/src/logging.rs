//! Logging setup
//!
//! Logs go to a file so they never interleave with the host application's
//! own output. Nothing is installed unless `HYPERHOLD_LOG` is set; its value
//! is the level (or full filter directive) for this crate.

use std::fs::File;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Environment variable enabling file logging
pub const LOG_ENV: &str = "HYPERHOLD_LOG";

/// Build the filter for a `HYPERHOLD_LOG` value
///
/// A bare level ("debug") applies to this crate only; anything containing
/// `=` or `,` is used verbatim as an `EnvFilter` directive.
pub fn filter_for(level: &str) -> EnvFilter {
    if level.contains('=') || level.contains(',') {
        EnvFilter::new(level)
    } else {
        EnvFilter::new(format!("hyperhold_core={}", level))
    }
}

/// Initialize file-based logging if `HYPERHOLD_LOG` is set
///
/// Returns whether a subscriber was installed by this call. Calling it again
/// after a subscriber exists is a no-op.
pub fn init(config: &Config) -> bool {
    let Ok(log_level) = std::env::var(LOG_ENV) else {
        return false;
    };

    // Creating the file would truncate the one the live subscriber writes to
    if tracing::dispatcher::has_been_set() {
        return false;
    }

    let log_path = config.log_path();
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            return false;
        }
    };

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter_for(&log_level))
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init()
        .is_ok();

    if installed {
        info!("Logging initialized to {:?}", log_path);
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::EnvGuard;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        Config {
            data_dir: temp_dir.path().to_path_buf(),
            database_file: PathBuf::from("hyperhold.db"),
            log_file: Some(temp_dir.path().join("logs").join("test.log")),
        }
    }

    #[test]
    fn test_filter_for_level() {
        assert_eq!(filter_for("debug").to_string(), "hyperhold_core=debug");
        assert!(filter_for("hyperhold_core=trace,warn")
            .to_string()
            .contains("hyperhold_core=trace"));
    }

    #[test]
    fn test_init_without_env_is_noop() {
        let _guard = EnvGuard::new(&[LOG_ENV]);
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        assert!(!init(&config));
        assert!(!config.log_path().exists());
    }

    #[test]
    fn test_init_creates_log_file() {
        let _guard = EnvGuard::new(&[LOG_ENV]);
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        std::env::set_var(LOG_ENV, "debug");

        // Another test may already own the global subscriber
        if init(&config) {
            assert!(config.log_path().exists());
        }
        assert!(!init(&config));
    }

    #[test]
    fn test_reinit_keeps_existing_log() {
        let _guard = EnvGuard::new(&[LOG_ENV]);
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        std::env::set_var(LOG_ENV, "debug");

        // Make sure a global subscriber exists, whoever installed it
        let _ = init(&config);
        let _ = tracing_subscriber::fmt().with_writer(std::io::sink).try_init();
        assert!(tracing::dispatcher::has_been_set());

        // A log file with earlier content must not be truncated
        let existing = Config {
            log_file: Some(temp_dir.path().join("existing.log")),
            ..test_config(&temp_dir)
        };
        std::fs::write(existing.log_path(), "earlier entries\n").unwrap();

        assert!(!init(&existing));
        assert_eq!(
            std::fs::read_to_string(existing.log_path()).unwrap(),
            "earlier entries\n"
        );
    }
}
