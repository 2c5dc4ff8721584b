// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Console logging is always available. With the `file-logging` feature,
//! [`init_file_logging`] also writes per-crate and combined log files into a
//! timestamped run folder and prunes old runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, TimeZone, Utc};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::{LogFormat, LogOutput, LoggingConfig};

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn env_filter(debug_flags: &CrateDebugFlags, config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = debug_flags.to_filter_string_with_default(&config.level);
    EnvFilter::try_new(&directives)
        .with_context(|| format!("Invalid log filter: {}", directives))
}

fn console_layer(config: &LoggingConfig) -> BoxedLayer {
    let base = tracing_subscriber::fmt::layer().with_target(true);
    match (config.format, config.output) {
        (LogFormat::Text, LogOutput::Stdout) => base.boxed(),
        (LogFormat::Text, LogOutput::Stderr) => base.with_writer(std::io::stderr).boxed(),
        (LogFormat::Compact, LogOutput::Stdout) => base.compact().boxed(),
        (LogFormat::Compact, LogOutput::Stderr) => {
            base.compact().with_writer(std::io::stderr).boxed()
        }
    }
}

/// Install a console subscriber filtered by `config.level` and the debug flags
///
/// # Errors
/// Fails on an invalid level or when a global subscriber is already set.
pub fn init_logging(debug_flags: &CrateDebugFlags, config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(debug_flags, config)?;
    Registry::default()
        .with(console_layer(config).with_filter(filter))
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

/// Keeps file writers alive; logs are flushed when dropped
#[cfg(feature = "file-logging")]
pub struct LoggingGuard {
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: PathBuf,
}

#[cfg(feature = "file-logging")]
impl LoggingGuard {
    /// Run folder the files are written to
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

/// Console plus file logging into `<log_dir>/run_<timestamp>/`
///
/// ```text
/// ./logs/
///   └── run_20250101_120000/
///       ├── jitconn-kernels.log
///       ├── jitconn-config.log
///       └── jitconn.log (combined)
/// ```
#[cfg(feature = "file-logging")]
pub fn init_file_logging(
    debug_flags: &CrateDebugFlags,
    config: &LoggingConfig,
) -> Result<LoggingGuard> {
    use tracing_appender::rolling;

    let timestamp = Utc::now().format(RUN_TIMESTAMP_FORMAT);
    let run_folder = config.log_dir.join(format!("{}{}", RUN_PREFIX, timestamp));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

    cleanup_old_runs(&config.log_dir, config.retention_runs)?;

    let mut layers: Vec<BoxedLayer> = vec![console_layer(config)
        .with_filter(env_filter(debug_flags, config)?)
        .boxed()];
    let mut file_guards = Vec::new();

    for crate_name in crate::KNOWN_CRATES {
        let appender = rolling::daily(&run_folder, format!("{}.log", crate_name));
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guards.push(guard);

        let crate_filter = EnvFilter::try_new(format!("{}=debug", crate_name.replace('-', "_")))
            .with_context(|| format!("Invalid log filter for {}", crate_name))?;
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(crate_filter)
                .boxed(),
        );
    }

    let combined = rolling::daily(&run_folder, "jitconn.log");
    let (combined_writer, combined_guard) = tracing_appender::non_blocking(combined);
    file_guards.push(combined_guard);
    layers.push(
        tracing_subscriber::fmt::layer()
            .with_writer(combined_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(env_filter(debug_flags, config)?)
            .boxed(),
    );

    Registry::default()
        .with(layers)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LoggingGuard {
        _file_guards: file_guards,
        log_dir: run_folder,
    })
}

/// Remove all but the `retention_runs` newest `run_*` folders under `base_log_dir`
///
/// Folders whose name does not parse as a run timestamp are left alone.
/// Returns the removed paths.
pub fn cleanup_old_runs(base_log_dir: &Path, retention_runs: usize) -> Result<Vec<PathBuf>> {
    if !base_log_dir.exists() {
        return Ok(Vec::new());
    }

    let mut runs = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)
        .with_context(|| format!("Failed to read {}", base_log_dir.display()))?
    {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let stamp = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(RUN_PREFIX))
            .and_then(|s| NaiveDateTime::parse_from_str(s, RUN_TIMESTAMP_FORMAT).ok());
        if let Some(naive) = stamp {
            runs.push((path, Utc.from_utc_datetime(&naive)));
        }
    }

    // newest first
    runs.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = Vec::new();
    for (path, _) in runs.into_iter().skip(retention_runs) {
        match std::fs::remove_dir_all(&path) {
            Ok(()) => removed.push(path),
            Err(e) => tracing::warn!(
                "Failed to remove old log directory {}: {}",
                path.display(),
                e
            ),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_keeps_newest_runs() {
        let dir = tempfile::tempdir().unwrap();
        for stamp in ["20250101_000000", "20250102_000000", "20250103_000000"] {
            std::fs::create_dir_all(dir.path().join(format!("run_{}", stamp))).unwrap();
        }
        std::fs::create_dir_all(dir.path().join("notes")).unwrap();

        let removed = cleanup_old_runs(dir.path(), 2).unwrap();

        assert_eq!(removed, vec![dir.path().join("run_20250101_000000")]);
        assert!(dir.path().join("run_20250103_000000").exists());
        assert!(dir.path().join("notes").exists());
    }

    #[test]
    fn test_cleanup_missing_dir_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let removed = cleanup_old_runs(&dir.path().join("absent"), 1).unwrap();
        assert!(removed.is_empty());
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let config = LoggingConfig::default().with_level("jitconn=loud");
        assert!(env_filter(&CrateDebugFlags::default(), &config).is_err());
    }
}
