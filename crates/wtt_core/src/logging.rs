//! Process-wide file logging for the hierarchy service.
//!
//! # Responsibility
//! - Start one rolling `flexi_logger` file logger per process.
//! - Announce which kernel provider/segment and schema the process serves.
//! - Route panics through the log with a flattened, capped payload.
//!
//! # Invariants
//! - The first successful `init_logging` fixes level and directory; a repeat with the
//!   same pair is a no-op, any other pair is `AlreadyActive`.
//! - Nothing in here panics.

use crate::config::GatewayConfig;
use crate::db::migrations::latest_version;
use flexi_logger::{
    Cleanup, Criterion, FileSpec, FlexiLoggerError, LogSpecification, Logger, LoggerHandle,
    Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const LOG_BASENAME: &str = "wtt";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_LOG_FILES: usize = 5;
const PANIC_PAYLOAD_CAP: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();

/// Reasons a logger could not be started.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("unsupported log level `{0}`; expected trace|debug|info|warn|error")]
    UnsupportedLevel(String),
    #[error("log directory cannot be empty")]
    EmptyDirectory,
    #[error("log directory must be absolute, got `{0}`")]
    RelativeDirectory(String),
    #[error("cannot create log directory `{}`", path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("logger backend failed to start")]
    Backend(#[from] FlexiLoggerError),
    #[error("logging already active at level `{level}` in `{}`", dir.display())]
    AlreadyActive { level: LevelFilter, dir: PathBuf },
}

struct ActiveLogger {
    level: LevelFilter,
    dir: PathBuf,
    _handle: LoggerHandle,
}

/// Starts file logging under `log_dir` and records the gateway this process talks to.
pub fn init_logging(
    level: &str,
    log_dir: &str,
    gateway: &GatewayConfig,
) -> Result<(), LoggingError> {
    let level = parse_level(level)?;
    let dir = log_directory(log_dir)?;

    let active = ACTIVE.get_or_try_init(|| start(level, &dir, gateway))?;
    if active.level != level || active.dir != dir {
        return Err(LoggingError::AlreadyActive {
            level: active.level,
            dir: active.dir.clone(),
        });
    }
    Ok(())
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start(
    level: LevelFilter,
    dir: &Path,
    gateway: &GatewayConfig,
) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDirectory {
        path: dir.to_path_buf(),
        source,
    })?;

    let handle = Logger::with(LogSpecification::builder().default(level).build())
        .log_to_file(FileSpec::default().directory(dir).basename(LOG_BASENAME))
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()?;

    route_panics_to_log();
    info!(
        "event=service_start module=logging status=ok version={} schema_version={} provider={} segment={} principal={} level={} log_dir={}",
        env!("CARGO_PKG_VERSION"),
        latest_version(),
        gateway.provider_name,
        gateway.segment_name,
        gateway.principal,
        level,
        dir.display()
    );

    Ok(ActiveLogger {
        level,
        dir: dir.to_path_buf(),
        _handle: handle,
    })
}

fn parse_level(raw: &str) -> Result<LevelFilter, LoggingError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::Trace),
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warn" | "warning" => Ok(LevelFilter::Warn),
        "error" => Ok(LevelFilter::Error),
        _ => Err(LoggingError::UnsupportedLevel(raw.trim().to_string())),
    }
}

fn log_directory(raw: &str) -> Result<PathBuf, LoggingError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LoggingError::EmptyDirectory);
    }
    let path = PathBuf::from(trimmed);
    if !path.is_absolute() {
        return Err(LoggingError::RelativeDirectory(trimmed.to_string()));
    }
    Ok(path)
}

// Only reached from inside the one-time logger start.
fn route_panics_to_log() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let location = panic
            .location()
            .map(|at| format!("{}:{}", at.file(), at.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic
            .payload()
            .downcast_ref::<&str>()
            .map(|text| (*text).to_string())
            .or_else(|| panic.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic module=logging status=error location={} payload={}",
            location,
            flatten_payload(&payload, PANIC_PAYLOAD_CAP)
        );
        previous(panic);
    }));
}

/// Project titles end up in panic messages; keep them on one line and short.
fn flatten_payload(payload: &str, cap: usize) -> String {
    let mut flat: String = payload
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .take(cap)
        .collect();
    if payload.chars().count() > cap {
        flat.push_str("...");
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::{flatten_payload, init_logging, log_directory, parse_level, LoggingError};
    use crate::config::GatewayConfig;
    use log::LevelFilter;
    use uuid::Uuid;

    #[test]
    fn level_names_parse_case_insensitively() {
        assert_eq!(parse_level("INFO").unwrap(), LevelFilter::Info);
        assert_eq!(parse_level(" warning ").unwrap(), LevelFilter::Warn);
        assert!(matches!(
            parse_level("verbose").unwrap_err(),
            LoggingError::UnsupportedLevel(level) if level == "verbose"
        ));
    }

    #[test]
    fn log_directory_must_be_absolute_and_non_empty() {
        assert!(matches!(log_directory("  ").unwrap_err(), LoggingError::EmptyDirectory));
        assert!(matches!(
            log_directory("logs/dev").unwrap_err(),
            LoggingError::RelativeDirectory(dir) if dir == "logs/dev"
        ));
    }

    #[test]
    fn panic_payload_is_flattened_and_capped() {
        assert_eq!(
            flatten_payload("Acme Corp\nPhase 1\rDesign review", 12),
            "Acme Corp Ph..."
        );
        assert_eq!(flatten_payload("Phase 1", 12), "Phase 1");
    }

    #[test]
    fn second_init_is_a_no_op_and_conflicts_report_the_active_logger() {
        let dir = std::env::temp_dir().join(format!("wtt-logging-{}", Uuid::new_v4()));
        let dir_str = dir.to_str().unwrap().to_string();
        let other_dir = std::env::temp_dir().join(format!("wtt-logging-{}", Uuid::new_v4()));
        let gateway = GatewayConfig::default().with_principal("jdoe");

        init_logging("info", &dir_str, &gateway).unwrap();
        init_logging("INFO", &dir_str, &GatewayConfig::default()).unwrap();
        assert!(dir.is_dir());

        match init_logging("debug", &dir_str, &gateway).unwrap_err() {
            LoggingError::AlreadyActive { level, dir: active } => {
                assert_eq!(level, LevelFilter::Info);
                assert_eq!(active, dir);
            }
            other => panic!("unexpected error: {other}"),
        }
        let err = init_logging("info", other_dir.to_str().unwrap(), &gateway).unwrap_err();
        assert!(matches!(err, LoggingError::AlreadyActive { .. }));
        assert!(!other_dir.exists());
    }
}
