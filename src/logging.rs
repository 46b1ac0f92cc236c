//! # Structured Logging Module
//!
//! Environment-aware structured logging to stderr and, when configured, to an
//! append-only JSON log file. The file is the procedure's persistent record;
//! operators read it for partial-failure detail that never reaches the exit code.
//!
//! Stdout is left to command output (`role`, `validate-config`).

use chrono::Utc;
use std::path::Path;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// `level_override` wins over the environment default; `RUST_LOG` wins over both.
/// The returned guard flushes the file sink when dropped, so hold it until the
/// process is about to exit. Calling this more than once is a no-op and returns
/// `None`.
#[must_use = "dropping the guard stops the log file writer"]
pub fn init_structured_logging(
    environment: &str,
    log_file: Option<&Path>,
    level_override: Option<&str>,
) -> Option<WorkerGuard> {
    if LOGGER_INITIALIZED.set(()).is_err() {
        return None;
    }

    let log_level = level_override
        .map(str::to_string)
        .unwrap_or_else(|| get_log_level(environment));
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.clone()))
    };

    let file_sink = log_file.and_then(|path| match file_appender(path) {
        Ok(appender) => Some(tracing_appender::non_blocking(appender)),
        Err(e) => {
            eprintln!(
                "cluster-shutdown: cannot open log file {}: {e}; logging to console only",
                path.display()
            );
            None
        }
    });
    let (file_writer, guard) = file_sink.unzip();

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_filter(filter());

    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_level(true)
            .with_ansi(false)
            .json()
            .with_filter(filter())
    });

    let subscriber = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer);

    if subscriber.try_init().is_err() {
        tracing::debug!(
            "Global tracing subscriber already initialized - continuing with existing subscriber"
        );
    }

    tracing::info!(
        pid = std::process::id(),
        environment = %environment,
        log_file = ?log_file.map(|p| p.display().to_string()),
        "🔧 STRUCTURED LOGGING: Initialized"
    );

    guard
}

/// Single never-rotated file at exactly `path`, opened for append
fn file_appender(path: &Path) -> Result<RollingFileAppender, String> {
    let file_name = path
        .file_name()
        .ok_or_else(|| "path has no file name".to_string())?;
    let directory = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(directory)
        .map_err(|e| e.to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "info".to_string(),
    }
}

/// Log a command issued against a single resource
pub fn log_dispatch_operation(
    component: &str,
    action: &str,
    target: &str,
    target_name: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        component = %component,
        action = %action,
        target = %target,
        target_name = target_name,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📤 DISPATCH_OPERATION"
    );
}

/// Log a phase or step transition of the procedure
pub fn log_phase_transition(
    component: &str,
    phase: &str,
    status: &str,
    outstanding: Option<usize>,
    elapsed_secs: Option<u64>,
) {
    tracing::info!(
        component = %component,
        phase = %phase,
        status = %status,
        outstanding = outstanding,
        elapsed_secs = elapsed_secs,
        timestamp = %Utc::now().to_rfc3339(),
        "🔀 PHASE_TRANSITION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
