use crate::errors::{AppError, AppResult};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use tracing::subscriber::Interest;
use tracing::{Metadata, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

const LOG_FILE_PREFIX: &str = "pin-explorer.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static FILE_LOGGING: AtomicBool = AtomicBool::new(false);

/// Drops every event while file logging is switched off.
struct FileLoggingGate;

impl<S: Subscriber> Layer<S> for FileLoggingGate {
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        Interest::sometimes()
    }

    fn enabled(&self, _metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        FILE_LOGGING.load(Ordering::Relaxed)
    }
}

pub fn init_tracing(data_dir: &Path, default_level: &str) -> AppResult<()> {
    if LOG_GUARD.get().is_some() {
        set_file_logging(true);
        return Ok(());
    }

    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    Registry::default()
        .with(FileLoggingGate)
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json().with_writer(non_blocking))
        .try_init()
        .map_err(|error| AppError::Internal(error.to_string()))?;
    let _ = LOG_GUARD.set(guard);
    set_file_logging(true);
    Ok(())
}

pub fn set_file_logging(enabled: bool) {
    FILE_LOGGING.store(enabled, Ordering::Relaxed);
}

pub fn file_logging_enabled() -> bool {
    FILE_LOGGING.load(Ordering::Relaxed)
}
