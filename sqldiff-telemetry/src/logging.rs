use sqldiff_config::Environment;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::PanicHookInfo;
use std::path::PathBuf;
use std::sync::Once;
use thiserror::Error;
use tracing::subscriber::{SetGlobalDefaultError, set_global_default};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, Rotation, RollingFileAppender};
use tracing_log::LogTracer;
use tracing_log::log_tracer::SetLoggerError;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry, fmt};

/// Directory receiving the rolling log files in production.
const LOG_DIR: &str = "logs";

/// Number of daily log files kept on disk.
const MAX_LOG_FILES: usize = 5;

/// Level used when `RUST_LOG` is not set.
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("could not create the log file appender: {0}")]
    Appender(#[from] InitError),

    #[error("could not route `log` records into tracing: {0}")]
    LogTracer(#[from] SetLoggerError),

    #[error("a global tracing subscriber is already installed: {0}")]
    GlobalDefault(#[from] SetGlobalDefaultError),

    #[error("could not determine the environment: {0}")]
    Environment(#[from] std::io::Error),
}

/// Keeps buffered log lines alive until dropped.
///
/// Hold it for the lifetime of the process, dropping it flushes pending lines to disk.
#[must_use]
pub enum LogFlusher {
    Flusher(WorkerGuard),
    NullFlusher,
}

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogOutput {
    /// Human readable lines on stdout.
    Console,
    /// JSON lines in daily files under `directory`, named after the application.
    RollingFiles { directory: PathBuf },
}

impl LogOutput {
    fn for_environment(environment: Environment) -> Self {
        if environment.is_prod() {
            LogOutput::RollingFiles {
                directory: PathBuf::from(LOG_DIR),
            }
        } else {
            LogOutput::Console
        }
    }
}

static INIT_TEST_TRACING: Once = Once::new();

/// Turns on console tracing for tests when `ENABLE_TRACING` is set, e.g.
///
/// ENABLE_TRACING=1 cargo test -p sqldiff concurrent_cancels
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var("ENABLE_TRACING").is_err() {
            return;
        }

        Environment::Dev.set();
        if let Err(err) = install(LogOutput::Console, "test", FmtSpan::NONE) {
            eprintln!("tracing for tests was not initialized: {err}");
        }
    });
}

/// Initializes tracing for the process.
///
/// In prod-like environments logs are written as JSON lines to daily rolling files under
/// `logs/`, otherwise they are pretty printed to the terminal. `RUST_LOG` overrides the
/// default `info` level. When `emit_on_span_close` is set, an event is emitted every time a
/// span closes, which gives the duration of each worker phase.
pub fn init_tracing(app_name: &str, emit_on_span_close: bool) -> Result<LogFlusher, TracingError> {
    let output = LogOutput::for_environment(Environment::load()?);
    let span_events = if emit_on_span_close {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    install(output, app_name, span_events)
}

fn install(
    output: LogOutput,
    app_name: &str,
    span_events: FmtSpan,
) -> Result<LogFlusher, TracingError> {
    LogTracer::init()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let log_flusher = match output {
        LogOutput::Console => {
            let layer = fmt::layer()
                .pretty()
                .with_ansi(true)
                .with_file(false)
                .with_line_number(false)
                .with_span_events(span_events);
            set_global_default(Registry::default().with(filter).with(layer))?;

            LogFlusher::NullFlusher
        }
        LogOutput::RollingFiles { directory } => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(app_name)
                .filename_suffix("log")
                .max_log_files(MAX_LOG_FILES)
                .build(directory)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(false)
                .with_current_span(true)
                .with_span_list(true)
                .with_span_events(span_events)
                .with_writer(writer);
            set_global_default(Registry::default().with(filter).with(layer))?;

            LogFlusher::Flusher(guard)
        }
    };

    install_panic_hook();

    Ok(log_flusher)
}

/// Logs panics through tracing before handing them to the previous hook.
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log_panic(info);
        previous(info);
    }));
}

fn log_panic(info: &PanicHookInfo) {
    let payload = info
        .payload()
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    let location = info
        .location()
        .map(|location| location.to_string())
        .unwrap_or_default();

    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => {
            tracing::error!(
                panic.payload = payload,
                panic.location = location,
                panic.backtrace = %backtrace,
                "worker process panicked"
            );
        }
        _ => {
            tracing::error!(
                panic.payload = payload,
                panic.location = location,
                "worker process panicked, set RUST_BACKTRACE=1 for a backtrace"
            );
        }
    }
}
