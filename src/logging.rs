//! Startup logging initialization, simplified from the teacher's
//! `plugins::logging::init`: this is a headless daemon, not a desktop app
//! with a per-platform app-data directory, so output defaults to stdout.
//!
//! Setting `PETERBOT_LOG_DIR` additionally mirrors output to a daily
//! rolling file in that directory, using the same
//! `tracing_appender::rolling::daily` + non-blocking writer the teacher
//! uses for its desktop log file. Verbosity is controlled by `RUST_LOG`
//! (defaults to `info`), and pre-`tracing` `log::` call sites are bridged
//! in via `tracing_log::LogTracer`, exactly as the teacher does.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Initialize the global tracing subscriber. Safe to call more than once;
/// only the first call takes effect.
pub fn init(log_dir: Option<&PathBuf>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = tracing_subscriber::fmt::layer();

    match log_dir {
        Some(dir) => {
            if std::fs::create_dir_all(dir).is_ok() {
                let file_appender = tracing_appender::rolling::daily(dir, "peterbot.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                let _ = GUARD.set(guard);

                let file_layer = tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false);

                let _ = tracing_subscriber::registry().with(filter).with(stdout_layer).with(file_layer).try_init();
            } else {
                let _ = tracing_subscriber::registry().with(filter).with(stdout_layer).try_init();
            }
        }
        None => {
            let _ = tracing_subscriber::registry().with(filter).with(stdout_layer).try_init();
        }
    }

    tracing_log::LogTracer::init().ok();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "peterbot starting");
}
