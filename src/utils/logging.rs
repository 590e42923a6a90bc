// src/utils/logging.rs
use crate::config::LogConfig;
use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Stdout plus a daily-rolling file under `cfg.dir`.
///
/// `RUST_LOG` wins over `cfg.level`. Keep the returned guard alive for the
/// whole process or buffered file lines are lost on exit.
pub fn init(cfg: &LogConfig, file_prefix: &str) -> Result<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&cfg.level))?;

    let file_appender = tracing_appender::rolling::daily(&cfg.dir, file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()?;

    Ok(guard)
}
