//! Tracing setup: console plus optional daily-rolling files, JSON in production.

pub mod config;
pub mod middleware;

use std::io;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use config::{LogLevel, LogSettings};

/// Install the global subscriber.
///
/// The returned guards flush the background writers on drop; hold them for
/// the life of the process.
pub fn init(settings: &LogSettings) -> Vec<WorkerGuard> {
    let mut guards = Vec::new();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.default_directive()));

    let (console_writer, console_guard) = non_blocking(io::stdout());
    guards.push(console_guard);

    let files = settings.dir.as_ref().and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("cannot create log directory {}: {e}; logging to console only", dir.display());
            return None;
        }
        let (app_writer, app_guard) = non_blocking(rolling::daily(dir, "app.log"));
        let (error_writer, error_guard) = non_blocking(rolling::daily(dir, "error.log"));
        guards.push(app_guard);
        guards.push(error_guard);
        Some((app_writer, error_writer))
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    if settings.is_production() {
        let console_layer = fmt::layer()
            .json()
            .with_writer(console_writer)
            .with_target(false);

        let file_layers = files.map(|(app_writer, error_writer)| {
            let app_layer = fmt::layer()
                .json()
                .with_writer(app_writer)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);
            let error_layer = fmt::layer()
                .json()
                .with_writer(error_writer)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);
            app_layer.and_then(error_layer)
        });

        registry.with(console_layer).with(file_layers).init();
    } else {
        let console_layer = fmt::layer()
            .with_writer(console_writer)
            .with_target(true)
            .pretty();

        let file_layer = files.map(|(app_writer, _)| {
            fmt::layer()
                .with_writer(app_writer)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
        });

        registry.with(console_layer).with(file_layer).init();
    }

    tracing::info!(
        environment = %settings.environment,
        level = %settings.level,
        "Logging initialized"
    );
    guards
}
