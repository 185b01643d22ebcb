//! CLI entry point for keysync.
//!
//! Parses flags, sets up logging, then hands the validated configuration to
//! the scheduler. Exits 0 on a completed one-shot run or after a shutdown
//! signal, and 1 on invalid configuration or a failed key file update.

use clap::Parser;
use keysync::config::{Cli, Config};
use keysync::fetch::BasicClient;
use keysync::scheduler::{run, shutdown_signal};
use std::ffi::OsStr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok(); // Load .env file

    let cli = Cli::parse();
    let _file_guard = init_tracing(cli.debug);

    let config = match Config::try_from(cli) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    debug!(?config, "Configuration loaded");

    let client = match BasicClient::with_timeout(config.timeout) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to build HTTP client");
            return ExitCode::FAILURE;
        }
    };

    // On ^C or SIGTERM stop before the next cycle.
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let signal = shutdown_signal().await;
            info!(signal, "Received signal, exiting");
            shutdown.cancel();
        }
    });

    match run(&config, Arc::new(client), shutdown).await {
        Ok(cycles) => {
            debug!(cycles, "Exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Fatal error");
            ExitCode::FAILURE
        }
    }
}

/// Colored stderr logging, plus a JSON rolling log file when `LOG_FILE_PATH`
/// is set. The returned guard must outlive all logging.
fn init_tracing(debug: bool) -> Option<WorkerGuard> {
    let level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(if debug { FmtSpan::CLOSE } else { FmtSpan::NONE })
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive(level.into()));

    let (json_layer, guard) = match std::env::var("LOG_FILE_PATH") {
        Ok(log_file_path) => {
            let path = Path::new(&log_file_path);
            let log_dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let log_file_name = path.file_name().unwrap_or(OsStr::new("keysync.log"));

            let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(non_blocking_file)
                .with_filter(
                    EnvFilter::from_env("RUST_LOG_JSON").add_directive(LevelFilter::DEBUG.into()),
                );
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    guard
}
