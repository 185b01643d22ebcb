//! Lifecycle controller: runs aggregate-then-publish cycles until told to stop.
//!
//! Shutdown is only observed between cycles. A cycle that has started
//! always runs to completion (or to a fatal publish error).

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::aggregate::aggregate_keys;
use crate::config::Config;
use crate::fetch::HttpClient;
use crate::publish::{PublishError, publish};

/// Outcome of one completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub fetched: usize,
    pub skipped: usize,
    pub bytes: usize,
    pub finished_at: DateTime<Utc>,
}

/// Fetches every configured user and overwrites the key file once.
#[tracing::instrument(skip_all, fields(keyfile = %config.keyfile.display()))]
pub async fn run_cycle<C: HttpClient + 'static>(
    config: &Config,
    client: &Arc<C>,
) -> Result<CycleReport, PublishError> {
    let blob = aggregate_keys(client.clone(), &config.host, &config.users, config.concurrency).await;

    info!(
        users = %config.users.join(", "),
        skipped = blob.skipped.len(),
        "Updating authorized keys file"
    );
    publish(&config.keyfile, blob.as_bytes())?;

    let report = CycleReport {
        fetched: blob.fetched.len(),
        skipped: blob.skipped.len(),
        bytes: blob.as_bytes().len(),
        finished_at: Utc::now(),
    };
    info!(
        fetched = report.fetched,
        bytes = report.bytes,
        finished_at = %report.finished_at,
        "Successfully updated keys"
    );
    Ok(report)
}

/// Runs cycles until `shutdown` fires, returning how many completed.
///
/// In one-shot mode exactly one cycle runs (none if already cancelled).
/// Otherwise the first cycle starts one interval after the call and one
/// follows every interval after that. A publish error ends the loop with
/// that error.
pub async fn run<C: HttpClient + 'static>(
    config: &Config,
    client: Arc<C>,
    shutdown: CancellationToken,
) -> Result<usize> {
    if config.once {
        if shutdown.is_cancelled() {
            return Ok(0);
        }
        run_cycle(config, &client)
            .await
            .context("updating authorized keys file")?;
        return Ok(1);
    }

    info!(
        keyfile = %config.keyfile.display(),
        interval = %humantime::format_duration(config.interval),
        users = %config.users.join(", "),
        "Starting bot"
    );

    let first_tick = Instant::now()
        .checked_add(config.interval)
        .with_context(|| format!("interval {:?} is too long", config.interval))?;
    let mut ticker = interval_at(first_tick, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    let mut cycles = 0;
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        run_cycle(config, &client)
            .await
            .context("updating authorized keys file")?;
        cycles += 1;
    }

    info!(cycles, "Bot stopped");
    Ok(cycles)
}

/// Resolves on SIGINT or SIGTERM, returning the signal's name.
#[cfg(unix)]
pub async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to register SIGTERM handler, falling back to SIGINT only");
            ctrl_c.await.ok();
            "SIGINT"
        }
    }
}

/// Resolves on Ctrl-C.
#[cfg(not(unix))]
pub async fn shutdown_signal() -> &'static str {
    tokio::signal::ctrl_c().await.ok();
    "interrupt"
}
