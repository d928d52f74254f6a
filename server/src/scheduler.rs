//! Periodic drivers for the world serializer, and the shutdown signal.
//!
//! Both drivers are plain tasks that lock the world mutex for each
//! firing, so ticks, autosaves and API handlers interleave but never
//! overlap. Shutdown is cooperative: the stop flag is only observed
//! between firings, so a tick or autosave that is already running always
//! completes before its driver exits, and awaiting the returned handle
//! drains the in-flight firing.

use std::path::PathBuf;
use std::time::Duration;

use log::{error, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use crate::api::SharedState;
use crate::snapshot;

/// Drives the simulation: every period the world advances by the
/// measured elapsed delta, not the nominal period. The driver stops
/// firing once `stop` flips, finishing any tick already in progress.
pub fn spawn_tick_loop(
    state: SharedState,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_tick = Instant::now();
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = sleep(period) => {
                    let now = Instant::now();
                    let delta = now.duration_since(last_tick).as_secs_f64();
                    last_tick = now;
                    let mut app = state.app.lock().await;
                    app.tick(delta).await;
                }
            }
        }
    })
}

/// Writes the world snapshot every period; failures are logged and the
/// write is retried on the next firing. Stops like the tick driver: no
/// new firings after `stop` flips, the current write runs to completion.
pub fn spawn_autosave_loop(
    state: SharedState,
    period: Duration,
    path: PathBuf,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = sleep(period) => {
                    let app = state.app.lock().await;
                    if let Err(err) = snapshot::save_to_file(&app, &path) {
                        error!("autosave failed, will retry next period: {err:#}");
                    }
                }
            }
        }
    })
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
