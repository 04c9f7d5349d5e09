//! Scheduled background ticks: the periodic drain trigger and the hourly heartbeat.
//!
//! Both run as plain `tokio::spawn`ed loops selecting between a `tokio::time::interval` and the
//! lifecycle shutdown signal -- no custom executor, no bespoke threading.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

/// One scheduled action, invoked on every tick.
#[async_trait]
pub trait Ticker: Send + Sync {
    async fn on_tick(&self);
}

/// Runs `ticker.on_tick()` every `interval`, stopping when `shutdown` fires.
///
/// Returns the join handle so callers can await it during drain.
pub fn spawn_interval_loop(
    interval: Duration,
    ticker: Arc<dyn Ticker>,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so the schedule starts one interval out.
        ticks.tick().await;
        loop {
            tokio::select! {
                _ = ticks.tick() => ticker.on_tick().await,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
