//! Background monitoring tasks
//!
//! Two polling tasks run alongside the coordination loop: the presence
//! change monitor (debounced FSR sampling on a fixed period) and the
//! calibration button poller. Both only raise flags on the shared context;
//! neither ever touches the record store.

use crate::state::RackContext;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

/// Start the background monitoring tasks.
///
/// Each task runs until the shutdown channel flips to `true`; the returned
/// handles let the caller join them for deterministic shutdown.
pub fn spawn_monitors(
    ctx: Arc<RackContext>,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(presence_monitor_task(ctx.clone(), shutdown.clone())),
        tokio::spawn(button_poll_task(ctx, shutdown)),
    ]
}

/// Presence change monitor
///
/// Each tick re-samples the debounced presence status and feeds it into the
/// shared transition state; the coordinator consumes the resulting alert on
/// its own schedule.
async fn presence_monitor_task(ctx: Arc<RackContext>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = time::interval(ctx.config.monitor_interval);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    info!(
        "Presence monitor started ({}ms interval)",
        ctx.config.monitor_interval.as_millis()
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                info!("Presence monitor shutting down");
                return;
            }
        }

        match ctx.debouncer.read_stable(ctx.presence.as_ref()).await {
            Ok(Some(value)) => {
                ctx.record_presence_sample(value);
                debug!("Presence sample {:#05b}", value);
            }
            Ok(None) => warn!("Presence unstable this tick, skipping sample"),
            Err(e) => warn!("Presence read failed: {}", e),
        }
    }
}

/// Calibration button poller
///
/// Latches a calibration request while the button reads pressed; the latch
/// stays set until the coordinator consumes it.
async fn button_poll_task(ctx: Arc<RackContext>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = time::interval(ctx.config.button_poll_interval);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    info!(
        "Button poller started ({}ms interval)",
        ctx.config.button_poll_interval.as_millis()
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                info!("Button poller shutting down");
                return;
            }
        }

        match ctx.button.is_pressed() {
            Ok(true) => {
                info!("Calibration button pressed");
                ctx.request_calibration();
            }
            Ok(false) => {}
            Err(e) => warn!("Button read failed: {}", e),
        }
    }
}
