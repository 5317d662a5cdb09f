//! Main coordination loop
//!
//! The coordinator is the single writer for the record store. On each tick
//! it consumes the calibration-request latch and the presence alert raised
//! by the background monitors, then performs any resulting measurement,
//! record upsert, and projection rewrite itself. Component failures degrade
//! the current operation and are logged; only shutdown stops the loop.

use crate::calibration::{run_calibration, Operator};
use crate::sensor::average_weight;
use crate::state::RackContext;
use crate::store::{slot_key, write_consolidated, SlotRecord};
use crate::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time;
use tracing::{error, info, warn};

/// Main coordination loop driver
pub struct Coordinator {
    ctx: Arc<RackContext>,
}

impl Coordinator {
    pub fn new(ctx: Arc<RackContext>) -> Self {
        Self { ctx }
    }

    /// Run until the shutdown channel flips.
    ///
    /// An in-flight calibration step or store rewrite always completes
    /// before the loop observes shutdown; nothing is interrupted mid-write.
    pub async fn run(
        &self,
        operator: &mut dyn Operator,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        // Prime the mirror and both baselines before consuming events:
        // current_adc_reading must reflect a real completed measurement, not
        // whatever the mirror deserialized
        self.ctx.reload_rack_state().await?;
        match self.ctx.debouncer.read_stable(self.ctx.presence.as_ref()).await {
            Ok(Some(status)) => self.ctx.seed_presence(status),
            Ok(None) => warn!("Presence unstable at startup; baseline stays at zero"),
            Err(e) => warn!("Presence read failed at startup: {}", e),
        }
        if let Err(e) = self.rebaseline().await {
            warn!("Weight baseline failed at startup: {}", e);
        }

        let mut interval = time::interval(self.ctx.config.tick_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        info!(
            "Coordinator started ({}ms tick)",
            self.ctx.config.tick_interval.as_millis()
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => {
                    info!("Coordinator shutting down");
                    return Ok(());
                }
            }

            if self.ctx.take_calibration_request() {
                if let Err(e) = run_calibration(&self.ctx, operator).await {
                    error!("Calibration failed: {}", e);
                }
                continue;
            }

            if let Some((previous, current)) = self.ctx.take_alert() {
                if let Err(e) = self.handle_transition(previous, current).await {
                    error!("Presence transition handling failed: {}", e);
                }
            }
        }
    }

    /// React to a consumed presence alert
    async fn handle_transition(&self, previous: u8, current: u8) -> Result<()> {
        info!(
            "Presence transition {:#05b} -> {:#05b}",
            previous, current
        );
        if current > previous {
            self.handle_added(previous, current).await
        } else if current < previous {
            self.handle_removed().await
        } else {
            Ok(())
        }
    }

    /// A jar appeared: remeasure, update the slot record, republish
    async fn handle_added(&self, previous: u8, current: u8) -> Result<()> {
        let delta = current - previous;
        if !delta.is_power_of_two() {
            // Simultaneous multi-slot change: slot attribution is undefined,
            // so only the weight baseline advances
            warn!(
                "Multi-bit presence delta {:#05b}; rebaselining weight only",
                delta
            );
            return self.rebaseline().await;
        }
        let slot = delta.trailing_zeros() as usize + 1;
        if slot > self.ctx.config.rack_size {
            warn!(
                "Presence bit {} exceeds rack size {}",
                slot, self.ctx.config.rack_size
            );
            return self.rebaseline().await;
        }

        let averaged = average_weight(self.ctx.weight.as_ref(), self.ctx.config.weight_samples)?;
        let mut rack = self.ctx.rack.lock().await;
        rack.shift_baseline(averaged);
        let grams = rack
            .references
            .adc_to_grams(rack.previous_adc_reading, rack.current_adc_reading)?;

        let name = match &rack.slots[slot - 1] {
            Some(record) => record.name.clone(),
            None => {
                warn!("Slot {} has no calibrated record; skipping update", slot);
                return Ok(());
            }
        };
        let volume_tsp = match self.ctx.reference_table.grams_to_tsp(&name, grams) {
            Some(volume) => volume,
            None => {
                warn!("No density reference for {:?}; skipping update", name);
                return Ok(());
            }
        };

        let key = slot_key(slot);
        let record = SlotRecord::new(key.clone(), &name, averaged, grams, volume_tsp);
        self.ctx.store.upsert(&key, &record.to_line())?;
        rack.slots[slot - 1] = Some(record);
        write_consolidated(&self.ctx.config.consolidated_path, &rack.slots)?;
        info!("Slot {} updated: {} {:.1}g {:.2}tsp", slot, name, grams, volume_tsp);
        Ok(())
    }

    /// A jar was removed: rebaseline only; calibrated data stays on disk
    async fn handle_removed(&self) -> Result<()> {
        self.rebaseline().await?;
        info!("Jar removed; weight rebaselined, record preserved");
        Ok(())
    }

    async fn rebaseline(&self) -> Result<()> {
        let averaged = average_weight(self.ctx.weight.as_ref(), self.ctx.config.weight_samples)?;
        self.ctx.rack.lock().await.shift_baseline(averaged);
        Ok(())
    }
}
