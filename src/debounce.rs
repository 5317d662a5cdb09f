//! Presence sensor debouncing
//!
//! The FSR array chatters while a jar settles, so a raw status byte is only
//! accepted once it has held steady for a run of consecutive samples. If the
//! reading never stabilizes within the configured number of rounds the
//! caller gets `None` and decides what to do with the unstable sensor.

use crate::sensor::PresenceSensor;
use crate::Result;
use std::time::Duration;
use tracing::{debug, warn};

/// Consecutive-agreement debouncer for the presence sensor
#[derive(Debug, Clone)]
pub struct Debouncer {
    /// Consecutive agreeing samples required for stability
    pub samples_required: u32,
    /// Delay between samples
    pub sample_interval: Duration,
    /// Rounds (restarted stability windows) before giving up
    pub max_rounds: u32,
}

impl Debouncer {
    pub fn new(samples_required: u32, sample_interval: Duration, max_rounds: u32) -> Self {
        Self {
            samples_required,
            sample_interval,
            max_rounds,
        }
    }

    /// Sample the sensor until a value is stable, or return `None` if no
    /// stable run emerged within `max_rounds` restarted windows.
    ///
    /// A round ends when a sample disagrees with the running candidate; the
    /// candidate then switches to the new value and the counter restarts.
    pub async fn read_stable(&self, sensor: &dyn PresenceSensor) -> Result<Option<u8>> {
        let mut candidate = sensor.read_status()?;
        let mut run: u32 = 1;
        let mut rounds: u32 = 0;

        loop {
            if run >= self.samples_required {
                debug!("Presence stable at {:#05b} after {} samples", candidate, run);
                return Ok(Some(candidate));
            }

            tokio::time::sleep(self.sample_interval).await;
            let sample = sensor.read_status()?;
            if sample == candidate {
                run += 1;
            } else {
                rounds += 1;
                if rounds >= self.max_rounds {
                    warn!(
                        "Presence never stabilized ({} rounds, last {:#05b} vs {:#05b})",
                        rounds, sample, candidate
                    );
                    return Ok(None);
                }
                candidate = sample;
                run = 1;
            }
        }
    }
}
