//! Shared controller state
//!
//! `RackContext` is the explicit context object passed to every task: it
//! owns the sensors, the record store, the reference table, and the two
//! independent mutexes that coordinate the monitors with the main loop.
//! The locks are never nested, so lock ordering is a non-issue.

use crate::config::Config;
use crate::convert::{ReferenceTable, ScaleReferences};
use crate::debounce::Debouncer;
use crate::sensor::{ButtonInput, PresenceSensor, WeightSensor};
use crate::store::{RecordStore, SlotRecord};
use crate::Result;
use std::sync::Mutex;
use tracing::info;

/// In-memory mirror of the persisted records plus the weight baselines
#[derive(Debug, Clone)]
pub struct RackState {
    /// Calibration anchors (empty rack / empty jar)
    pub references: ScaleReferences,
    /// Weight baseline before the most recent averaged sample
    pub previous_adc_reading: i64,
    /// Most recent completed averaged weight sample
    pub current_adc_reading: i64,
    /// Per-slot record cache, indexed by slot number - 1
    pub slots: Vec<Option<SlotRecord>>,
}

impl RackState {
    pub fn new(rack_size: usize, empty_jar_mass: f64) -> Self {
        Self {
            references: ScaleReferences {
                empty_rack_adc: 0,
                empty_jar_adc: 0,
                empty_jar_mass,
            },
            previous_adc_reading: 0,
            current_adc_reading: 0,
            slots: vec![None; rack_size],
        }
    }

    /// Record a freshly averaged weight sample, shifting the old baseline
    pub fn shift_baseline(&mut self, averaged_adc: i64) {
        self.previous_adc_reading = self.current_adc_reading;
        self.current_adc_reading = averaged_adc;
    }

    /// Rebuild the mirror from persisted records (startup and
    /// post-calibration refresh). Slot records land in their slot; the two
    /// reference records restore the calibration anchors.
    pub fn rebuild(&mut self, records: Vec<SlotRecord>) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        for record in records {
            if record.location == crate::store::EMPTY_RACK_KEY {
                self.references.empty_rack_adc = record.adc_reading;
            } else if record.location.starts_with(crate::store::EMPTY_JAR_KEY_PREFIX) {
                self.references.empty_jar_adc = record.adc_reading;
                if record.mass_grams > 0.0 {
                    self.references.empty_jar_mass = record.mass_grams;
                }
            } else if let Some(slot) = parse_slot_number(&record.location) {
                if slot >= 1 && slot <= self.slots.len() {
                    self.slots[slot - 1] = Some(record);
                }
            }
        }
        if self.references.is_calibrated() {
            info!(
                "Restored calibration: empty_rack_adc={} empty_jar_adc={} jar_mass={:.1}g",
                self.references.empty_rack_adc,
                self.references.empty_jar_adc,
                self.references.empty_jar_mass
            );
        }
    }
}

fn parse_slot_number(location: &str) -> Option<usize> {
    location.strip_prefix("Spice")?.parse().ok()
}

/// Presence readings shared between the change monitor and the main loop
#[derive(Debug, Default, Clone, Copy)]
pub struct MonitorState {
    /// Baseline presence byte the consumer last acted on
    pub previous: u8,
    /// Most recent debounced presence byte
    pub current: u8,
    /// Edge-triggered alert, set by the monitor, cleared by the consumer
    pub alert: bool,
}

/// Everything the tasks share, passed as `Arc<RackContext>`
pub struct RackContext {
    pub config: Config,
    pub weight: Box<dyn WeightSensor>,
    pub presence: Box<dyn PresenceSensor>,
    pub button: Box<dyn ButtonInput>,
    pub store: RecordStore,
    pub reference_table: ReferenceTable,
    pub debouncer: Debouncer,

    /// Presence transition state; the change monitor writes, the
    /// coordinator reads-and-clears
    monitor: Mutex<MonitorState>,
    /// Button press latch; independent of the monitor mutex
    calibration_requested: Mutex<bool>,
    /// Record mirror; mutated only by the coordinator
    pub rack: tokio::sync::Mutex<RackState>,
}

impl RackContext {
    pub fn new(
        config: Config,
        weight: Box<dyn WeightSensor>,
        presence: Box<dyn PresenceSensor>,
        button: Box<dyn ButtonInput>,
        store: RecordStore,
        reference_table: ReferenceTable,
    ) -> Self {
        let debouncer = Debouncer::new(
            config.debounce_samples,
            config.debounce_interval,
            config.debounce_max_rounds,
        );
        let rack = RackState::new(config.rack_size, config.empty_jar_mass);
        Self {
            config,
            weight,
            presence,
            button,
            store,
            reference_table,
            debouncer,
            monitor: Mutex::new(MonitorState::default()),
            calibration_requested: Mutex::new(false),
            rack: tokio::sync::Mutex::new(rack),
        }
    }

    /// Feed one debounced presence sample into the shared transition state.
    ///
    /// While an alert is unconsumed the baseline is pinned, so transitions
    /// arriving between consumer polls coalesce into the net change rather
    /// than a queue of single-bit events.
    pub fn record_presence_sample(&self, value: u8) {
        let mut state = self.monitor.lock().unwrap();
        if !state.alert {
            state.previous = state.current;
        }
        state.current = value;
        if state.current != state.previous {
            state.alert = true;
        }
    }

    /// Consume a pending presence alert, returning `(previous, current)`
    pub fn take_alert(&self) -> Option<(u8, u8)> {
        let mut state = self.monitor.lock().unwrap();
        if !state.alert {
            return None;
        }
        state.alert = false;
        let pair = (state.previous, state.current);
        state.previous = state.current;
        Some(pair)
    }

    /// Seed the presence baseline without raising an alert (startup)
    pub fn seed_presence(&self, value: u8) {
        let mut state = self.monitor.lock().unwrap();
        state.previous = value;
        state.current = value;
        state.alert = false;
    }

    /// Snapshot the monitor state (tests and logging)
    pub fn monitor_state(&self) -> MonitorState {
        *self.monitor.lock().unwrap()
    }

    /// Latch a calibration request from the button poller
    pub fn request_calibration(&self) {
        *self.calibration_requested.lock().unwrap() = true;
    }

    /// Consume a pending calibration request
    pub fn take_calibration_request(&self) -> bool {
        let mut flag = self.calibration_requested.lock().unwrap();
        std::mem::take(&mut *flag)
    }

    /// Rebuild the record mirror from the persisted store
    pub async fn reload_rack_state(&self) -> Result<()> {
        let records = self.store.load_records()?;
        self.rack.lock().await.rebuild(records);
        Ok(())
    }
}
