//! Shared test fixtures: scripted sensors, a scripted operator, and a
//! context builder with test-friendly timing.

// Not every test binary uses every fixture
#![allow(dead_code)]

use spicerack::calibration::Operator;
use spicerack::config::Config;
use spicerack::convert::ReferenceTable;
use spicerack::sensor::{ButtonInput, PresenceSensor, WeightSensor};
use spicerack::store::RecordStore;
use spicerack::{RackContext, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Presence sensor replaying a scripted sequence, repeating the final value
pub struct ScriptedPresence {
    values: Mutex<VecDeque<u8>>,
    last: AtomicU8,
}

impl ScriptedPresence {
    pub fn new(values: impl IntoIterator<Item = u8>) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
            last: AtomicU8::new(0),
        }
    }
}

impl PresenceSensor for ScriptedPresence {
    fn read_status(&self) -> Result<u8> {
        let mut values = self.values.lock().unwrap();
        match values.pop_front() {
            Some(v) => {
                self.last.store(v, Ordering::SeqCst);
                Ok(v)
            }
            None => Ok(self.last.load(Ordering::SeqCst)),
        }
    }
}

/// Presence sensor the test can flip at will
#[derive(Clone)]
pub struct SettablePresence(pub Arc<AtomicU8>);

impl SettablePresence {
    pub fn new(value: u8) -> Self {
        Self(Arc::new(AtomicU8::new(value)))
    }

    pub fn set(&self, value: u8) {
        self.0.store(value, Ordering::SeqCst);
    }
}

impl PresenceSensor for SettablePresence {
    fn read_status(&self) -> Result<u8> {
        Ok(self.0.load(Ordering::SeqCst))
    }
}

/// Weight sensor replaying a scripted sequence, repeating the final value
pub struct ScriptedWeight {
    values: Mutex<VecDeque<i64>>,
    last: Mutex<i64>,
}

impl ScriptedWeight {
    pub fn new(values: impl IntoIterator<Item = i64>) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
            last: Mutex::new(0),
        }
    }
}

impl WeightSensor for ScriptedWeight {
    fn read_raw(&self) -> Result<i64> {
        let mut values = self.values.lock().unwrap();
        match values.pop_front() {
            Some(v) => {
                *self.last.lock().unwrap() = v;
                Ok(v)
            }
            None => Ok(*self.last.lock().unwrap()),
        }
    }
}

/// Button that never fires unless the test says so
#[derive(Clone)]
pub struct SettableButton(pub Arc<AtomicBool>);

impl SettableButton {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn press(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ButtonInput for SettableButton {
    fn is_pressed(&self) -> Result<bool> {
        Ok(self.0.load(Ordering::SeqCst))
    }
}

/// Operator answering prompts from a script and collecting messages
pub struct ScriptedOperator {
    pub answers: VecDeque<String>,
    pub messages: Vec<String>,
}

impl ScriptedOperator {
    pub fn new(answers: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            answers: answers.into_iter().map(str::to_string).collect(),
            messages: Vec::new(),
        }
    }
}

impl Operator for ScriptedOperator {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        match self.answers.pop_front() {
            Some(answer) => Ok(answer),
            None => panic!("Operator script exhausted at prompt {:?}", prompt),
        }
    }

    fn say(&mut self, message: &str) -> Result<()> {
        self.messages.push(message.to_string());
        Ok(())
    }
}

/// Test configuration with millisecond timing and a 2-sample debouncer
pub fn test_config(dir: &TempDir, rack_size: usize) -> Config {
    let mut config = Config::default();
    config.store_path = dir.path().join("spice_data");
    config.consolidated_path = dir.path().join("spice_summary");
    config.reference_table_path = dir.path().join("spice_density.csv");
    config.rack_size = rack_size;
    config.monitor_interval = Duration::from_millis(50);
    config.button_poll_interval = Duration::from_millis(10);
    config.tick_interval = Duration::from_millis(20);
    config.debounce_samples = 2;
    config.debounce_interval = Duration::from_millis(1);
    config.debounce_max_rounds = 3;
    config.weight_samples = 2;
    config
}

/// Reference table rows used across tests
pub const TEST_DENSITIES: &str = "Paprika, 180, 2.0\nCumin, 150, 1.5\n";

/// Build a context over a temp store with the given sensors
pub fn build_context(
    dir: &TempDir,
    rack_size: usize,
    weight: Box<dyn WeightSensor>,
    presence: Box<dyn PresenceSensor>,
    button: Box<dyn ButtonInput>,
) -> Arc<RackContext> {
    let config = test_config(dir, rack_size);
    std::fs::write(&config.reference_table_path, TEST_DENSITIES).unwrap();
    let store = RecordStore::open(&config.store_path).unwrap();
    let table = ReferenceTable::load(&config.reference_table_path).unwrap();
    Arc::new(RackContext::new(
        config, weight, presence, button, store, table,
    ))
}
