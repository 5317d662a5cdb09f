//! # Smart Spice Rack Controller Library (spicerack)
//!
//! Sensor-driven record store and concurrent update engine for a physical
//! spice rack.
//!
//! **Purpose:** Read a load cell (ADC) and a force-sensing-resistor array
//! through device files, detect when jars are added or removed, compute
//! calibrated masses, and maintain a small keyed record file on disk along
//! with a consolidated summary for external relay.
//!
//! **Architecture:** A main coordination loop owns all record-file writes;
//! two background tasks (presence change monitor, calibration button poller)
//! raise flags under independent mutexes that the loop consumes.

pub mod calibration;
pub mod config;
pub mod convert;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod sensor;
pub mod state;
pub mod store;

pub use error::{Error, Result};
pub use state::RackContext;
