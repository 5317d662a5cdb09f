//! Persistent record store
//!
//! The keyed, line-oriented file holding calibration and measurement data,
//! plus the derived consolidated projection.

pub mod consolidated;
pub mod file;
pub mod record;

pub use consolidated::write_consolidated;
pub use file::{LineSpan, RecordStore};
pub use record::{
    empty_jar_key, slot_key, SlotRecord, EMPTY_JAR_KEY_PREFIX, EMPTY_RACK_KEY, MAX_NAME_LEN,
};
