//! Consolidated projection file
//!
//! A derived summary regenerated wholesale after every store mutation, one
//! line per occupied slot in slot order:
//!
//! ```text
//! Paprika - 19.25tsp
//! ```
//!
//! The external byte-relay server reads this file on its own schedule, so it
//! is written to a scratch file and renamed into place; readers never see a
//! partially written projection.

use super::record::SlotRecord;
use crate::{Error, Result};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Rewrite the projection from the current slot cache.
///
/// `slots` is indexed by slot number - 1; unoccupied slots are skipped.
pub fn write_consolidated(path: &Path, slots: &[Option<SlotRecord>]) -> Result<()> {
    let mut temp_path = path.as_os_str().to_os_string();
    temp_path.push(".tmp");

    let mut temp = std::fs::File::create(&temp_path)
        .map_err(|e| Error::Store(format!("create projection scratch: {}", e)))?;
    for record in slots.iter().flatten() {
        temp.write_all(format!("{} - {:.2}tsp\n", record.name, record.volume_tsp).as_bytes())
            .map_err(|e| Error::Store(format!("write projection: {}", e)))?;
    }
    temp.flush()
        .map_err(|e| Error::Store(format!("flush projection: {}", e)))?;
    drop(temp);

    std::fs::rename(&temp_path, path)
        .map_err(|e| Error::Store(format!("publish projection {}: {}", path.display(), e)))?;
    debug!("Consolidated projection regenerated at {}", path.display());
    Ok(())
}
