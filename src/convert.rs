//! Mass and volume conversion
//!
//! Raw ADC deltas become grams through a two-point linear calibration
//! anchored at the empty-jar reference; grams become teaspoons through a
//! per-spice density table shipped alongside the controller.

use crate::{Error, Result};
use std::path::Path;
use tracing::warn;

/// Grams per ounce conversion factor
const GRAMS_TO_OUNCES: f64 = 0.035_273_961_9;

/// The two baseline ADC readings plus the empty jar mass that anchor the
/// linear ADC→grams mapping
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaleReferences {
    pub empty_rack_adc: i64,
    pub empty_jar_adc: i64,
    pub empty_jar_mass: f64,
}

impl ScaleReferences {
    /// True once both reference readings have been measured
    pub fn is_calibrated(&self) -> bool {
        self.empty_rack_adc != 0 && self.empty_jar_adc != 0 && self.empty_jar_mass > 0.0
    }

    /// Convert the ADC delta between two weight baselines into grams.
    ///
    /// Scale factor `m = (empty_jar_adc - empty_rack_adc) / empty_jar_mass`;
    /// the jar's own mass is subtracted so the result is spice mass only.
    pub fn adc_to_grams(&self, previous_adc: i64, current_adc: i64) -> Result<f64> {
        if !self.is_calibrated() {
            return Err(Error::NotCalibrated(
                "reference readings not established".to_string(),
            ));
        }
        let m = (self.empty_jar_adc - self.empty_rack_adc) as f64 / self.empty_jar_mass;
        if m == 0.0 {
            return Err(Error::NotCalibrated(
                "reference readings are identical".to_string(),
            ));
        }
        let x = (current_adc - previous_adc).abs() as f64;
        Ok(x / m - self.empty_jar_mass)
    }
}

/// One row of the density reference table
#[derive(Debug, Clone)]
struct DensityRow {
    name: String,
    tsp_per_oz: f64,
}

/// Read-only spice density table, loaded from a CSV of
/// `name, ..., tsp_per_oz` rows (last numeric column is the density)
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    rows: Vec<DensityRow>,
}

impl ReferenceTable {
    /// Load the table; malformed rows are logged and skipped
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read reference table {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::parse(&contents))
    }

    fn parse(contents: &str) -> Self {
        let mut rows = Vec::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() < 2 {
                warn!("Skipping malformed reference row: {:?}", line);
                continue;
            }
            let name = fields[0].to_string();
            match fields[fields.len() - 1].parse::<f64>() {
                Ok(tsp_per_oz) if tsp_per_oz.is_finite() => {
                    rows.push(DensityRow { name, tsp_per_oz })
                }
                _ => warn!("Skipping reference row with bad density: {:?}", line),
            }
        }
        Self { rows }
    }

    /// Convert grams of a named spice to teaspoons.
    ///
    /// The name matches by substring in either direction so operator
    /// shorthand ("cumin" vs "Ground Cumin") still resolves. `None` means
    /// the table has no matching row and the caller should re-prompt.
    pub fn grams_to_tsp(&self, name: &str, grams: f64) -> Option<f64> {
        let needle = name.to_ascii_lowercase();
        self.rows
            .iter()
            .find(|row| {
                let hay = row.name.to_ascii_lowercase();
                hay.contains(&needle) || needle.contains(&hay)
            })
            .map(|row| grams * GRAMS_TO_OUNCES * row.tsp_per_oz)
    }

    /// Known names, for the calibration retry prompt
    pub fn names(&self) -> Vec<&str> {
        self.rows.iter().map(|row| row.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_point_calibration_scenario() {
        let refs = ScaleReferences {
            empty_rack_adc: 1000,
            empty_jar_adc: 1200,
            empty_jar_mass: 130.0,
        };
        // m = 200/130; x = 600; grams = 600/m - 130 = 390 - 130 = 260
        let grams = refs.adc_to_grams(1200, 1800).unwrap();
        assert!((grams - 260.0).abs() < 1e-9);
    }

    #[test]
    fn delta_direction_does_not_matter() {
        let refs = ScaleReferences {
            empty_rack_adc: 1000,
            empty_jar_adc: 1200,
            empty_jar_mass: 130.0,
        };
        let a = refs.adc_to_grams(1200, 1800).unwrap();
        let b = refs.adc_to_grams(1800, 1200).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn uncalibrated_references_are_an_error() {
        let refs = ScaleReferences::default();
        assert!(matches!(
            refs.adc_to_grams(0, 100),
            Err(Error::NotCalibrated(_))
        ));
    }

    #[test]
    fn table_lookup_by_substring() {
        let table = ReferenceTable::parse("Ground Cumin, 201, 2.1\nPaprika, 180, 1.9\n");
        let tsp = table.grams_to_tsp("cumin", 100.0).unwrap();
        assert!((tsp - 100.0 * GRAMS_TO_OUNCES * 2.1).abs() < 1e-9);
        assert!(table.grams_to_tsp("saffron", 100.0).is_none());
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let table = ReferenceTable::parse("# comment\n\nBad Row\nSalt, 1.5\n");
        assert_eq!(table.names(), vec!["Salt"]);
    }
}
