//! Record line format
//!
//! One record per rack slot plus the two reference entries, serialized as a
//! single comma-separated line of `field:value` pairs in fixed column order:
//!
//! ```text
//! Spice_Location:Spice2,Spice_Name:Paprika,ADC_Reading:1450,Spice_Mass:260.000000,Spice_Volume:19.200000
//! ```
//!
//! The location doubles as the record key. Serialized names are sanitized to
//! keep the field delimiters (comma, colon, newline) out of field values so a
//! written line always parses back in column order.

use crate::{Error, Result};

/// Maximum serialized spice name length in bytes
pub const MAX_NAME_LEN: usize = 31;

const FIELD_LOCATION: &str = "Spice_Location";
const FIELD_NAME: &str = "Spice_Name";
const FIELD_ADC: &str = "ADC_Reading";
const FIELD_MASS: &str = "Spice_Mass";
const FIELD_VOLUME: &str = "Spice_Volume";

/// Reference record key for the empty rack baseline
pub const EMPTY_RACK_KEY: &str = "N/A-Empty Rack";

/// Stable prefix shared by every empty jar reference key; upserts match on
/// this so a re-calibration with a different jar mass replaces the old
/// record instead of accumulating one per mass
pub const EMPTY_JAR_KEY_PREFIX: &str = "N/A-Empty Jar";

/// Reference record key for the empty jar baseline at a given mass
pub fn empty_jar_key(mass_grams: f64) -> String {
    format!("{}-{:.6}g", EMPTY_JAR_KEY_PREFIX, mass_grams)
}

/// Record key for a numbered rack slot
pub fn slot_key(slot: usize) -> String {
    format!("Spice{}", slot)
}

/// One persisted record: a rack slot or a reference baseline
#[derive(Debug, Clone, PartialEq)]
pub struct SlotRecord {
    /// Location key, e.g. "Spice2" or "N/A-Empty Rack"
    pub location: String,
    /// Spice name (sanitized, at most [`MAX_NAME_LEN`] bytes)
    pub name: String,
    /// Averaged raw ADC reading when the record was written
    pub adc_reading: i64,
    /// Calibrated spice mass in grams
    pub mass_grams: f64,
    /// Equivalent volume in teaspoons
    pub volume_tsp: f64,
}

impl SlotRecord {
    pub fn new(
        location: impl Into<String>,
        name: &str,
        adc_reading: i64,
        mass_grams: f64,
        volume_tsp: f64,
    ) -> Self {
        Self {
            location: location.into(),
            name: sanitize_name(name),
            adc_reading,
            mass_grams,
            volume_tsp,
        }
    }

    /// Serialize to one newline-terminated store line
    pub fn to_line(&self) -> String {
        format!(
            "{}:{},{}:{},{}:{},{}:{:.6},{}:{:.6}\n",
            FIELD_LOCATION,
            self.location,
            FIELD_NAME,
            self.name,
            FIELD_ADC,
            self.adc_reading,
            FIELD_MASS,
            self.mass_grams,
            FIELD_VOLUME,
            self.volume_tsp,
        )
    }

    /// Parse one store line back into a record
    pub fn parse_line(line: &str) -> Result<Self> {
        let line = line.trim_end_matches('\n');
        let mut fields = line.split(',');

        let location = take_field(&mut fields, FIELD_LOCATION, line)?;
        let name = take_field(&mut fields, FIELD_NAME, line)?;
        let adc = take_field(&mut fields, FIELD_ADC, line)?;
        let mass = take_field(&mut fields, FIELD_MASS, line)?;
        let volume = take_field(&mut fields, FIELD_VOLUME, line)?;

        let adc_reading = adc
            .parse::<i64>()
            .map_err(|_| Error::Parse(format!("bad ADC reading {:?} in {:?}", adc, line)))?;
        let mass_grams = mass
            .parse::<f64>()
            .map_err(|_| Error::Parse(format!("bad mass {:?} in {:?}", mass, line)))?;
        let volume_tsp = volume
            .parse::<f64>()
            .map_err(|_| Error::Parse(format!("bad volume {:?} in {:?}", volume, line)))?;

        Ok(Self {
            location,
            name,
            adc_reading,
            mass_grams,
            volume_tsp,
        })
    }
}

fn take_field<'a>(
    fields: &mut impl Iterator<Item = &'a str>,
    expected: &str,
    line: &str,
) -> Result<String> {
    let field = fields
        .next()
        .ok_or_else(|| Error::Parse(format!("missing {} in {:?}", expected, line)))?;
    let (tag, value) = field
        .split_once(':')
        .ok_or_else(|| Error::Parse(format!("malformed field {:?} in {:?}", field, line)))?;
    if tag != expected {
        return Err(Error::Parse(format!(
            "expected {} but found {} in {:?}",
            expected, tag, line
        )));
    }
    Ok(value.to_string())
}

/// Strip the field delimiters that would corrupt the line format, then
/// truncate to the maximum field length on a char boundary.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim_end_matches(['\r', '\n'])
        .chars()
        .filter(|c| *c != ',' && *c != ':' && *c != '\n')
        .collect();
    let mut out = cleaned;
    while out.len() > MAX_NAME_LEN {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_fields() {
        let record = SlotRecord::new("Spice1", "Paprika", 1450, 260.0, 19.25);
        let parsed = SlotRecord::parse_line(&record.to_line()).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn floats_serialize_to_six_decimals() {
        let record = SlotRecord::new("Spice1", "Salt", 100, 1.5, 2.25);
        let line = record.to_line();
        assert!(line.contains("Spice_Mass:1.500000"));
        assert!(line.contains("Spice_Volume:2.250000"));
    }

    #[test]
    fn name_is_sanitized_and_truncated() {
        let record = SlotRecord::new("Spice1", "Salt, extra:fine\n", 1, 0.0, 0.0);
        assert_eq!(record.name, "Salt extrafine");

        let long = "x".repeat(40);
        assert_eq!(sanitize_name(&long).len(), MAX_NAME_LEN);
    }

    #[test]
    fn reference_keys_are_distinct() {
        assert_ne!(EMPTY_RACK_KEY, empty_jar_key(130.0));
        assert_eq!(slot_key(2), "Spice2");
    }

    #[test]
    fn rejects_out_of_order_fields() {
        let line = "Spice_Name:Salt,Spice_Location:Spice1,ADC_Reading:1,Spice_Mass:0.0,Spice_Volume:0.0";
        assert!(SlotRecord::parse_line(line).is_err());
    }
}
