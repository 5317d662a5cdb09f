//! Sensor device readers
//!
//! Each physical input sits behind a trait so the monitors, calibration
//! engine, and tests can substitute synthetic sensors. The file-backed
//! implementations reopen the device on every read, matching how the kernel
//! drivers expose fresh samples through sysfs/chardev reads.

use crate::{Error, Result};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Maximum bytes read for one ASCII weight sample
const WEIGHT_READ_LEN: usize = 16;

/// Raw load-cell ADC sampling
pub trait WeightSensor: Send + Sync {
    /// Read one raw ADC sample
    fn read_raw(&self) -> Result<i64>;
}

/// Multi-bit slot presence status (bit i set ⇒ slot i+1 occupied)
pub trait PresenceSensor: Send + Sync {
    /// Read the current presence byte
    fn read_status(&self) -> Result<u8>;
}

/// Calibration button input
pub trait ButtonInput: Send + Sync {
    /// True while the button is pressed
    fn is_pressed(&self) -> Result<bool>;
}

/// Load-cell ADC exposed as an ASCII integer line (IIO raw voltage channel)
pub struct FileWeightSensor {
    path: PathBuf,
}

impl FileWeightSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WeightSensor for FileWeightSensor {
    fn read_raw(&self) -> Result<i64> {
        let mut buf = [0u8; WEIGHT_READ_LEN];
        let n = read_device(&self.path, &mut buf)?;
        let text = std::str::from_utf8(&buf[..n])
            .map_err(|_| Error::Sensor(format!("{}: non-ASCII sample", self.path.display())))?;
        let value = text.trim().parse::<i64>().map_err(|_| {
            Error::Sensor(format!(
                "{}: unparsable ADC sample {:?}",
                self.path.display(),
                text.trim()
            ))
        })?;
        debug!("Weight reading is {}", value);
        Ok(value)
    }
}

/// FSR array status byte device
pub struct FilePresenceSensor {
    path: PathBuf,
}

impl FilePresenceSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PresenceSensor for FilePresenceSensor {
    fn read_status(&self) -> Result<u8> {
        let mut buf = [0u8; 1];
        let n = read_device(&self.path, &mut buf)?;
        if n == 0 {
            return Err(Error::Sensor(format!(
                "{}: empty presence read",
                self.path.display()
            )));
        }
        debug!("FSR reading is {:#05b}", buf[0]);
        Ok(buf[0])
    }
}

/// Button device yielding ASCII '0'/'1'
pub struct FileButtonInput {
    path: PathBuf,
}

impl FileButtonInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ButtonInput for FileButtonInput {
    fn is_pressed(&self) -> Result<bool> {
        let mut buf = [0u8; 1];
        let n = read_device(&self.path, &mut buf)?;
        if n == 0 {
            return Err(Error::Sensor(format!(
                "{}: empty button read",
                self.path.display()
            )));
        }
        Ok(buf[0] == b'1')
    }
}

/// Open a device file and fill as much of `buf` as one read session yields.
///
/// Interrupted reads are retried; any other failure maps to a sensor error.
fn read_device(path: &Path, buf: &mut [u8]) -> Result<usize> {
    let mut file = File::open(path)
        .map_err(|e| Error::Sensor(format!("failed to open {}: {}", path.display(), e)))?;
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(Error::Sensor(format!(
                    "read failed on {}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }
    Ok(filled)
}

/// Average `samples` consecutive raw ADC readings (integer mean).
///
/// This is the measurement primitive behind every weight baseline; the
/// caller is responsible for shifting previous/current readings around it.
pub fn average_weight(sensor: &dyn WeightSensor, samples: u32) -> Result<i64> {
    let mut sum: i64 = 0;
    for _ in 0..samples {
        sum += sensor.read_raw()?;
    }
    let mean = sum / i64::from(samples);
    debug!("Averaged {} weight samples: {}", samples, mean);
    Ok(mean)
}
