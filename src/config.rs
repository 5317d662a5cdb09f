//! Configuration loading and layering
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (via clap `env` attributes)
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default empty jar mass in grams, overridable during calibration
pub const DEFAULT_EMPTY_JAR_MASS: f64 = 130.0;

/// Controller configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// ADC raw sample device (ASCII integer line)
    pub weight_device: PathBuf,
    /// FSR presence device (single status byte)
    pub presence_device: PathBuf,
    /// Calibration button device ('0'/'1' ASCII)
    pub button_device: PathBuf,
    /// Record store file
    pub store_path: PathBuf,
    /// Consolidated projection file (consumed by the external relay)
    pub consolidated_path: PathBuf,
    /// Read-only spice density reference table (CSV)
    pub reference_table_path: PathBuf,
    /// Number of rack slots
    pub rack_size: usize,
    /// Presence change monitor period
    pub monitor_interval: Duration,
    /// Calibration button poll period
    pub button_poll_interval: Duration,
    /// Main coordination loop tick
    pub tick_interval: Duration,
    /// Consecutive agreeing samples required by the debouncer
    pub debounce_samples: u32,
    /// Spacing between debounce samples
    pub debounce_interval: Duration,
    /// Debounce rounds before giving up on stability
    pub debounce_max_rounds: u32,
    /// Weight samples averaged per measurement
    pub weight_samples: u32,
    /// Default empty jar mass in grams
    pub empty_jar_mass: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            weight_device: PathBuf::from("/sys/bus/iio/devices/iio:device0/in_voltage0_raw"),
            presence_device: PathBuf::from("/dev/fsr_gpio_0"),
            button_device: PathBuf::from("/dev/cal_button_0"),
            store_path: PathBuf::from("/var/lib/spicerack/spice_data"),
            consolidated_path: PathBuf::from("/var/lib/spicerack/spice_summary"),
            reference_table_path: PathBuf::from("/etc/spicerack/spice_density.csv"),
            rack_size: 3,
            monitor_interval: Duration::from_secs(5),
            button_poll_interval: Duration::from_millis(500),
            tick_interval: Duration::from_secs(1),
            debounce_samples: 10,
            debounce_interval: Duration::from_millis(200),
            debounce_max_rounds: 10,
            weight_samples: 10,
            empty_jar_mass: DEFAULT_EMPTY_JAR_MASS,
        }
    }
}

/// On-disk configuration file shape; every field optional so partial files
/// layer over the compiled defaults
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub weight_device: Option<PathBuf>,
    pub presence_device: Option<PathBuf>,
    pub button_device: Option<PathBuf>,
    pub store_path: Option<PathBuf>,
    pub consolidated_path: Option<PathBuf>,
    pub reference_table_path: Option<PathBuf>,
    pub rack_size: Option<usize>,
    pub monitor_interval_ms: Option<u64>,
    pub button_poll_interval_ms: Option<u64>,
    pub tick_interval_ms: Option<u64>,
    pub debounce_samples: Option<u32>,
    pub debounce_interval_ms: Option<u64>,
    pub debounce_max_rounds: Option<u32>,
    pub weight_samples: Option<u32>,
    pub empty_jar_mass: Option<f64>,
}

impl Config {
    /// Load configuration, layering an optional TOML file over the defaults.
    ///
    /// When `config_path` is None, the platform config directories are probed
    /// (`~/.config/spicerack/config.toml`, then `/etc/spicerack/config.toml`);
    /// a missing file is not an error, a malformed one is.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        let path = match config_path {
            Some(p) => Some(p.to_path_buf()),
            None => find_config_file(),
        };

        if let Some(path) = path {
            if config_path.is_some() && !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            if path.exists() {
                let contents = std::fs::read_to_string(&path)?;
                let file: FileConfig = toml::from_str(&contents)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                config.apply(file);
                tracing::info!("Loaded config from {}", path.display());
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, file: FileConfig) {
        if let Some(v) = file.weight_device {
            self.weight_device = v;
        }
        if let Some(v) = file.presence_device {
            self.presence_device = v;
        }
        if let Some(v) = file.button_device {
            self.button_device = v;
        }
        if let Some(v) = file.store_path {
            self.store_path = v;
        }
        if let Some(v) = file.consolidated_path {
            self.consolidated_path = v;
        }
        if let Some(v) = file.reference_table_path {
            self.reference_table_path = v;
        }
        if let Some(v) = file.rack_size {
            self.rack_size = v;
        }
        if let Some(v) = file.monitor_interval_ms {
            self.monitor_interval = Duration::from_millis(v);
        }
        if let Some(v) = file.button_poll_interval_ms {
            self.button_poll_interval = Duration::from_millis(v);
        }
        if let Some(v) = file.tick_interval_ms {
            self.tick_interval = Duration::from_millis(v);
        }
        if let Some(v) = file.debounce_samples {
            self.debounce_samples = v;
        }
        if let Some(v) = file.debounce_interval_ms {
            self.debounce_interval = Duration::from_millis(v);
        }
        if let Some(v) = file.debounce_max_rounds {
            self.debounce_max_rounds = v;
        }
        if let Some(v) = file.weight_samples {
            self.weight_samples = v;
        }
        if let Some(v) = file.empty_jar_mass {
            self.empty_jar_mass = v;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.rack_size == 0 || self.rack_size > 8 {
            return Err(Error::Config(format!(
                "rack_size must be 1..=8 (one presence bit per slot), got {}",
                self.rack_size
            )));
        }
        if self.weight_samples == 0 {
            return Err(Error::Config("weight_samples must be nonzero".to_string()));
        }
        if self.debounce_samples == 0 || self.debounce_max_rounds == 0 {
            return Err(Error::Config(
                "debounce_samples and debounce_max_rounds must be nonzero".to_string(),
            ));
        }
        if !(self.empty_jar_mass.is_finite() && self.empty_jar_mass > 0.0) {
            return Err(Error::Config(format!(
                "empty_jar_mass must be a positive finite value, got {}",
                self.empty_jar_mass
            )));
        }
        Ok(())
    }
}

/// Probe platform config locations for a config file
fn find_config_file() -> Option<PathBuf> {
    if let Some(dir) = dirs::config_dir() {
        let user_config = dir.join("spicerack").join("config.toml");
        if user_config.exists() {
            return Some(user_config);
        }
    }
    let system_config = PathBuf::from("/etc/spicerack/config.toml");
    if system_config.exists() {
        return Some(system_config);
    }
    None
}
