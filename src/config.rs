use ltr329::MeasurementConfig;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Mode {
    /// Trigger one measurement per reading, sensor in standby in between
    #[default]
    Single,
    /// Let the sensor measure at its repeat rate
    Continuous,
}

/// USB IDs of the FTDI adapter the sensor hangs off.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AdapterConfig {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl Default for AdapterConfig {
    // FT232H
    fn default() -> Self {
        AdapterConfig {
            vendor_id: 0x0403,
            product_id: 0x6014,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub sensor: MeasurementConfig,
    pub mode: Mode,
    /// Time between printed readings
    pub interval_ms: u64,
    pub adapter: AdapterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sensor: MeasurementConfig::default(),
            mode: Mode::default(),
            interval_ms: 1000,
            adapter: AdapterConfig::default(),
        }
    }
}

impl Config {
    pub fn from_str(conf: &str) -> Result<Self, anyhow::Error> {
        Ok(ron::from_str::<Config>(conf)?)
    }

    pub fn read_from_file<P: AsRef<Path>>(file: P) -> Result<Self, anyhow::Error> {
        Ok(ron::de::from_reader(BufReader::new(File::open(file)?))?)
    }

    /// Reject sensor settings the device can't do.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.sensor.validate().map_err(|e| {
            anyhow::anyhow!(
                "{e}: gain {0} integration {1} ms rate {2} ms",
                self.sensor.gain,
                self.sensor.integration_ms,
                self.sensor.rate_ms
            )
        })
    }
}
