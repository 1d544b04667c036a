use crate::bus::SlaveAddress;
use crate::errors::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::fs;

/// Poll rate used when a sensor entry leaves `frequency` out
pub const DEFAULT_FREQUENCY_HZ: u32 = 10;

/// Fastest poll rate; the scheduler works in whole microseconds
pub const MAX_FREQUENCY_HZ: u32 = 1_000_000;

/// Root configuration struct expecting `[[sensor]]` TOML array format
#[derive(Debug, Deserialize)]
pub struct SensorConfig {
    #[serde(rename = "sensor")]
    pub sensors: Vec<SensorEntry>,
}

/// One sensor entry, matching each `[[sensor]]` section
#[derive(Debug, Deserialize)]
pub struct SensorEntry {
    pub id: String,
    pub driver: String,
    pub bus: String,
    pub address: u8,
    pub frequency: Option<u32>,
    /// Abort init at the first failed register write
    #[serde(default)]
    pub strict_init: bool,
}

impl SensorEntry {
    pub fn frequency_hz(&self) -> u32 {
        self.frequency.unwrap_or(DEFAULT_FREQUENCY_HZ)
    }

    pub fn slave_address(&self) -> ConfigResult<SlaveAddress> {
        SlaveAddress::try_from(self.address).map_err(|e| ConfigError::InvalidValue {
            field: format!("{}.address", self.id),
            reason: e.to_string(),
        })
    }
}

impl SensorConfig {
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let parsed: SensorConfig = toml::from_str(content)?;
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> ConfigResult<()> {
        for s in self.sensors.iter() {
            s.slave_address()?;
            match s.frequency {
                Some(0) => {
                    return Err(ConfigError::InvalidValue {
                        field: format!("{}.frequency", s.id),
                        reason: "must be at least 1 Hz".to_string(),
                    })
                }
                Some(hz) if hz > MAX_FREQUENCY_HZ => {
                    return Err(ConfigError::InvalidValue {
                        field: format!("{}.frequency", s.id),
                        reason: format!("must not exceed {} Hz", MAX_FREQUENCY_HZ),
                    })
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Loads config from TOML file
pub fn load_sensor_config(path: &str) -> ConfigResult<SensorConfig> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::LoadError {
        path: path.to_string(),
        source,
    })?;
    SensorConfig::from_toml(&content)
}
