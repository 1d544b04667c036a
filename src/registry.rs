use crate::bus::linux::LinuxIicBus;
use crate::bus::{share, BusRegistry, BusType, SlaveAddress};
use crate::config::{BusConfig, SensorConfig, SensorEntry};
use crate::errors::{RegistryError, RegistryResult, SensorError, SensorResult};
use crate::sensors::{create_sensor_driver, InitPolicy, SensorDriver};
use tracing::{error, info, warn};

/// A driver that came through `init`, with its configured poll rate
pub struct RegisteredSensor {
    pub driver: Box<dyn SensorDriver>,
    pub frequency_hz: u32,
}

/// Open every I2C bus listed in the config. A bus that fails to open is
/// left out; sensors on it then fail with `BusUnavailable`.
pub fn open_buses(bus_cfg: &BusConfig) -> BusRegistry {
    let mut registry = BusRegistry::new();
    for b in bus_cfg.buses.iter() {
        match BusType::from_str(&b.r#type) {
            Some(BusType::I2C) => match LinuxIicBus::new(&b.path) {
                Ok(bus) => {
                    info!("[registry] opened bus {} at {}", b.id, b.path);
                    registry.insert(b.id.clone(), share(bus));
                }
                Err(e) => error!("[registry] failed to open bus {} at {}: {}", b.id, b.path, e),
            },
            None => warn!("[registry] ignoring bus {} with unsupported type '{}'", b.id, b.r#type),
        }
    }
    registry
}

fn init_sensor(entry: &SensorEntry, buses: &BusRegistry) -> SensorResult<Box<dyn SensorDriver>> {
    let bus = buses.get_device(&entry.bus)?;
    let mut sensor = create_sensor_driver(&entry.driver, entry.id.clone(), entry.bus.clone(), bus)?;
    if entry.strict_init {
        sensor.set_init_policy(InitPolicy::FailFast);
    }

    let address = SlaveAddress::try_from(entry.address)?;
    let report = sensor.init(address)?;
    if let Some(step) = report.first_failure() {
        warn!(
            "[{}] initialized with {} failed write(s), first at register {:#04x}",
            entry.id,
            report.failures(),
            step.register
        );
    }
    Ok(sensor)
}

/// Create and initialize every configured sensor.
///
/// A sensor whose bus or device cannot be reached is dropped from start-up
/// and the rest carry on; an unknown driver name is a configuration error.
pub fn init_sensors(sensor_config: &SensorConfig, buses: &BusRegistry) -> RegistryResult<Vec<RegisteredSensor>> {
    let mut sensors = Vec::new();
    info!("[registry] initializing {} sensors...", sensor_config.sensors.len());

    for s in sensor_config.sensors.iter() {
        info!("[registry] registering sensor: id={} driver={} bus={} address={:#04x}", s.id, s.driver, s.bus, s.address);
        match init_sensor(s, buses) {
            Ok(driver) => sensors.push(RegisteredSensor { driver, frequency_hz: s.frequency_hz() }),
            Err(e @ SensorError::UnsupportedDriver { .. }) => {
                return Err(RegistryError::RegistrationError(e));
            }
            Err(e) => error!("[registry] sensor {} skipped: {}", s.id, e),
        }
    }

    if sensors.is_empty() {
        return Err(RegistryError::NoSensors);
    }
    Ok(sensors)
}
