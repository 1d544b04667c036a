use thiserror::Error;
use crate::bus::linux::I2CError;

/// Failures reported by the platform bus layer
#[derive(Error, Debug)]
pub enum BusError {
    #[error("no target address set on the bus")]
    NoTarget,

    #[error("bus handle is already in use")]
    Busy,

    #[error("device at {address:#04x} did not acknowledge")]
    Nack { address: u8 },

    #[error("I2C communication failed: {0}")]
    Io(#[from] I2CError),

    #[error("I2C controller error: {0:?}")]
    Hal(embedded_hal::i2c::ErrorKind),
}

/// Errors surfaced by the register shim and sensor drivers
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Bus '{bus}' not found or unavailable")]
    BusUnavailable { bus: String },

    #[error("Sensor '{sensor}' not found at address {address:#04x}")]
    DeviceNotFound { sensor: String, address: u8 },

    #[error("Write to register {register:#04x} transferred {actual} of {expected} bytes")]
    TransferError { register: u8, expected: usize, actual: usize },

    #[error("Read from register {register:#04x} returned {actual} of {expected} bytes")]
    ShortRead { register: u8, expected: usize, actual: usize },

    #[error("Sample at register {register:#04x} has {actual} bytes, expected {expected}")]
    DecodeError { register: u8, expected: usize, actual: usize },

    #[error("Sensor '{sensor}' used before init")]
    NotInitialized { sensor: String },

    #[error("Sensor '{sensor}' initialization failed at register {register:#04x}: {source}")]
    InitError {
        sensor: String,
        register: u8,
        #[source]
        source: Box<SensorError>,
    },

    #[error("Invalid 7-bit slave address: {0:#x}")]
    InvalidAddress(u16),

    #[error("Unsupported sensor driver: '{driver}'")]
    UnsupportedDriver { driver: String },

    #[error(transparent)]
    Bus(#[from] BusError),
}

impl SensorError {
    /// Bus-level I/O mismatches and sample glitches: the caller keeps polling.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SensorError::TransferError { .. }
                | SensorError::ShortRead { .. }
                | SensorError::DecodeError { .. }
                | SensorError::Bus(_)
        )
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from '{path}': {source}")]
    LoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration format: {0}")]
    FormatError(#[from] toml::de::Error),

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Registry and start-up errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Configuration failed: {0}")]
    Config(#[from] ConfigError),

    #[error("Sensor registration failed: {0}")]
    RegistrationError(#[source] SensorError),

    #[error("No sensor could be initialized")]
    NoSensors,
}

pub type SensorResult<T> = Result<T, SensorError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type RegistryResult<T> = Result<T, RegistryError>;
