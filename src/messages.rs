use crate::sensors::{BodyTemperature, HeartRateSample, SensorSample};
use serde::{Deserialize, Serialize};

/// Header metadata common to all sensor messages
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Header {
    /// Unique device identifier
    pub device_id: String,
    /// Sensor identifier from the configuration (e.g., "hrate0", "btemp0")
    pub sensor_id: String,
    /// Sequence number for message ordering
    pub seq: u64,
    /// UTC timestamp in nanoseconds
    pub t_utc_ns: u64,
    /// Message schema version for evolution
    pub schema_v: u16,
}

impl Header {
    /// Create a new header stamped with the current time
    pub fn new(device_id: String, sensor_id: String, seq: u64) -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};

        let now_utc = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;

        Self {
            device_id,
            sensor_id,
            seq,
            t_utc_ns: now_utc,
            schema_v: 1,
        }
    }
}

/// Optical heart-rate sensor reading
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HeartRateMessage {
    pub h: Header,
    /// Red channel ADC count (18-bit)
    pub red: u32,
}

/// Body temperature reading
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BodyTemperatureMessage {
    pub h: Header,
    /// Raw sensor counts (0.0625 °C per LSB)
    pub raw: i16,
    /// Temperature (°C)
    pub celsius: f32,
}

/// Unified sensor message enum for different sensor types
#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum SensorMessage {
    HeartRate(HeartRateMessage),
    BodyTemperature(BodyTemperatureMessage),
}

impl SensorMessage {
    pub fn from_sample(h: Header, sample: SensorSample) -> Self {
        match sample {
            SensorSample::HeartRate(HeartRateSample { red }) => {
                SensorMessage::HeartRate(HeartRateMessage { h, red })
            }
            SensorSample::BodyTemperature(t @ BodyTemperature { raw }) => {
                SensorMessage::BodyTemperature(BodyTemperatureMessage { h, raw, celsius: t.celsius() })
            }
        }
    }

    /// Get the header from any sensor message
    pub fn header(&self) -> &Header {
        match self {
            SensorMessage::HeartRate(msg) => &msg.h,
            SensorMessage::BodyTemperature(msg) => &msg.h,
        }
    }

    /// Get the sensor ID from any sensor message
    pub fn sensor_id(&self) -> &str {
        &self.header().sensor_id
    }

    /// Serialize to a single JSON line
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
