//! TMP112 body temperature sensor.
//!
//! Runs in continuous conversion mode. The part has no data-ready flag: the
//! temperature register reads 0 until the first conversion completes, so reads
//! within one conversion time of `init` report no sample. After that every
//! poll returns the latest conversion.

use super::{BodyTemperature, RegisterDriver, SampleLayout, SensorProfile, StatusRegister};
use crate::bus::IicBus;
use crate::errors::SensorResult;
use crate::regio::{self, RegisterSequence};
use bitfield::bitfield;
use std::time::Duration;

/// Default 7-bit slave address (ADD0 tied to GND)
pub const ADDRESS: u8 = 0x48;

/// Worst-case conversion time
pub const CONVERSION_TIME: Duration = Duration::from_millis(35);

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Temperature = 0x00,
    Config = 0x01,
    TLow = 0x02,
    THigh = 0x03,
}

impl Register {
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

bitfield! {
    /// Configuration register, most significant byte first on the wire
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct ConfigRegister(u16);
    impl Debug;
    pub one_shot, set_one_shot: 15;
    pub u8, resolution, set_resolution: 14, 13;
    pub u8, fault_queue, set_fault_queue: 12, 11;
    pub polarity, set_polarity: 10;
    pub thermostat, set_thermostat: 9;
    pub shutdown, set_shutdown: 8;
    pub u8, conversion_rate, set_conversion_rate: 7, 6;
    pub alert, set_alert: 5;
    pub extended, set_extended: 4;
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionRate {
    Hz0_25 = 0,
    Hz1 = 1,
    Hz4 = 2,
    Hz8 = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tmp112Config {
    pub conversion_rate: ConversionRate,
    /// 13-bit format, extends the range to 150 °C
    pub extended_mode: bool,
}

impl Default for Tmp112Config {
    fn default() -> Self {
        Self { conversion_rate: ConversionRate::Hz4, extended_mode: false }
    }
}

impl Tmp112Config {
    pub fn register(&self) -> ConfigRegister {
        let mut config = ConfigRegister(0);
        // resolution bits are read-only 0b11; written back unchanged
        config.set_resolution(0b11);
        config.set_conversion_rate(self.conversion_rate as u8);
        config.set_alert(true);
        config.set_extended(self.extended_mode);
        config
    }
}

/// Decode the temperature register into 0.0625 °C counts
pub fn decode_temperature(bytes: [u8; 2]) -> i16 {
    let word = i16::from_be_bytes(bytes);
    if bytes[1] & 0x01 != 0 {
        word >> 3
    } else {
        word >> 4
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tmp112 {
    config: Tmp112Config,
}

impl Tmp112 {
    pub fn new(config: Tmp112Config) -> Self {
        Self { config }
    }
}

impl SensorProfile for Tmp112 {
    type Sample = BodyTemperature;

    const NAME: &'static str = "tmp112";
    const SAMPLE: SampleLayout = SampleLayout::new(Register::Temperature.addr(), 2);

    fn status(&self) -> Option<StatusRegister> {
        None
    }

    fn warm_up(&self) -> Duration {
        CONVERSION_TIME
    }

    fn init_sequences(&self) -> Vec<RegisterSequence> {
        let [hi, lo] = self.config.register().0.to_be_bytes();
        vec![RegisterSequence::new(Register::Config.addr(), &[hi, lo])]
    }

    fn decode(&self, raw: &[u8]) -> BodyTemperature {
        BodyTemperature { raw: decode_temperature([raw[0], raw[1]]) }
    }
}

pub type BodyTemperatureSensor<B> = RegisterDriver<Tmp112, B>;

impl<B: IicBus> RegisterDriver<Tmp112, B> {
    pub fn read_configuration(&mut self) -> SensorResult<ConfigRegister> {
        let address = self.require_address()?;
        let bytes: [u8; 2] = regio::read_exact(self.bus_mut(), address, Register::Config.addr())?;
        Ok(ConfigRegister(u16::from_be_bytes(bytes)))
    }
}
