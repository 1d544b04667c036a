//! MAX30102 pulse oximetry / heart-rate sensor.
//!
//! The driver runs the part in heart-rate mode (red LED only) and reads one
//! 3-byte FIFO sample whenever `PPG_RDY` is set in interrupt status 1.

use super::{HeartRateSample, RegisterDriver, SampleLayout, SensorProfile, StatusRegister};
use crate::bus::IicBus;
use crate::errors::SensorResult;
use crate::regio::{self, RegisterSequence};
use bitfield::bitfield;
use tracing::debug;

/// Default 7-bit slave address
pub const ADDRESS: u8 = 0x57;

/// FIFO samples are 18 bits, left in the low two bits of the first byte
pub const FIFO_MSB_MASK: u8 = 0x03;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    IntStatus1 = 0x00,
    IntStatus2 = 0x01,
    IntEnable1 = 0x02,
    IntEnable2 = 0x03,
    FifoWrPtr = 0x04,
    OvfCounter = 0x05,
    FifoRdPtr = 0x06,
    FifoData = 0x07,
    FifoConfig = 0x08,
    ModeConfig = 0x09,
    SpO2Config = 0x0A,
    Reserved0B = 0x0B,
    Led1PulseAmp = 0x0C,
    Led2PulseAmp = 0x0D,
    ProxLedPulseAmp = 0x10,
    MultiLedCtrl1 = 0x11,
    MultiLedCtrl2 = 0x12,
    DieTempInteger = 0x1F,
    DieTempFraction = 0x20,
    DieTempConfig = 0x21,
    ProxIntThreshold = 0x30,
}

impl Register {
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

bitfield! {
    /// Interrupt status 1 / interrupt enable 1 layout
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct InterruptStatus1(u8);
    impl Debug;
    pub a_full, set_a_full: 7;
    pub ppg_rdy, set_ppg_rdy: 6;
    pub alc_ovf, set_alc_ovf: 5;
    pub prox_int, set_prox_int: 4;
    pub pwr_rdy, _: 0;
}

bitfield! {
    /// Interrupt status 2 / interrupt enable 2 layout
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct InterruptStatus2(u8);
    impl Debug;
    pub die_temp_rdy, set_die_temp_rdy: 1;
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct FifoConfig(u8);
    impl Debug;
    pub u8, smp_ave, set_smp_ave: 7, 5;
    pub rollover_en, set_rollover_en: 4;
    pub u8, fifo_a_full, set_fifo_a_full: 3, 0;
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct ModeConfig(u8);
    impl Debug;
    pub shdn, set_shdn: 7;
    pub reset, set_reset: 6;
    pub u8, mode, set_mode: 2, 0;
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct SpO2Config(u8);
    impl Debug;
    pub u8, adc_rge, set_adc_rge: 6, 5;
    pub u8, sr, set_sr: 4, 2;
    pub u8, led_pw, set_led_pw: 1, 0;
}

/// Samples averaged into each FIFO entry
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleAveraging {
    None = 0,
    Avg2 = 1,
    Avg4 = 2,
    Avg8 = 3,
    Avg16 = 4,
    Avg32 = 5,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedMode {
    /// Red LED only
    HeartRate = 2,
    /// Red and IR
    SpO2 = 3,
    MultiLed = 7,
}

/// ADC full scale
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcRange {
    Na2048 = 0,
    Na4096 = 1,
    Na8192 = 2,
    Na16384 = 3,
}

/// LED pulse width, which also fixes the ADC resolution
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseWidth {
    Us69Bits15 = 0,
    Us118Bits16 = 1,
    Us215Bits17 = 2,
    Us411Bits18 = 3,
}

/// Samples per second
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRate {
    Sps50 = 0,
    Sps100 = 1,
    Sps200 = 2,
    Sps400 = 3,
    Sps800 = 4,
    Sps1000 = 5,
    Sps1600 = 6,
    Sps3200 = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Max30102Config {
    pub sample_averaging: SampleAveraging,
    pub fifo_rollover: bool,
    /// Free FIFO slots left when A_FULL fires (0..=15)
    pub fifo_almost_full: u8,
    pub mode: LedMode,
    pub adc_range: AdcRange,
    pub pulse_width: PulseWidth,
    pub sample_rate: SampleRate,
    /// LED1 (red) current, 0.2 mA per step
    pub led1_current: u8,
}

impl Default for Max30102Config {
    fn default() -> Self {
        Self {
            sample_averaging: SampleAveraging::None,
            fifo_rollover: false,
            fifo_almost_full: 15,
            mode: LedMode::HeartRate,
            adc_range: AdcRange::Na8192,
            pulse_width: PulseWidth::Us411Bits18,
            sample_rate: SampleRate::Sps50,
            led1_current: 0x28,
        }
    }
}

impl Max30102Config {
    pub fn interrupt_enable(&self) -> InterruptStatus1 {
        let mut enable = InterruptStatus1(0);
        enable.set_ppg_rdy(true);
        enable.set_a_full(true);
        enable
    }

    pub fn fifo_config(&self) -> FifoConfig {
        let mut fifo = FifoConfig(0);
        fifo.set_smp_ave(self.sample_averaging as u8);
        fifo.set_rollover_en(self.fifo_rollover);
        fifo.set_fifo_a_full(self.fifo_almost_full & 0x0F);
        fifo
    }

    pub fn mode_config(&self) -> ModeConfig {
        let mut mode = ModeConfig(0);
        mode.set_mode(self.mode as u8);
        mode
    }

    pub fn spo2_config(&self) -> SpO2Config {
        let mut spo2 = SpO2Config(0);
        spo2.set_adc_rge(self.adc_range as u8);
        spo2.set_sr(self.sample_rate as u8);
        spo2.set_led_pw(self.pulse_width as u8);
        spo2
    }
}

/// Decode one FIFO entry
pub fn decode_fifo_sample(bytes: [u8; 3]) -> u32 {
    (((bytes[0] & FIFO_MSB_MASK) as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32
}

#[derive(Debug, Clone, Default)]
pub struct Max30102 {
    config: Max30102Config,
}

impl Max30102 {
    pub fn new(config: Max30102Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Max30102Config {
        &self.config
    }
}

impl SensorProfile for Max30102 {
    type Sample = HeartRateSample;

    const NAME: &'static str = "max30102";
    const SAMPLE: SampleLayout = SampleLayout::new(Register::FifoData.addr(), 3);

    fn status(&self) -> Option<StatusRegister> {
        let mut ready = InterruptStatus1(0);
        ready.set_ppg_rdy(true);
        Some(StatusRegister { register: Register::IntStatus1.addr(), ready_mask: ready.0 })
    }

    fn init_sequences(&self) -> Vec<RegisterSequence> {
        let c = &self.config;
        vec![
            // interrupt enable 1 and 2
            RegisterSequence::new(Register::IntEnable1.addr(), &[c.interrupt_enable().0, 0x00]),
            // FIFO write pointer, overflow counter, read pointer
            RegisterSequence::new(Register::FifoWrPtr.addr(), &[0x00, 0x00, 0x00]),
            RegisterSequence::new(
                Register::FifoConfig.addr(),
                &[
                    c.fifo_config().0,
                    c.mode_config().0,
                    c.spo2_config().0,
                    0x00,
                    c.led1_current,
                ],
            ),
        ]
    }

    fn decode(&self, raw: &[u8]) -> HeartRateSample {
        HeartRateSample { red: decode_fifo_sample([raw[0], raw[1], raw[2]]) }
    }

    fn observe_status(&self, sensor: &str, flags: u8) {
        let status = InterruptStatus1(flags);
        if status.alc_ovf() {
            debug!("[{}] ambient light cancellation overflow", sensor);
        }
        if status.a_full() {
            debug!("[{}] FIFO almost full", sensor);
        }
    }
}

pub type HeartRateSensor<B> = RegisterDriver<Max30102, B>;

impl<B: IicBus> RegisterDriver<Max30102, B> {
    /// Software reset; the part reverts to power-on defaults and needs `init` again.
    pub fn reset(&mut self) -> SensorResult<()> {
        let address = self.require_address()?;
        let mut mode = ModeConfig(0);
        mode.set_reset(true);
        regio::write(self.bus_mut(), address, &RegisterSequence::new(Register::ModeConfig.addr(), &[mode.0]))?;
        Ok(())
    }

    pub fn shutdown(&mut self) -> SensorResult<()> {
        self.update_mode(|mode| mode.set_shdn(true))
    }

    pub fn wake(&mut self) -> SensorResult<()> {
        self.update_mode(|mode| mode.set_shdn(false))
    }

    fn update_mode(&mut self, change: impl FnOnce(&mut ModeConfig)) -> SensorResult<()> {
        let address = self.require_address()?;
        let [current]: [u8; 1] = regio::read_exact(self.bus_mut(), address, Register::ModeConfig.addr())?;
        let mut mode = ModeConfig(current);
        change(&mut mode);
        regio::write(self.bus_mut(), address, &RegisterSequence::new(Register::ModeConfig.addr(), &[mode.0]))?;
        Ok(())
    }

    /// Trigger a single die temperature conversion.
    pub fn start_die_temperature(&mut self) -> SensorResult<()> {
        let address = self.require_address()?;
        regio::write(self.bus_mut(), address, &RegisterSequence::new(Register::DieTempConfig.addr(), &[0x01]))?;
        Ok(())
    }

    /// Die temperature in °C, or `None` while the conversion is still running.
    pub fn read_die_temperature(&mut self) -> SensorResult<Option<f32>> {
        let address = self.require_address()?;

        // TEMP_EN clears itself when the conversion is done
        let [config]: [u8; 1] = regio::read_exact(self.bus_mut(), address, Register::DieTempConfig.addr())?;
        if config & 0x01 != 0 {
            return Ok(None);
        }

        let [integer, fraction]: [u8; 2] =
            regio::read_exact(self.bus_mut(), address, Register::DieTempInteger.addr())?;
        Ok(Some(integer as i8 as f32 + (fraction & 0x0F) as f32 * 0.0625))
    }

    pub fn interrupt_status(&mut self) -> SensorResult<(InterruptStatus1, InterruptStatus2)> {
        let address = self.require_address()?;
        let [s1, s2]: [u8; 2] = regio::read_exact(self.bus_mut(), address, Register::IntStatus1.addr())?;
        Ok((InterruptStatus1(s1), InterruptStatus2(s2)))
    }
}
