use crate::bus::{IicBus, SharedBus, SlaveAddress};
use crate::errors::{BusError, SensorError, SensorResult};
use crate::regio::{self, RegisterSequence};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[cfg(feature = "max30102")]
pub mod max30102;
#[cfg(feature = "tmp112")]
pub mod tmp112;

/// Largest sample any profile reads in one transfer
pub const MAX_SAMPLE_WIDTH: usize = 8;

/// Optical sensor FIFO sample (red LED channel ADC count)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateSample {
    pub red: u32,
}

/// Body temperature in sensor counts of 0.0625 °C
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyTemperature {
    pub raw: i16,
}

impl BodyTemperature {
    pub const CELSIUS_PER_LSB: f32 = 0.0625;

    pub fn celsius(&self) -> f32 {
        self.raw as f32 * Self::CELSIUS_PER_LSB
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SensorSample {
    HeartRate(HeartRateSample),
    BodyTemperature(BodyTemperature),
}

impl From<HeartRateSample> for SensorSample {
    fn from(sample: HeartRateSample) -> Self {
        SensorSample::HeartRate(sample)
    }
}

impl From<BodyTemperature> for SensorSample {
    fn from(sample: BodyTemperature) -> Self {
        SensorSample::BodyTemperature(sample)
    }
}

/// Status register polled before each sample read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRegister {
    pub register: u8,
    pub ready_mask: u8,
}

impl StatusRegister {
    pub fn is_ready(&self, flags: u8) -> bool {
        flags & self.ready_mask != 0
    }
}

/// Where a sample lives and how wide it is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLayout {
    pub register: u8,
    pub width: usize,
}

impl SampleLayout {
    pub const fn new(register: u8, width: usize) -> Self {
        assert!(width > 0 && width <= MAX_SAMPLE_WIDTH);
        Self { register, width }
    }
}

/// Register map and decoding rules of one sensor chip
pub trait SensorProfile {
    type Sample: Copy + fmt::Debug + Into<SensorSample>;

    const NAME: &'static str;
    const SAMPLE: SampleLayout;

    /// Ready flag gating the sample read; `None` when every poll carries a sample.
    fn status(&self) -> Option<StatusRegister>;

    /// Writes issued by `init`, in order
    fn init_sequences(&self) -> Vec<RegisterSequence>;

    /// Decode exactly `SAMPLE.width` bytes
    fn decode(&self, raw: &[u8]) -> Self::Sample;

    /// Time from the end of `init` until the first sample is valid. Reads
    /// before then report no sample without touching the bus.
    fn warm_up(&self) -> Duration {
        Duration::ZERO
    }

    /// Hook for flags beyond the ready bit (overflow, alarms)
    fn observe_status(&self, _sensor: &str, _flags: u8) {}
}

/// How `init` treats a failed sub-write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitPolicy {
    /// Record the failure and keep going
    #[default]
    BestEffort,
    /// Abort at the first failure
    FailFast,
}

#[derive(Debug)]
pub struct InitStep {
    pub register: u8,
    pub result: SensorResult<usize>,
}

/// Per-sequence outcome of `init`
#[derive(Debug, Default)]
pub struct InitReport {
    steps: Vec<InitStep>,
}

impl InitReport {
    pub fn steps(&self) -> &[InitStep] {
        &self.steps
    }

    pub fn first_failure(&self) -> Option<&InitStep> {
        self.steps.iter().find(|s| s.result.is_err())
    }

    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| s.result.is_err()).count()
    }

    pub fn is_clean(&self) -> bool {
        self.first_failure().is_none()
    }

    fn device_absent(&self) -> bool {
        !self.steps.is_empty()
            && self
                .steps
                .iter()
                .all(|s| matches!(s.result, Err(SensorError::Bus(BusError::Nack { .. }))))
    }
}

/// Generic register-polled driver, instantiated per [`SensorProfile`]
pub struct RegisterDriver<P, B> {
    id: String,
    bus_id: String,
    address: Option<SlaveAddress>,
    ready_at: Option<Instant>,
    policy: InitPolicy,
    profile: P,
    bus: B,
}

impl<P: SensorProfile, B: IicBus> RegisterDriver<P, B> {
    pub fn new(id: String, bus_id: String, profile: P, bus: B) -> Self {
        Self {
            id,
            bus_id,
            address: None,
            ready_at: None,
            policy: InitPolicy::default(),
            profile,
            bus,
        }
    }

    pub fn with_policy(mut self, policy: InitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn address(&self) -> Option<SlaveAddress> {
        self.address
    }

    pub fn profile(&self) -> &P {
        &self.profile
    }

    pub(crate) fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub(crate) fn require_address(&self) -> SensorResult<SlaveAddress> {
        self.address
            .ok_or_else(|| SensorError::NotInitialized { sensor: self.id.clone() })
    }

    /// Store `address` and write the profile's init sequences.
    pub fn init(&mut self, address: SlaveAddress) -> SensorResult<InitReport> {
        self.address = Some(address);
        let mut report = InitReport::default();

        for sequence in self.profile.init_sequences() {
            let register = sequence.start();
            let result = regio::write(&mut self.bus, address, &sequence);
            match &result {
                Ok(_) => debug!("[{}] wrote {:?}", self.id, sequence),
                Err(e) => warn!("[{}] init write to {:#04x} failed: {}", self.id, register, e),
            }
            let failed = result.is_err();
            report.steps.push(InitStep { register, result });

            if failed && self.policy == InitPolicy::FailFast {
                return Err(self.abort_init(report));
            }
        }

        if report.device_absent() {
            self.address = None;
            return Err(SensorError::DeviceNotFound { sensor: self.id.clone(), address: address.get() });
        }
        self.ready_at = Some(Instant::now() + self.profile.warm_up());
        Ok(report)
    }

    fn abort_init(&mut self, mut report: InitReport) -> SensorError {
        let address = self.address.take();
        if report.device_absent() {
            if let Some(address) = address {
                return SensorError::DeviceNotFound { sensor: self.id.clone(), address: address.get() };
            }
        }
        match report.steps.pop() {
            Some(InitStep { register, result: Err(source) }) => SensorError::InitError {
                sensor: self.id.clone(),
                register,
                source: Box::new(source),
            },
            _ => SensorError::NotInitialized { sensor: self.id.clone() },
        }
    }

    /// Poll the sensor once.
    ///
    /// `Ok(None)` means the ready flag is clear: no sample yet, not an error.
    pub fn read(&mut self) -> SensorResult<Option<P::Sample>> {
        self.read_at(Instant::now())
    }

    /// [`read`](Self::read) as of `now`
    pub fn read_at(&mut self, now: Instant) -> SensorResult<Option<P::Sample>> {
        let address = self.require_address()?;
        if self.ready_at.is_some_and(|ready_at| now < ready_at) {
            return Ok(None);
        }

        if let Some(status) = self.profile.status() {
            let [flags]: [u8; 1] = regio::read_exact(&mut self.bus, address, status.register)?;
            self.profile.observe_status(&self.id, flags);
            if !status.is_ready(flags) {
                return Ok(None);
            }
        }

        let layout = P::SAMPLE;
        let mut buf = [0u8; MAX_SAMPLE_WIDTH];
        let raw = &mut buf[..layout.width];
        let count = regio::read(&mut self.bus, address, layout.register, raw)?;
        if count != layout.width {
            return Err(SensorError::DecodeError {
                register: layout.register,
                expected: layout.width,
                actual: count,
            });
        }
        Ok(Some(self.profile.decode(raw)))
    }
}

/// Object-safe face of a driver, used by the registry and the poller
pub trait SensorDriver {
    fn init(&mut self, address: SlaveAddress) -> SensorResult<InitReport>;
    fn read(&mut self) -> SensorResult<Option<SensorSample>>;
    fn set_init_policy(&mut self, policy: InitPolicy);
    fn id(&self) -> &str;
    fn bus(&self) -> &str;
    fn kind(&self) -> &'static str;
}

impl<P: SensorProfile, B: IicBus> SensorDriver for RegisterDriver<P, B> {
    fn init(&mut self, address: SlaveAddress) -> SensorResult<InitReport> {
        RegisterDriver::init(self, address)
    }

    fn read(&mut self) -> SensorResult<Option<SensorSample>> {
        Ok(RegisterDriver::read(self)?.map(Into::into))
    }

    fn set_init_policy(&mut self, policy: InitPolicy) {
        self.policy = policy;
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn bus(&self) -> &str {
        &self.bus_id
    }

    fn kind(&self) -> &'static str {
        P::NAME
    }
}

pub fn create_sensor_driver(
    driver: &str,
    id: String,
    bus_id: String,
    bus: SharedBus,
) -> SensorResult<Box<dyn SensorDriver>> {
    match driver {
        #[cfg(feature = "max30102")]
        "max30102" => Ok(Box::new(RegisterDriver::new(id, bus_id, max30102::Max30102::default(), bus))),
        #[cfg(feature = "tmp112")]
        "tmp112" => Ok(Box::new(RegisterDriver::new(id, bus_id, tmp112::Tmp112::default(), bus))),
        _ => {
            let _ = (id, bus_id, bus);
            Err(SensorError::UnsupportedDriver { driver: driver.to_string() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::{BusOp, MockBus, Reply};
    use crate::bus::NextCondition;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Minimal profile: status at 0x10 bit 0, two-byte big-endian sample at 0x11
    struct Probe;

    impl SensorProfile for Probe {
        type Sample = HeartRateSample;

        const NAME: &'static str = "probe";
        const SAMPLE: SampleLayout = SampleLayout::new(0x11, 2);

        fn status(&self) -> Option<StatusRegister> {
            Some(StatusRegister { register: 0x10, ready_mask: 0x01 })
        }

        fn init_sequences(&self) -> Vec<RegisterSequence> {
            vec![
                RegisterSequence::new(0x20, &[0xAA]),
                RegisterSequence::new(0x30, &[0xBB, 0xCC]),
            ]
        }

        fn decode(&self, raw: &[u8]) -> HeartRateSample {
            HeartRateSample { red: u16::from_be_bytes([raw[0], raw[1]]) as u32 }
        }
    }

    fn address() -> SlaveAddress {
        SlaveAddress::new(0x2A).unwrap()
    }

    fn driver(bus: MockBus) -> (RegisterDriver<Probe, Rc<RefCell<MockBus>>>, Rc<RefCell<MockBus>>) {
        let shared = Rc::new(RefCell::new(bus));
        let driver = RegisterDriver::new("probe0".to_string(), "i2c1".to_string(), Probe, shared.clone());
        (driver, shared)
    }

    #[test]
    fn test_init_writes_sequences_in_order() {
        let (mut driver, bus) = driver(MockBus::new());

        let report = driver.init(address()).unwrap();

        assert!(report.is_clean());
        assert_eq!(report.steps().len(), 2);
        assert_eq!(bus.borrow().writes(), vec![vec![0x20, 0xAA], vec![0x30, 0xBB, 0xCC]]);
        assert_eq!(driver.address(), Some(address()));
    }

    #[test]
    fn test_best_effort_init_continues_past_failure() {
        let mut mock = MockBus::new();
        mock.queue_write_reply(Reply::Short(1));
        let (mut driver, bus) = driver(mock);

        let report = driver.init(address()).unwrap();

        assert_eq!(report.failures(), 1);
        assert_eq!(report.first_failure().map(|s| s.register), Some(0x20));
        assert_eq!(bus.borrow().writes().len(), 2);
        assert!(driver.address().is_some());
    }

    #[test]
    fn test_fail_fast_init_stops_at_first_failure() {
        let mut mock = MockBus::new();
        mock.queue_write_reply(Reply::Data(Vec::new()));
        mock.queue_write_reply(Reply::Short(0));
        let (driver, bus) = driver(mock);
        let mut driver = driver.with_policy(InitPolicy::FailFast);

        match driver.init(address()) {
            Err(SensorError::InitError { register, source, .. }) => {
                assert_eq!(register, 0x30);
                assert!(matches!(*source, SensorError::TransferError { .. }));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(bus.borrow().writes().len(), 2);
        assert!(driver.address().is_none());
    }

    #[test]
    fn test_all_nacks_mean_device_not_found() {
        let mut mock = MockBus::new();
        mock.queue_write_reply(Reply::Nack);
        mock.queue_write_reply(Reply::Nack);
        let (mut driver, _bus) = driver(mock);

        assert!(matches!(
            driver.init(address()),
            Err(SensorError::DeviceNotFound { address: 0x2A, .. })
        ));
        assert!(matches!(driver.read(), Err(SensorError::NotInitialized { .. })));
    }

    #[test]
    fn test_read_before_init_is_rejected() {
        let (mut driver, bus) = driver(MockBus::new());
        assert!(matches!(driver.read(), Err(SensorError::NotInitialized { .. })));
        assert!(bus.borrow().ops.is_empty());
    }

    #[test]
    fn test_read_after_init_without_activity_is_not_ready() {
        let (mut driver, bus) = driver(MockBus::new());
        driver.init(address()).unwrap();
        bus.borrow_mut().clear();

        assert_eq!(driver.read().unwrap(), None);
        // only the status register was touched
        assert_eq!(bus.borrow().ops.len(), 2);
    }

    #[test]
    fn test_ready_read_decodes_sample() {
        let mut mock = MockBus::new();
        mock.queue_read(&[0x01]).queue_read(&[0x12, 0x34]);
        let (mut driver, bus) = driver(mock);
        driver.init(address()).unwrap();
        bus.borrow_mut().clear();

        let sample = driver.read().unwrap();

        assert_eq!(sample, Some(HeartRateSample { red: 0x1234 }));
        assert_eq!(
            bus.borrow().ops,
            vec![
                BusOp::Write { address: 0x2A, bytes: vec![0x10], condition: NextCondition::Restart },
                BusOp::Read { address: 0x2A, len: 1, condition: NextCondition::Stop },
                BusOp::Write { address: 0x2A, bytes: vec![0x11], condition: NextCondition::Restart },
                BusOp::Read { address: 0x2A, len: 2, condition: NextCondition::Stop },
            ]
        );
    }

    #[test]
    fn test_sample_count_mismatch_is_decode_error() {
        let mut mock = MockBus::new();
        mock.queue_read(&[0x01]).queue_read(&[0x12]);
        let (mut driver, _bus) = driver(mock);
        driver.init(address()).unwrap();

        assert!(matches!(
            driver.read(),
            Err(SensorError::DecodeError { register: 0x11, expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_failed_status_read_surfaces_once() {
        let mut mock = MockBus::new();
        mock.queue_read_reply(Reply::Nack);
        let (mut driver, bus) = driver(mock);
        driver.init(address()).unwrap();
        bus.borrow_mut().clear();

        let err = driver.read().unwrap_err();
        assert!(err.is_transient());
        // no retry
        assert_eq!(bus.borrow().ops.len(), 2);
    }

    #[test]
    fn test_repeated_reads_leave_bus_stop_terminated() {
        let mut mock = MockBus::new();
        mock.queue_read(&[0x01]).queue_read(&[0x00, 0x01]);
        let (mut driver, bus) = driver(mock);
        driver.init(address()).unwrap();

        for _ in 0..3 {
            driver.read().unwrap();
        }

        let bus = bus.borrow();
        let last = bus.ops.last().unwrap();
        assert!(matches!(last, BusOp::Read { condition: NextCondition::Stop, .. }));
        for op in bus.ops.iter() {
            if let BusOp::Read { condition, .. } = op {
                assert_eq!(*condition, NextCondition::Stop);
            }
        }
        let targets = bus
            .controls
            .iter()
            .filter(|c| matches!(c, crate::bus::BusControl::SetTargetAddress(_)))
            .count();
        // two init writes, one ready poll (status + sample), two idle polls
        assert_eq!(targets, 2 + 2 + 1 + 1);
    }

    #[test]
    fn test_object_safe_driver_converts_samples() {
        let mut mock = MockBus::new();
        mock.queue_read(&[0x01]).queue_read(&[0x00, 0x05]);
        let (driver, _bus) = driver(mock);
        let mut boxed: Box<dyn SensorDriver> = Box::new(driver);

        SensorDriver::init(boxed.as_mut(), address()).unwrap();
        let sample = boxed.read().unwrap();

        assert_eq!(sample, Some(SensorSample::HeartRate(HeartRateSample { red: 5 })));
        assert_eq!(boxed.kind(), "probe");
        assert_eq!(boxed.bus(), "i2c1");
    }

    #[test]
    fn test_unknown_driver_is_rejected() {
        let bus = crate::bus::share(MockBus::new());
        let result = create_sensor_driver("max30100", "spo2".to_string(), "i2c1".to_string(), bus);
        assert!(matches!(result, Err(SensorError::UnsupportedDriver { .. })));
    }

    #[test]
    fn test_body_temperature_units() {
        let t = BodyTemperature { raw: 0x250 };
        assert_eq!(t.celsius(), 37.0);
        assert_eq!(BodyTemperature { raw: -400 }.celsius(), -25.0);
    }
}
