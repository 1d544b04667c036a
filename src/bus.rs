pub mod hal;
pub mod linux;
#[cfg(test)]
pub(crate) mod mock;

use crate::errors::{BusError, SensorError, SensorResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// 7-bit I2C slave address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlaveAddress(u8);

impl SlaveAddress {
    pub const MAX: u8 = 0x7F;

    pub fn new(address: u16) -> SensorResult<Self> {
        if address > Self::MAX as u16 {
            return Err(SensorError::InvalidAddress(address));
        }
        Ok(Self(address as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for SlaveAddress {
    type Error = SensorError;

    fn try_from(address: u8) -> Result<Self, Self::Error> {
        Self::new(address as u16)
    }
}

impl fmt::Display for SlaveAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Condition the controller emits once the next transfer completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextCondition {
    /// Release the bus
    Stop,
    /// Keep the bus and issue a repeated start before the next transfer
    Restart,
}

/// Commands accepted by [`IicBus::control`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusControl {
    SetTargetAddress(SlaveAddress),
    SetNextCondition(NextCondition),
}

/// Narrow contract of the platform I2C controller.
///
/// Transfers go to the last address set with [`BusControl::SetTargetAddress`]
/// and end with the last condition set with [`BusControl::SetNextCondition`].
/// `write` and `read` report how many bytes actually moved; callers decide
/// whether a short count is an error.
pub trait IicBus {
    fn control(&mut self, command: BusControl) -> Result<(), BusError>;
    fn write(&mut self, bytes: &[u8]) -> Result<usize, BusError>;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BusError>;
}

impl<T: IicBus + ?Sized> IicBus for &mut T {
    fn control(&mut self, command: BusControl) -> Result<(), BusError> {
        (**self).control(command)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, BusError> {
        (**self).write(bytes)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BusError> {
        (**self).read(buf)
    }
}

impl<T: IicBus + ?Sized> IicBus for Box<T> {
    fn control(&mut self, command: BusControl) -> Result<(), BusError> {
        (**self).control(command)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, BusError> {
        (**self).write(bytes)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BusError> {
        (**self).read(buf)
    }
}

// Several drivers share one controller from a single polling task. A borrow
// conflict can only come from re-entrancy and is reported, not panicked on.
impl<T: IicBus + ?Sized> IicBus for Rc<RefCell<T>> {
    fn control(&mut self, command: BusControl) -> Result<(), BusError> {
        self.try_borrow_mut().map_err(|_| BusError::Busy)?.control(command)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, BusError> {
        self.try_borrow_mut().map_err(|_| BusError::Busy)?.write(bytes)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BusError> {
        self.try_borrow_mut().map_err(|_| BusError::Busy)?.read(buf)
    }
}

/// Bus handle shared by every driver attached to the same controller
pub type SharedBus = Rc<RefCell<dyn IicBus>>;

pub fn share<B: IicBus + 'static>(bus: B) -> SharedBus {
    Rc::new(RefCell::new(bus))
}

/// Bus type enum for different communication interfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    I2C,
}

impl BusType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "i2c" => Some(BusType::I2C),
            _ => None,
        }
    }
}

/// Controllers opened at start-up, keyed by bus id
#[derive(Default)]
pub struct BusRegistry {
    buses: HashMap<String, SharedBus>,
}

impl BusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bus_id: impl Into<String>, bus: SharedBus) {
        self.buses.insert(bus_id.into(), bus);
    }

    /// Resolve a bus handle by id
    pub fn get_device(&self, bus_id: &str) -> SensorResult<SharedBus> {
        self.buses
            .get(bus_id)
            .cloned()
            .ok_or_else(|| SensorError::BusUnavailable { bus: bus_id.to_string() })
    }

    pub fn len(&self) -> usize {
        self.buses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }
}
