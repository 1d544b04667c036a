#[cfg(target_os = "linux")]
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError, LinuxI2CMessage};
#[cfg(target_os = "linux")]
use i2cdev::core::{I2CDevice, I2CMessage, I2CTransfer};

use super::{BusControl, IicBus, NextCondition, SlaveAddress};
use crate::errors::BusError;

/// I2C bus error type - platform specific
#[cfg(target_os = "linux")]
pub type I2CError = LinuxI2CError;

#[cfg(not(target_os = "linux"))]
#[derive(Debug)]
pub struct I2CError(String);

#[cfg(not(target_os = "linux"))]
impl std::fmt::Display for I2CError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "I2C not supported on this platform: {}", self.0)
    }
}

#[cfg(not(target_os = "linux"))]
impl std::error::Error for I2CError {}

/// `/dev/i2c-N` controller.
///
/// A write issued while the next condition is `Restart` is held back and
/// sent together with the following read as one `I2C_RDWR` transfer, which
/// puts a repeated start between the two on the wire.
#[cfg(target_os = "linux")]
pub struct LinuxIicBus {
    device: LinuxI2CDevice,
    target: Option<SlaveAddress>,
    next: NextCondition,
    pending: Vec<u8>,
}

#[cfg(not(target_os = "linux"))]
pub struct LinuxIicBus {
    _phantom: std::marker::PhantomData<()>,
}

#[cfg(target_os = "linux")]
impl LinuxIicBus {
    pub fn new(path: &str) -> Result<Self, BusError> {
        let device = LinuxI2CDevice::new(path, 0)?;
        Ok(Self {
            device,
            target: None,
            next: NextCondition::Stop,
            pending: Vec::new(),
        })
    }

    fn target(&self) -> Result<SlaveAddress, BusError> {
        self.target.ok_or(BusError::NoTarget)
    }
}

// ENXIO / EREMOTEIO: the kernel's report of an unacknowledged address
#[cfg(target_os = "linux")]
const NACK_ERRNOS: [i32; 2] = [6, 121];

#[cfg(target_os = "linux")]
fn map_error(address: SlaveAddress, err: LinuxI2CError) -> BusError {
    let errno = match &err {
        LinuxI2CError::Errno(errno) => Some(*errno),
        LinuxI2CError::Io(io) => io.raw_os_error(),
    };
    match errno {
        Some(errno) if NACK_ERRNOS.contains(&errno) => BusError::Nack { address: address.get() },
        _ => BusError::Io(err),
    }
}

#[cfg(target_os = "linux")]
impl IicBus for LinuxIicBus {
    fn control(&mut self, command: BusControl) -> Result<(), BusError> {
        match command {
            BusControl::SetTargetAddress(address) => {
                if self.target != Some(address) {
                    self.pending.clear();
                }
                self.device.set_slave_address(address.get() as u16)?;
                self.target = Some(address);
            }
            BusControl::SetNextCondition(condition) => self.next = condition,
        }
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, BusError> {
        let address = self.target()?;
        match self.next {
            NextCondition::Restart => self.pending.extend_from_slice(bytes),
            NextCondition::Stop => {
                self.pending.clear();
                self.device.write(bytes).map_err(|e| map_error(address, e))?;
            }
        }
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BusError> {
        let address = self.target()?;
        let pointer = std::mem::take(&mut self.pending);
        let len = buf.len();
        if pointer.is_empty() {
            self.device.read(buf).map_err(|e| map_error(address, e))?;
        } else {
            let mut messages = [LinuxI2CMessage::write(&pointer), LinuxI2CMessage::read(buf)];
            self.device.transfer(&mut messages).map_err(|e| map_error(address, e))?;
        }
        Ok(len)
    }
}

#[cfg(not(target_os = "linux"))]
impl LinuxIicBus {
    pub fn new(_path: &str) -> Result<Self, BusError> {
        Err(BusError::Io(I2CError("I2C is only supported on Linux".to_string())))
    }
}

#[cfg(not(target_os = "linux"))]
impl IicBus for LinuxIicBus {
    fn control(&mut self, _command: BusControl) -> Result<(), BusError> {
        Err(BusError::Io(I2CError("I2C is only supported on Linux".to_string())))
    }

    fn write(&mut self, _bytes: &[u8]) -> Result<usize, BusError> {
        Err(BusError::Io(I2CError("I2C is only supported on Linux".to_string())))
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, BusError> {
        Err(BusError::Io(I2CError("I2C is only supported on Linux".to_string())))
    }
}
