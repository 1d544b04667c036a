//! Adapter from any `embedded-hal` 1.0 I2C controller to [`IicBus`].
//!
//! This is how the drivers run on a microcontroller HAL: a pointer write
//! under `Restart` is kept until the next read and then sent with
//! `write_read`, which the HAL performs as write, repeated start, read.

use super::{BusControl, IicBus, NextCondition, SlaveAddress};
use crate::errors::BusError;
use embedded_hal::i2c::{Error as _, ErrorKind, I2c, NoAcknowledgeSource};

pub struct HalIicBus<I> {
    i2c: I,
    target: Option<SlaveAddress>,
    next: NextCondition,
    pending: Vec<u8>,
}

impl<I: I2c> HalIicBus<I> {
    pub fn new(i2c: I) -> Self {
        Self {
            i2c,
            target: None,
            next: NextCondition::Stop,
            pending: Vec::new(),
        }
    }

    /// Releases the underlying controller.
    pub fn release(self) -> I {
        self.i2c
    }

    fn target(&self) -> Result<u8, BusError> {
        self.target.map(SlaveAddress::get).ok_or(BusError::NoTarget)
    }

    fn map_error(address: u8, kind: ErrorKind) -> BusError {
        match kind {
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
            | ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown) => BusError::Nack { address },
            other => BusError::Hal(other),
        }
    }
}

impl<I: I2c> IicBus for HalIicBus<I> {
    fn control(&mut self, command: BusControl) -> Result<(), BusError> {
        match command {
            BusControl::SetTargetAddress(address) => {
                if self.target != Some(address) {
                    self.pending.clear();
                }
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
                self.i2c
                    .write(address, bytes)
                    .map_err(|e| Self::map_error(address, e.kind()))?;
            }
        }
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BusError> {
        let address = self.target()?;
        let pointer = std::mem::take(&mut self.pending);
        let result = if pointer.is_empty() {
            self.i2c.read(address, buf)
        } else {
            self.i2c.write_read(address, &pointer, buf)
        };
        result.map_err(|e| Self::map_error(address, e.kind()))?;
        Ok(buf.len())
    }
}
