//! Register access shim shared by the sensor drivers.
//!
//! Writes are a single STOP-terminated transaction starting with the
//! register address. Reads write the register pointer, keep the bus with a
//! repeated start, then read the requested bytes and release the bus.

use crate::bus::{BusControl, IicBus, NextCondition, SlaveAddress};
use crate::errors::{SensorError, SensorResult};
use std::fmt;
use tracing::trace;

/// Start register followed by the values for the auto-incremented registers
#[derive(Clone, PartialEq, Eq)]
pub struct RegisterSequence {
    bytes: Vec<u8>,
}

impl RegisterSequence {
    pub fn new(start: u8, values: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(values.len() + 1);
        bytes.push(start);
        bytes.extend_from_slice(values);
        Self { bytes }
    }

    pub fn start(&self) -> u8 {
        self.bytes[0]
    }

    pub fn values(&self) -> &[u8] {
        &self.bytes[1..]
    }

    /// Bytes as they go on the wire
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for RegisterSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegisterSequence({:#04x}: {:02x?})", self.start(), self.values())
    }
}

fn select<B: IicBus + ?Sized>(
    bus: &mut B,
    address: SlaveAddress,
    condition: NextCondition,
) -> SensorResult<()> {
    bus.control(BusControl::SetTargetAddress(address))?;
    bus.control(BusControl::SetNextCondition(condition))?;
    Ok(())
}

/// Write `sequence` to the device at `address` in one transaction.
pub fn write<B: IicBus + ?Sized>(
    bus: &mut B,
    address: SlaveAddress,
    sequence: &RegisterSequence,
) -> SensorResult<usize> {
    select(bus, address, NextCondition::Stop)?;

    let bytes = sequence.as_bytes();
    let written = bus.write(bytes)?;
    trace!("[regio] {} <- {:?} ({} bytes)", address, sequence, written);
    if written < bytes.len() {
        return Err(SensorError::TransferError {
            register: sequence.start(),
            expected: bytes.len(),
            actual: written,
        });
    }
    Ok(written)
}

/// Read from `register` into `buf` and return how many bytes the bus delivered.
///
/// A short count is not an error here; see [`read_exact`].
pub fn read<B: IicBus + ?Sized>(
    bus: &mut B,
    address: SlaveAddress,
    register: u8,
    buf: &mut [u8],
) -> SensorResult<usize> {
    select(bus, address, NextCondition::Restart)?;

    let written = bus.write(&[register])?;
    if written != 1 {
        return Err(SensorError::TransferError { register, expected: 1, actual: written });
    }

    bus.control(BusControl::SetNextCondition(NextCondition::Stop))?;
    let count = bus.read(buf)?;
    trace!("[regio] {} -> {:#04x}: {:02x?}", address, register, &buf[..count.min(buf.len())]);
    Ok(count)
}

/// Read exactly `N` bytes from `register`.
pub fn read_exact<B: IicBus + ?Sized, const N: usize>(
    bus: &mut B,
    address: SlaveAddress,
    register: u8,
) -> SensorResult<[u8; N]> {
    let mut buf = [0u8; N];
    let count = read(bus, address, register, &mut buf)?;
    if count < N {
        return Err(SensorError::ShortRead { register, expected: N, actual: count });
    }
    Ok(buf)
}
