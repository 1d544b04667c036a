//! Recording bus double used by the unit tests.

use super::{BusControl, IicBus, NextCondition, SlaveAddress};
use crate::errors::BusError;
use std::collections::VecDeque;

/// One transfer as seen on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    Write { address: u8, bytes: Vec<u8>, condition: NextCondition },
    Read { address: u8, len: usize, condition: NextCondition },
}

/// Scripted outcome for the next write or read
#[derive(Debug, Clone)]
pub enum Reply {
    /// Read payload; a payload shorter than the buffer is a short transfer
    Data(Vec<u8>),
    /// Write accepted only this many bytes
    Short(usize),
    Nack,
}

#[derive(Debug, Default)]
pub struct MockBus {
    target: Option<SlaveAddress>,
    condition: Option<NextCondition>,
    pub controls: Vec<BusControl>,
    pub ops: Vec<BusOp>,
    writes: VecDeque<Reply>,
    reads: VecDeque<Reply>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_read(&mut self, bytes: &[u8]) -> &mut Self {
        self.reads.push_back(Reply::Data(bytes.to_vec()));
        self
    }

    pub fn queue_read_reply(&mut self, reply: Reply) -> &mut Self {
        self.reads.push_back(reply);
        self
    }

    pub fn queue_write_reply(&mut self, reply: Reply) -> &mut Self {
        self.writes.push_back(reply);
        self
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                BusOp::Write { bytes, .. } => Some(bytes.clone()),
                BusOp::Read { .. } => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.controls.clear();
        self.ops.clear();
    }

    fn current(&self) -> Result<(u8, NextCondition), BusError> {
        let address = self.target.ok_or(BusError::NoTarget)?.get();
        Ok((address, self.condition.unwrap_or(NextCondition::Stop)))
    }
}

impl IicBus for MockBus {
    fn control(&mut self, command: BusControl) -> Result<(), BusError> {
        self.controls.push(command);
        match command {
            BusControl::SetTargetAddress(address) => self.target = Some(address),
            BusControl::SetNextCondition(condition) => self.condition = Some(condition),
        }
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, BusError> {
        let (address, condition) = self.current()?;
        self.ops.push(BusOp::Write { address, bytes: bytes.to_vec(), condition });
        match self.writes.pop_front() {
            Some(Reply::Short(n)) => Ok(n.min(bytes.len())),
            Some(Reply::Nack) => Err(BusError::Nack { address }),
            Some(Reply::Data(_)) | None => Ok(bytes.len()),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BusError> {
        let (address, condition) = self.current()?;
        self.ops.push(BusOp::Read { address, len: buf.len(), condition });
        match self.reads.pop_front() {
            Some(Reply::Data(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Some(Reply::Short(n)) => Ok(n.min(buf.len())),
            Some(Reply::Nack) => Err(BusError::Nack { address }),
            // Idle device: registers read back as zero
            None => {
                buf.fill(0);
                Ok(buf.len())
            }
        }
    }
}
