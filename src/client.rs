//! Device-management client stub.
//!
//! Keeps the latest value per sensor and hands out reports for values that
//! changed since the previous report. Upload is not implemented: reports are
//! written to the log as JSON lines.

use crate::errors::SensorResult;
use crate::messages::{Header, SensorMessage};
use crate::sensors::SensorSample;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
struct Slot {
    sample: SensorSample,
    fresh: bool,
}

pub struct DeviceClient {
    device_id: String,
    seq: u64,
    slots: BTreeMap<String, Slot>,
}

impl DeviceClient {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            seq: 0,
            slots: BTreeMap::new(),
        }
    }

    /// Take the outcome of one poll. Errors and "not ready" leave the
    /// previous value in place. Returns whether a new sample was stored.
    pub fn record(&mut self, sensor_id: &str, result: SensorResult<Option<SensorSample>>) -> bool {
        match result {
            Ok(Some(sample)) => {
                self.slots.insert(sensor_id.to_string(), Slot { sample, fresh: true });
                true
            }
            Ok(None) => {
                debug!("[{}] no sample yet", sensor_id);
                false
            }
            Err(e) => {
                warn!("[{}] read failed: {}", sensor_id, e);
                false
            }
        }
    }

    pub fn latest(&self, sensor_id: &str) -> Option<SensorSample> {
        self.slots.get(sensor_id).map(|slot| slot.sample)
    }

    /// Messages for every value updated since the last report
    pub fn report(&mut self) -> Vec<SensorMessage> {
        let mut messages = Vec::new();
        for (sensor_id, slot) in self.slots.iter_mut().filter(|(_, slot)| slot.fresh) {
            slot.fresh = false;
            self.seq += 1;
            let header = Header::new(self.device_id.clone(), sensor_id.clone(), self.seq);
            messages.push(SensorMessage::from_sample(header, slot.sample));
        }
        messages
    }

    /// Report fresh values to the log
    pub fn publish(&mut self) -> usize {
        let messages = self.report();
        for msg in messages.iter() {
            match msg.to_json() {
                Ok(json) => info!(target: "report", "{}", json),
                Err(e) => warn!("[{}] failed to encode report: {}", msg.sensor_id(), e),
            }
        }
        messages.len()
    }
}
