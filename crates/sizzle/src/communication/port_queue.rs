use std::collections::VecDeque;
use serde::Deserialize;
use super::frame::{IncomingUnit, SidecarRecord};

/// Number of input ports a stage listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputPorts {
    /// Frames only
    Single,

    /// Frames on port 0, sidecar records on port 1
    Dual,
}

/// Joins the per-port arrivals of a multi-input stage into whole units.
///
/// Each port is a FIFO. With [`InputPorts::Dual`] a unit is released only once
/// both port heads are present, and the head of port 1 becomes the unit's
/// sidecar. Arrival order on each port is what aligns the two streams, so the
/// upstream producers must emit exactly one item per unit on each port,
/// sentinels included.
#[derive(Debug)]
pub struct PortQueue {
    ports: InputPorts,
    frames: VecDeque<IncomingUnit>,
    sidecars: VecDeque<Vec<SidecarRecord>>,
}

impl PortQueue {
    pub fn new(ports: InputPorts) -> Self {
        Self {
            ports,
            frames: VecDeque::new(),
            sidecars: VecDeque::new(),
        }
    }

    pub fn push_frames(&mut self, unit: IncomingUnit) {
        self.frames.push_back(unit);
    }

    /// Queues the sidecar records for the next unit. Ignored on a single-port queue.
    pub fn push_sidecar(&mut self, records: Vec<SidecarRecord>) {
        if self.ports == InputPorts::Dual {
            self.sidecars.push_back(records);
        }
    }

    /// Pops the next complete unit, if every port has delivered its part.
    pub fn pop_all(&mut self) -> Option<IncomingUnit> {
        match self.ports {
            InputPorts::Single => self.frames.pop_front(),
            InputPorts::Dual => {
                if self.frames.is_empty() || self.sidecars.is_empty() {
                    return None;
                }
                let mut unit = self.frames.pop_front()?;
                let records = self.sidecars.pop_front()?;
                unit.set_sidecar(records);
                Some(unit)
            }
        }
    }

    /// Number of items waiting on each port.
    pub fn pending(&self) -> (usize, usize) {
        (self.frames.len(), self.sidecars.len())
    }
}
