//! Records exchanged with the neighbouring pipeline stages.
//!
//! * [`IncomingUnit`] - frames (plus optional sidecar records) delivered by the upstream port
//! * [`ResultUnit`] - the aggregated result, failure status or relayed sentinel sent downstream
//! * [`PortQueue`] - joins frame and sidecar arrivals from two input ports into units

mod frame;
mod port_queue;
mod result;

pub use frame::{BatchInfo, Frame, FrameId, ImageFormat, IncomingUnit, SidecarRecord};
pub use port_queue::{InputPorts, PortQueue};
pub use result::{AggregatedOutput, OutputBuffer, ResultUnit, UnitStatus};
