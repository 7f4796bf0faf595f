//! # Batching
//!
//! Turning one incoming unit into fixed-capacity model batches and folding
//! their results back together.
//!
//! * [`splitter`] - windows of `capacity` slots over the unit, the last one padded
//! * [`builder`] - contiguous per-input buffers for one window, padding zeroed
//! * [`aggregator`] - per-output buffers holding every window's result at its offset
//! * [`isolator`] - invalidates the frame ids of failed slots and failed windows
//!
//! A frame's position in the unit is its slot position in the aggregated
//! result; nothing here ever moves a frame to another slot.

pub mod aggregator;
pub mod builder;
pub mod isolator;
pub mod splitter;

use std::collections::TryReserveError;

pub use aggregator::ResultAggregator;
pub use builder::{BuiltInputs, FrameBufferBuilder, InputBuffer, SlotFailure};
pub use isolator::{mark_batch_invalid, mark_invalid};
pub use splitter::{model_batch_count, split, ModelBatch, ModelBatches};

/// Allocates a zero-filled buffer, reporting allocation failure instead of aborting.
pub(crate) fn zeroed(size: usize) -> Result<Vec<u8>, TryReserveError> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(size)?;
    buffer.resize(size, 0);
    Ok(buffer)
}
