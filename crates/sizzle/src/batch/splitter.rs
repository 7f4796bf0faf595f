use std::ops::Range;
use crate::error::StageError;

/// A fixed-capacity window over an incoming unit.
///
/// Slots `[start, start + capacity)` map onto frame positions; the trailing
/// slots past the end of the unit are padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelBatch {
    /// Position of this window among the unit's model batches
    pub index: usize,

    /// Position in the unit of the first slot
    pub start: usize,

    /// Number of slots backed by real frames
    pub real_len: usize,

    pub capacity: usize,
}

impl ModelBatch {
    /// Frame positions covered by every slot, padding included.
    pub fn slots(&self) -> Range<usize> {
        self.start..self.start + self.capacity
    }

    /// Frame positions backed by real frames.
    pub fn real(&self) -> Range<usize> {
        self.start..self.start + self.real_len
    }

    pub fn padding(&self) -> usize {
        self.capacity - self.real_len
    }

    /// The frame position of slot `slot`, or `None` when the slot is padding.
    pub fn frame_position(&self, slot: usize) -> Option<usize> {
        (slot < self.real_len).then(|| self.start + slot)
    }
}

/// Number of model batches needed for `frame_count` frames.
pub fn model_batch_count(frame_count: usize, capacity: usize) -> usize {
    frame_count.div_ceil(capacity)
}

/// Splits `frame_count` frames into windows of `capacity` slots.
///
/// Zero frames yields no windows; sentinels are expected to be relayed before
/// splitting.
pub fn split(frame_count: usize, capacity: usize) -> Result<ModelBatches, StageError> {
    if capacity == 0 {
        return Err(StageError::ZeroCapacity);
    }
    Ok(ModelBatches {
        frame_count,
        capacity,
        next: 0,
    })
}

/// Iterator over the model batches of one unit, in slot order.
#[derive(Debug, Clone)]
pub struct ModelBatches {
    frame_count: usize,
    capacity: usize,
    next: usize,
}

impl Iterator for ModelBatches {
    type Item = ModelBatch;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next.checked_mul(self.capacity)?;
        if start >= self.frame_count {
            return None;
        }
        let batch = ModelBatch {
            index: self.next,
            start,
            real_len: self.capacity.min(self.frame_count - start),
            capacity: self.capacity,
        };
        self.next += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = model_batch_count(self.frame_count, self.capacity).saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ModelBatches {}
