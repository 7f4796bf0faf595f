use tracing::debug;
use crate::communication::{AggregatedOutput, OutputBuffer};
use crate::error::AggregateError;
use super::splitter::ModelBatch;
use super::zeroed;

/// Folds the outputs of every model batch of one unit into per-output buffers.
///
/// The aggregated buffers are sized on the first successful model batch,
/// `output size * model batch count` each, and model batch `b` is written at
/// offset `b * output size`. Model batches that never succeed leave their
/// segments zeroed.
#[derive(Debug)]
pub struct ResultAggregator {
    batch_count: usize,
    outputs: Vec<AggregatedOutput>,
}

impl ResultAggregator {
    pub fn new(batch_count: usize) -> Self {
        Self {
            batch_count,
            outputs: vec![],
        }
    }

    pub fn is_allocated(&self) -> bool {
        !self.outputs.is_empty()
    }

    /// Copies one model batch's outputs into its segments.
    ///
    /// Outputs are checked against the layout fixed by the first absorbed
    /// batch, so callers feeding the aggregator without an
    /// [`InferenceInvoker`](crate::inference::InferenceInvoker) still get a
    /// non-fatal error for a drifting output set. The per-model-batch buffers
    /// are released once copied.
    pub fn absorb(&mut self, batch: &ModelBatch, outputs: Vec<OutputBuffer>) -> Result<(), AggregateError> {
        if batch.index >= self.batch_count {
            return Err(AggregateError::SegmentOutOfRange {
                index: batch.index,
                count: self.batch_count,
            });
        }
        if !self.is_allocated() {
            self.allocate(&outputs)?;
        }
        // A rejected batch leaves no partial segments
        if outputs.len() != self.outputs.len() {
            return Err(AggregateError::OutputCount {
                expected: self.outputs.len(),
                actual: outputs.len(),
            });
        }
        for (aggregated, out) in self.outputs.iter().zip(outputs.iter()) {
            if aggregated.name() != out.name() || aggregated.segment_size() != out.size() {
                return Err(AggregateError::SegmentMismatch {
                    name: out.name().to_string(),
                    expected: aggregated.segment_size(),
                    actual: out.size(),
                });
            }
        }
        let count = self.batch_count;
        for (aggregated, out) in self.outputs.iter_mut().zip(outputs.iter()) {
            let segment = aggregated
                .segment_mut(batch.index)
                .ok_or(AggregateError::SegmentOutOfRange { index: batch.index, count })?;
            segment.copy_from_slice(out.data());
        }
        Ok(())
    }

    fn allocate(&mut self, outputs: &[OutputBuffer]) -> Result<(), AggregateError> {
        let mut allocated = Vec::with_capacity(outputs.len());
        for out in outputs.iter() {
            if out.size() == 0 {
                return Err(AggregateError::EmptyOutput(out.name().to_string()));
            }
            let alloc_error = || AggregateError::Allocation {
                name: out.name().to_string(),
                size: out.size().saturating_mul(self.batch_count),
            };
            let size = out.size().checked_mul(self.batch_count).ok_or_else(alloc_error)?;
            let data = zeroed(size).map_err(|_| alloc_error())?;
            debug!(output = out.name(), size, "allocated aggregated output");
            allocated.push(AggregatedOutput::new(out.name().to_string(), out.size(), data));
        }
        self.outputs = allocated;
        Ok(())
    }

    /// Hands over the aggregated buffers; empty if no model batch succeeded.
    pub fn finish(self) -> Vec<AggregatedOutput> {
        self.outputs
    }
}
