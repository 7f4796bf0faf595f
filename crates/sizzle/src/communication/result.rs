use uuid::Uuid;
use super::frame::{BatchInfo, Frame};

/// A named raw buffer exchanged with the predictor.
///
/// Before an invocation it is a zeroed descriptor of the declared size; after
/// a successful invocation it holds that output's bytes for one model batch.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputBuffer {
    name: String,
    data: Vec<u8>,
}

impl OutputBuffer {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// One output of the model concatenated across every model batch of a unit.
///
/// Segment `b` holds the bytes model batch `b` produced for this output.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedOutput {
    name: String,
    segment_size: usize,
    data: Vec<u8>,
}

impl AggregatedOutput {
    pub(crate) fn new(name: String, segment_size: usize, data: Vec<u8>) -> Self {
        Self {
            name,
            segment_size,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes produced by one model batch.
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    pub fn segment_count(&self) -> usize {
        self.data.len().checked_div(self.segment_size).unwrap_or(0)
    }

    pub fn segment(&self, index: usize) -> Option<&[u8]> {
        let start = index.checked_mul(self.segment_size)?;
        let end = start.checked_add(self.segment_size)?;
        self.data.get(start..end)
    }

    pub(crate) fn segment_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        let start = index.checked_mul(self.segment_size)?;
        let end = start.checked_add(self.segment_size)?;
        self.data.get_mut(start..end)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Total size in bytes, `segment_size * segment_count`.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Outcome carried by a result unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    /// The unit was processed; individual frames may still be invalid
    Completed,

    /// Relayed end-of-stream marker
    EndOfStream,

    /// The unit could not be processed as a whole
    Failed(String),
}

/// The record emitted downstream for every incoming unit.
#[derive(Debug, Clone)]
pub struct ResultUnit {
    unit_id: Uuid,
    status: UnitStatus,
    info: BatchInfo,
    frames: Vec<Frame>,
    outputs: Vec<AggregatedOutput>,
}

impl ResultUnit {
    pub(crate) fn completed(
        unit_id: Uuid,
        info: BatchInfo,
        frames: Vec<Frame>,
        outputs: Vec<AggregatedOutput>,
    ) -> Self {
        Self {
            unit_id,
            status: UnitStatus::Completed,
            info,
            frames,
            outputs,
        }
    }

    pub(crate) fn end_of_stream(unit_id: Uuid, info: BatchInfo) -> Self {
        Self {
            unit_id,
            status: UnitStatus::EndOfStream,
            info,
            frames: vec![],
            outputs: vec![],
        }
    }

    pub(crate) fn failed(unit_id: Uuid, info: BatchInfo, message: String) -> Self {
        Self {
            unit_id,
            status: UnitStatus::Failed(message),
            info,
            frames: vec![],
            outputs: vec![],
        }
    }

    /// Correlates this result with the log records of the unit that produced it.
    pub fn unit_id(&self) -> Uuid {
        self.unit_id
    }

    pub fn status(&self) -> &UnitStatus {
        &self.status
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self.status, UnitStatus::Failed(_))
    }

    pub fn is_sentinel(&self) -> bool {
        self.status == UnitStatus::EndOfStream
    }

    /// Failure message, if the unit failed.
    pub fn message(&self) -> Option<&str> {
        match &self.status {
            UnitStatus::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn info(&self) -> &BatchInfo {
        &self.info
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn outputs(&self) -> &[AggregatedOutput] {
        &self.outputs
    }

    pub fn output(&self, name: &str) -> Option<&AggregatedOutput> {
        self.outputs.iter().find(|o| o.name() == name)
    }

    /// Bytes of output `name` belonging to the frame at `position`, or `None`
    /// when that frame was invalidated.
    ///
    /// Each model batch segment is split evenly across its slots, so this is
    /// only meaningful for outputs whose leading dimension is the batch.
    pub fn frame_output(&self, name: &str, position: usize) -> Option<&[u8]> {
        if !self.info.frame_ids.get(position)?.is_valid() {
            return None;
        }
        let output = self.output(name)?;
        let slots = self.info.max_batch_size;
        if slots == 0 || output.size() % slots != 0 {
            return None;
        }
        let per_frame = output.size() / slots;
        let start = position.checked_mul(per_frame)?;
        output.data().get(start..start.checked_add(per_frame)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::FrameId;

    fn info(ids: Vec<FrameId>, max_batch_size: usize) -> BatchInfo {
        BatchInfo {
            batch_id: 0,
            is_first: true,
            is_last: false,
            batch_size: ids.len(),
            max_batch_size,
            frame_ids: ids,
        }
    }

    #[test]
    fn test_segments_index_by_model_batch() {
        let out = AggregatedOutput::new("boxes".into(), 2, vec![1, 1, 2, 2, 3, 3]);
        assert_eq!(out.segment_count(), 3);
        assert_eq!(out.segment(1), Some(&[2u8, 2][..]));
        assert_eq!(out.segment(3), None);
    }

    #[test]
    fn test_huge_segment_index_is_none() {
        let mut out = AggregatedOutput::new("boxes".into(), 2, vec![1, 1, 2, 2]);
        assert_eq!(out.segment(usize::MAX / 2), None);
        assert_eq!(out.segment(usize::MAX), None);
        assert!(out.segment_mut(usize::MAX / 2).is_none());
    }

    #[test]
    fn test_frame_output_skips_invalid_frames() {
        let out = AggregatedOutput::new("scores".into(), 4, vec![0, 1, 2, 3, 4, 5, 6, 7]);
        let result = ResultUnit::completed(
            Uuid::new_v4(),
            info(vec![FrameId::Valid(0), FrameId::Invalid, FrameId::Valid(2)], 4),
            vec![],
            vec![out],
        );

        assert_eq!(result.frame_output("scores", 0), Some(&[0u8, 1][..]));
        assert_eq!(result.frame_output("scores", 1), None);
        assert_eq!(result.frame_output("scores", 2), Some(&[4u8, 5][..]));
        assert_eq!(result.frame_output("missing", 0), None);
    }

    #[test]
    fn test_failed_unit_exposes_message() {
        let result = ResultUnit::failed(Uuid::new_v4(), info(vec![], 0), "boom".into());
        assert!(!result.is_ok());
        assert_eq!(result.message(), Some("boom"));
        assert!(result.outputs().is_empty());
    }
}
