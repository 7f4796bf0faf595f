use tracing::warn;
use crate::communication::{Frame, SidecarRecord};
use crate::error::{BufferError, StageError};
use crate::inference::ModelSchema;
use super::splitter::ModelBatch;
use super::zeroed;

/// One contiguous model-batch buffer for a single model input.
#[derive(Debug, Clone, PartialEq)]
pub struct InputBuffer {
    name: String,
    data: Vec<u8>,
}

impl InputBuffer {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// A slot whose frame could not be copied into the batch buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotFailure {
    /// Position of the frame in the unit
    pub position: usize,
    pub error: BufferError,
}

/// Buffers for one model batch plus the slots that failed to fill.
///
/// Failed slots are zero-filled so the remaining slots stay at their offsets.
#[derive(Debug)]
pub struct BuiltInputs {
    pub buffers: Vec<InputBuffer>,
    pub failures: Vec<SlotFailure>,
}

#[derive(Debug, Clone)]
struct StreamLayout {
    name: String,
    element_size: usize,
}

impl StreamLayout {
    fn buffer_size(&self, capacity: usize) -> usize {
        self.element_size * capacity
    }
}

/// Copies frame payloads and sidecar records into per-model-batch buffers.
#[derive(Debug, Clone)]
pub struct FrameBufferBuilder {
    capacity: usize,
    primary: StreamLayout,
    sidecar: Option<StreamLayout>,
}

impl FrameBufferBuilder {
    pub fn new(schema: &ModelSchema) -> Result<Self, StageError> {
        schema.validate()?;
        let layout = |index: usize| {
            let input = &schema.inputs[index];
            StreamLayout {
                name: input.name.clone(),
                element_size: input.size / schema.capacity,
            }
        };
        Ok(Self {
            capacity: schema.capacity,
            primary: layout(0),
            sidecar: schema.has_sidecar().then(|| layout(1)),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rejects a unit whose sidecar stream cannot be aligned with its frames.
    ///
    /// A sidecar, when present, must hold one record per frame. A model with a
    /// secondary input additionally requires the sidecar to be present.
    pub fn check_alignment(&self, frames: &[Frame], sidecar: Option<&[SidecarRecord]>) -> Result<(), StageError> {
        match sidecar {
            Some(records) if records.len() != frames.len() => Err(StageError::SidecarMismatch {
                frames: frames.len(),
                sidecar: records.len(),
            }),
            None if self.sidecar.is_some() => Err(StageError::SidecarMissing),
            _ => Ok(()),
        }
    }

    /// Builds the input buffers of one model batch.
    ///
    /// A frame whose payload does not match the element size, or whose sidecar
    /// record is missing, does not stop the build; its slot is zeroed and
    /// reported in [`BuiltInputs::failures`].
    /// Failing to allocate a buffer fails the whole model batch.
    pub fn build(
        &self,
        batch: &ModelBatch,
        frames: &[Frame],
        sidecar: Option<&[SidecarRecord]>,
    ) -> Result<BuiltInputs, BufferError> {
        let mut failures = vec![];
        let mut buffers = vec![self.fill(&self.primary, batch, &mut failures, |p| frames.get(p).map(Frame::data))?];

        if let Some(layout) = &self.sidecar {
            let records = sidecar.unwrap_or_default();
            buffers.push(self.fill(layout, batch, &mut failures, |p| records.get(p).map(SidecarRecord::data))?);
        }

        // A frame with both streams bad is reported once
        failures.sort_by_key(|f| f.position);
        failures.dedup_by_key(|f| f.position);

        Ok(BuiltInputs { buffers, failures })
    }

    fn fill<'a, F>(
        &self,
        layout: &StreamLayout,
        batch: &ModelBatch,
        failures: &mut Vec<SlotFailure>,
        payload: F,
    ) -> Result<InputBuffer, BufferError>
    where F: Fn(usize) -> Option<&'a [u8]>
    {
        let size = layout.buffer_size(self.capacity);
        let mut data = zeroed(size).map_err(|_| BufferError::Allocation {
            name: layout.name.clone(),
            size,
        })?;

        for (slot, chunk) in data.chunks_exact_mut(layout.element_size).enumerate() {
            // Padding slots keep their zeroes
            let Some(position) = batch.frame_position(slot) else {
                continue;
            };
            let error = match payload(position) {
                Some(bytes) if bytes.len() == layout.element_size => {
                    chunk.copy_from_slice(bytes);
                    continue;
                }
                Some(bytes) => BufferError::SizeMismatch {
                    slot,
                    expected: layout.element_size,
                    actual: bytes.len(),
                },
                None => BufferError::MissingPayload { slot, position },
            };
            warn!(input = %layout.name, position, %error, "failed to copy frame into batch buffer");
            failures.push(SlotFailure { position, error });
        }
        Ok(InputBuffer::new(layout.name.clone(), data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::split;
    use crate::communication::ImageFormat;
    use crate::inference::TensorDescription;

    fn schema(with_sidecar: bool) -> ModelSchema {
        let mut inputs = vec![TensorDescription::new("data", vec![2, 4], 8)];
        if with_sidecar {
            inputs.push(TensorDescription::new("im_info", vec![2, 3], 24));
        }
        ModelSchema {
            name: "mock".into(),
            capacity: 2,
            inputs,
            outputs: vec![TensorDescription::new("out", vec![2], 2)],
        }
    }

    fn frames(count: u8) -> Vec<Frame> {
        (0..count)
            .map(|i| Frame::new(i as u32, ImageFormat::Rgb888, 2, 2, vec![i + 1; 4]))
            .collect()
    }

    fn records(count: u8) -> Vec<SidecarRecord> {
        (0..count).map(|i| SidecarRecord::new(vec![0x10 + i; 12])).collect()
    }

    #[test]
    fn test_build_copies_frames_at_slot_offsets() {
        let builder = FrameBufferBuilder::new(&schema(false)).unwrap();
        let frames = frames(4);
        let batch = split(4, 2).unwrap().nth(1).unwrap();

        let built = builder.build(&batch, &frames, None).unwrap();

        assert_eq!(built.buffers.len(), 1);
        assert_eq!(built.buffers[0].name(), "data");
        assert_eq!(built.buffers[0].data(), &[3, 3, 3, 3, 4, 4, 4, 4]);
        assert!(built.failures.is_empty());
    }

    #[test]
    fn test_padding_slots_are_zero_in_every_stream() {
        let builder = FrameBufferBuilder::new(&schema(true)).unwrap();
        let frames = frames(3);
        let records = records(3);
        let last = split(3, 2).unwrap().last().unwrap();

        let built = builder.build(&last, &frames, Some(&records)).unwrap();

        assert_eq!(built.buffers[0].data(), &[3, 3, 3, 3, 0, 0, 0, 0]);
        assert_eq!(&built.buffers[1].data()[..12], &[0x12; 12]);
        assert!(built.buffers[1].data()[12..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_bad_slot_is_zeroed_and_reported() {
        let builder = FrameBufferBuilder::new(&schema(false)).unwrap();
        let mut frames = frames(2);
        frames[0] = Frame::new(0, ImageFormat::Rgb888, 2, 2, vec![9; 3]);
        let batch = split(2, 2).unwrap().next().unwrap();

        let built = builder.build(&batch, &frames, None).unwrap();

        assert_eq!(built.buffers[0].data(), &[0, 0, 0, 0, 2, 2, 2, 2]);
        assert_eq!(
            built.failures,
            vec![SlotFailure {
                position: 0,
                error: BufferError::SizeMismatch { slot: 0, expected: 4, actual: 3 },
            }]
        );
    }

    #[test]
    fn test_failure_in_both_streams_reported_once() {
        let builder = FrameBufferBuilder::new(&schema(true)).unwrap();
        let mut frames = frames(2);
        let mut records = records(2);
        frames[1] = Frame::new(1, ImageFormat::Rgb888, 2, 2, vec![]);
        records[1] = SidecarRecord::new(vec![1; 4]);
        let batch = split(2, 2).unwrap().next().unwrap();

        let built = builder.build(&batch, &frames, Some(&records)).unwrap();

        assert_eq!(built.failures.len(), 1);
        assert_eq!(built.failures[0].position, 1);
    }

    #[test]
    fn test_short_sidecar_reports_uncovered_frames() {
        let builder = FrameBufferBuilder::new(&schema(true)).unwrap();
        let frames = frames(4);
        let records = records(3);
        let batch = split(4, 2).unwrap().nth(1).unwrap();

        let built = builder.build(&batch, &frames, Some(&records)).unwrap();

        assert_eq!(built.buffers[0].data(), &[3, 3, 3, 3, 4, 4, 4, 4]);
        assert!(built.buffers[1].data()[12..].iter().all(|b| *b == 0));
        assert_eq!(
            built.failures,
            vec![SlotFailure {
                position: 3,
                error: BufferError::MissingPayload { slot: 1, position: 3 },
            }]
        );
    }

    #[test]
    fn test_alignment_rejects_length_mismatch() {
        let builder = FrameBufferBuilder::new(&schema(true)).unwrap();
        let err = builder.check_alignment(&frames(5), Some(&records(4))).unwrap_err();
        assert!(matches!(err, StageError::SidecarMismatch { frames: 5, sidecar: 4 }));
    }

    #[test]
    fn test_alignment_requires_sidecar_for_two_input_models() {
        let builder = FrameBufferBuilder::new(&schema(true)).unwrap();
        assert!(matches!(builder.check_alignment(&frames(2), None), Err(StageError::SidecarMissing)));

        let single = FrameBufferBuilder::new(&schema(false)).unwrap();
        assert!(single.check_alignment(&frames(2), None).is_ok());
    }
}
