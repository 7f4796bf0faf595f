use std::fmt;

/// Identity of a frame within the stream.
///
/// A frame whose slot failed to copy or whose model batch failed to predict is
/// marked [`FrameId::Invalid`] in the result metadata. Consumers must skip
/// invalid positions rather than read their result bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameId {
    Valid(u32),
    Invalid,
}

impl FrameId {
    /// The sentinel encoding used on the legacy wire format.
    pub const RAW_INVALID: i64 = -1;

    /// Decodes a raw id, treating every negative value as invalid.
    pub fn from_raw(raw: i64) -> Self {
        match u32::try_from(raw) {
            Ok(id) => FrameId::Valid(id),
            Err(_) => FrameId::Invalid,
        }
    }

    pub fn as_raw(&self) -> i64 {
        match self {
            FrameId::Valid(id) => i64::from(*id),
            FrameId::Invalid => Self::RAW_INVALID,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, FrameId::Valid(_))
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameId::Valid(id) => write!(f, "{}", id),
            FrameId::Invalid => write!(f, "invalid"),
        }
    }
}

/// Pixel layout of a frame payload. Only carried through for downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Yuv420Sp,
    Rgb888,
    Bgr888,
}

/// One raw input frame.
#[derive(Debug, Clone)]
pub struct Frame {
    id: FrameId,
    format: ImageFormat,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(id: u32, format: ImageFormat, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            id: FrameId::Valid(id),
            format,
            width,
            height,
            data,
        }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Fixed-size auxiliary record travelling alongside a frame on the secondary input.
#[derive(Debug, Clone, PartialEq)]
pub struct SidecarRecord {
    data: Vec<u8>,
}

impl SidecarRecord {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Packs an image-info triple (for example height, width and scale) as
    /// little-endian `f32`s, the record layout detection models take as their
    /// second input.
    pub fn from_image_info(info: [f32; 3]) -> Self {
        let data = info.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self { data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Stream metadata of one incoming unit, relayed unchanged to the result
/// except for `max_batch_size` and invalidated `frame_ids`.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchInfo {
    /// Monotonically increasing position of the unit in the stream
    pub batch_id: u32,

    pub is_first: bool,

    pub is_last: bool,

    /// Number of real frames in the unit
    pub batch_size: usize,

    /// Number of slots once padded to whole model batches; set by the stage
    pub max_batch_size: usize,

    /// Per-position frame identities, aligned with the aggregated result
    pub frame_ids: Vec<FrameId>,
}

/// One unit of work handed to the stage per invocation.
///
/// A unit with no frames is a sentinel marking the end of the stream.
#[derive(Debug, Clone)]
pub struct IncomingUnit {
    info: BatchInfo,
    frames: Vec<Frame>,
    sidecar: Option<Vec<SidecarRecord>>,
}

impl IncomingUnit {
    pub fn new(batch_id: u32, frames: Vec<Frame>) -> Self {
        let info = BatchInfo {
            batch_id,
            is_first: batch_id == 0,
            is_last: false,
            batch_size: frames.len(),
            max_batch_size: 0,
            frame_ids: frames.iter().map(Frame::id).collect(),
        };
        Self {
            info,
            frames,
            sidecar: None,
        }
    }

    /// An end-of-stream marker carrying only stream metadata.
    pub fn sentinel(batch_id: u32) -> Self {
        let mut unit = Self::new(batch_id, vec![]);
        unit.info.is_last = true;
        unit
    }

    pub fn with_sidecar(mut self, records: Vec<SidecarRecord>) -> Self {
        self.sidecar = Some(records);
        self
    }

    /// Overrides the first-of-stream flag, which defaults to `batch_id == 0`.
    pub fn with_first(mut self, is_first: bool) -> Self {
        self.info.is_first = is_first;
        self
    }

    pub fn with_last(mut self, is_last: bool) -> Self {
        self.info.is_last = is_last;
        self
    }

    pub fn is_sentinel(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn info(&self) -> &BatchInfo {
        &self.info
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn sidecar(&self) -> Option<&[SidecarRecord]> {
        self.sidecar.as_deref()
    }

    pub(crate) fn set_sidecar(&mut self, records: Vec<SidecarRecord>) {
        self.sidecar = Some(records);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub(crate) fn into_parts(self) -> (BatchInfo, Vec<Frame>, Option<Vec<SidecarRecord>>) {
        (self.info, self.frames, self.sidecar)
    }
}
