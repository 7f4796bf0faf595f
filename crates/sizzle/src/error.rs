//! Error types for the batching stage.
//!
//! Errors are split by the granularity at which they are recovered:
//!
//! * [`BufferError`] - a single slot of a model batch, recovered by invalidating one frame
//! * [`PredictError`] - one predictor invocation, recovered by invalidating one model batch
//! * [`AggregateError`] - folding one model batch into the result; fatal when the
//!   aggregated buffers cannot be allocated
//! * [`StageError`] - a whole incoming unit, reported downstream as a failed unit
//! * [`ConfigError`] - setup time only

use crate::downstream::TransportKind;

/// Failure to copy one frame (or sidecar record) into its slot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("slot {slot}: payload is {actual} bytes, element size is {expected}")]
    SizeMismatch {
        slot: usize,
        expected: usize,
        actual: usize,
    },

    #[error("slot {slot}: no payload for frame position {position}")]
    MissingPayload { slot: usize, position: usize },

    #[error("failed to allocate {size} bytes for input `{name}`")]
    Allocation { name: String, size: usize },
}

/// Failure to fold one model batch's outputs into the aggregated result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    #[error("failed to allocate {size} bytes for aggregated output `{name}`")]
    Allocation { name: String, size: usize },

    #[error("output `{0}` has a size of zero")]
    EmptyOutput(String),

    #[error("output `{name}` is {actual} bytes, aggregated segments are {expected}")]
    SegmentMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("model batch produced {actual} outputs, aggregated result holds {expected}")]
    OutputCount { expected: usize, actual: usize },

    #[error("model batch {index} is outside the {count} aggregated segments")]
    SegmentOutOfRange { index: usize, count: usize },
}

impl AggregateError {
    /// Whether the aggregated result can no longer be kept aligned, which
    /// aborts the whole unit rather than one model batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AggregateError::Allocation { .. } | AggregateError::EmptyOutput(_))
    }
}

impl From<AggregateError> for StageError {
    fn from(err: AggregateError) -> Self {
        match err {
            AggregateError::Allocation { name, size } => StageError::AggregateAllocation { name, size },
            AggregateError::EmptyOutput(name) => StageError::EmptyOutput(name),
            other => StageError::Aggregate(other),
        }
    }
}

/// Failure of one call into the predictor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PredictError {
    #[error("failed to allocate {size} bytes for output `{name}`")]
    OutputAllocation { name: String, size: usize },

    #[error("predictor returned {actual} outputs, model declares {expected}")]
    OutputCount { expected: usize, actual: usize },

    #[error("output {index}: expected `{expected}` of {expected_size} bytes, got `{actual}` of {actual_size} bytes")]
    OutputMismatch {
        index: usize,
        expected: String,
        expected_size: usize,
        actual: String,
        actual_size: usize,
    },

    #[error("predict call failed: {0}")]
    Backend(String),
}

/// Unit-level failures. Every variant except [`StageError::Send`] is reported
/// downstream as a failed [`ResultUnit`](crate::communication::ResultUnit).
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("model batch capacity must be greater than zero")]
    ZeroCapacity,

    #[error("model `{0}` declares no inputs")]
    NoInputs(String),

    #[error("input `{name}` of {size} bytes does not divide into {capacity} slots")]
    InputNotDivisible {
        name: String,
        size: usize,
        capacity: usize,
    },

    #[error("the number of image data ({frames}) and information data ({sidecar}) doesn't match")]
    SidecarMismatch { frames: usize, sidecar: usize },

    #[error("model expects a secondary input but the unit carries none")]
    SidecarMissing,

    #[error("output `{0}` has a declared size of zero")]
    EmptyOutput(String),

    #[error("failed to allocate {size} bytes for aggregated output `{name}`")]
    AggregateAllocation { name: String, size: usize },

    #[error("aggregation failed: {0}")]
    Aggregate(AggregateError),

    #[error("failed to send result downstream ({kind:?}): {message}")]
    Send { kind: TransportKind, message: String },
}

/// Invalid setup configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("the model_path does not exist in the stage config")]
    MissingModelPath,

    #[error("config item `{name}` has an invalid value `{value}`")]
    InvalidValue { name: String, value: String },
}
