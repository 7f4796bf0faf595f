use async_trait::async_trait;
use crate::batch::InputBuffer;
use crate::communication::OutputBuffer;
use crate::error::{PredictError, StageError};

/// Name, shape and byte size of one model input or output.
///
/// The leading dimension of an input is the batch dimension; `size` is the
/// byte size of the whole batched buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorDescription {
    pub name: String,
    pub dims: Vec<usize>,
    pub size: usize,
}

impl TensorDescription {
    pub fn new(name: impl Into<String>, dims: Vec<usize>, size: usize) -> Self {
        Self {
            name: name.into(),
            dims,
            size,
        }
    }
}

/// The fixed input/output layout of a model, queried once at setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSchema {
    pub name: String,

    /// Number of frames the model consumes per invocation
    pub capacity: usize,

    pub inputs: Vec<TensorDescription>,

    pub outputs: Vec<TensorDescription>,
}

impl ModelSchema {
    /// Checks the schema can drive the batching stage: a non-zero capacity,
    /// at least one input, input buffers that divide evenly into slots and
    /// outputs of non-zero size.
    pub fn validate(&self) -> Result<(), StageError> {
        if self.capacity == 0 {
            return Err(StageError::ZeroCapacity);
        }
        if self.inputs.is_empty() {
            return Err(StageError::NoInputs(self.name.clone()));
        }
        for input in self.inputs.iter() {
            if input.size == 0 || input.size % self.capacity != 0 {
                return Err(StageError::InputNotDivisible {
                    name: input.name.clone(),
                    size: input.size,
                    capacity: self.capacity,
                });
            }
        }
        if let Some(empty) = self.outputs.iter().find(|o| o.size == 0) {
            return Err(StageError::EmptyOutput(empty.name.clone()));
        }
        Ok(())
    }

    /// Bytes one frame occupies in input `index`.
    pub fn element_size(&self, index: usize) -> Option<usize> {
        let input = self.inputs.get(index)?;
        input.size.checked_div(self.capacity)
    }

    /// Whether the model takes a secondary per-frame input.
    pub fn has_sidecar(&self) -> bool {
        self.inputs.len() > 1
    }
}

/// Provides the schema of the loaded model.
pub trait ModelDescriptor {
    fn describe(&self) -> ModelSchema;
}

/// The opaque prediction function.
///
/// Implementations receive one buffer per declared input, each holding a full
/// model batch, and the zeroed output buffers sized from the schema. They
/// return the filled outputs in schema order, or an error in which case none
/// of the outputs are trusted.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use sizzle::batch::InputBuffer;
/// use sizzle::communication::OutputBuffer;
/// use sizzle::error::PredictError;
/// use sizzle::inference::Predictor;
///
/// struct Sum;
///
/// #[async_trait]
/// impl Predictor for Sum {
///     async fn predict(
///         &self,
///         inputs: Vec<InputBuffer>,
///         mut outputs: Vec<OutputBuffer>,
///     ) -> Result<Vec<OutputBuffer>, PredictError> {
///         let total: u8 = inputs[0].data().iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
///         outputs[0].data_mut()[0] = total;
///         Ok(outputs)
///     }
/// }
/// ```
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(
        &self,
        inputs: Vec<InputBuffer>,
        outputs: Vec<OutputBuffer>,
    ) -> Result<Vec<OutputBuffer>, PredictError>;
}
