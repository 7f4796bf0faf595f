use tracing::debug;
use crate::batch::{zeroed, InputBuffer};
use crate::communication::OutputBuffer;
use crate::error::PredictError;
use super::core_trait::{ModelSchema, Predictor, TensorDescription};

/// Calls the predictor once per model batch.
///
/// The output layout is captured from the schema at construction; every
/// invocation pre-allocates one zeroed buffer per declared output and checks
/// that the predictor hands back exactly that set.
pub struct InferenceInvoker<P> {
    predictor: P,
    outputs: Vec<TensorDescription>,
}

impl<P> InferenceInvoker<P>
where P: Predictor
{
    pub fn new(predictor: P, schema: &ModelSchema) -> Self {
        Self {
            predictor,
            outputs: schema.outputs.clone(),
        }
    }

    pub fn predictor(&self) -> &P {
        &self.predictor
    }

    /// Runs one model batch through the predictor.
    ///
    /// The input buffers are consumed by the call and released when it returns.
    pub async fn invoke(&self, inputs: Vec<InputBuffer>) -> Result<Vec<OutputBuffer>, PredictError> {
        let descriptors = self.allocate_outputs()?;
        debug!(inputs = inputs.len(), outputs = descriptors.len(), "calling predictor");
        let filled = self.predictor.predict(inputs, descriptors).await?;
        self.check_outputs(&filled)?;
        Ok(filled)
    }

    fn allocate_outputs(&self) -> Result<Vec<OutputBuffer>, PredictError> {
        self.outputs
            .iter()
            .map(|desc| {
                zeroed(desc.size)
                    .map(|data| OutputBuffer::new(desc.name.clone(), data))
                    .map_err(|_| PredictError::OutputAllocation {
                        name: desc.name.clone(),
                        size: desc.size,
                    })
            })
            .collect()
    }

    fn check_outputs(&self, filled: &[OutputBuffer]) -> Result<(), PredictError> {
        if filled.len() != self.outputs.len() {
            return Err(PredictError::OutputCount {
                expected: self.outputs.len(),
                actual: filled.len(),
            });
        }
        for (index, (desc, out)) in self.outputs.iter().zip(filled.iter()).enumerate() {
            if desc.name != out.name() || desc.size != out.size() {
                return Err(PredictError::OutputMismatch {
                    index,
                    expected: desc.name.clone(),
                    expected_size: desc.size,
                    actual: out.name().to_string(),
                    actual_size: out.size(),
                });
            }
        }
        Ok(())
    }
}
