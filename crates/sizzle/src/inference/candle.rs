use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use crate::batch::InputBuffer;
use crate::communication::OutputBuffer;
use crate::error::PredictError;
use super::core_trait::{ModelDescriptor, ModelSchema, Predictor};

/// A candle model run by [`CandlePredictor`].
///
/// `forward` receives one `u8` tensor per declared input, shaped with the
/// input's declared dims, and returns one tensor per declared output in schema
/// order.
pub trait CandleModel: Send + Sync {
    fn forward(&self, inputs: &[Tensor]) -> candle_core::Result<Vec<Tensor>>;
}

/// Adapts a [`CandleModel`] to the byte-buffer [`Predictor`] seam.
///
/// Output tensors are flattened and written to their buffers as little-endian
/// bytes of their own dtype. Half-precision outputs are widened to `f32`.
pub struct CandlePredictor<M> {
    model: M,
    device: Device,
    schema: ModelSchema,
}

impl<M> CandlePredictor<M>
where M: CandleModel
{
    pub fn new(model: M, schema: ModelSchema, device: Device) -> Self {
        Self {
            model,
            device,
            schema,
        }
    }
}

impl<M> ModelDescriptor for CandlePredictor<M> {
    fn describe(&self) -> ModelSchema {
        self.schema.clone()
    }
}

#[async_trait]
impl<M> Predictor for CandlePredictor<M>
where M: CandleModel + 'static
{
    async fn predict(
        &self,
        inputs: Vec<InputBuffer>,
        mut outputs: Vec<OutputBuffer>,
    ) -> Result<Vec<OutputBuffer>, PredictError> {
        let tensors = inputs
            .into_iter()
            .zip(self.schema.inputs.iter())
            .map(|(buffer, desc)| Tensor::from_vec(buffer.into_data(), desc.dims.clone(), &self.device))
            .collect::<candle_core::Result<Vec<_>>>()
            .map_err(backend_error)?;

        let produced = self.model.forward(&tensors).map_err(backend_error)?;
        if produced.len() != outputs.len() {
            return Err(PredictError::OutputCount {
                expected: outputs.len(),
                actual: produced.len(),
            });
        }

        for (index, (out, tensor)) in outputs.iter_mut().zip(produced.iter()).enumerate() {
            let bytes = tensor_bytes(tensor).map_err(backend_error)?;
            if bytes.len() != out.size() {
                return Err(PredictError::OutputMismatch {
                    index,
                    expected: out.name().to_string(),
                    expected_size: out.size(),
                    actual: out.name().to_string(),
                    actual_size: bytes.len(),
                });
            }
            out.data_mut().copy_from_slice(&bytes);
        }
        Ok(outputs)
    }
}

fn backend_error(err: candle_core::Error) -> PredictError {
    PredictError::Backend(err.to_string())
}

fn tensor_bytes(tensor: &Tensor) -> candle_core::Result<Vec<u8>> {
    let flat = tensor.flatten_all()?;
    let bytes = match flat.dtype() {
        DType::U8 => flat.to_vec1::<u8>()?,
        DType::U32 => flat.to_vec1::<u32>()?.iter().flat_map(|v| v.to_le_bytes()).collect(),
        DType::I64 => flat.to_vec1::<i64>()?.iter().flat_map(|v| v.to_le_bytes()).collect(),
        DType::F64 => flat.to_vec1::<f64>()?.iter().flat_map(|v| v.to_le_bytes()).collect(),
        _ => flat
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()?
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect(),
    };
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::TensorDescription;

    // Sums every frame's bytes into one f32 per slot
    struct SlotSum;

    impl CandleModel for SlotSum {
        fn forward(&self, inputs: &[Tensor]) -> candle_core::Result<Vec<Tensor>> {
            let sums = inputs[0].to_dtype(DType::F32)?.sum(1)?;
            Ok(vec![sums])
        }
    }

    fn schema() -> ModelSchema {
        ModelSchema {
            name: "slot-sum".into(),
            capacity: 2,
            inputs: vec![TensorDescription::new("data", vec![2, 3], 6)],
            outputs: vec![TensorDescription::new("sum", vec![2], 8)],
        }
    }

    #[tokio::test]
    async fn test_candle_predictor_writes_le_bytes() {
        let predictor = CandlePredictor::new(SlotSum, schema(), Device::Cpu);
        let inputs = vec![InputBuffer::new("data", vec![1, 2, 3, 4, 5, 6])];
        let outputs = vec![OutputBuffer::new("sum", vec![0; 8])];

        let filled = predictor.predict(inputs, outputs).await.unwrap();

        assert_eq!(&filled[0].data()[0..4], &6.0f32.to_le_bytes());
        assert_eq!(&filled[0].data()[4..8], &15.0f32.to_le_bytes());
    }

    #[tokio::test]
    async fn test_candle_predictor_reports_shape_errors() {
        let predictor = CandlePredictor::new(SlotSum, schema(), Device::Cpu);
        let inputs = vec![InputBuffer::new("data", vec![1, 2, 3])];
        let outputs = vec![OutputBuffer::new("sum", vec![0; 8])];

        let err = predictor.predict(inputs, outputs).await.unwrap_err();
        assert!(matches!(err, PredictError::Backend(_)));
    }

    #[test]
    fn test_describe_returns_schema() {
        let predictor = CandlePredictor::new(SlotSum, schema(), Device::Cpu);
        assert_eq!(predictor.describe(), schema());
    }
}
