use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use crate::batch::{
    mark_batch_invalid,
    mark_invalid,
    split,
    FrameBufferBuilder,
    ModelBatch,
    ResultAggregator,
};
use crate::communication::{
    AggregatedOutput,
    BatchInfo,
    Frame,
    FrameId,
    IncomingUnit,
    InputPorts,
    OutputBuffer,
    ResultUnit,
    SidecarRecord,
    UnitStatus,
};
use crate::config::EngineConfig;
use crate::downstream::{Downstream, DownstreamSender};
use crate::error::StageError;
use crate::inference::{InferenceInvoker, ModelDescriptor, Predictor};

/// What one call to [`InferenceStage::process`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub unit_id: Uuid,
    pub batch_id: u32,

    /// Status of the result unit that was sent downstream
    pub status: UnitStatus,

    /// Model batches the unit was split into
    pub model_batches: usize,

    /// Model batches whose results were discarded
    pub failed_batches: usize,

    /// Frames marked invalid in the result
    pub invalid_frames: usize,

    /// Backpressure retries needed to deliver the result
    pub retries: u32,
}

#[derive(Debug, Default)]
struct RunStats {
    model_batches: usize,
    failed_batches: usize,
}

/// The batching inference stage.
///
/// Each call to [`process`](InferenceStage::process) takes one incoming unit
/// through split, buffer build, prediction and aggregation, and sends exactly
/// one result unit downstream. All per-unit state lives inside the call, so a
/// shared stage can process several units concurrently; the model batches of
/// one unit always run in order.
pub struct InferenceStage<P, D> {
    model_name: String,
    builder: FrameBufferBuilder,
    invoker: InferenceInvoker<P>,
    sender: DownstreamSender<D>,
}

impl<P, D> InferenceStage<P, D>
where
    P: Predictor,
    D: Downstream,
{
    /// Queries the model schema once and prepares the stage.
    pub fn new<M>(config: &EngineConfig, descriptor: &M, predictor: P, downstream: D) -> Result<Self, StageError>
    where M: ModelDescriptor
    {
        let schema = descriptor.describe();
        let builder = FrameBufferBuilder::new(&schema)?;
        let model_name = config.model_name();

        if config.input_ports == InputPorts::Dual && !schema.has_sidecar() {
            warn!(model = %model_name, "stage listens on two ports but the model takes one input; sidecar records are ignored");
        }
        info!(
            model = %model_name,
            capacity = schema.capacity,
            inputs = schema.inputs.len(),
            outputs = schema.outputs.len(),
            "inference stage initialised"
        );

        Ok(Self {
            model_name,
            builder,
            invoker: InferenceInvoker::new(predictor, &schema),
            sender: DownstreamSender::new(downstream, config.retry.clone()),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn capacity(&self) -> usize {
        self.builder.capacity()
    }

    pub fn predictor(&self) -> &P {
        self.invoker.predictor()
    }

    pub fn downstream(&self) -> &D {
        self.sender.downstream()
    }

    /// Processes one unit and sends its result downstream.
    ///
    /// Frame and model batch failures are recorded as invalid frame ids in a
    /// completed result. Unit-level failures are sent downstream as a failed
    /// result and reported in the returned status. Only a failed send is
    /// returned as an error.
    #[instrument(
        skip_all,
        fields(model = %self.model_name, batch_id = unit.info().batch_id, unit_id = tracing::field::Empty)
    )]
    pub async fn process(&self, unit: IncomingUnit) -> Result<StageReport, StageError> {
        let unit_id = Uuid::new_v4();
        tracing::Span::current().record("unit_id", tracing::field::display(unit_id));

        if unit.is_sentinel() {
            info!("relaying end-of-stream sentinel");
            let (info, _, _) = unit.into_parts();
            return self
                .deliver(ResultUnit::end_of_stream(unit_id, info), RunStats::default())
                .await;
        }

        info!(frames = unit.len(), "start process");
        let (mut info, frames, sidecar) = unit.into_parts();
        match self.run(&mut info, &frames, sidecar.as_deref()).await {
            Ok((outputs, stats)) => {
                let result = ResultUnit::completed(unit_id, info, frames, outputs);
                self.deliver(result, stats).await
            }
            Err(err) => {
                error!(error = %err, "unit failed");
                let result = ResultUnit::failed(unit_id, info, err.to_string());
                self.deliver(result, RunStats::default()).await
            }
        }
    }

    async fn run(
        &self,
        info: &mut BatchInfo,
        frames: &[Frame],
        sidecar: Option<&[SidecarRecord]>,
    ) -> Result<(Vec<AggregatedOutput>, RunStats), StageError> {
        self.builder.check_alignment(frames, sidecar)?;

        let capacity = self.builder.capacity();
        let batches = split(frames.len(), capacity)?;
        let mut stats = RunStats {
            model_batches: batches.len(),
            failed_batches: 0,
        };
        info.max_batch_size = stats.model_batches * capacity;
        let mut aggregator = ResultAggregator::new(stats.model_batches);

        for batch in batches {
            let built = match self.builder.build(&batch, frames, sidecar) {
                Ok(built) => built,
                Err(err) => {
                    mark_batch_invalid(&mut info.frame_ids, &batch, &err);
                    stats.failed_batches += 1;
                    continue;
                }
            };
            for failure in built.failures.iter() {
                mark_invalid(&mut info.frame_ids, failure.position..failure.position + 1);
            }

            let outputs = match self.invoker.invoke(built.buffers).await {
                Ok(outputs) => outputs,
                Err(err) => {
                    mark_batch_invalid(&mut info.frame_ids, &batch, &err);
                    stats.failed_batches += 1;
                    continue;
                }
            };

            if !absorb_batch(&mut aggregator, &batch, outputs, &mut info.frame_ids)? {
                stats.failed_batches += 1;
            }
        }

        Ok((aggregator.finish(), stats))
    }

    async fn deliver(&self, result: ResultUnit, stats: RunStats) -> Result<StageReport, StageError> {
        let mut report = StageReport {
            unit_id: result.unit_id(),
            batch_id: result.info().batch_id,
            status: result.status().clone(),
            model_batches: stats.model_batches,
            failed_batches: stats.failed_batches,
            invalid_frames: result.info().frame_ids.iter().filter(|id| !id.is_valid()).count(),
            retries: 0,
        };
        let delivery = self.sender.send(result).await?;
        report.retries = delivery.retries;
        info!(
            status = ?report.status,
            model_batches = report.model_batches,
            invalid_frames = report.invalid_frames,
            retries = report.retries,
            "end process"
        );
        Ok(report)
    }
}

/// Folds one model batch into the aggregate. Returns `Ok(false)` when only
/// this model batch was lost and `Err` when the unit cannot continue.
fn absorb_batch(
    aggregator: &mut ResultAggregator,
    batch: &ModelBatch,
    outputs: Vec<OutputBuffer>,
    frame_ids: &mut [FrameId],
) -> Result<bool, StageError> {
    match aggregator.absorb(batch, outputs) {
        Ok(()) => Ok(true),
        Err(err) if err.is_fatal() => Err(err.into()),
        Err(err) => {
            mark_batch_invalid(frame_ids, batch, &err);
            Ok(false)
        }
    }
}
