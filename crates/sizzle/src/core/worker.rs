//! Background processing of queued units.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::error::Elapsed;
use tracing::{debug, error};
use crate::communication::{IncomingUnit, InputPorts, PortQueue, SidecarRecord};
use crate::downstream::Downstream;
use crate::inference::Predictor;
use super::stage::InferenceStage;

/// Owns a spawned background task, stopping it when dropped.
pub struct StageWorkerHandle {
    /// Cleared to ask the task to stop
    running: Arc<AtomicBool>,

    /// `None` once shutdown has started
    handle: Option<JoinHandle<()>>,

    notifier: Arc<Notify>,
}

impl StageWorkerHandle {
    /// Spawns the task built by `task` with a shared running flag and notifier.
    pub fn new<F>(task: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>, Arc<Notify>) -> JoinHandle<()>,
    {
        let running = Arc::new(AtomicBool::new(true));
        let notifier = Arc::new(Notify::new());
        let handle = task(running.clone(), notifier.clone());

        Self {
            running,
            handle: Some(handle),
            notifier,
        }
    }

    /// Wakes the task to look for work.
    pub fn notify(&self) {
        self.notifier.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the task after the unit it is currently processing.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.notifier.notify_one();

        if let Some(handle) = self.handle.take() {
            // Outside a runtime the task is simply detached
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move {
                    let _ = handle.await;
                });
            }
        }
    }
}

impl Drop for StageWorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs an [`InferenceStage`] on a background task, fed from per-port queues.
///
/// Units are processed one at a time in arrival order. Results and failures
/// are reported through the stage's downstream; a failed send is logged and
/// the worker moves on to the next unit.
pub struct StageWorker {
    queue: Arc<Mutex<PortQueue>>,
    handle: StageWorkerHandle,
}

impl StageWorker {
    pub fn spawn<P, D>(stage: Arc<InferenceStage<P, D>>, ports: InputPorts) -> Self
    where
        P: Predictor + 'static,
        D: Downstream + 'static,
    {
        let queue = Arc::new(Mutex::new(PortQueue::new(ports)));
        let handle = StageWorkerHandle::new({
            let queue = queue.clone();
            move |running, notifier| tokio::spawn(stage_loop(stage, running, notifier, queue))
        });
        Self { queue, handle }
    }

    /// Queues a unit arriving on the frame port.
    pub async fn submit_frames(&self, unit: IncomingUnit) {
        self.queue.lock().await.push_frames(unit);
        self.handle.notify();
    }

    /// Queues sidecar records arriving on the secondary port.
    pub async fn submit_sidecar(&self, records: Vec<SidecarRecord>) {
        self.queue.lock().await.push_sidecar(records);
        self.handle.notify();
    }

    /// Items waiting on the frame and sidecar ports.
    pub async fn pending(&self) -> (usize, usize) {
        self.queue.lock().await.pending()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    pub fn shutdown(&mut self) {
        self.handle.shutdown();
    }
}

async fn stage_loop<P, D>(
    stage: Arc<InferenceStage<P, D>>,
    running: Arc<AtomicBool>,
    notifier: Arc<Notify>,
    queue: Arc<Mutex<PortQueue>>,
)
where
    P: Predictor,
    D: Downstream,
{
    while running.load(Ordering::SeqCst) {
        let next = queue.lock().await.pop_all();
        let Some(unit) = next else {
            if timeout_await_notifier(&notifier).await.is_err() {
                debug!(model = stage.model_name(), "no complete unit queued");
            }
            continue;
        };

        if let Err(err) = stage.process(unit).await {
            error!(model = stage.model_name(), error = %err, "dropping unit result");
        }
    }
}

#[inline]
async fn timeout_await_notifier(notifier: &Notify) -> Result<(), Elapsed> {
    tokio::time::timeout(Duration::from_millis(100), notifier.notified()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use crate::batch::InputBuffer;
    use crate::communication::{Frame, ImageFormat, OutputBuffer, ResultUnit, UnitStatus};
    use crate::config::EngineConfig;
    use crate::downstream::{channel, ResultStream};
    use crate::error::PredictError;
    use crate::inference::{ModelDescriptor, ModelSchema, TensorDescription};

    // Sums the primary input of each batch into a single byte
    struct Summing {
        with_sidecar: bool,
    }

    impl ModelDescriptor for Summing {
        fn describe(&self) -> ModelSchema {
            let mut inputs = vec![TensorDescription::new("data", vec![2, 1], 2)];
            if self.with_sidecar {
                inputs.push(TensorDescription::new("im_info", vec![2, 3], 24));
            }
            ModelSchema {
                name: "summing".into(),
                capacity: 2,
                inputs,
                outputs: vec![TensorDescription::new("sum", vec![1], 1)],
            }
        }
    }

    #[async_trait]
    impl Predictor for Summing {
        async fn predict(
            &self,
            inputs: Vec<InputBuffer>,
            mut outputs: Vec<OutputBuffer>,
        ) -> Result<Vec<OutputBuffer>, PredictError> {
            outputs[0].data_mut()[0] = inputs[0].data().iter().sum();
            Ok(outputs)
        }
    }

    fn worker(with_sidecar: bool, ports: InputPorts) -> (StageWorker, ResultStream) {
        let (downstream, stream) = channel(8);
        let model = Summing { with_sidecar };
        let stage = InferenceStage::new(&EngineConfig::new("summing.om"), &model, Summing { with_sidecar }, downstream)
            .expect("valid schema");
        (StageWorker::spawn(Arc::new(stage), ports), stream)
    }

    fn unit(batch_id: u32, values: &[u8]) -> IncomingUnit {
        let frames = values
            .iter()
            .enumerate()
            .map(|(i, v)| Frame::new(i as u32, ImageFormat::Yuv420Sp, 1, 1, vec![*v]))
            .collect();
        IncomingUnit::new(batch_id, frames)
    }

    async fn next(stream: &mut ResultStream) -> ResultUnit {
        tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("result within timeout")
            .expect("stream open")
    }

    #[tokio::test]
    async fn test_units_processed_in_arrival_order() {
        let (worker, mut stream) = worker(false, InputPorts::Single);

        worker.submit_frames(unit(0, &[1, 2, 3])).await;
        worker.submit_frames(unit(1, &[4])).await;
        worker.submit_frames(IncomingUnit::sentinel(2)).await;

        let first = next(&mut stream).await;
        assert_eq!(first.info().batch_id, 0);
        assert_eq!(first.output("sum").unwrap().data(), &[3, 3]);

        let second = next(&mut stream).await;
        assert_eq!(second.info().batch_id, 1);
        assert_eq!(second.output("sum").unwrap().data(), &[4]);

        let last = next(&mut stream).await;
        assert_eq!(last.status(), &UnitStatus::EndOfStream);
    }

    #[tokio::test]
    async fn test_dual_ports_wait_for_sidecar() {
        let (worker, mut stream) = worker(true, InputPorts::Dual);

        worker.submit_frames(unit(0, &[5, 6])).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(worker.pending().await, (1, 0));

        worker
            .submit_sidecar(vec![SidecarRecord::from_image_info([1.0, 1.0, 0.0]); 2])
            .await;

        let result = next(&mut stream).await;
        assert!(result.is_ok());
        assert_eq!(result.output("sum").unwrap().data(), &[11]);
        assert_eq!(worker.pending().await, (0, 0));
    }

    #[tokio::test]
    async fn test_misaligned_sidecar_is_reported_and_worker_continues() {
        let (worker, mut stream) = worker(true, InputPorts::Dual);

        worker.submit_frames(unit(0, &[1, 2])).await;
        worker.submit_sidecar(vec![SidecarRecord::from_image_info([1.0, 1.0, 0.0])]).await;
        worker.submit_frames(unit(1, &[3])).await;
        worker.submit_sidecar(vec![SidecarRecord::from_image_info([1.0, 1.0, 0.0])]).await;

        let rejected = next(&mut stream).await;
        assert!(!rejected.is_ok());
        assert_eq!(rejected.info().batch_id, 0);

        let accepted = next(&mut stream).await;
        assert!(accepted.is_ok());
        assert_eq!(accepted.output("sum").unwrap().data(), &[3]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_worker() {
        let (mut worker, _stream) = worker(false, InputPorts::Single);
        assert!(worker.is_running());

        worker.shutdown();
        assert!(!worker.is_running());
    }
}
