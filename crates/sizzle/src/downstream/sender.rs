use tracing::{error, info};
use crate::communication::ResultUnit;
use crate::config::RetryPolicy;
use crate::error::StageError;
use super::core_trait::{Downstream, TransportError};

/// Outcome of a successful send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Number of backpressure retries before the transport accepted the unit
    pub retries: u32,
}

/// Sends result units downstream, sleeping and retrying while the transport
/// reports backpressure.
///
/// With the default [`RetryPolicy`] the sender never gives up on a full queue;
/// the calling task is held until downstream drains. Any other transport error
/// ends the send immediately.
pub struct DownstreamSender<D> {
    downstream: D,
    policy: RetryPolicy,
}

impl<D> DownstreamSender<D>
where D: Downstream
{
    pub fn new(downstream: D, policy: RetryPolicy) -> Self {
        Self { downstream, policy }
    }

    pub fn downstream(&self) -> &D {
        &self.downstream
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn send(&self, unit: ResultUnit) -> Result<Delivery, StageError> {
        let batch_id = unit.info().batch_id;
        let mut pending = unit;
        let mut retries = 0;
        loop {
            match self.downstream.try_send(pending).await {
                Ok(()) => return Ok(Delivery { retries }),
                Err(TransportError::Full(unit) | TransportError::OutOfMemory(unit)) if self.policy.allows(retries) => {
                    info!(batch_id, retries, interval_ms = self.policy.interval_ms, "downstream queue is full, retrying");
                    tokio::time::sleep(self.policy.interval()).await;
                    retries += 1;
                    pending = unit;
                }
                Err(err) => {
                    error!(batch_id, retries, error = %err, "failed to send data downstream");
                    return Err(StageError::Send {
                        kind: err.kind(),
                        message: err.to_string(),
                    });
                }
            }
        }
    }
}
