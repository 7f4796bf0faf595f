use std::pin::Pin;
use std::task::{Context, Poll};
use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use crate::communication::ResultUnit;
use super::core_trait::{Downstream, TransportError};

/// Creates a bounded in-process output port holding up to `capacity` results.
///
/// A full channel is reported as [`TransportError::Full`], so the sender's
/// retry policy applies; a dropped [`ResultStream`] is reported as
/// [`TransportError::Closed`].
pub fn channel(capacity: usize) -> (ChannelDownstream, ResultStream) {
    let (sender, receiver) = mpsc::channel(capacity);
    (ChannelDownstream { sender }, ResultStream { receiver })
}

/// Sending half of [`channel`].
#[derive(Debug, Clone)]
pub struct ChannelDownstream {
    sender: mpsc::Sender<ResultUnit>,
}

#[async_trait]
impl Downstream for ChannelDownstream {
    async fn try_send(&self, unit: ResultUnit) -> Result<(), TransportError> {
        self.sender.try_send(unit).map_err(|err| match err {
            TrySendError::Full(unit) => TransportError::Full(unit),
            TrySendError::Closed(unit) => TransportError::Closed(unit),
        })
    }
}

/// # ResultStream
///
/// The receiving half of [`channel`] as a [`futures::Stream`]. Yields results in
/// send order and ends once every sender is dropped.
pub struct ResultStream {
    receiver: mpsc::Receiver<ResultUnit>,
}

impl Stream for ResultStream {
    type Item = ResultUnit;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().receiver).poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use futures::StreamExt;
    use uuid::Uuid;
    use crate::communication::BatchInfo;
    use crate::config::RetryPolicy;
    use crate::downstream::{DownstreamSender, TransportKind};

    fn unit(batch_id: u32) -> ResultUnit {
        let info = BatchInfo {
            batch_id,
            is_first: batch_id == 0,
            is_last: false,
            batch_size: 0,
            max_batch_size: 0,
            frame_ids: vec![],
        };
        ResultUnit::end_of_stream(Uuid::new_v4(), info)
    }

    #[tokio::test]
    async fn test_full_channel_reports_backpressure() {
        let (downstream, _stream) = channel(1);
        downstream.try_send(unit(0)).await.unwrap();

        let err = downstream.try_send(unit(1)).await.unwrap_err();
        assert_eq!(err.kind(), TransportKind::Full);
        assert!(err.is_backpressure());
    }

    #[tokio::test]
    async fn test_dropped_stream_reports_closed() {
        let (downstream, stream) = channel(1);
        drop(stream);

        let err = downstream.try_send(unit(0)).await.unwrap_err();
        assert_eq!(err.kind(), TransportKind::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sender_waits_for_consumer() {
        let (downstream, mut stream) = channel(1);
        let sender = DownstreamSender::new(downstream, RetryPolicy::unbounded(Duration::from_millis(200)));

        sender.send(unit(0)).await.unwrap();

        let consumer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let mut seen = vec![];
            while let Some(result) = stream.next().await {
                seen.push(result.info().batch_id);
            }
            seen
        });

        let delivery = sender.send(unit(1)).await.unwrap();
        assert!(delivery.retries >= 1);
        drop(sender);

        assert_eq!(consumer.await.unwrap(), vec![0, 1]);
    }
}
