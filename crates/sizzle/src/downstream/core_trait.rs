use async_trait::async_trait;
use crate::communication::ResultUnit;

/// Coarse classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Full,
    OutOfMemory,
    Closed,
    Other,
}

/// Failure reported by the downstream transport.
///
/// The backpressure variants hand the record back so it can be retried
/// without cloning.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("downstream queue is full")]
    Full(ResultUnit),

    #[error("downstream has no memory available")]
    OutOfMemory(ResultUnit),

    #[error("downstream is closed")]
    Closed(ResultUnit),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportError::Full(_) => TransportKind::Full,
            TransportError::OutOfMemory(_) => TransportKind::OutOfMemory,
            TransportError::Closed(_) => TransportKind::Closed,
            TransportError::Other(_) => TransportKind::Other,
        }
    }

    /// Whether the transport signalled backpressure rather than a failure.
    pub fn is_backpressure(&self) -> bool {
        matches!(self.kind(), TransportKind::Full | TransportKind::OutOfMemory)
    }
}

/// The output port towards the next stage.
///
/// `try_send` must not wait for capacity; it reports [`TransportError::Full`]
/// and lets the [`DownstreamSender`](super::DownstreamSender) apply the retry
/// policy.
#[async_trait]
pub trait Downstream: Send + Sync {
    async fn try_send(&self, unit: ResultUnit) -> Result<(), TransportError>;
}
