//! # Downstream
//!
//! Delivery of result units to the next stage.
//!
//! * [`Downstream`] - the transport seam; reports backpressure as a distinguishable error
//! * [`DownstreamSender`] - applies the [`RetryPolicy`](crate::config::RetryPolicy) on backpressure
//! * [`channel`] - a bounded in-process transport whose receiving half is a stream

mod channel;
mod core_trait;
mod sender;

pub use channel::{channel, ChannelDownstream, ResultStream};
pub use core_trait::*;
pub use sender::{Delivery, DownstreamSender};
