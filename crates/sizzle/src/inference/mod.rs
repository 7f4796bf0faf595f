//! # Inference
//!
//! The boundary to the opaque prediction function.
//!
//! * [`ModelDescriptor`] - supplies the [`ModelSchema`] once at setup: batch
//!   capacity, input sizes and the named outputs
//! * [`Predictor`] - one call per model batch, byte buffers in, byte buffers out
//! * [`InferenceInvoker`] - allocates the declared output buffers for each call
//!   and validates what the predictor returns
//!
//! ## Feature Flags
//!
//! - `candle`: provides [`CandlePredictor`](candle::CandlePredictor), running a
//!   candle model behind the [`Predictor`] seam

mod core_trait;
mod invoker;

#[cfg_attr(docsrs, doc(cfg(feature = "candle")))]
#[cfg(feature = "candle")]
/// Candle predictor adapter.
///
/// This module is only available when the `candle` feature flag is enabled.
pub mod candle;

pub use core_trait::*;
pub use invoker::InferenceInvoker;
