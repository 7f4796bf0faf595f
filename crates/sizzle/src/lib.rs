//! # Sizzle
//!
//! A batching stage for frame inference pipelines.
//!
//! ## Overview
//!
//! Upstream stages deliver units of frames, optionally paired with one
//! sidecar record per frame. A model accepts a fixed number of frames per
//! call, its capacity. The stage splits each unit into model batches of that
//! capacity, zero-pads the last one, runs the predictor once per model batch
//! and concatenates every output into one buffer per output name, in model
//! batch order. The result unit goes downstream together with the source
//! frames.
//!
//! ### Failure isolation
//!
//! - A frame that cannot be copied into its slot is marked invalid; the rest
//!   of its model batch still runs
//! - A model batch whose prediction fails has its frames marked invalid and its
//!   output segments left zeroed; later model batches still run
//! - A unit whose sidecar cannot be aligned with its frames is reported
//!   downstream as failed, without calling the predictor
//!
//! Invalid frames carry [`FrameId::Invalid`](communication::FrameId::Invalid)
//! in the result's batch info; their output slots must be ignored.
//!
//! ### Backpressure
//!
//! Sending downstream retries on a full or memory-starved transport according
//! to the configured [`RetryPolicy`](config::RetryPolicy), which by default
//! waits 200ms between attempts and never gives up.
//!
//! ## Features
//!
//! - **candle** - Enables a [`Predictor`](inference::Predictor) backed by a candle model
//!

pub mod batch;
pub mod communication;
pub mod config;
pub mod core;
pub mod downstream;
pub mod error;
pub mod inference;

pub use config::{EngineConfig, RetryPolicy};
pub use crate::core::{InferenceStage, StageReport, StageWorker};
pub use error::StageError;
