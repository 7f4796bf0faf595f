//! # Core
//!
//! Orchestration of the batching stage.
//!
//! * [`stage`] - [`InferenceStage`] takes one incoming unit through split, build,
//!   predict and aggregate, isolating failures to the smallest affected scope, and
//!   sends exactly one result unit downstream
//! * [`worker`] - [`StageWorker`] runs a stage on a background task, joining the
//!   frame and sidecar ports into whole units

pub mod stage;
pub mod worker;

pub use stage::{InferenceStage, StageReport};
pub use worker::{StageWorker, StageWorkerHandle};
