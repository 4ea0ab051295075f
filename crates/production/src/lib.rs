//! Production domain module: brew batches and their lifecycle.
//!
//! Batches move through a fixed transition table. Status changes are events
//! of the `Batch` aggregate and double as the append-only status history.

pub mod batch;
pub mod stats;

pub use batch::{
    Batch, BatchDetailsUpdated, BatchEvent, BatchPatch, BatchStatus, BatchStatusChanged,
    BatchStatusHistory, PlanBatch, UpdateBatch, compute_abv,
};
pub use stats::BatchStatistics;
