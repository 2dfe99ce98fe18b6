//! Deferred, batched removal of aliases.
//!
//! - [`pipeline`] - Bounded inbound queue, fan-out workers, fan-in coordinator
//! - [`batch`] - Batch buffer and its per-owner flush into the registry

pub mod batch;
pub mod pipeline;

pub use batch::{DeleteBatch, FlushSummary};
pub use pipeline::{DeletionPipeline, DeletionSender, PipelineConfig};
