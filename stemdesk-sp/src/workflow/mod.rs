//! Orchestration across pipeline stages

mod locks;
mod pipeline;
pub mod retention;

pub use locks::ScopeLocks;
pub use pipeline::{PipelineError, SeparationPipeline};
