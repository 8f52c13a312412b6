//! Meshport Conversion Pipeline
//!
//! Orchestrates the end-to-end flow: a caller hands in an input locator,
//! the pipeline decodes it into a canonical mesh on a background worker,
//! and on request re-encodes that mesh into an output artifact. The
//! presentation layer depends on three things only: `load`, `convert`
//! and `current_state`.

pub mod buffers;
pub mod pipeline;
pub mod state;
pub mod task;

pub use buffers::{BufferLease, ExportBufferPool};
pub use pipeline::{ConversionPipeline, PipelineConfig, OUTPUT_STEM};
pub use state::{MeshSummary, PipelineEvent, PipelineState};
pub use task::PipelineTask;
