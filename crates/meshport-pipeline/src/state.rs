//! Pipeline state and notification types
//!
//! The state is an explicit value handed to the presentation layer on
//! request, and completion is delivered as messages on an event channel.
//! Nothing here is ambient shared mutable state; the pipeline owns the
//! mesh and callers only ever see an `Arc` read view.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use meshport_core::{BoundingBox, CanonicalMesh, ErrorKind, InputFormat, TargetFormat};
use meshport_parsers::LoadedAsset;

/// Current state of one pipeline instance
#[derive(Debug, Clone)]
pub enum PipelineState {
    /// No mesh loaded yet
    Idle,
    /// A load is running on the worker
    Loading,
    /// A mesh is loaded and readable
    Ready(Arc<CanonicalMesh>),
    /// A conversion is running on the worker
    Converting,
    /// The last operation failed
    Error { kind: ErrorKind, message: String },
}

impl PipelineState {
    /// Whether an operation is in flight
    ///
    /// This must be false on every exit path of every operation,
    /// success or failure.
    pub fn is_busy(&self) -> bool {
        matches!(self, PipelineState::Loading | PipelineState::Converting)
    }

    /// Whether a mesh is loaded and convertible
    pub fn is_ready(&self) -> bool {
        matches!(self, PipelineState::Ready(_))
    }

    /// Whether the last operation failed
    pub fn has_error(&self) -> bool {
        matches!(self, PipelineState::Error { .. })
    }

    /// Latest error message, if any
    pub fn error_message(&self) -> Option<&str> {
        match self {
            PipelineState::Error { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Notification sent to the presentation layer
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    LoadStarted {
        source: PathBuf,
    },
    LoadCompleted {
        summary: MeshSummary,
    },
    LoadFailed {
        kind: ErrorKind,
        message: String,
    },
    ConvertStarted {
        target: TargetFormat,
    },
    ConvertCompleted {
        target: TargetFormat,
        artifact: PathBuf,
    },
    ConvertFailed {
        kind: ErrorKind,
        message: String,
    },
}

/// Renderer-facing summary of a loaded asset
#[derive(Debug, Clone, Serialize)]
pub struct MeshSummary {
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub submesh_count: usize,
    pub texture_count: usize,
    pub source_format: InputFormat,
    pub bounding_box: BoundingBox,
}

impl MeshSummary {
    /// Summarize a freshly decoded asset
    pub fn of(asset: &LoadedAsset) -> Self {
        Self {
            vertex_count: asset.mesh.vertex_count(),
            triangle_count: asset.mesh.triangle_count(),
            submesh_count: asset.mesh.submeshes().len(),
            texture_count: asset.textures.len(),
            source_format: asset.source_format,
            bounding_box: asset.mesh.bounding_box(),
        }
    }
}
