//! Unified error handling for meshport
//!
//! This module provides a single error type covering every failure the
//! conversion pipeline can report. Decode and encode failures are always
//! local to one `load`/`convert` operation; none of them are fatal to a
//! pipeline instance.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for all meshport operations
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Output artifact could not be created or replaced
    #[error("Output path failure at {path}: {message}")]
    OutputPathFailure { path: PathBuf, message: String },

    // ==================== Decode Errors ====================

    /// File extension is not in the supported input set
    #[error("Unsupported input format: .{extension}")]
    UnsupportedInputFormat { extension: String },

    /// No mesh-bearing object was found in the asset
    #[error("No usable mesh in asset: {message}")]
    EmptyAsset { message: String },

    /// Vertex buffer layout does not match 3 packed f32 components
    #[error("Malformed vertex buffer: {message}")]
    MalformedVertexBuffer { message: String },

    /// A primitive group is not a triangle list
    #[error("Unsupported primitive type: {found}")]
    UnsupportedPrimitiveType { found: String },

    /// Assembled buffers violate a canonical mesh invariant
    #[error("Mesh validation failed: {message}")]
    MeshValidationFailure { message: String },

    // ==================== Encode Errors ====================

    /// Requested export format is outside the writer capability set
    #[error("Unsupported target format: {format}")]
    UnsupportedTargetFormat { format: String },

    /// Internal consistency error while encoding
    #[error("Encoding failed: {message}")]
    EncodingFailure { message: String },

    /// Export buffer pool could not provide a staging buffer
    #[error("GPU buffer allocator unavailable")]
    GpuResourceUnavailable,

    // ==================== Pipeline Errors ====================

    /// `convert` was called without a successfully loaded mesh
    #[error("No mesh loaded")]
    NoMeshLoaded,

    /// A load or convert is already in flight on this pipeline
    #[error("Operation in progress: {operation}")]
    OperationInProgress { operation: String },

    /// Operation aborted through a cancellation token
    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error classification surfaced to the presentation layer
///
/// The presentation layer displays `kind` + the human-readable message
/// from [`Error`]'s `Display` impl; it never matches on error payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    IoFailure,
    OutputPathFailure,
    UnsupportedInputFormat,
    EmptyAsset,
    MalformedVertexBuffer,
    UnsupportedPrimitiveType,
    MeshValidationFailure,
    UnsupportedTargetFormat,
    EncodingFailure,
    GpuResourceUnavailable,
    NoMeshLoaded,
    OperationInProgress,
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Error {
    /// Classify this error for display and dispatch
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::IoFailure,
            Error::OutputPathFailure { .. } => ErrorKind::OutputPathFailure,
            Error::UnsupportedInputFormat { .. } => ErrorKind::UnsupportedInputFormat,
            Error::EmptyAsset { .. } => ErrorKind::EmptyAsset,
            Error::MalformedVertexBuffer { .. } => ErrorKind::MalformedVertexBuffer,
            Error::UnsupportedPrimitiveType { .. } => ErrorKind::UnsupportedPrimitiveType,
            Error::MeshValidationFailure { .. } => ErrorKind::MeshValidationFailure,
            Error::UnsupportedTargetFormat { .. } => ErrorKind::UnsupportedTargetFormat,
            Error::EncodingFailure { .. } => ErrorKind::EncodingFailure,
            Error::GpuResourceUnavailable => ErrorKind::GpuResourceUnavailable,
            Error::NoMeshLoaded => ErrorKind::NoMeshLoaded,
            Error::OperationInProgress { .. } => ErrorKind::OperationInProgress,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Create an empty-asset error
    pub fn empty_asset(message: impl Into<String>) -> Self {
        Error::EmptyAsset {
            message: message.into(),
        }
    }

    /// Create a malformed-vertex-buffer error
    pub fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedVertexBuffer {
            message: message.into(),
        }
    }

    /// Create a mesh-validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Error::MeshValidationFailure {
            message: message.into(),
        }
    }

    /// Create an encoding-failure error
    pub fn encoding(message: impl Into<String>) -> Self {
        Error::EncodingFailure {
            message: message.into(),
        }
    }

    /// Check if this is a decode-side format/content error
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedInputFormat { .. }
                | Error::EmptyAsset { .. }
                | Error::MalformedVertexBuffer { .. }
                | Error::UnsupportedPrimitiveType { .. }
                | Error::MeshValidationFailure { .. }
        )
    }

    /// Check if this error rejects a format rather than reporting corruption
    pub fn is_unsupported_format(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedInputFormat { .. } | Error::UnsupportedTargetFormat { .. }
        )
    }

    /// Check if the failed operation may simply be retried later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::OperationInProgress { .. } | Error::GpuResourceUnavailable
        )
    }
}

/// Extension trait for annotating errors with a human-readable context
pub trait ResultExt<T> {
    /// Prefix the error message with an operation description
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| match e {
            Error::EmptyAsset { message } => Error::EmptyAsset {
                message: format!("{}: {}", context.into(), message),
            },
            Error::MalformedVertexBuffer { message } => Error::MalformedVertexBuffer {
                message: format!("{}: {}", context.into(), message),
            },
            Error::MeshValidationFailure { message } => Error::MeshValidationFailure {
                message: format!("{}: {}", context.into(), message),
            },
            Error::EncodingFailure { message } => Error::EncodingFailure {
                message: format!("{}: {}", context.into(), message),
            },
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(
            Error::empty_asset("nothing here").kind(),
            ErrorKind::EmptyAsset
        );
        assert_eq!(Error::NoMeshLoaded.kind(), ErrorKind::NoMeshLoaded);
        assert_eq!(
            Error::GpuResourceUnavailable.kind(),
            ErrorKind::GpuResourceUnavailable
        );
    }

    #[test]
    fn test_is_decode_error() {
        assert!(Error::malformed("short read").is_decode_error());
        assert!(Error::validation("index out of range").is_decode_error());
        assert!(!Error::NoMeshLoaded.is_decode_error());
    }

    #[test]
    fn test_is_unsupported_format() {
        let err = Error::UnsupportedTargetFormat {
            format: "fbx".into(),
        };
        assert!(err.is_unsupported_format());
        assert!(!Error::Cancelled.is_unsupported_format());
    }

    #[test]
    fn test_context_prefixes_message() {
        let result: Result<()> = Err(Error::malformed("stride 16 != 12"));
        let err = result.context("decoding cube.ply").unwrap_err();
        assert!(err.to_string().contains("decoding cube.ply"));
        assert!(err.to_string().contains("stride 16"));
    }
}
