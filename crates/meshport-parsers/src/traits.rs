//! Decoder interface shared by all input formats
//!
//! Every supported input format implements [`MeshDecoder`]: bytes in,
//! [`LoadedAsset`] out. Decoders have no side effects beyond reading and
//! never guess the format from content — the tag comes from the file
//! extension, resolved before a decoder is ever invoked.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use meshport_core::{CancelToken, CanonicalMesh, InputFormat, Result};

/// A decoded asset: the canonical mesh plus rendering-only side artifacts
#[derive(Debug, Clone, Serialize)]
pub struct LoadedAsset {
    /// First usable mesh found in the source asset
    pub mesh: CanonicalMesh,
    /// Texture references collected for the renderer; never consulted by
    /// writers and not preserved through conversion
    pub textures: Vec<TextureRef>,
    /// Format the asset was decoded from
    pub source_format: InputFormat,
}

impl LoadedAsset {
    /// Wrap a mesh with no texture side artifacts
    pub fn bare(mesh: CanonicalMesh, source_format: InputFormat) -> Self {
        Self {
            mesh,
            textures: Vec::new(),
            source_format,
        }
    }
}

/// Reference to a texture named by the source asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureRef {
    /// Name as it appears in the source (file name or package entry)
    pub name: String,
    /// Absolute path, when the reference could be resolved on disk
    pub resolved: Option<PathBuf>,
}

impl TextureRef {
    /// An unresolved reference, by name only
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolved: None,
        }
    }
}

/// Core trait for all input format decoders
///
/// If the asset contains multiple objects, only the first usable mesh is
/// converted; multi-object aggregation is out of scope.
pub trait MeshDecoder: std::fmt::Debug + Send + Sync {
    /// The format this decoder handles
    fn format(&self) -> InputFormat;

    /// Human-readable decoder name
    fn name(&self) -> &str;

    /// Decode an in-memory byte source
    fn decode(&self, bytes: &[u8], cancel: &CancelToken) -> Result<LoadedAsset>;

    /// Decode from a file path
    ///
    /// Decoders that chase sidecar files (OBJ material libraries)
    /// override this to resolve texture references next to the source.
    fn decode_file(&self, path: &Path, cancel: &CancelToken) -> Result<LoadedAsset> {
        let bytes = std::fs::read(path)?;
        self.decode(&bytes, cancel)
    }
}
