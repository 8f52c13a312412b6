//! Decoder registry
//!
//! Maps input format tags to decoder instances. The extension gate lives
//! here: an unrecognized extension is rejected before any decoder sees a
//! single byte, and the tag alone selects the decoder — content is never
//! sniffed to pick a format.

use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;

use meshport_core::{Error, InputFormat, Result};

use crate::fbx::FbxDecoder;
use crate::obj::ObjDecoder;
use crate::ply::PlyDecoder;
use crate::stl::StlDecoder;
use crate::traits::MeshDecoder;
use crate::usdz::UsdzDecoder;

/// Registry of available decoders
pub struct DecoderRegistry {
    decoders: Vec<Arc<dyn MeshDecoder>>,
}

impl DecoderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            decoders: Vec::new(),
        }
    }

    /// Create a registry with every built-in decoder registered
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ObjDecoder));
        registry.register(Arc::new(StlDecoder));
        registry.register(Arc::new(PlyDecoder));
        registry.register(Arc::new(FbxDecoder));
        registry.register(Arc::new(UsdzDecoder));
        registry
    }

    /// Register a decoder; a later registration for the same format wins
    pub fn register(&mut self, decoder: Arc<dyn MeshDecoder>) {
        self.decoders
            .retain(|existing| existing.format() != decoder.format());
        self.decoders.push(decoder);
    }

    /// Look up the decoder for a format tag
    pub fn for_format(&self, format: InputFormat) -> Result<Arc<dyn MeshDecoder>> {
        self.decoders
            .iter()
            .find(|d| d.format() == format)
            .cloned()
            .ok_or_else(|| Error::UnsupportedInputFormat {
                extension: format.extension().to_string(),
            })
    }

    /// Resolve a path's extension to a decoder
    ///
    /// This is the pre-decode gate: unknown extensions fail here with
    /// `UnsupportedInputFormat`.
    pub fn for_path(&self, path: &Path) -> Result<Arc<dyn MeshDecoder>> {
        let format = InputFormat::from_path(path)?;
        self.for_format(format)
    }

    /// Formats with a registered decoder
    pub fn formats(&self) -> Vec<InputFormat> {
        self.decoders.iter().map(|d| d.format()).collect()
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Global registry holding the built-in decoders
pub static GLOBAL_REGISTRY: Lazy<DecoderRegistry> = Lazy::new(DecoderRegistry::with_builtins);
