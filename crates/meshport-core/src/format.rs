//! Format tags for the reader and writer capability sets
//!
//! The two sets are deliberately independent: every [`InputFormat`] can
//! be loaded, but only a subset of [`TargetFormat`] requests can be
//! encoded. FBX and USDZ are accepted on the way in and rejected on the
//! way out; that asymmetry is policy, not an oversight.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Supported input formats, resolved from the file extension
///
/// The tag is never sniffed from content when the extension is
/// unambiguous; an unknown extension is rejected before any decoder runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputFormat {
    Obj,
    Stl,
    Ply,
    Fbx,
    Usdz,
}

impl InputFormat {
    /// All accepted input extensions, lowercase
    pub const EXTENSIONS: [&'static str; 5] = ["obj", "stl", "ply", "fbx", "usdz"];

    /// Resolve a format tag from a file extension
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "obj" => Ok(InputFormat::Obj),
            "stl" => Ok(InputFormat::Stl),
            "ply" => Ok(InputFormat::Ply),
            "fbx" => Ok(InputFormat::Fbx),
            "usdz" => Ok(InputFormat::Usdz),
            other => Err(Error::UnsupportedInputFormat {
                extension: other.to_string(),
            }),
        }
    }

    /// Resolve a format tag from a file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::UnsupportedInputFormat {
                extension: String::new(),
            })?;
        Self::from_extension(ext)
    }

    /// Canonical lowercase extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            InputFormat::Obj => "obj",
            InputFormat::Stl => "stl",
            InputFormat::Ply => "ply",
            InputFormat::Fbx => "fbx",
            InputFormat::Usdz => "usdz",
        }
    }

    /// Human-readable format name
    pub fn name(&self) -> &'static str {
        match self {
            InputFormat::Obj => "Wavefront OBJ",
            InputFormat::Stl => "STL",
            InputFormat::Ply => "Stanford PLY",
            InputFormat::Fbx => "Autodesk FBX",
            InputFormat::Usdz => "USD Package",
        }
    }
}

impl std::fmt::Display for InputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Export format requested by the caller
///
/// Carries every tag a caller may legally *request*; the writer
/// capability set is the `is_encodable` subset. Requests outside it fail
/// with `UnsupportedTargetFormat` and write nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetFormat {
    Obj,
    Stl,
    Ply,
    Fbx,
    Usdz,
}

impl TargetFormat {
    /// Resolve a target tag from a user-supplied string
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "obj" => Ok(TargetFormat::Obj),
            "stl" => Ok(TargetFormat::Stl),
            "ply" => Ok(TargetFormat::Ply),
            "fbx" => Ok(TargetFormat::Fbx),
            "usdz" => Ok(TargetFormat::Usdz),
            other => Err(Error::UnsupportedTargetFormat {
                format: other.to_string(),
            }),
        }
    }

    /// Extension used for the output artifact
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Obj => "obj",
            TargetFormat::Stl => "stl",
            TargetFormat::Ply => "ply",
            TargetFormat::Fbx => "fbx",
            TargetFormat::Usdz => "usdz",
        }
    }

    /// Whether a writer exists for this tag
    pub fn is_encodable(&self) -> bool {
        matches!(
            self,
            TargetFormat::Obj | TargetFormat::Stl | TargetFormat::Ply
        )
    }
}

impl std::fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_input_format_from_extension() {
        assert_eq!(InputFormat::from_extension("obj").unwrap(), InputFormat::Obj);
        assert_eq!(InputFormat::from_extension("USDZ").unwrap(), InputFormat::Usdz);
        assert!(InputFormat::from_extension("gltf").is_err());
    }

    #[test]
    fn test_input_format_from_path() {
        let fmt = InputFormat::from_path(&PathBuf::from("/models/ship.STL")).unwrap();
        assert_eq!(fmt, InputFormat::Stl);

        let err = InputFormat::from_path(&PathBuf::from("/models/noext")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedInputFormat);
    }

    #[test]
    fn test_target_format_capability_set() {
        assert!(TargetFormat::Obj.is_encodable());
        assert!(TargetFormat::Stl.is_encodable());
        assert!(TargetFormat::Ply.is_encodable());
        assert!(!TargetFormat::Fbx.is_encodable());
        assert!(!TargetFormat::Usdz.is_encodable());
    }

    #[test]
    fn test_target_format_from_tag() {
        assert_eq!(TargetFormat::from_tag("stl").unwrap(), TargetFormat::Stl);
        // Requestable even though not encodable; the writer rejects it later.
        assert_eq!(TargetFormat::from_tag("fbx").unwrap(), TargetFormat::Fbx);
        assert!(TargetFormat::from_tag("3mf").is_err());
    }
}
