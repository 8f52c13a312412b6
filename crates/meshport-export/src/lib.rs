//! Meshport Export Pipeline
//!
//! Encoders for converting a canonical mesh to standard interchange
//! formats:
//! - Wavefront OBJ (text)
//! - Binary STL
//! - ASCII PLY
//!
//! FBX and USDZ are accepted as *input* formats by the parsers crate but
//! are deliberately not export targets; [`encode`] rejects them with
//! `UnsupportedTargetFormat`.

pub mod obj;
pub mod ply;
pub mod stl;
pub mod traits;

pub use obj::ObjEncoder;
pub use ply::PlyEncoder;
pub use stl::StlEncoder;
pub use traits::{encode, MeshEncoder};
