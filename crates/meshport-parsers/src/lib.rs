//! meshport-parsers
//!
//! Decoders for every supported mesh input format.
//!
//! # Supported Formats
//!
//! | Format | Extension | Source layout |
//! |--------|-----------|-----------------------------------|
//! | OBJ    | `.obj`    | Wavefront text                    |
//! | STL    | `.stl`    | Binary and ASCII stereolithography|
//! | PLY    | `.ply`    | ASCII and binary little-endian    |
//! | FBX    | `.fbx`    | Binary node-record container      |
//! | USDZ   | `.usdz`   | USD zip package with usda layers  |
//!
//! Each decoder produces a [`LoadedAsset`]: the canonical mesh plus any
//! texture references found along the way. Only the first usable mesh of
//! a multi-object asset is converted.
//!
//! # Example
//!
//! ```rust,ignore
//! use meshport_parsers::{GLOBAL_REGISTRY, MeshDecoder};
//! use meshport_core::CancelToken;
//!
//! let decoder = GLOBAL_REGISTRY.for_path("model.obj".as_ref())?;
//! let asset = decoder.decode_file("model.obj".as_ref(), &CancelToken::new())?;
//! println!("{} triangles", asset.mesh.triangle_count());
//! ```

pub mod buffer;
pub mod fbx;
pub mod obj;
pub mod ply;
pub mod registry;
pub mod stl;
pub mod traits;
pub mod usdz;

// Re-export main types
pub use registry::{DecoderRegistry, GLOBAL_REGISTRY};
pub use traits::{LoadedAsset, MeshDecoder, TextureRef};

pub use fbx::FbxDecoder;
pub use obj::ObjDecoder;
pub use ply::PlyDecoder;
pub use stl::StlDecoder;
pub use usdz::UsdzDecoder;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
