//! Encoder interface and target-format dispatch
//!
//! Encoders turn a valid [`CanonicalMesh`] into the byte representation
//! of one target format. They return bytes only — persisting the
//! artifact is the pipeline's job.

use tracing::debug;

use meshport_core::{CancelToken, CanonicalMesh, Error, Result, TargetFormat};

use crate::obj::ObjEncoder;
use crate::ply::PlyEncoder;
use crate::stl::StlEncoder;

/// Core trait for all target format encoders
pub trait MeshEncoder: Send + Sync {
    /// The format this encoder produces
    fn format(&self) -> TargetFormat;

    /// Human-readable encoder name
    fn name(&self) -> &str;

    /// Encode the mesh into this format's byte representation
    fn encode(&self, mesh: &CanonicalMesh, cancel: &CancelToken) -> Result<Vec<u8>>;
}

/// Encode a mesh for the requested target format
///
/// The writer capability set is `{obj, stl, ply}`; FBX and USDZ are
/// accepted input formats but rejected here by policy, and that
/// asymmetry is deliberate. Rejection happens before any bytes are
/// produced.
pub fn encode(mesh: &CanonicalMesh, target: TargetFormat, cancel: &CancelToken) -> Result<Vec<u8>> {
    debug!(
        target = %target,
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "encoding mesh"
    );
    match target {
        TargetFormat::Obj => ObjEncoder.encode(mesh, cancel),
        TargetFormat::Stl => StlEncoder.encode(mesh, cancel),
        TargetFormat::Ply => PlyEncoder.encode(mesh, cancel),
        TargetFormat::Fbx | TargetFormat::Usdz => Err(Error::UnsupportedTargetFormat {
            format: target.extension().to_string(),
        }),
    }
}

/// Defense-in-depth index check shared by every encoder
///
/// Mesh construction already enforces this invariant; an encoder that
/// still observes a violation reports it as an internal encoding
/// failure rather than emitting a corrupt artifact.
pub(crate) fn verify_indices(mesh: &CanonicalMesh) -> Result<()> {
    let vertex_count = mesh.vertex_count() as u32;
    for (i, submesh) in mesh.submeshes().iter().enumerate() {
        if let Some(&bad) = submesh.indices.iter().find(|&&idx| idx >= vertex_count) {
            return Err(Error::encoding(format!(
                "submesh {} index {} exceeds vertex count {}",
                i, bad, vertex_count
            )));
        }
    }
    Ok(())
}
