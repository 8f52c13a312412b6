//! Wavefront OBJ encoder
//!
//! Positions are written with Rust's shortest round-trip float
//! formatting, so a decode of the output reproduces coordinates exactly
//! even though OBJ is a text format. Submesh boundaries are preserved
//! through `g`/`usemtl` lines.

use std::fmt::Write;

use meshport_core::{CancelToken, CanonicalMesh, Error, Result, TargetFormat};

use crate::traits::{verify_indices, MeshEncoder};

/// Vertices between cancellation checks
const CANCEL_INTERVAL: usize = 4096;

/// Wavefront OBJ encoder
pub struct ObjEncoder;

impl MeshEncoder for ObjEncoder {
    fn format(&self) -> TargetFormat {
        TargetFormat::Obj
    }

    fn name(&self) -> &str {
        "Wavefront OBJ Encoder"
    }

    fn encode(&self, mesh: &CanonicalMesh, cancel: &CancelToken) -> Result<Vec<u8>> {
        verify_indices(mesh)?;

        let mut out = String::new();
        let write_err = |_| Error::encoding("OBJ text formatting failed");

        for (i, vertex) in mesh.vertices().iter().enumerate() {
            if i % CANCEL_INTERVAL == 0 {
                cancel.check()?;
            }
            writeln!(out, "v {} {} {}", vertex[0], vertex[1], vertex[2]).map_err(write_err)?;
        }

        for (i, submesh) in mesh.submeshes().iter().enumerate() {
            writeln!(out, "g submesh_{}", i).map_err(write_err)?;
            if let Some(material) = &submesh.material {
                writeln!(out, "usemtl {}", material).map_err(write_err)?;
            }
            for (t, triangle) in submesh.indices.chunks_exact(3).enumerate() {
                if t % CANCEL_INTERVAL == 0 {
                    cancel.check()?;
                }
                // OBJ face indices are 1-based.
                writeln!(
                    out,
                    "f {} {} {}",
                    triangle[0] + 1,
                    triangle[1] + 1,
                    triangle[2] + 1
                )
                .map_err(write_err)?;
            }
        }

        Ok(out.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshport_core::Submesh;

    #[test]
    fn test_encode_triangle() {
        let mesh = CanonicalMesh::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![Submesh::with_material(vec![0, 1, 2], "hull")],
        )
        .unwrap();

        let bytes = ObjEncoder.encode(&mesh, &CancelToken::new()).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains("v 0 0 0"));
        assert!(text.contains("v 1 0 0"));
        assert!(text.contains("usemtl hull"));
        assert!(text.contains("f 1 2 3"));
    }

    #[test]
    fn test_submesh_boundaries_written() {
        let mesh = CanonicalMesh::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
            vec![
                Submesh::new(vec![0, 1, 2]),
                Submesh::new(vec![1, 3, 2]),
            ],
        )
        .unwrap();

        let bytes = ObjEncoder.encode(&mesh, &CancelToken::new()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.matches("g submesh_").count(), 2);
    }
}
