//! ASCII PLY encoder
//!
//! Emits the classic vertex/face element pair with f32 positions and
//! uchar-counted uint index lists. ASCII keeps the artifact inspectable
//! and, with shortest round-trip float formatting, coordinate-exact.

use std::fmt::Write;

use meshport_core::{CancelToken, CanonicalMesh, Error, Result, TargetFormat};

use crate::traits::{verify_indices, MeshEncoder};

/// Elements between cancellation checks
const CANCEL_INTERVAL: usize = 4096;

/// ASCII PLY encoder
pub struct PlyEncoder;

impl MeshEncoder for PlyEncoder {
    fn format(&self) -> TargetFormat {
        TargetFormat::Ply
    }

    fn name(&self) -> &str {
        "ASCII PLY Encoder"
    }

    fn encode(&self, mesh: &CanonicalMesh, cancel: &CancelToken) -> Result<Vec<u8>> {
        verify_indices(mesh)?;

        let mut out = String::new();
        let write_err = |_| Error::encoding("PLY text formatting failed");

        writeln!(out, "ply").map_err(write_err)?;
        writeln!(out, "format ascii 1.0").map_err(write_err)?;
        writeln!(out, "comment meshport export").map_err(write_err)?;
        writeln!(out, "element vertex {}", mesh.vertex_count()).map_err(write_err)?;
        writeln!(out, "property float x").map_err(write_err)?;
        writeln!(out, "property float y").map_err(write_err)?;
        writeln!(out, "property float z").map_err(write_err)?;
        writeln!(out, "element face {}", mesh.triangle_count()).map_err(write_err)?;
        writeln!(out, "property list uchar uint vertex_indices").map_err(write_err)?;
        writeln!(out, "end_header").map_err(write_err)?;

        for (i, vertex) in mesh.vertices().iter().enumerate() {
            if i % CANCEL_INTERVAL == 0 {
                cancel.check()?;
            }
            writeln!(out, "{} {} {}", vertex[0], vertex[1], vertex[2]).map_err(write_err)?;
        }

        for (t, triangle) in mesh.triangles().enumerate() {
            if t % CANCEL_INTERVAL == 0 {
                cancel.check()?;
            }
            writeln!(out, "3 {} {} {}", triangle[0], triangle[1], triangle[2])
                .map_err(write_err)?;
        }

        Ok(out.into_bytes())
    }
}
