//! Binary STL encoder
//!
//! Facet normals are recomputed from triangle winding since the
//! canonical mesh carries positions only. STL has no notion of
//! submeshes; all triangles are emitted as one flat solid, which is why
//! decode-side vertex merging is what keeps connectivity stable across
//! a round trip.

use byteorder::{LittleEndian, WriteBytesExt};

use meshport_core::{CancelToken, CanonicalMesh, Error, Result, TargetFormat};

use crate::traits::{verify_indices, MeshEncoder};

/// Triangles between cancellation checks
const CANCEL_INTERVAL: usize = 1024;

/// Binary STL encoder
pub struct StlEncoder;

impl StlEncoder {
    fn facet_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [f32; 3] {
        let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        let normal = [
            e1[1] * e2[2] - e1[2] * e2[1],
            e1[2] * e2[0] - e1[0] * e2[2],
            e1[0] * e2[1] - e1[1] * e2[0],
        ];
        let len = (normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2]).sqrt();
        if len > 0.0 {
            [normal[0] / len, normal[1] / len, normal[2] / len]
        } else {
            [0.0, 0.0, 0.0]
        }
    }
}

impl MeshEncoder for StlEncoder {
    fn format(&self) -> TargetFormat {
        TargetFormat::Stl
    }

    fn name(&self) -> &str {
        "Binary STL Encoder"
    }

    fn encode(&self, mesh: &CanonicalMesh, cancel: &CancelToken) -> Result<Vec<u8>> {
        verify_indices(mesh)?;

        let triangle_count = mesh.triangle_count();
        let mut out = Vec::with_capacity(84 + triangle_count * 50);

        let mut header = [0u8; 80];
        let tag = b"meshport binary STL export";
        header[..tag.len()].copy_from_slice(tag);
        out.extend_from_slice(&header);

        let count = u32::try_from(triangle_count)
            .map_err(|_| Error::encoding(format!("{} triangles exceed STL capacity", triangle_count)))?;
        out.extend_from_slice(&count.to_le_bytes());

        let vertices = mesh.vertices();
        for (t, triangle) in mesh.triangles().enumerate() {
            if t % CANCEL_INTERVAL == 0 {
                cancel.check()?;
            }
            let corners = [
                vertices[triangle[0] as usize],
                vertices[triangle[1] as usize],
                vertices[triangle[2] as usize],
            ];
            let normal = Self::facet_normal(corners[0], corners[1], corners[2]);

            let io_err = |_| Error::encoding("STL record write failed");
            for component in normal {
                out.write_f32::<LittleEndian>(component).map_err(io_err)?;
            }
            for corner in corners {
                for component in corner {
                    out.write_f32::<LittleEndian>(component).map_err(io_err)?;
                }
            }
            out.write_u16::<LittleEndian>(0).map_err(io_err)?; // attribute byte count
        }

        Ok(out)
    }
}
