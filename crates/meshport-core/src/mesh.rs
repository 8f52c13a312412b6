//! Canonical mesh representation
//!
//! The pivot between every input and output format: vertex positions
//! plus flat triangle-list submeshes. Construction validates all
//! invariants up front, so holding a `CanonicalMesh` is proof the
//! geometry is usable; a partially built mesh is never observable.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A named group of triangles sharing a material within one mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submesh {
    /// Flat triangle list: every consecutive index triple is one triangle
    pub indices: Vec<u32>,
    /// Opaque material reference, not required for geometry correctness
    pub material: Option<String>,
}

impl Submesh {
    /// Create a submesh from a flat triangle list
    pub fn new(indices: Vec<u32>) -> Self {
        Self {
            indices,
            material: None,
        }
    }

    /// Create a submesh with a material reference
    pub fn with_material(indices: Vec<u32>, material: impl Into<String>) -> Self {
        Self {
            indices,
            material: Some(material.into()),
        }
    }

    /// Number of triangles in this submesh
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Format-independent mesh representation
///
/// Invariants (enforced by [`CanonicalMesh::new`]):
/// - `vertices` is non-empty and at least one submesh exists
/// - every submesh index buffer length is divisible by 3
/// - every index is `< vertices.len()`
///
/// Deliberately not deserializable: the validating constructor is the
/// only way in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalMesh {
    vertices: Vec<[f32; 3]>,
    submeshes: Vec<Submesh>,
}

impl CanonicalMesh {
    /// Assemble a validated mesh from raw buffers
    ///
    /// Any invariant violation short-circuits with `MeshValidationFailure`.
    pub fn new(vertices: Vec<[f32; 3]>, submeshes: Vec<Submesh>) -> Result<Self> {
        if vertices.is_empty() {
            return Err(Error::validation("mesh has no vertices"));
        }
        if submeshes.is_empty() {
            return Err(Error::validation("mesh has no submeshes"));
        }

        let vertex_count = vertices.len() as u32;
        for (i, submesh) in submeshes.iter().enumerate() {
            if submesh.indices.is_empty() {
                return Err(Error::validation(format!("submesh {} is empty", i)));
            }
            if submesh.indices.len() % 3 != 0 {
                return Err(Error::validation(format!(
                    "submesh {} index count {} is not a multiple of 3",
                    i,
                    submesh.indices.len()
                )));
            }
            if let Some(&bad) = submesh.indices.iter().find(|&&idx| idx >= vertex_count) {
                return Err(Error::validation(format!(
                    "submesh {} references vertex {} but mesh has {} vertices",
                    i, bad, vertex_count
                )));
            }
        }

        Ok(Self {
            vertices,
            submeshes,
        })
    }

    /// Vertex positions
    pub fn vertices(&self) -> &[[f32; 3]] {
        &self.vertices
    }

    /// Submeshes in source order
    pub fn submeshes(&self) -> &[Submesh] {
        &self.submeshes
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Total triangle count across all submeshes
    pub fn triangle_count(&self) -> usize {
        self.submeshes.iter().map(|s| s.triangle_count()).sum()
    }

    /// Iterate all triangles as index triples, across submeshes
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.submeshes
            .iter()
            .flat_map(|s| s.indices.chunks_exact(3))
            .map(|t| [t[0], t[1], t[2]])
    }

    /// Axis-aligned bounding box of all vertex positions
    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox::new(self.vertices[0], self.vertices[0]);
        for &v in &self.vertices[1..] {
            bbox.expand(v);
        }
        bbox
    }

    /// Positions as a flat f32 array (for renderer upload)
    pub fn positions_flat(&self) -> Vec<f32> {
        self.vertices.iter().flat_map(|v| *v).collect()
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum corner
    pub min: [f32; 3],
    /// Maximum corner
    pub max: [f32; 3],
}

impl BoundingBox {
    /// Create a new bounding box
    pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, max }
    }

    /// Get the center point
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
            (self.min[2] + self.max[2]) / 2.0,
        ]
    }

    /// Get the size (extent)
    pub fn size(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Expand to include a point
    pub fn expand(&mut self, point: [f32; 3]) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(point[i]);
            self.max[i] = self.max[i].max(point[i]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn quad_vertices() -> Vec<[f32; 3]> {
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ]
    }

    #[test]
    fn test_valid_mesh_counts() {
        let mesh = CanonicalMesh::new(
            quad_vertices(),
            vec![Submesh::new(vec![0, 1, 2, 1, 3, 2])],
        )
        .unwrap();

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.triangles().count(), 2);
    }

    #[test]
    fn test_empty_vertices_rejected() {
        let err = CanonicalMesh::new(vec![], vec![Submesh::new(vec![0, 1, 2])]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MeshValidationFailure);
    }

    #[test]
    fn test_no_submeshes_rejected() {
        let err = CanonicalMesh::new(quad_vertices(), vec![]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MeshValidationFailure);
    }

    #[test]
    fn test_non_triangle_count_rejected() {
        let err =
            CanonicalMesh::new(quad_vertices(), vec![Submesh::new(vec![0, 1, 2, 3])]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MeshValidationFailure);
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let err =
            CanonicalMesh::new(quad_vertices(), vec![Submesh::new(vec![0, 1, 9])]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MeshValidationFailure);
        assert!(err.to_string().contains("9"));
    }

    #[test]
    fn test_bounding_box() {
        let mesh =
            CanonicalMesh::new(quad_vertices(), vec![Submesh::new(vec![0, 1, 2])]).unwrap();
        let bbox = mesh.bounding_box();
        assert_eq!(bbox.min, [0.0, 0.0, 0.0]);
        assert_eq!(bbox.max, [1.0, 1.0, 0.0]);
        assert_eq!(bbox.center(), [0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_positions_flat() {
        let mesh =
            CanonicalMesh::new(quad_vertices(), vec![Submesh::new(vec![0, 1, 2])]).unwrap();
        let flat = mesh.positions_flat();
        assert_eq!(flat.len(), 12);
        assert_eq!(&flat[3..6], &[1.0, 0.0, 0.0]);
    }
}
