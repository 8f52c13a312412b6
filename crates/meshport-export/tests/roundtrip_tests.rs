//! Round-trip tests: encode with this crate, re-decode with the parsers
//!
//! The contract is count and connectivity preservation, not byte
//! identity — text formats are free to vary in whitespace.

use meshport_core::{CancelToken, CanonicalMesh, ErrorKind, Submesh, TargetFormat};
use meshport_export::encode;
use meshport_parsers::{DecoderRegistry, MeshDecoder};

/// 8-vertex, 12-triangle unit cube
fn cube() -> CanonicalMesh {
    let vertices = vec![
        [-0.5, -0.5, -0.5],
        [0.5, -0.5, -0.5],
        [0.5, 0.5, -0.5],
        [-0.5, 0.5, -0.5],
        [-0.5, -0.5, 0.5],
        [0.5, -0.5, 0.5],
        [0.5, 0.5, 0.5],
        [-0.5, 0.5, 0.5],
    ];
    let indices = vec![
        0, 1, 2, 0, 2, 3, // back
        4, 6, 5, 4, 7, 6, // front
        0, 4, 5, 0, 5, 1, // bottom
        3, 2, 6, 3, 6, 7, // top
        0, 3, 7, 0, 7, 4, // left
        1, 5, 6, 1, 6, 2, // right
    ];
    CanonicalMesh::new(vertices, vec![Submesh::new(indices)]).unwrap()
}

/// Triangles as sorted index triples, for connectivity comparison
fn connectivity(mesh: &CanonicalMesh) -> Vec<[u32; 3]> {
    let mut triangles: Vec<[u32; 3]> = mesh
        .triangles()
        .map(|mut t| {
            t.sort_unstable();
            t
        })
        .collect();
    triangles.sort_unstable();
    triangles
}

fn decode(target: TargetFormat, bytes: &[u8]) -> CanonicalMesh {
    let registry = DecoderRegistry::with_builtins();
    let input_format = match target {
        TargetFormat::Obj => meshport_core::InputFormat::Obj,
        TargetFormat::Stl => meshport_core::InputFormat::Stl,
        TargetFormat::Ply => meshport_core::InputFormat::Ply,
        _ => panic!("not a decodable round-trip target"),
    };
    registry
        .for_format(input_format)
        .unwrap()
        .decode(bytes, &CancelToken::new())
        .unwrap()
        .mesh
}

#[test]
fn obj_round_trip_preserves_counts_and_coordinates() {
    let mesh = cube();
    let bytes = encode(&mesh, TargetFormat::Obj, &CancelToken::new()).unwrap();
    let reread = decode(TargetFormat::Obj, &bytes);

    assert_eq!(reread.vertex_count(), 8);
    assert_eq!(reread.triangle_count(), 12);
    assert_eq!(reread.vertices(), mesh.vertices());
    assert_eq!(connectivity(&reread), connectivity(&mesh));
}

#[test]
fn stl_round_trip_preserves_counts() {
    let mesh = cube();
    let bytes = encode(&mesh, TargetFormat::Stl, &CancelToken::new()).unwrap();
    let reread = decode(TargetFormat::Stl, &bytes);

    // Vertex merging on decode restores the shared corners.
    assert_eq!(reread.vertex_count(), 8);
    assert_eq!(reread.triangle_count(), 12);
}

#[test]
fn ply_round_trip_preserves_counts_and_connectivity() {
    let mesh = cube();
    let bytes = encode(&mesh, TargetFormat::Ply, &CancelToken::new()).unwrap();
    let reread = decode(TargetFormat::Ply, &bytes);

    assert_eq!(reread.vertex_count(), 8);
    assert_eq!(reread.triangle_count(), 12);
    assert_eq!(connectivity(&reread), connectivity(&mesh));
}

#[test]
fn obj_round_trip_keeps_materials_per_submesh() {
    let mesh = CanonicalMesh::new(
        vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
        vec![
            Submesh::with_material(vec![0, 1, 2], "hull"),
            Submesh::with_material(vec![1, 3, 2], "glass"),
        ],
    )
    .unwrap();

    let bytes = encode(&mesh, TargetFormat::Obj, &CancelToken::new()).unwrap();
    let reread = decode(TargetFormat::Obj, &bytes);

    assert_eq!(reread.submeshes().len(), 2);
    assert_eq!(reread.submeshes()[0].material.as_deref(), Some("hull"));
    assert_eq!(reread.submeshes()[1].material.as_deref(), Some("glass"));
}

#[test]
fn declared_but_unencodable_targets_are_rejected() {
    let mesh = cube();
    for target in [TargetFormat::Fbx, TargetFormat::Usdz] {
        let err = encode(&mesh, target, &CancelToken::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedTargetFormat);
    }
}
