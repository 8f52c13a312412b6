//! End-to-end pipeline scenarios

use std::path::PathBuf;

use meshport_core::{CancelToken, ErrorKind, TargetFormat};
use meshport_parsers::{MeshDecoder, StlDecoder};
use meshport_pipeline::{ConversionPipeline, PipelineConfig, PipelineEvent, PipelineState};
use tempfile::TempDir;

const CUBE_OBJ: &str = "\
v -0.5 -0.5 -0.5
v 0.5 -0.5 -0.5
v 0.5 0.5 -0.5
v -0.5 0.5 -0.5
v -0.5 -0.5 0.5
v 0.5 -0.5 0.5
v 0.5 0.5 0.5
v -0.5 0.5 0.5
f 1 2 3
f 1 3 4
f 5 7 6
f 5 8 7
f 1 5 6
f 1 6 2
f 4 3 7
f 4 7 8
f 1 4 8
f 1 8 5
f 2 6 7
f 2 7 3
";

/// A pipeline writing into a fresh temp dir, plus the input workspace
fn pipeline_fixture() -> (ConversionPipeline, TempDir) {
    let dir = TempDir::new().unwrap();
    let pipeline = ConversionPipeline::with_config(PipelineConfig {
        output_dir: dir.path().join("out"),
        export_buffers: 2,
    });
    (pipeline, dir)
}

fn write_cube(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("cube.obj");
    std::fs::write(&path, CUBE_OBJ).unwrap();
    path
}

#[test]
fn cube_loads_ready_and_converts_to_stl() {
    let (pipeline, dir) = pipeline_fixture();
    let cube = write_cube(&dir);

    let summary = pipeline.load(cube).wait().unwrap();
    assert_eq!(summary.vertex_count, 8);
    assert_eq!(summary.triangle_count, 12);
    assert!(pipeline.current_state().is_ready());

    let artifact = pipeline.convert(TargetFormat::Stl).wait().unwrap();
    assert_eq!(artifact, pipeline.output_path(TargetFormat::Stl));
    assert!(artifact.exists());

    // Mesh remains loaded after a conversion.
    assert!(pipeline.current_state().is_ready());

    // The artifact decodes back with the same triangle count.
    let bytes = std::fs::read(&artifact).unwrap();
    let reread = StlDecoder.decode(&bytes, &CancelToken::new()).unwrap();
    assert_eq!(reread.mesh.triangle_count(), 12);
    assert_eq!(reread.mesh.vertex_count(), 8);
}

#[test]
fn unsupported_export_writes_nothing() {
    let (pipeline, dir) = pipeline_fixture();
    pipeline.load(write_cube(&dir)).wait().unwrap();

    let err = pipeline.convert(TargetFormat::Fbx).wait().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedTargetFormat);

    assert!(!pipeline.output_path(TargetFormat::Fbx).exists());
    assert!(!pipeline.current_state().is_busy());
}

#[test]
fn convert_before_load_is_rejected_without_side_effects() {
    let (pipeline, _dir) = pipeline_fixture();

    let err = pipeline.convert(TargetFormat::Obj).wait().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoMeshLoaded);

    // State untouched, nothing on disk.
    assert!(matches!(pipeline.current_state(), PipelineState::Idle));
    assert!(!pipeline.output_path(TargetFormat::Obj).exists());
}

#[test]
fn zero_byte_obj_reports_empty_asset_and_clears_busy() {
    let (pipeline, dir) = pipeline_fixture();
    let path = dir.path().join("empty.obj");
    std::fs::write(&path, b"").unwrap();

    let err = pipeline.load(path).wait().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyAsset);

    let state = pipeline.current_state();
    assert!(!state.is_busy());
    assert!(state.has_error());
}

#[test]
fn out_of_range_index_never_reaches_ready() {
    let (pipeline, dir) = pipeline_fixture();
    let path = dir.path().join("bad.obj");
    std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n").unwrap();

    let err = pipeline.load(path).wait().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MeshValidationFailure);

    let state = pipeline.current_state();
    assert!(!state.is_ready());
    assert!(!state.is_busy());
    assert!(pipeline.mesh().is_none());
}

#[test]
fn unknown_extension_rejected_before_decoding() {
    let (pipeline, dir) = pipeline_fixture();
    let path = dir.path().join("scene.gltf");
    std::fs::write(&path, b"{}").unwrap();

    let err = pipeline.load(path).wait().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedInputFormat);
}

#[test]
fn successful_load_clears_previous_error() {
    let (pipeline, dir) = pipeline_fixture();
    let bad = dir.path().join("empty.obj");
    std::fs::write(&bad, b"").unwrap();

    pipeline.load(bad).wait().unwrap_err();
    assert!(pipeline.current_state().has_error());

    pipeline.load(write_cube(&dir)).wait().unwrap();
    let state = pipeline.current_state();
    assert!(state.is_ready());
    assert!(!state.has_error());
}

#[test]
fn single_slot_artifact_is_overwritten() {
    let (pipeline, dir) = pipeline_fixture();
    pipeline.load(write_cube(&dir)).wait().unwrap();

    let first = pipeline.convert(TargetFormat::Obj).wait().unwrap();
    let first_len = std::fs::metadata(&first).unwrap().len();

    // Load a smaller mesh into the same pipeline and convert again.
    let tri = dir.path().join("tri.obj");
    std::fs::write(&tri, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
    pipeline.load(tri).wait().unwrap();
    let second = pipeline.convert(TargetFormat::Obj).wait().unwrap();

    assert_eq!(first, second);
    let second_len = std::fs::metadata(&second).unwrap().len();
    assert!(second_len < first_len, "artifact was not replaced");
}

#[test]
fn replacement_mesh_swaps_atomically_for_readers() {
    let (pipeline, dir) = pipeline_fixture();
    pipeline.load(write_cube(&dir)).wait().unwrap();
    let snapshot = pipeline.mesh().unwrap();
    assert_eq!(snapshot.vertex_count(), 8);

    let tri = dir.path().join("tri.obj");
    std::fs::write(&tri, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
    pipeline.load(tri).wait().unwrap();

    // The old snapshot stays valid; the pipeline now serves the new one.
    assert_eq!(snapshot.vertex_count(), 8);
    assert_eq!(pipeline.mesh().unwrap().vertex_count(), 3);
}

#[test]
fn events_report_load_lifecycle() {
    let (pipeline, dir) = pipeline_fixture();
    let events = pipeline.take_events().unwrap();

    pipeline.load(write_cube(&dir)).wait().unwrap();

    match events.recv().unwrap() {
        PipelineEvent::LoadStarted { source } => {
            assert!(source.ends_with("cube.obj"));
        }
        other => panic!("expected LoadStarted, got {:?}", other),
    }
    match events.recv().unwrap() {
        PipelineEvent::LoadCompleted { summary } => {
            assert_eq!(summary.triangle_count, 12);
        }
        other => panic!("expected LoadCompleted, got {:?}", other),
    }
}

#[test]
fn convert_to_every_supported_target() {
    let (pipeline, dir) = pipeline_fixture();
    pipeline.load(write_cube(&dir)).wait().unwrap();

    for target in [TargetFormat::Obj, TargetFormat::Stl, TargetFormat::Ply] {
        let artifact = pipeline.convert(target).wait().unwrap();
        assert!(artifact.exists());
        assert_eq!(
            artifact.extension().and_then(|e| e.to_str()),
            Some(target.extension())
        );
    }
}
