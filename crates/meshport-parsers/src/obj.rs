//! Wavefront OBJ decoder
//!
//! Text format: `v` lines carry positions, `f` lines carry 1-based
//! (optionally negative) vertex indices in `v`, `v/vt`, `v//vn` or
//! `v/vt/vn` form. `g`, `o` and `usemtl` delimit submeshes. Faces with
//! more than three vertices are rejected rather than re-triangulated.
//!
//! Only the first `o` object carrying faces is converted; material
//! libraries referenced by `mtllib` are chased for texture references
//! when decoding from a file path.

use std::path::Path;

use tracing::debug;

use meshport_core::{CancelToken, CanonicalMesh, Error, InputFormat, Result, Submesh};

use crate::traits::{LoadedAsset, MeshDecoder, TextureRef};

/// Lines between cancellation checks
const CANCEL_INTERVAL: usize = 4096;

/// Wavefront OBJ decoder
#[derive(Debug)]
pub struct ObjDecoder;

impl ObjDecoder {
    /// Resolve one face token (`7`, `7/2`, `7//3`, `-1`) to a 0-based index
    fn resolve_index(token: &str, vertex_count: usize) -> Result<u32> {
        let position_part = token.split('/').next().unwrap_or("");
        let raw: i64 = position_part
            .parse()
            .map_err(|_| Error::malformed(format!("bad face index '{}'", token)))?;

        let resolved = if raw > 0 {
            raw - 1
        } else if raw < 0 {
            vertex_count as i64 + raw
        } else {
            return Err(Error::malformed("face index 0 is not valid in OBJ"));
        };

        if resolved < 0 {
            return Err(Error::malformed(format!(
                "negative face index '{}' resolves before the first vertex",
                token
            )));
        }
        // Out-of-range positive indices are caught by mesh validation.
        Ok(resolved as u32)
    }

    fn parse_position(rest: &[&str]) -> Result<[f32; 3]> {
        if rest.len() < 3 {
            return Err(Error::malformed(format!(
                "vertex line has {} components, expected 3",
                rest.len()
            )));
        }
        let mut pos = [0.0f32; 3];
        for (i, tok) in rest.iter().take(3).enumerate() {
            pos[i] = tok
                .parse()
                .map_err(|_| Error::malformed(format!("bad vertex component '{}'", tok)))?;
        }
        Ok(pos)
    }
}

impl MeshDecoder for ObjDecoder {
    fn format(&self) -> InputFormat {
        InputFormat::Obj
    }

    fn name(&self) -> &str {
        "Wavefront OBJ Decoder"
    }

    fn decode(&self, bytes: &[u8], cancel: &CancelToken) -> Result<LoadedAsset> {
        let text = String::from_utf8_lossy(bytes);

        let mut vertices: Vec<[f32; 3]> = Vec::new();
        let mut submeshes: Vec<Submesh> = Vec::new();
        let mut current_indices: Vec<u32> = Vec::new();
        let mut current_material: Option<String> = None;
        let mut material_libs: Vec<String> = Vec::new();
        let mut seen_faces = false;

        let flush =
            |indices: &mut Vec<u32>, material: &Option<String>, out: &mut Vec<Submesh>| {
                if !indices.is_empty() {
                    out.push(Submesh {
                        indices: std::mem::take(indices),
                        material: material.clone(),
                    });
                }
            };

        for (line_no, line) in text.lines().enumerate() {
            if line_no % CANCEL_INTERVAL == 0 {
                cancel.check()?;
            }

            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let mut tokens = line.split_whitespace();
            let keyword = tokens.next().unwrap_or("");
            let rest: Vec<&str> = tokens.collect();

            match keyword {
                "v" => vertices.push(Self::parse_position(&rest)?),
                "f" => {
                    if rest.len() < 3 {
                        return Err(Error::malformed(format!(
                            "face with {} vertices",
                            rest.len()
                        )));
                    }
                    if rest.len() > 3 {
                        return Err(Error::UnsupportedPrimitiveType {
                            found: format!("{}-gon face", rest.len()),
                        });
                    }
                    for token in &rest {
                        current_indices.push(Self::resolve_index(token, vertices.len())?);
                    }
                    seen_faces = true;
                }
                "o" => {
                    // Only the first object is converted.
                    if seen_faces {
                        debug!("stopping at second OBJ object '{}'", rest.first().unwrap_or(&""));
                        break;
                    }
                }
                "g" => flush(&mut current_indices, &current_material, &mut submeshes),
                "usemtl" => {
                    flush(&mut current_indices, &current_material, &mut submeshes);
                    current_material = rest.first().map(|s| s.to_string());
                }
                "mtllib" => material_libs.extend(rest.iter().map(|s| s.to_string())),
                // Normals, texture coordinates and smoothing groups are
                // outside the canonical scope.
                "vn" | "vt" | "vp" | "s" | "l" | "p" => {}
                _ => {}
            }
        }

        flush(&mut current_indices, &current_material, &mut submeshes);

        if vertices.is_empty() || submeshes.is_empty() {
            return Err(Error::empty_asset("OBJ source contains no triangle mesh"));
        }

        let mesh = CanonicalMesh::new(vertices, submeshes)?;
        let textures = material_libs.into_iter().map(TextureRef::named).collect();

        Ok(LoadedAsset {
            mesh,
            textures,
            source_format: InputFormat::Obj,
        })
    }

    fn decode_file(&self, path: &Path, cancel: &CancelToken) -> Result<LoadedAsset> {
        let bytes = std::fs::read(path)?;
        let mut asset = self.decode(&bytes, cancel)?;
        asset.textures = resolve_material_libs(path, &asset.textures);
        Ok(asset)
    }
}

/// Chase `mtllib` references next to the OBJ and collect texture maps
///
/// A missing or unreadable material library is not an error; the mesh is
/// already decoded and textures are a rendering-only side artifact.
fn resolve_material_libs(obj_path: &Path, libs: &[TextureRef]) -> Vec<TextureRef> {
    let parent = obj_path.parent().unwrap_or_else(|| Path::new("."));
    let mut textures = Vec::new();

    for lib in libs {
        let mtl_path = parent.join(&lib.name);
        let Ok(contents) = std::fs::read_to_string(&mtl_path) else {
            debug!("material library {} not readable, skipping", mtl_path.display());
            continue;
        };

        for line in contents.lines() {
            let line = line.trim();
            let mut tokens = line.split_whitespace();
            let keyword = tokens.next().unwrap_or("");
            if matches!(keyword, "map_Kd" | "map_Ka" | "map_Ks" | "map_bump" | "bump") {
                if let Some(name) = tokens.last() {
                    let resolved = parent.join(name);
                    textures.push(TextureRef {
                        name: name.to_string(),
                        resolved: resolved.exists().then_some(resolved),
                    });
                }
            }
        }
    }

    textures
}
