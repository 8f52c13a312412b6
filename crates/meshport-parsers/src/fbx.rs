//! Autodesk FBX decoder (binary container)
//!
//! Binary FBX is a tree of length-prefixed node records. The decoder
//! walks the tree iteratively with an explicit stack (asset node trees
//! can nest arbitrarily deep), pulls the first `Geometry` node's
//! `Vertices` and `PolygonVertexIndex` arrays, and collects
//! `RelativeFilename` entries from `Texture` nodes as texture
//! references. Array properties may be zlib-compressed.
//!
//! ASCII FBX carries no parseable node records and surfaces as an empty
//! asset. Polygons are delimited by a negative final index; any polygon
//! that is not a triangle is rejected.

use std::io::Read;

use byteorder::{ByteOrder, LittleEndian};
use flate2::read::ZlibDecoder;
use tracing::debug;

use meshport_core::{CancelToken, CanonicalMesh, Error, InputFormat, Result, Submesh};

use crate::traits::{LoadedAsset, MeshDecoder, TextureRef};

/// Magic prefix of every binary FBX stream
const FBX_MAGIC: &[u8] = b"Kaydara FBX Binary  \x00\x1a\x00";

/// Header length: magic + u32 version
const FBX_HEADER_LEN: usize = 27;

/// Version at which node headers widen from u32 to u64 fields
const FBX_WIDE_VERSION: u32 = 7500;

/// Array elements between cancellation checks
const CANCEL_INTERVAL: usize = 65536;

/// Autodesk FBX decoder
#[derive(Debug)]
pub struct FbxDecoder;

/// One parsed node record header
struct NodeRecord<'a> {
    /// Absolute offset one past this node's subtree
    end: usize,
    /// Property payload
    props: &'a [u8],
    /// First child offset (== `end` when the node has no children)
    children_start: usize,
    name: &'a str,
}

impl FbxDecoder {
    fn read_node<'a>(data: &'a [u8], offset: usize, wide: bool) -> Result<Option<NodeRecord<'a>>> {
        let header_len = if wide { 8 * 3 + 1 } else { 4 * 3 + 1 };
        if offset + header_len > data.len() {
            return Err(Error::malformed("FBX node record ends early"));
        }

        let (end, _num_props, prop_len, name_len) = if wide {
            (
                LittleEndian::read_u64(&data[offset..]) as usize,
                LittleEndian::read_u64(&data[offset + 8..]) as usize,
                LittleEndian::read_u64(&data[offset + 16..]) as usize,
                data[offset + 24] as usize,
            )
        } else {
            (
                LittleEndian::read_u32(&data[offset..]) as usize,
                LittleEndian::read_u32(&data[offset + 4..]) as usize,
                LittleEndian::read_u32(&data[offset + 8..]) as usize,
                data[offset + 12] as usize,
            )
        };

        // A zeroed record terminates a child list.
        if end == 0 {
            return Ok(None);
        }

        let name_start = offset + header_len;
        let props_start = name_start + name_len;
        let children_start = props_start + prop_len;
        if end > data.len() || children_start > end {
            return Err(Error::malformed("FBX node record overruns the stream"));
        }

        let name = std::str::from_utf8(&data[name_start..props_start])
            .map_err(|_| Error::malformed("FBX node name is not UTF-8"))?;

        Ok(Some(NodeRecord {
            end,
            props: &data[props_start..children_start],
            children_start,
            name,
        }))
    }

    /// Decode the first array property of a node into f64 values
    fn read_f64_array(props: &[u8]) -> Result<Vec<f64>> {
        let (code, payload) = Self::read_array_payload(props)?;
        match code {
            b'd' => Ok(payload
                .chunks_exact(8)
                .map(LittleEndian::read_f64)
                .collect()),
            b'f' => Ok(payload
                .chunks_exact(4)
                .map(|c| LittleEndian::read_f32(c) as f64)
                .collect()),
            other => Err(Error::malformed(format!(
                "expected float array property, found type '{}'",
                other as char
            ))),
        }
    }

    /// Decode the first array property of a node into i64 values
    fn read_int_array(props: &[u8]) -> Result<Vec<i64>> {
        let (code, payload) = Self::read_array_payload(props)?;
        match code {
            b'i' => Ok(payload
                .chunks_exact(4)
                .map(|c| LittleEndian::read_i32(c) as i64)
                .collect()),
            b'l' => Ok(payload
                .chunks_exact(8)
                .map(LittleEndian::read_i64)
                .collect()),
            other => Err(Error::malformed(format!(
                "expected integer array property, found type '{}'",
                other as char
            ))),
        }
    }

    /// Split an array property into its type code and raw payload,
    /// inflating zlib-compressed arrays
    fn read_array_payload(props: &[u8]) -> Result<(u8, Vec<u8>)> {
        if props.len() < 13 {
            return Err(Error::malformed("FBX array property ends early"));
        }
        let code = props[0];
        let elem_size = match code {
            b'f' | b'i' => 4,
            b'd' | b'l' => 8,
            b'b' => 1,
            other => {
                return Err(Error::malformed(format!(
                    "FBX property type '{}' is not an array",
                    other as char
                )))
            }
        };
        let len = LittleEndian::read_u32(&props[1..]) as usize;
        let encoding = LittleEndian::read_u32(&props[5..]);
        let compressed_len = LittleEndian::read_u32(&props[9..]) as usize;

        let payload = match encoding {
            0 => {
                let total = len
                    .checked_mul(elem_size)
                    .filter(|&t| 13 + t <= props.len())
                    .ok_or_else(|| Error::malformed("FBX array overruns its record"))?;
                props[13..13 + total].to_vec()
            }
            1 => {
                if 13 + compressed_len > props.len() {
                    return Err(Error::malformed("FBX compressed array overruns its record"));
                }
                let mut inflated = Vec::with_capacity(len * elem_size);
                ZlibDecoder::new(&props[13..13 + compressed_len])
                    .read_to_end(&mut inflated)
                    .map_err(|e| Error::malformed(format!("FBX zlib inflate failed: {}", e)))?;
                if inflated.len() != len * elem_size {
                    return Err(Error::malformed(format!(
                        "FBX array inflated to {} bytes, expected {}",
                        inflated.len(),
                        len * elem_size
                    )));
                }
                inflated
            }
            other => {
                return Err(Error::malformed(format!(
                    "unknown FBX array encoding {}",
                    other
                )))
            }
        };

        Ok((code, payload))
    }

    /// Read the first string property of a node
    fn read_string_prop(props: &[u8]) -> Result<String> {
        if props.len() < 5 || props[0] != b'S' {
            return Err(Error::malformed("expected FBX string property"));
        }
        let len = LittleEndian::read_u32(&props[1..]) as usize;
        if 5 + len > props.len() {
            return Err(Error::malformed("FBX string property ends early"));
        }
        Ok(String::from_utf8_lossy(&props[5..5 + len]).into_owned())
    }

    /// Turn polygon indices (negative value ends a polygon) into a
    /// triangle list
    fn triangulate(polygon_indices: &[i64]) -> Result<Vec<u32>> {
        let mut indices = Vec::with_capacity(polygon_indices.len());
        let mut polygon: Vec<u32> = Vec::with_capacity(4);

        for &raw in polygon_indices {
            let (value, last) = if raw < 0 { (!raw, true) } else { (raw, false) };
            if value < 0 || value > u32::MAX as i64 {
                return Err(Error::malformed(format!("FBX polygon index {} out of range", raw)));
            }
            polygon.push(value as u32);

            if last {
                if polygon.len() != 3 {
                    return Err(Error::UnsupportedPrimitiveType {
                        found: format!("{}-gon polygon", polygon.len()),
                    });
                }
                indices.extend_from_slice(&polygon);
                polygon.clear();
            }
        }

        if !polygon.is_empty() {
            return Err(Error::malformed("FBX polygon list ends mid-polygon"));
        }
        Ok(indices)
    }
}

impl MeshDecoder for FbxDecoder {
    fn format(&self) -> InputFormat {
        InputFormat::Fbx
    }

    fn name(&self) -> &str {
        "Autodesk FBX Decoder"
    }

    fn decode(&self, bytes: &[u8], cancel: &CancelToken) -> Result<LoadedAsset> {
        if bytes.len() < FBX_HEADER_LEN || !bytes.starts_with(FBX_MAGIC) {
            return Err(Error::empty_asset(
                "no binary FBX stream found (ASCII FBX is not supported)",
            ));
        }
        let version = LittleEndian::read_u32(&bytes[FBX_MAGIC.len()..]);
        let wide = version >= FBX_WIDE_VERSION;
        debug!(version, "decoding binary FBX");

        let mut raw_vertices: Option<Vec<f64>> = None;
        let mut raw_polygons: Option<Vec<i64>> = None;
        let mut textures: Vec<TextureRef> = Vec::new();
        let mut geometry_done = false;

        // Iterative traversal: the stack holds (subtree_end, node_name)
        // for every ancestor we descended into.
        let mut stack: Vec<(usize, String)> = Vec::new();
        let mut offset = FBX_HEADER_LEN;

        while offset < bytes.len() {
            cancel.check()?;

            while stack.last().is_some_and(|(end, _)| *end == offset) {
                let (_, name) = stack.pop().unwrap_or_default();
                if name == "Geometry" && !geometry_done {
                    // The first geometry is consumed here: complete means
                    // done, incomplete means unusable — discard it and
                    // keep looking for the first usable mesh.
                    if raw_vertices.is_some() && raw_polygons.is_some() {
                        geometry_done = true;
                    } else {
                        raw_vertices = None;
                        raw_polygons = None;
                    }
                }
            }

            let Some(node) = Self::read_node(bytes, offset, wide)? else {
                // Null terminator record; also ends the top-level list.
                offset += if wide { 25 } else { 13 };
                if stack.is_empty() {
                    break;
                }
                continue;
            };

            let in_geometry = stack.iter().any(|(_, name)| name == "Geometry");
            let in_texture = stack.iter().any(|(_, name)| name == "Texture");

            match node.name {
                "Objects" => {
                    stack.push((node.end, node.name.to_string()));
                    offset = node.children_start;
                }
                "Geometry" if !geometry_done => {
                    stack.push((node.end, node.name.to_string()));
                    offset = node.children_start;
                }
                "Vertices" if in_geometry && raw_vertices.is_none() => {
                    raw_vertices = Some(Self::read_f64_array(node.props)?);
                    offset = node.end;
                }
                "PolygonVertexIndex" if in_geometry && raw_polygons.is_none() => {
                    raw_polygons = Some(Self::read_int_array(node.props)?);
                    offset = node.end;
                }
                "Texture" => {
                    stack.push((node.end, node.name.to_string()));
                    offset = node.children_start;
                }
                "RelativeFilename" | "FileName" if in_texture => {
                    if let Ok(name) = Self::read_string_prop(node.props) {
                        if !name.is_empty() {
                            textures.push(TextureRef::named(name));
                        }
                    }
                    offset = node.end;
                }
                _ => {
                    offset = node.end;
                }
            }
        }

        let (raw_vertices, raw_polygons) = match (raw_vertices, raw_polygons) {
            (Some(v), Some(p)) => (v, p),
            _ => {
                return Err(Error::empty_asset(
                    "FBX stream contains no geometry with vertices and polygons",
                ))
            }
        };

        if raw_vertices.len() % 3 != 0 {
            return Err(Error::malformed(format!(
                "FBX vertex array length {} is not a multiple of 3",
                raw_vertices.len()
            )));
        }

        let mut vertices = Vec::with_capacity(raw_vertices.len() / 3);
        for (i, triple) in raw_vertices.chunks_exact(3).enumerate() {
            if i % CANCEL_INTERVAL == 0 {
                cancel.check()?;
            }
            vertices.push([triple[0] as f32, triple[1] as f32, triple[2] as f32]);
        }

        let indices = Self::triangulate(&raw_polygons)?;
        if indices.is_empty() {
            return Err(Error::empty_asset("FBX geometry has no polygons"));
        }

        let mesh = CanonicalMesh::new(vertices, vec![Submesh::new(indices)])?;
        Ok(LoadedAsset {
            mesh,
            textures,
            source_format: InputFormat::Fbx,
        })
    }
}
