//! STL decoder (binary and ASCII)
//!
//! Binary STL: 80-byte header, u32 triangle count, then 50 bytes per
//! triangle (normal, three vertices, attribute word). ASCII STL: `solid`
//! / `facet` / `outer loop` / `vertex` keywords. A leading `solid` token
//! does not prove ASCII — some binary exporters write it — so the
//! triangle-count arithmetic decides.
//!
//! STL stores no connectivity, so exact-duplicate vertices are merged
//! while decoding; without that, shared corners could not survive a
//! round trip through this format.

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use meshport_core::{CancelToken, CanonicalMesh, Error, InputFormat, Result, Submesh};

use crate::buffer::positions_from_bytes;
use crate::traits::{LoadedAsset, MeshDecoder};

/// Binary layout constants
const HEADER_LEN: usize = 80;
const COUNT_LEN: usize = 4;
const TRIANGLE_LEN: usize = 50;

/// Triangles between cancellation checks
const CANCEL_INTERVAL: usize = 1024;

/// STL decoder
#[derive(Debug)]
pub struct StlDecoder;

/// Merges positionally identical vertices, keyed by their bit patterns
#[derive(Default)]
struct VertexMerger {
    vertices: Vec<[f32; 3]>,
    seen: HashMap<[u32; 3], u32>,
}

impl VertexMerger {
    fn push(&mut self, position: [f32; 3]) -> u32 {
        let key = [
            position[0].to_bits(),
            position[1].to_bits(),
            position[2].to_bits(),
        ];
        if let Some(&index) = self.seen.get(&key) {
            return index;
        }
        let index = self.vertices.len() as u32;
        self.vertices.push(position);
        self.seen.insert(key, index);
        index
    }
}

impl StlDecoder {
    /// True when the byte length matches the binary triangle arithmetic
    fn looks_binary(bytes: &[u8]) -> bool {
        if bytes.len() < HEADER_LEN + COUNT_LEN {
            return false;
        }
        let count = LittleEndian::read_u32(&bytes[HEADER_LEN..HEADER_LEN + COUNT_LEN]) as usize;
        bytes.len() == HEADER_LEN + COUNT_LEN + count * TRIANGLE_LEN
    }

    fn decode_binary(bytes: &[u8], cancel: &CancelToken) -> Result<CanonicalMesh> {
        let count = LittleEndian::read_u32(&bytes[HEADER_LEN..HEADER_LEN + COUNT_LEN]) as usize;
        if count == 0 {
            return Err(Error::empty_asset("binary STL declares zero triangles"));
        }
        debug!(triangles = count, "decoding binary STL");

        let mut merger = VertexMerger::default();
        let mut indices = Vec::with_capacity(count * 3);

        let body = &bytes[HEADER_LEN + COUNT_LEN..];
        for (i, record) in body.chunks_exact(TRIANGLE_LEN).enumerate() {
            if i % CANCEL_INTERVAL == 0 {
                cancel.check()?;
            }
            // Skip the 12-byte facet normal; positions follow as a
            // packed 36-byte run of three vertices.
            let positions = positions_from_bytes(&record[12..48])?;
            for position in positions {
                indices.push(merger.push(position));
            }
        }

        CanonicalMesh::new(merger.vertices, vec![Submesh::new(indices)])
    }

    fn decode_ascii(bytes: &[u8], cancel: &CancelToken) -> Result<CanonicalMesh> {
        let text = String::from_utf8_lossy(bytes);

        let mut merger = VertexMerger::default();
        let mut indices = Vec::new();
        let mut facet_vertices: Vec<[f32; 3]> = Vec::new();
        let mut in_loop = false;

        for (line_no, line) in text.lines().enumerate() {
            if line_no % CANCEL_INTERVAL == 0 {
                cancel.check()?;
            }

            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("outer") => {
                    in_loop = true;
                    facet_vertices.clear();
                }
                Some("vertex") if in_loop => {
                    let mut position = [0.0f32; 3];
                    for component in position.iter_mut() {
                        let token = tokens
                            .next()
                            .ok_or_else(|| Error::malformed("vertex line missing component"))?;
                        *component = token.parse().map_err(|_| {
                            Error::malformed(format!("bad vertex component '{}'", token))
                        })?;
                    }
                    facet_vertices.push(position);
                }
                Some("endloop") => {
                    in_loop = false;
                    if facet_vertices.len() != 3 {
                        return Err(Error::UnsupportedPrimitiveType {
                            found: format!("{}-vertex facet", facet_vertices.len()),
                        });
                    }
                    for &position in &facet_vertices {
                        indices.push(merger.push(position));
                    }
                }
                _ => {}
            }
        }

        if indices.is_empty() {
            return Err(Error::empty_asset("ASCII STL contains no facets"));
        }
        CanonicalMesh::new(merger.vertices, vec![Submesh::new(indices)])
    }
}

impl MeshDecoder for StlDecoder {
    fn format(&self) -> InputFormat {
        InputFormat::Stl
    }

    fn name(&self) -> &str {
        "STL Decoder"
    }

    fn decode(&self, bytes: &[u8], cancel: &CancelToken) -> Result<LoadedAsset> {
        if bytes.is_empty() {
            return Err(Error::empty_asset("STL source is empty"));
        }

        let mesh = if Self::looks_binary(bytes) {
            Self::decode_binary(bytes, cancel)?
        } else if bytes.trim_ascii_start().starts_with(b"solid") {
            Self::decode_ascii(bytes, cancel)?
        } else {
            return Err(Error::malformed(
                "STL is neither a consistent binary stream nor an ASCII solid",
            ));
        };

        Ok(LoadedAsset::bare(mesh, InputFormat::Stl))
    }
}
