//! Stanford PLY decoder (ASCII and binary little-endian)
//!
//! The header declares elements and their property layout; the body is
//! decoded strictly against that declaration. Positions must be declared
//! as 32-bit floats — any other layout is refused as a malformed vertex
//! buffer rather than silently converted. Face lists must be triangles.
//!
//! `comment TextureFile <name>` lines, the de-facto convention for
//! textured PLY, are collected as texture references.

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use meshport_core::{CancelToken, CanonicalMesh, Error, InputFormat, Result, Submesh};

use crate::buffer::{positions_from_bytes, POSITION_STRIDE};
use crate::traits::{LoadedAsset, MeshDecoder, TextureRef};

/// Elements between cancellation checks
const CANCEL_INTERVAL: usize = 4096;

/// Stanford PLY decoder
#[derive(Debug)]
pub struct PlyDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl ScalarType {
    fn from_name(name: &str) -> Result<Self> {
        match name {
            "char" | "int8" => Ok(ScalarType::I8),
            "uchar" | "uint8" => Ok(ScalarType::U8),
            "short" | "int16" => Ok(ScalarType::I16),
            "ushort" | "uint16" => Ok(ScalarType::U16),
            "int" | "int32" => Ok(ScalarType::I32),
            "uint" | "uint32" => Ok(ScalarType::U32),
            "float" | "float32" => Ok(ScalarType::F32),
            "double" | "float64" => Ok(ScalarType::F64),
            other => Err(Error::malformed(format!("unknown PLY type '{}'", other))),
        }
    }

    fn size(&self) -> usize {
        match self {
            ScalarType::I8 | ScalarType::U8 => 1,
            ScalarType::I16 | ScalarType::U16 => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::F64 => 8,
        }
    }

    /// Read one value as i64 (for counts and indices)
    fn read_int(&self, bytes: &[u8]) -> i64 {
        match self {
            ScalarType::I8 => bytes[0] as i8 as i64,
            ScalarType::U8 => bytes[0] as i64,
            ScalarType::I16 => LittleEndian::read_i16(bytes) as i64,
            ScalarType::U16 => LittleEndian::read_u16(bytes) as i64,
            ScalarType::I32 => LittleEndian::read_i32(bytes) as i64,
            ScalarType::U32 => LittleEndian::read_u32(bytes) as i64,
            ScalarType::F32 => LittleEndian::read_f32(bytes) as i64,
            ScalarType::F64 => LittleEndian::read_f64(bytes) as i64,
        }
    }
}

#[derive(Debug, Clone)]
enum PropertyKind {
    Scalar(ScalarType),
    List { count: ScalarType, item: ScalarType },
}

#[derive(Debug, Clone)]
struct Property {
    name: String,
    kind: PropertyKind,
}

#[derive(Debug, Clone)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<Property>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlyEncoding {
    Ascii,
    BinaryLittleEndian,
}

struct Header {
    encoding: PlyEncoding,
    elements: Vec<Element>,
    textures: Vec<TextureRef>,
    body_offset: usize,
}

impl PlyDecoder {
    fn parse_header(bytes: &[u8]) -> Result<Header> {
        // The header is ASCII up to the end_header line; everything after
        // may be binary, so offsets are tracked on the raw bytes and each
        // line is decoded individually.
        const MAX_HEADER_LEN: usize = 64 * 1024;

        let mut encoding = None;
        let mut elements: Vec<Element> = Vec::new();
        let mut textures = Vec::new();
        let mut offset = 0usize;
        let mut saw_magic = false;
        let mut saw_end = false;

        while offset < bytes.len() && offset < MAX_HEADER_LEN {
            let line_end = bytes[offset..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|p| offset + p + 1)
                .unwrap_or(bytes.len());
            let line = String::from_utf8_lossy(&bytes[offset..line_end]);
            offset = line_end;

            let line_trimmed = line.trim();
            let mut tokens = line_trimmed.split_whitespace();
            let keyword = tokens.next().unwrap_or("");

            if !saw_magic {
                if keyword == "ply" {
                    saw_magic = true;
                    continue;
                }
                return Err(Error::empty_asset("missing PLY magic line"));
            }

            match keyword {
                "format" => match tokens.next() {
                    Some("ascii") => encoding = Some(PlyEncoding::Ascii),
                    Some("binary_little_endian") => {
                        encoding = Some(PlyEncoding::BinaryLittleEndian)
                    }
                    Some(other) => {
                        return Err(Error::malformed(format!(
                            "unsupported PLY encoding '{}'",
                            other
                        )))
                    }
                    None => return Err(Error::malformed("format line missing encoding")),
                },
                "comment" | "obj_info" => {
                    let rest: Vec<&str> = tokens.collect();
                    if rest.first() == Some(&"TextureFile") {
                        if let Some(name) = rest.get(1) {
                            textures.push(TextureRef::named(*name));
                        }
                    }
                }
                "element" => {
                    let name = tokens
                        .next()
                        .ok_or_else(|| Error::malformed("element line missing name"))?;
                    let count: usize = tokens
                        .next()
                        .and_then(|c| c.parse().ok())
                        .ok_or_else(|| Error::malformed("element line missing count"))?;
                    elements.push(Element {
                        name: name.to_string(),
                        count,
                        properties: Vec::new(),
                    });
                }
                "property" => {
                    let element = elements
                        .last_mut()
                        .ok_or_else(|| Error::malformed("property before any element"))?;
                    let first = tokens
                        .next()
                        .ok_or_else(|| Error::malformed("property line missing type"))?;
                    let kind = if first == "list" {
                        let count = ScalarType::from_name(
                            tokens
                                .next()
                                .ok_or_else(|| Error::malformed("list missing count type"))?,
                        )?;
                        let item = ScalarType::from_name(
                            tokens
                                .next()
                                .ok_or_else(|| Error::malformed("list missing item type"))?,
                        )?;
                        PropertyKind::List { count, item }
                    } else {
                        PropertyKind::Scalar(ScalarType::from_name(first)?)
                    };
                    let name = tokens
                        .next()
                        .ok_or_else(|| Error::malformed("property line missing name"))?;
                    element.properties.push(Property {
                        name: name.to_string(),
                        kind,
                    });
                }
                "end_header" => {
                    saw_end = true;
                    break;
                }
                _ => {}
            }
        }

        if !saw_end {
            return Err(Error::malformed("PLY header missing end_header"));
        }
        let encoding =
            encoding.ok_or_else(|| Error::malformed("PLY header missing format line"))?;

        Ok(Header {
            encoding,
            elements,
            textures,
            body_offset: offset,
        })
    }

    /// Byte offsets of the f32 x/y/z properties within one vertex record
    ///
    /// Errors when the positions are not declared as 32-bit floats or the
    /// vertex element carries variable-length lists (no fixed stride).
    fn vertex_layout(element: &Element) -> Result<(usize, [usize; 3])> {
        let mut stride = 0usize;
        let mut offsets = [usize::MAX; 3];

        for property in &element.properties {
            match &property.kind {
                PropertyKind::Scalar(scalar) => {
                    let slot = match property.name.as_str() {
                        "x" => Some(0),
                        "y" => Some(1),
                        "z" => Some(2),
                        _ => None,
                    };
                    if let Some(slot) = slot {
                        if *scalar != ScalarType::F32 {
                            return Err(Error::malformed(format!(
                                "position property '{}' declared as {:?}, expected 32-bit float",
                                property.name, scalar
                            )));
                        }
                        offsets[slot] = stride;
                    }
                    stride += scalar.size();
                }
                PropertyKind::List { .. } => {
                    return Err(Error::malformed(format!(
                        "vertex element carries list property '{}'; no fixed stride",
                        property.name
                    )));
                }
            }
        }

        if offsets.contains(&usize::MAX) {
            return Err(Error::malformed("vertex element missing x/y/z positions"));
        }
        Ok((stride, offsets))
    }

    fn decode_ascii(header: &Header, body: &str, cancel: &CancelToken) -> Result<CanonicalMesh> {
        let mut lines = body.lines().filter(|l| !l.trim().is_empty());
        let mut vertices: Vec<[f32; 3]> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();

        for element in &header.elements {
            match element.name.as_str() {
                "vertex" => {
                    // Validates the declared f32 layout up front.
                    Self::vertex_layout(element)?;
                    let slots: Vec<Option<usize>> = element
                        .properties
                        .iter()
                        .map(|p| match p.name.as_str() {
                            "x" => Some(0),
                            "y" => Some(1),
                            "z" => Some(2),
                            _ => None,
                        })
                        .collect();

                    for i in 0..element.count {
                        if i % CANCEL_INTERVAL == 0 {
                            cancel.check()?;
                        }
                        let line = lines
                            .next()
                            .ok_or_else(|| Error::malformed("vertex data ends early"))?;
                        let mut position = [0.0f32; 3];
                        let mut tokens = line.split_whitespace();
                        for slot in &slots {
                            let token = tokens
                                .next()
                                .ok_or_else(|| Error::malformed("vertex line ends early"))?;
                            if let Some(slot) = slot {
                                position[*slot] = token.parse().map_err(|_| {
                                    Error::malformed(format!("bad position value '{}'", token))
                                })?;
                            }
                        }
                        vertices.push(position);
                    }
                }
                "face" => {
                    for i in 0..element.count {
                        if i % CANCEL_INTERVAL == 0 {
                            cancel.check()?;
                        }
                        let line = lines
                            .next()
                            .ok_or_else(|| Error::malformed("face data ends early"))?;
                        let mut tokens = line.split_whitespace();
                        let count: usize = tokens
                            .next()
                            .and_then(|c| c.parse().ok())
                            .ok_or_else(|| Error::malformed("face line missing list count"))?;
                        if count != 3 {
                            return Err(Error::UnsupportedPrimitiveType {
                                found: format!("{}-vertex face", count),
                            });
                        }
                        for _ in 0..3 {
                            let token = tokens
                                .next()
                                .ok_or_else(|| Error::malformed("face line ends early"))?;
                            let index: i64 = token.parse().map_err(|_| {
                                Error::malformed(format!("bad face index '{}'", token))
                            })?;
                            if index < 0 {
                                return Err(Error::malformed("negative face index"));
                            }
                            indices.push(index as u32);
                        }
                    }
                }
                _ => {
                    // Unknown element: skip its lines.
                    for _ in 0..element.count {
                        lines.next();
                    }
                }
            }
        }

        Self::assemble(vertices, indices)
    }

    fn decode_binary(header: &Header, body: &[u8], cancel: &CancelToken) -> Result<CanonicalMesh> {
        let mut cursor = 0usize;
        let mut vertices: Vec<[f32; 3]> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();

        let take = |cursor: &mut usize, len: usize| -> Result<usize> {
            let start = *cursor;
            let end = start
                .checked_add(len)
                .filter(|&end| end <= body.len())
                .ok_or_else(|| Error::malformed("binary PLY data ends early"))?;
            *cursor = end;
            Ok(start)
        };

        for element in &header.elements {
            match element.name.as_str() {
                "vertex" => {
                    let (stride, offsets) = Self::vertex_layout(element)?;
                    let start = take(&mut cursor, stride * element.count)?;
                    let records = &body[start..start + stride * element.count];

                    if stride == POSITION_STRIDE && offsets == [0, 4, 8] {
                        // Pure position layout: the element region is
                        // exactly the packed stride-12 buffer.
                        vertices = positions_from_bytes(records)?;
                        cancel.check()?;
                    } else {
                        for (i, record) in records.chunks_exact(stride).enumerate() {
                            if i % CANCEL_INTERVAL == 0 {
                                cancel.check()?;
                            }
                            vertices.push([
                                LittleEndian::read_f32(&record[offsets[0]..]),
                                LittleEndian::read_f32(&record[offsets[1]..]),
                                LittleEndian::read_f32(&record[offsets[2]..]),
                            ]);
                        }
                    }
                }
                "face" => {
                    for i in 0..element.count {
                        if i % CANCEL_INTERVAL == 0 {
                            cancel.check()?;
                        }
                        for property in &element.properties {
                            match &property.kind {
                                PropertyKind::List { count, item } => {
                                    let at = take(&mut cursor, count.size())?;
                                    let n = count.read_int(&body[at..]);
                                    let at = take(&mut cursor, item.size() * n.max(0) as usize)?;
                                    if property.name == "vertex_indices"
                                        || property.name == "vertex_index"
                                    {
                                        if n != 3 {
                                            return Err(Error::UnsupportedPrimitiveType {
                                                found: format!("{}-vertex face", n),
                                            });
                                        }
                                        for k in 0..3 {
                                            let index = item
                                                .read_int(&body[at + k * item.size()..]);
                                            if index < 0 {
                                                return Err(Error::malformed(
                                                    "negative face index",
                                                ));
                                            }
                                            indices.push(index as u32);
                                        }
                                    }
                                }
                                PropertyKind::Scalar(scalar) => {
                                    take(&mut cursor, scalar.size())?;
                                }
                            }
                        }
                    }
                }
                _ => {
                    // Unknown element: walk its properties to skip it.
                    for _ in 0..element.count {
                        for property in &element.properties {
                            match &property.kind {
                                PropertyKind::Scalar(scalar) => {
                                    take(&mut cursor, scalar.size())?;
                                }
                                PropertyKind::List { count, item } => {
                                    let at = take(&mut cursor, count.size())?;
                                    let n = count.read_int(&body[at..]).max(0) as usize;
                                    take(&mut cursor, item.size() * n)?;
                                }
                            }
                        }
                    }
                }
            }
        }

        Self::assemble(vertices, indices)
    }

    fn assemble(vertices: Vec<[f32; 3]>, indices: Vec<u32>) -> Result<CanonicalMesh> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(Error::empty_asset("PLY source contains no triangle mesh"));
        }
        CanonicalMesh::new(vertices, vec![Submesh::new(indices)])
    }
}

impl MeshDecoder for PlyDecoder {
    fn format(&self) -> InputFormat {
        InputFormat::Ply
    }

    fn name(&self) -> &str {
        "Stanford PLY Decoder"
    }

    fn decode(&self, bytes: &[u8], cancel: &CancelToken) -> Result<LoadedAsset> {
        if bytes.is_empty() {
            return Err(Error::empty_asset("PLY source is empty"));
        }

        let header = Self::parse_header(bytes)?;
        debug!(
            encoding = ?header.encoding,
            elements = header.elements.len(),
            "decoding PLY"
        );

        let body = &bytes[header.body_offset..];
        let mesh = match header.encoding {
            PlyEncoding::Ascii => {
                Self::decode_ascii(&header, &String::from_utf8_lossy(body), cancel)?
            }
            PlyEncoding::BinaryLittleEndian => Self::decode_binary(&header, body, cancel)?,
        };

        Ok(LoadedAsset {
            mesh,
            textures: header.textures,
            source_format: InputFormat::Ply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshport_core::ErrorKind;

    const ASCII_TRIANGLE: &str = "\
ply
format ascii 1.0
comment TextureFile skin.png
element vertex 3
property float x
property float y
property float z
element face 1
property list uchar int vertex_indices
end_header
0 0 0
1 0 0
0 1 0
3 0 1 2
";

    #[test]
    fn test_decode_ascii_triangle() {
        let asset = PlyDecoder
            .decode(ASCII_TRIANGLE.as_bytes(), &CancelToken::new())
            .unwrap();
        assert_eq!(asset.mesh.vertex_count(), 3);
        assert_eq!(asset.mesh.triangle_count(), 1);
        assert_eq!(asset.textures, vec![TextureRef::named("skin.png")]);
    }

    fn binary_ply(vertices: &[[f32; 3]], faces: &[[u32; 3]]) -> Vec<u8> {
        let mut bytes = format!(
            "ply\nformat binary_little_endian 1.0\nelement vertex {}\nproperty float x\nproperty float y\nproperty float z\nelement face {}\nproperty list uchar uint vertex_indices\nend_header\n",
            vertices.len(),
            faces.len()
        )
        .into_bytes();
        for vertex in vertices {
            for component in vertex {
                bytes.extend_from_slice(&component.to_le_bytes());
            }
        }
        for face in faces {
            bytes.push(3);
            for index in face {
                bytes.extend_from_slice(&index.to_le_bytes());
            }
        }
        bytes
    }

    #[test]
    fn test_decode_binary_little_endian() {
        let bytes = binary_ply(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
            &[[0, 1, 2], [1, 3, 2]],
        );
        let asset = PlyDecoder.decode(&bytes, &CancelToken::new()).unwrap();
        assert_eq!(asset.mesh.vertex_count(), 4);
        assert_eq!(asset.mesh.triangle_count(), 2);
    }

    #[test]
    fn test_double_positions_rejected() {
        let ply = "\
ply
format ascii 1.0
element vertex 1
property double x
property double y
property double z
element face 1
property list uchar int vertex_indices
end_header
0 0 0
3 0 0 0
";
        let err = PlyDecoder
            .decode(ply.as_bytes(), &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedVertexBuffer);
    }

    #[test]
    fn test_quad_face_rejected() {
        let ply = "\
ply
format ascii 1.0
element vertex 4
property float x
property float y
property float z
element face 1
property list uchar int vertex_indices
end_header
0 0 0
1 0 0
1 1 0
0 1 0
4 0 1 2 3
";
        let err = PlyDecoder
            .decode(ply.as_bytes(), &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPrimitiveType);
    }

    #[test]
    fn test_garbage_is_empty_asset() {
        let err = PlyDecoder
            .decode(b"not a ply at all", &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyAsset);
    }

    #[test]
    fn test_truncated_binary_is_malformed() {
        let mut bytes = binary_ply(&[[0.0; 3]; 3], &[[0, 1, 2]]);
        bytes.truncate(bytes.len() - 5);
        let err = PlyDecoder.decode(&bytes, &CancelToken::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedVertexBuffer);
    }

    #[test]
    fn test_out_of_range_index_fails_validation() {
        let bytes = binary_ply(&[[0.0; 3]; 3], &[[0, 1, 7]]);
        let err = PlyDecoder.decode(&bytes, &CancelToken::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MeshValidationFailure);
    }
}
