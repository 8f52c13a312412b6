//! USDZ decoder (USD zip package)
//!
//! A USDZ file is a zip archive (by convention uncompressed, but deflate
//! entries are handled) holding USD layers and texture images. The
//! decoder walks the central directory, extracts the first `.usda` text
//! layer, and reads the first `def Mesh` prim's `points`,
//! `faceVertexCounts` and `faceVertexIndices` attributes. Image entries
//! in the package are collected as texture references.
//!
//! Packages that carry only binary `.usdc` crate layers yield an empty
//! asset: the crate format is out of scope, and pretending otherwise
//! would mean guessing at geometry.

use std::io::Read;

use byteorder::{ByteOrder, LittleEndian};
use flate2::read::DeflateDecoder;
use tracing::debug;

use meshport_core::{CancelToken, CanonicalMesh, Error, InputFormat, Result, Submesh};

use crate::traits::{LoadedAsset, MeshDecoder, TextureRef};

/// Zip signatures
const EOCD_SIG: u32 = 0x0605_4b50;
const CENTRAL_SIG: u32 = 0x0201_4b50;
const LOCAL_SIG: u32 = 0x0403_4b50;

/// Values between cancellation checks while parsing attribute arrays
const CANCEL_INTERVAL: usize = 16384;

/// Image extensions collected as texture references
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "exr", "tif"];

/// USDZ decoder
#[derive(Debug)]
pub struct UsdzDecoder;

/// One central-directory entry
struct ZipEntry {
    name: String,
    method: u16,
    compressed_size: usize,
    local_offset: usize,
}

impl UsdzDecoder {
    /// Parse the central directory of a zip archive
    fn zip_entries(bytes: &[u8]) -> Result<Vec<ZipEntry>> {
        // The end-of-central-directory record sits in the trailing 64 KiB
        // (comment length is 16-bit); scan backwards for its signature.
        if bytes.len() < 22 {
            return Err(Error::empty_asset("not a usd package (too short for zip)"));
        }
        let scan_start = bytes.len().saturating_sub(22 + u16::MAX as usize);
        let eocd = (scan_start..=bytes.len() - 22)
            .rev()
            .find(|&i| LittleEndian::read_u32(&bytes[i..]) == EOCD_SIG)
            .ok_or_else(|| Error::empty_asset("not a usd package (no zip directory)"))?;

        let entry_count = LittleEndian::read_u16(&bytes[eocd + 10..]) as usize;
        let cd_offset = LittleEndian::read_u32(&bytes[eocd + 16..]) as usize;

        let mut entries = Vec::with_capacity(entry_count);
        let mut cursor = cd_offset;
        for _ in 0..entry_count {
            if cursor + 46 > bytes.len() || LittleEndian::read_u32(&bytes[cursor..]) != CENTRAL_SIG
            {
                return Err(Error::malformed("zip central directory is corrupt"));
            }
            let method = LittleEndian::read_u16(&bytes[cursor + 10..]);
            let compressed_size = LittleEndian::read_u32(&bytes[cursor + 20..]) as usize;
            let name_len = LittleEndian::read_u16(&bytes[cursor + 28..]) as usize;
            let extra_len = LittleEndian::read_u16(&bytes[cursor + 30..]) as usize;
            let comment_len = LittleEndian::read_u16(&bytes[cursor + 32..]) as usize;
            let local_offset = LittleEndian::read_u32(&bytes[cursor + 42..]) as usize;

            if cursor + 46 + name_len > bytes.len() {
                return Err(Error::malformed("zip entry name overruns the archive"));
            }
            let name =
                String::from_utf8_lossy(&bytes[cursor + 46..cursor + 46 + name_len]).into_owned();

            entries.push(ZipEntry {
                name,
                method,
                compressed_size,
                local_offset,
            });
            cursor += 46 + name_len + extra_len + comment_len;
        }
        Ok(entries)
    }

    /// Extract one entry's payload
    fn extract(bytes: &[u8], entry: &ZipEntry) -> Result<Vec<u8>> {
        let at = entry.local_offset;
        if at + 30 > bytes.len() || LittleEndian::read_u32(&bytes[at..]) != LOCAL_SIG {
            return Err(Error::malformed("zip local header is corrupt"));
        }
        let name_len = LittleEndian::read_u16(&bytes[at + 26..]) as usize;
        let extra_len = LittleEndian::read_u16(&bytes[at + 28..]) as usize;
        let data_start = at + 30 + name_len + extra_len;
        let data_end = data_start + entry.compressed_size;
        if data_end > bytes.len() {
            return Err(Error::malformed("zip entry data overruns the archive"));
        }
        let data = &bytes[data_start..data_end];

        match entry.method {
            0 => Ok(data.to_vec()),
            8 => {
                let mut inflated = Vec::new();
                DeflateDecoder::new(data)
                    .read_to_end(&mut inflated)
                    .map_err(|e| Error::malformed(format!("zip inflate failed: {}", e)))?;
                Ok(inflated)
            }
            other => Err(Error::malformed(format!(
                "zip compression method {} not supported",
                other
            ))),
        }
    }

    /// Slice the first `def Mesh` block out of a usda layer
    ///
    /// Brace matching is done iteratively; USD scene graphs can nest
    /// prims arbitrarily deep.
    fn first_mesh_block(text: &str) -> Option<&str> {
        let def_at = text.find("def Mesh")?;
        let open_at = def_at + text[def_at..].find('{')?;

        let mut depth = 0usize;
        for (i, byte) in text.as_bytes().iter().enumerate().skip(open_at) {
            match byte {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[open_at + 1..i]);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Extract the bracketed payload of `<name> = [ ... ]`
    fn attribute_payload<'a>(block: &'a str, name: &str) -> Option<&'a str> {
        let needle = format!("{} = [", name);
        let at = block.find(&needle)?;
        let start = at + needle.len();
        let end = start + block[start..].find(']')?;
        Some(&block[start..end])
    }

    fn parse_points(payload: &str, cancel: &CancelToken) -> Result<Vec<[f32; 3]>> {
        let mut points = Vec::new();
        for (i, tuple) in payload.split('(').skip(1).enumerate() {
            if i % CANCEL_INTERVAL == 0 {
                cancel.check()?;
            }
            let tuple = tuple
                .split(')')
                .next()
                .ok_or_else(|| Error::malformed("unterminated point tuple in usda layer"))?;
            let components: Vec<&str> = tuple.split(',').map(str::trim).collect();
            if components.len() != 3 {
                return Err(Error::malformed(format!(
                    "point tuple has {} components, expected 3",
                    components.len()
                )));
            }
            let mut point = [0.0f32; 3];
            for (slot, component) in point.iter_mut().zip(&components) {
                *slot = component
                    .parse()
                    .map_err(|_| Error::malformed(format!("bad point value '{}'", component)))?;
            }
            points.push(point);
        }
        Ok(points)
    }

    fn parse_ints(payload: &str, cancel: &CancelToken) -> Result<Vec<i64>> {
        let mut values = Vec::new();
        for (i, token) in payload
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .enumerate()
        {
            if i % CANCEL_INTERVAL == 0 {
                cancel.check()?;
            }
            values.push(
                token
                    .parse()
                    .map_err(|_| Error::malformed(format!("bad integer '{}'", token)))?,
            );
        }
        Ok(values)
    }

    fn decode_usda(text: &str, cancel: &CancelToken) -> Result<CanonicalMesh> {
        let block = Self::first_mesh_block(text)
            .ok_or_else(|| Error::empty_asset("usda layer contains no Mesh prim"))?;

        let points_payload = Self::attribute_payload(block, "points")
            .ok_or_else(|| Error::empty_asset("Mesh prim has no points attribute"))?;
        let counts_payload = Self::attribute_payload(block, "faceVertexCounts")
            .ok_or_else(|| Error::empty_asset("Mesh prim has no faceVertexCounts attribute"))?;
        let indices_payload = Self::attribute_payload(block, "faceVertexIndices")
            .ok_or_else(|| Error::empty_asset("Mesh prim has no faceVertexIndices attribute"))?;

        let vertices = Self::parse_points(points_payload, cancel)?;
        let counts = Self::parse_ints(counts_payload, cancel)?;
        let raw_indices = Self::parse_ints(indices_payload, cancel)?;

        if counts.is_empty() {
            return Err(Error::empty_asset("Mesh prim has no faces"));
        }
        if let Some(&bad) = counts.iter().find(|&&c| c != 3) {
            return Err(Error::UnsupportedPrimitiveType {
                found: format!("{}-vertex face", bad),
            });
        }
        if raw_indices.len() != counts.len() * 3 {
            return Err(Error::malformed(format!(
                "faceVertexIndices has {} values, {} faces declare {}",
                raw_indices.len(),
                counts.len(),
                counts.len() * 3
            )));
        }

        let mut indices = Vec::with_capacity(raw_indices.len());
        for raw in raw_indices {
            if raw < 0 || raw > u32::MAX as i64 {
                return Err(Error::malformed(format!("face index {} out of range", raw)));
            }
            indices.push(raw as u32);
        }

        CanonicalMesh::new(vertices, vec![Submesh::new(indices)])
    }

    fn is_image_entry(name: &str) -> bool {
        name.rsplit('.')
            .next()
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }
}

impl MeshDecoder for UsdzDecoder {
    fn format(&self) -> InputFormat {
        InputFormat::Usdz
    }

    fn name(&self) -> &str {
        "USD Package Decoder"
    }

    fn decode(&self, bytes: &[u8], cancel: &CancelToken) -> Result<LoadedAsset> {
        if bytes.is_empty() {
            return Err(Error::empty_asset("usd package is empty"));
        }

        let entries = Self::zip_entries(bytes)?;
        debug!(entries = entries.len(), "scanning usd package");

        let textures: Vec<TextureRef> = entries
            .iter()
            .filter(|e| Self::is_image_entry(&e.name))
            .map(|e| TextureRef::named(e.name.rsplit('/').next().unwrap_or(e.name.as_str())))
            .collect();

        // First text layer wins; a bare .usd entry counts when its
        // payload is the usda text form.
        let mut saw_binary_layer = false;
        for entry in &entries {
            cancel.check()?;
            let lower = entry.name.to_ascii_lowercase();
            if lower.ends_with(".usda") || lower.ends_with(".usd") {
                let payload = Self::extract(bytes, entry)?;
                if lower.ends_with(".usd") && !payload.starts_with(b"#usda") {
                    saw_binary_layer = true;
                    continue;
                }
                let text = String::from_utf8_lossy(&payload);
                let mesh = Self::decode_usda(&text, cancel)?;
                return Ok(LoadedAsset {
                    mesh,
                    textures,
                    source_format: InputFormat::Usdz,
                });
            }
            if lower.ends_with(".usdc") {
                saw_binary_layer = true;
            }
        }

        if saw_binary_layer {
            Err(Error::empty_asset(
                "usd package carries only binary usdc layers, which are not supported",
            ))
        } else {
            Err(Error::empty_asset("usd package contains no usd layer"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshport_core::ErrorKind;

    /// Build a stored-entry zip archive from (name, payload) pairs
    fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut data = Vec::new();
        let mut central = Vec::new();
        let mut offsets = Vec::new();

        for (name, payload) in entries {
            offsets.push(data.len());
            data.extend_from_slice(&LOCAL_SIG.to_le_bytes());
            data.extend_from_slice(&[0u8; 2]); // version needed
            data.extend_from_slice(&[0u8; 2]); // flags
            data.extend_from_slice(&0u16.to_le_bytes()); // method: stored
            data.extend_from_slice(&[0u8; 8]); // time, date, crc
            data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            data.extend_from_slice(&(name.len() as u16).to_le_bytes());
            data.extend_from_slice(&0u16.to_le_bytes()); // extra len
            data.extend_from_slice(name.as_bytes());
            data.extend_from_slice(payload);
        }

        let cd_offset = data.len();
        for ((name, payload), offset) in entries.iter().zip(&offsets) {
            central.extend_from_slice(&CENTRAL_SIG.to_le_bytes());
            central.extend_from_slice(&[0u8; 6]); // versions, flags
            central.extend_from_slice(&0u16.to_le_bytes()); // method
            central.extend_from_slice(&[0u8; 8]); // time, date, crc
            central.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            central.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            central.extend_from_slice(&(name.len() as u16).to_le_bytes());
            central.extend_from_slice(&[0u8; 6]); // extra, comment, disk
            central.extend_from_slice(&[0u8; 6]); // attrs
            central.extend_from_slice(&(*offset as u32).to_le_bytes());
            central.extend_from_slice(name.as_bytes());
        }
        data.extend_from_slice(&central);

        data.extend_from_slice(&EOCD_SIG.to_le_bytes());
        data.extend_from_slice(&[0u8; 4]); // disk numbers
        data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        data.extend_from_slice(&(central.len() as u32).to_le_bytes());
        data.extend_from_slice(&(cd_offset as u32).to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes()); // comment len
        data
    }

    const USDA_TRIANGLE: &str = r#"#usda 1.0

def Xform "root"
{
    def Mesh "tri"
    {
        point3f[] points = [(0, 0, 0), (1, 0, 0), (0, 1, 0)]
        int[] faceVertexCounts = [3]
        int[] faceVertexIndices = [0, 1, 2]
    }
}
"#;

    #[test]
    fn test_decode_usda_layer() {
        let archive = zip_archive(&[("model.usda", USDA_TRIANGLE.as_bytes())]);
        let asset = UsdzDecoder.decode(&archive, &CancelToken::new()).unwrap();
        assert_eq!(asset.mesh.vertex_count(), 3);
        assert_eq!(asset.mesh.triangle_count(), 1);
    }

    #[test]
    fn test_texture_entries_collected() {
        let archive = zip_archive(&[
            ("model.usda", USDA_TRIANGLE.as_bytes()),
            ("textures/albedo.png", b"not a real png"),
        ]);
        let asset = UsdzDecoder.decode(&archive, &CancelToken::new()).unwrap();
        assert_eq!(asset.textures, vec![TextureRef::named("albedo.png")]);
    }

    #[test]
    fn test_quad_face_rejected() {
        let usda = r#"#usda 1.0
def Mesh "quad"
{
    point3f[] points = [(0, 0, 0), (1, 0, 0), (1, 1, 0), (0, 1, 0)]
    int[] faceVertexCounts = [4]
    int[] faceVertexIndices = [0, 1, 2, 3]
}
"#;
        let archive = zip_archive(&[("model.usda", usda.as_bytes())]);
        let err = UsdzDecoder.decode(&archive, &CancelToken::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPrimitiveType);
    }

    #[test]
    fn test_binary_only_package_is_empty_asset() {
        let archive = zip_archive(&[("model.usdc", b"PXR-USDC...")]);
        let err = UsdzDecoder.decode(&archive, &CancelToken::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyAsset);
        assert!(err.to_string().contains("usdc"));
    }

    #[test]
    fn test_not_a_zip_is_empty_asset() {
        let err = UsdzDecoder
            .decode(b"definitely not a zip archive", &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyAsset);
    }

    #[test]
    fn test_mesh_without_points_is_empty_asset() {
        let usda = r#"#usda 1.0
def Mesh "empty"
{
}
"#;
        let archive = zip_archive(&[("model.usda", usda.as_bytes())]);
        let err = UsdzDecoder.decode(&archive, &CancelToken::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyAsset);
    }
}
