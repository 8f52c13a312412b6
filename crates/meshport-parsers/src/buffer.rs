//! Raw buffer interpretation helpers
//!
//! Decoders that assemble binary vertex or index payloads funnel them
//! through these checks so a layout mismatch is always a typed error,
//! never a silent misread.

use byteorder::{ByteOrder, LittleEndian};

use meshport_core::{Error, Result};

/// Byte stride of one packed position: 3 components × 32-bit float
pub const POSITION_STRIDE: usize = 12;

/// Byte width of one 32-bit index
pub const INDEX_STRIDE: usize = 4;

/// Interpret a raw buffer as tightly packed 3-component f32 positions
///
/// The buffer length must be an exact multiple of the 12-byte stride.
pub fn positions_from_bytes(bytes: &[u8]) -> Result<Vec<[f32; 3]>> {
    if bytes.len() % POSITION_STRIDE != 0 {
        return Err(Error::malformed(format!(
            "vertex buffer length {} is not a multiple of the {}-byte position stride",
            bytes.len(),
            POSITION_STRIDE
        )));
    }

    let mut positions = Vec::with_capacity(bytes.len() / POSITION_STRIDE);
    for chunk in bytes.chunks_exact(POSITION_STRIDE) {
        positions.push([
            LittleEndian::read_f32(&chunk[0..4]),
            LittleEndian::read_f32(&chunk[4..8]),
            LittleEndian::read_f32(&chunk[8..12]),
        ]);
    }
    Ok(positions)
}

/// Interpret a raw buffer as 32-bit unsigned little-endian indices
pub fn indices_from_bytes(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.len() % INDEX_STRIDE != 0 {
        return Err(Error::malformed(format!(
            "index buffer length {} is not a multiple of {} bytes",
            bytes.len(),
            INDEX_STRIDE
        )));
    }

    let mut indices = Vec::with_capacity(bytes.len() / INDEX_STRIDE);
    for chunk in bytes.chunks_exact(INDEX_STRIDE) {
        indices.push(LittleEndian::read_u32(chunk));
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshport_core::ErrorKind;

    #[test]
    fn test_positions_round_trip() {
        let mut bytes = Vec::new();
        for f in [1.0f32, 2.0, 3.0, -4.5, 0.0, 9.25] {
            bytes.extend_from_slice(&f.to_le_bytes());
        }

        let positions = positions_from_bytes(&bytes).unwrap();
        assert_eq!(positions, vec![[1.0, 2.0, 3.0], [-4.5, 0.0, 9.25]]);
    }

    #[test]
    fn test_stride_mismatch_is_malformed() {
        let err = positions_from_bytes(&[0u8; 13]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedVertexBuffer);
    }

    #[test]
    fn test_indices_from_bytes() {
        let mut bytes = Vec::new();
        for i in [0u32, 1, 2, 7] {
            bytes.extend_from_slice(&i.to_le_bytes());
        }
        assert_eq!(indices_from_bytes(&bytes).unwrap(), vec![0, 1, 2, 7]);

        let err = indices_from_bytes(&[0u8; 6]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedVertexBuffer);
    }
}
