//! Value compression for large payloads.

use nscache_core::{Error, Result};
use std::io::{Read, Write};

/// Item flag marking a zlib-compressed value.
pub const FLAG_COMPRESSED: u32 = 1 << 3;

/// Encode `data` for storage, compressing it when it reaches `threshold`
/// and the compressed form is smaller. Returns the payload and its flags.
pub fn encode_value(data: &[u8], threshold: Option<usize>) -> Result<(Vec<u8>, u32)> {
    match threshold {
        Some(min) if min > 0 && data.len() >= min => {
            let compressed = compress_zlib(data)?;
            if compressed.len() < data.len() {
                Ok((compressed, FLAG_COMPRESSED))
            } else {
                Ok((data.to_vec(), 0))
            }
        }
        _ => Ok((data.to_vec(), 0)),
    }
}

/// Undo [`encode_value`] given the item flags returned by the server.
pub fn decode_value(data: Vec<u8>, flags: u32) -> Result<Vec<u8>> {
    if flags & FLAG_COMPRESSED != 0 {
        decompress_zlib(&data)
    } else {
        Ok(data)
    }
}

fn compress_zlib(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::Internal(format!("Zlib write failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| Error::Internal(format!("Zlib finish failed: {}", e)))
}

fn decompress_zlib(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(|e| Error::Protocol(format!("Zlib read failed: {}", e)))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_values_stay_plain() {
        let (payload, flags) = encode_value(b"short", Some(1024)).unwrap();
        assert_eq!(payload, b"short");
        assert_eq!(flags, 0);
    }

    #[test]
    fn test_large_values_are_compressed() {
        let data = "namespace ".repeat(200);
        let (payload, flags) = encode_value(data.as_bytes(), Some(64)).unwrap();
        assert_eq!(flags, FLAG_COMPRESSED);
        assert!(payload.len() < data.len());

        let decoded = decode_value(payload, flags).unwrap();
        assert_eq!(decoded, data.as_bytes());
    }

    #[test]
    fn test_incompressible_values_stay_plain() {
        let data: Vec<u8> = (0u8..=255).collect();
        let (payload, flags) = encode_value(&data, Some(16)).unwrap();
        assert_eq!(flags, 0);
        assert_eq!(payload, data);
    }

    #[test]
    fn test_corrupt_compressed_value() {
        let err = decode_value(b"not zlib".to_vec(), FLAG_COMPRESSED).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
