//! Transparent chunk compression.
//!
//! A general-purpose compressor is attempted for payloads above a small
//! threshold; the compressed form is only kept when it actually pays off.

use bytes::Bytes;

/// Above this size, compression is attempted when enabled.
pub const COMPRESSION_THRESHOLD_BYTES: usize = 1024;

/// The compressed form is accepted only if it is strictly smaller than
/// this fraction of the original length.
pub const ACCEPT_RATIO: f64 = 0.9;

#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("decompression failed: {0}")]
    Failed(String),
}

/// Attempt compression of `data`. Returns `Some(compressed)` only when
/// compression is enabled, the payload exceeds the threshold, and the
/// compressed form is strictly smaller than `ACCEPT_RATIO` of the original.
pub fn try_compress(data: &[u8], enabled: bool) -> Option<Bytes> {
    if !enabled || data.len() <= COMPRESSION_THRESHOLD_BYTES {
        return None;
    }
    let compressed = lz4_flex::compress_prepend_size(data);
    if (compressed.len() as f64) < (data.len() as f64) * ACCEPT_RATIO {
        Some(Bytes::from(compressed))
    } else {
        None
    }
}

pub fn decompress(data: &[u8]) -> Result<Bytes, CompressionError> {
    lz4_flex::decompress_size_prepended(data)
        .map(Bytes::from)
        .map_err(|e| CompressionError::Failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_payload_is_never_compressed() {
        let data = vec![0u8; 100];
        assert!(try_compress(&data, true).is_none());
    }

    #[test]
    fn disabled_compression_is_skipped_regardless_of_size() {
        let data = vec![0u8; 10_000];
        assert!(try_compress(&data, false).is_none());
    }

    #[test]
    fn highly_compressible_payload_round_trips() {
        let data = vec![0u8; 100_000];
        let compressed = try_compress(&data, true).expect("should compress");
        assert!((compressed.len() as f64) < data.len() as f64 * ACCEPT_RATIO);
        let restored = decompress(&compressed).unwrap();
        assert_eq!(&restored[..], &data[..]);
    }

    #[test]
    fn incompressible_payload_is_rejected() {
        // Pseudo-random bytes rarely compress below the 0.9 ratio.
        let mut state: u64 = 0x2545F4914F6CDD1D;
        let data: Vec<u8> = (0..5000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state & 0xFF) as u8
            })
            .collect();
        assert!(try_compress(&data, true).is_none());
    }
}
