//! Compression Codec
//!
//! Every message on the wire is a self-contained zlib stream. The codec is
//! stateless: each call builds its own encoder or decoder, so it can be used
//! from any number of connection tasks at once.
//!
//! ## Failure Handling
//!
//! Neither direction panics. Callers get a [`CodecError`] back and decide
//! locally what to do with it (the connection handler drops undecodable
//! messages and substitutes a fixed reply when compression fails).

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::Write;
use thiserror::Error;

/// Upper bound on a single decompressed message (16 MB).
///
/// Guards against a tiny compressed payload expanding without limit.
pub const MAX_DECOMPRESSED_SIZE: usize = 16 * 1024 * 1024;

/// Errors produced by the codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The encoder could not be driven to completion
    #[error("compression failed: {0}")]
    Compression(#[source] std::io::Error),

    /// The input was not a complete, valid zlib stream
    #[error("decompression failed: {0}")]
    Decompression(String),
}

/// Compresses `data` into a complete zlib stream at the best compression level.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2 + 16), Compression::best());
    encoder.write_all(data).map_err(CodecError::Compression)?;
    encoder.finish().map_err(CodecError::Compression)
}

/// Decompresses a complete zlib stream.
///
/// Truncated or corrupt streams and output larger than
/// [`MAX_DECOMPRESSED_SIZE`] are rejected. Bytes after the end of the
/// stream are ignored.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = Decompress::new(true);
    // One byte of headroom past the cap so oversized output is detectable.
    let limit = MAX_DECOMPRESSED_SIZE + 1;
    let mut out = Vec::with_capacity(data.len().saturating_mul(4).clamp(64, limit));

    loop {
        if out.len() == out.capacity() {
            out.reserve_exact(out.len().min(limit - out.len()).max(1));
        }

        let in_before = decoder.total_in();
        let out_before = decoder.total_out();
        let status = decoder
            .decompress_vec(&data[in_before as usize..], &mut out, FlushDecompress::None)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;

        if out.len() > MAX_DECOMPRESSED_SIZE {
            return Err(CodecError::Decompression(format!(
                "message exceeds {} bytes",
                MAX_DECOMPRESSED_SIZE
            )));
        }

        match status {
            Status::StreamEnd => return Ok(out),
            // Output space was available but nothing moved: input ran out
            // before the stream trailer was seen.
            _ if decoder.total_in() == in_before && decoder.total_out() == out_before => {
                return Err(CodecError::Decompression("truncated stream".to_string()));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let inputs: [&[u8]; 4] = [
            b"$get color",
            b"$set color=blue",
            b"",
            &[0u8, 255, 1, 254, 7, 7, 7, 7, 7, 7, 7, 7],
        ];

        for input in inputs {
            let compressed = compress(input).unwrap();
            assert_eq!(decompress(&compressed).unwrap(), input);
        }
    }

    #[test]
    fn test_round_trip_large() {
        let input = "key=value\n".repeat(50_000);
        let compressed = compress(input.as_bytes()).unwrap();
        assert!(compressed.len() < input.len());
        assert_eq!(decompress(&compressed).unwrap(), input.as_bytes());
    }

    #[test]
    fn test_round_trip_highly_compressible() {
        for n in [10, 100, 200, 300, 1000, 5000, 100_000] {
            let input = format!("$set k={}", "a".repeat(n));
            let compressed = compress(input.as_bytes()).unwrap();
            assert_eq!(decompress(&compressed).unwrap(), input.as_bytes());
        }

        let zeros = vec![0u8; 1024 * 1024];
        let compressed = compress(&zeros).unwrap();
        assert_eq!(decompress(&compressed).unwrap(), zeros);
    }

    #[test]
    fn test_decompress_size_limit() {
        let at_limit = vec![0u8; MAX_DECOMPRESSED_SIZE];
        let compressed = compress(&at_limit).unwrap();
        assert_eq!(decompress(&compressed).unwrap().len(), MAX_DECOMPRESSED_SIZE);

        let over_limit = vec![0u8; MAX_DECOMPRESSED_SIZE + 1];
        let compressed = compress(&over_limit).unwrap();
        assert!(matches!(
            decompress(&compressed).unwrap_err(),
            CodecError::Decompression(_)
        ));
    }

    #[test]
    fn test_compress_is_deterministic() {
        let a = compress(b"Set color=blue\nreads=0\nwrites=1\n").unwrap();
        let b = compress(b"Set color=blue\nreads=0\nwrites=1\n").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_decompress_garbage() {
        let err = decompress(b"definitely not zlib").unwrap_err();
        assert!(matches!(err, CodecError::Decompression(_)));
    }

    #[test]
    fn test_decompress_empty() {
        assert!(matches!(
            decompress(b"").unwrap_err(),
            CodecError::Decompression(_)
        ));
    }

    #[test]
    fn test_decompress_truncated() {
        let compressed = compress("some reasonably long message ".repeat(20).as_bytes()).unwrap();
        let truncated = &compressed[..compressed.len() / 2];
        assert!(decompress(truncated).is_err());
    }

    #[test]
    fn test_concurrent_use() {
        use std::thread;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                thread::spawn(move || {
                    for j in 0..200 {
                        let msg = format!("$set key{}={}", i, j);
                        let compressed = compress(msg.as_bytes()).unwrap();
                        assert_eq!(decompress(&compressed).unwrap(), msg.as_bytes());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
