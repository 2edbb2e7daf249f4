//! Gzip handling for request and response bodies.
//!
//! Request bodies above [`COMPRESSION_THRESHOLD`] are sent gzip-compressed
//! with `Content-Encoding: gzip`. Response decompression is header-driven
//! with no threshold: any response marked gzip is decompressed.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Request bodies at or below this size are sent uncompressed.
pub const COMPRESSION_THRESHOLD: usize = 1024;

/// Gzip-compress a byte slice.
pub fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decompress a gzip byte slice.
pub fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Compress a request body when it exceeds the threshold.
///
/// Returns the bytes to send and whether they are gzip-encoded.
pub fn maybe_compress(body: Vec<u8>) -> std::io::Result<(Vec<u8>, bool)> {
    if body.len() > COMPRESSION_THRESHOLD {
        Ok((gzip(&body)?, true))
    } else {
        Ok((body, false))
    }
}
