//! Stored chunk file structure (.cacnk).
//!
//! Two shapes are accepted on disk:
//!
//! 1. Raw: a bare ZSTD frame, or the plaintext itself when uncompressed.
//!    This is what encoders produce and what stores normally hold.
//! 2. Wrapped: a 3 byte magic, then a 16 byte header
//!    `{compressed_size: u32, uncompressed_size: u32, compression: u32,
//!    flags: u32}` (little-endian), then `compressed_size` payload bytes.
//!
//! Decoding always ends with verifying that the plaintext hashes to the
//! expected chunk id, so a stray non-chunk file can never decode silently.

use bytes::Bytes;

use crate::format::{self, u32_from_le_slice};
use crate::{Chunk, Compression, CompressionError, HashSum, VerifiedChunk};

const WRAPPER_HEADER_SIZE: usize = 16;

const WRAPPER_COMPRESSION_NONE: u32 = 0;
const WRAPPER_COMPRESSION_ZSTD: u32 = 1;

#[derive(Debug)]
pub enum ChunkFileError {
    /// Chunk content does not hash to its id.
    HashMismatch { expected: HashSum, actual: HashSum },
    /// Neither a raw frame nor a valid wrapped chunk.
    InvalidFrame,
    /// Wrapped chunk with a compression id this implementation doesn't know.
    UnknownCompression(u32),
    /// Wrapped chunk smaller than its own header claims.
    Truncated,
    /// I/O failure while encoding.
    Io(std::io::Error),
}

impl std::error::Error for ChunkFileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChunkFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HashMismatch { expected, actual } => {
                write!(f, "chunk hash mismatch (expected: {expected}, got: {actual})")
            }
            Self::InvalidFrame => write!(f, "invalid chunk file frame"),
            Self::UnknownCompression(id) => write!(f, "unknown chunk compression ({id})"),
            Self::Truncated => write!(f, "chunk file ends unexpectedly"),
            Self::Io(err) => write!(f, "i/o error: {err}"),
        }
    }
}

impl From<CompressionError> for ChunkFileError {
    fn from(err: CompressionError) -> Self {
        match err {
            CompressionError::InvalidFrame => Self::InvalidFrame,
            CompressionError::Io(err) => Self::Io(err),
        }
    }
}

/// Encode a chunk the way chunks are stored on disk.
///
/// Produces a raw frame without wrapper, matching the reference store layout.
pub fn encode_chunk_file(chunk: Chunk, compression: Compression) -> Result<Bytes, ChunkFileError> {
    let compressed = chunk.compress(compression)?;
    let (_, data) = compressed.into_inner();
    Ok(data)
}

/// Encode a chunk with the legacy wrapper header.
pub fn encode_chunk_file_wrapped(
    chunk: Chunk,
    compression: Compression,
) -> Result<Bytes, ChunkFileError> {
    let compressed = chunk.compress(compression)?;
    let mut out =
        Vec::with_capacity(format::CACNK_MAGIC.len() + WRAPPER_HEADER_SIZE + compressed.len());
    out.extend_from_slice(&format::CACNK_MAGIC);
    out.extend((compressed.len() as u32).to_le_bytes());
    out.extend((compressed.source_size() as u32).to_le_bytes());
    out.extend(
        match compressed.compression() {
            Compression::None => WRAPPER_COMPRESSION_NONE,
            Compression::Zstd(_) => WRAPPER_COMPRESSION_ZSTD,
        }
        .to_le_bytes(),
    );
    out.extend(0u32.to_le_bytes());
    out.extend_from_slice(compressed.data());
    Ok(Bytes::from(out))
}

/// Decode a stored chunk file and verify its identity.
///
/// Wrapped files are recognized by their magic; anything else is probed as a
/// raw ZSTD frame first and treated as plaintext if the probe fails.
pub fn decode_chunk_file(
    file: Bytes,
    expected: &HashSum,
) -> Result<VerifiedChunk, ChunkFileError> {
    let plaintext = if file.starts_with(&format::CACNK_MAGIC) {
        decode_wrapped(file.slice(format::CACNK_MAGIC.len()..))?
    } else {
        match Compression::Zstd(0).decompress(file.clone(), 0) {
            Ok(plaintext) => plaintext,
            Err(CompressionError::InvalidFrame) => file,
            Err(CompressionError::Io(err)) => return Err(ChunkFileError::Io(err)),
        }
    };
    let actual = HashSum::digest(&plaintext);
    if actual != *expected {
        return Err(ChunkFileError::HashMismatch {
            expected: *expected,
            actual,
        });
    }
    Ok(VerifiedChunk::from_parts(actual, Chunk(plaintext)))
}

fn decode_wrapped(buf: Bytes) -> Result<Bytes, ChunkFileError> {
    if buf.len() < WRAPPER_HEADER_SIZE {
        return Err(ChunkFileError::Truncated);
    }
    let compressed_size = u32_from_le_slice(&buf[0..4]) as usize;
    let uncompressed_size = u32_from_le_slice(&buf[4..8]) as usize;
    let compression = u32_from_le_slice(&buf[8..12]);
    if buf.len() - WRAPPER_HEADER_SIZE != compressed_size {
        return Err(ChunkFileError::Truncated);
    }
    let payload = buf.slice(WRAPPER_HEADER_SIZE..);
    let plaintext = match compression {
        WRAPPER_COMPRESSION_NONE => payload,
        WRAPPER_COMPRESSION_ZSTD => Compression::Zstd(0)
            .decompress(payload, uncompressed_size)
            .map_err(|_| ChunkFileError::InvalidFrame)?,
        other => return Err(ChunkFileError::UnknownCompression(other)),
    };
    if plaintext.len() != uncompressed_size {
        return Err(ChunkFileError::InvalidFrame);
    }
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_data() -> Vec<u8> {
        let mut seed = 0x1d96_u32;
        (0..8192)
            .map(|_| {
                seed = seed.wrapping_mul(48271) ^ (seed >> 9);
                seed as u8
            })
            .collect()
    }

    #[test]
    fn raw_roundtrip() {
        for compression in [Compression::None, Compression::zstd_default()] {
            let data = chunk_data();
            let id = HashSum::digest(&data);
            let file = encode_chunk_file(Chunk::from(data.clone()), compression).unwrap();
            let decoded = decode_chunk_file(file, &id).unwrap();
            assert_eq!(decoded.data(), &data[..]);
            assert_eq!(*decoded.hash(), id);
        }
    }

    #[test]
    fn wrapped_roundtrip() {
        for compression in [Compression::None, Compression::zstd_default()] {
            let data = chunk_data();
            let id = HashSum::digest(&data);
            let file = encode_chunk_file_wrapped(Chunk::from(data.clone()), compression).unwrap();
            assert_eq!(&file[..3], &format::CACNK_MAGIC);
            let decoded = decode_chunk_file(file, &id).unwrap();
            assert_eq!(decoded.data(), &data[..]);
        }
    }

    #[test]
    fn altered_payload_is_detected() {
        let data = chunk_data();
        let id = HashSum::digest(&data);
        let mut altered = data;
        altered[100] ^= 0x01;
        match decode_chunk_file(Bytes::from(altered.clone()), &id) {
            Err(ChunkFileError::HashMismatch { expected, actual }) => {
                assert_eq!(expected, id);
                assert_eq!(actual, HashSum::digest(&altered));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn truncated_wrapper_is_rejected() {
        let mut file = format::CACNK_MAGIC.to_vec();
        file.extend([0u8; 8]);
        match decode_chunk_file(Bytes::from(file), &HashSum::default()) {
            Err(ChunkFileError::Truncated) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn unknown_wrapper_compression_is_rejected() {
        let data = b"payload".to_vec();
        let mut file = format::CACNK_MAGIC.to_vec();
        file.extend((data.len() as u32).to_le_bytes());
        file.extend((data.len() as u32).to_le_bytes());
        file.extend(7u32.to_le_bytes());
        file.extend(0u32.to_le_bytes());
        file.extend(&data);
        match decode_chunk_file(Bytes::from(file), &HashSum::digest(&data)) {
            Err(ChunkFileError::UnknownCompression(7)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
