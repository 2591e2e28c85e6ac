#![allow(clippy::len_without_is_empty)]
use bytes::Bytes;

use crate::{Compression, CompressionError, HashSum};

/// A single chunk.
///
/// Represents a single chunk of a source stream. Is not compressed.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk(pub(crate) Bytes);

impl<T> From<T> for Chunk
where
    T: Into<bytes::Bytes>,
{
    fn from(b: T) -> Self {
        Self(b.into())
    }
}

impl Chunk {
    /// Chunk data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.0[..]
    }
    /// Size of chunk.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }
    /// Create a verified chunk by calculating its id.
    #[inline]
    pub fn verify(self) -> VerifiedChunk {
        VerifiedChunk::from(self)
    }
    /// Create a compressed chunk.
    #[inline]
    pub fn compress(self, compression: Compression) -> Result<CompressedChunk, CompressionError> {
        CompressedChunk::try_compress(compression, self)
    }
    #[inline]
    pub fn into_inner(self) -> Bytes {
        self.0
    }
}

/// A chunk with verified id.
#[derive(Debug, Clone)]
pub struct VerifiedChunk {
    pub(crate) chunk: Chunk,
    pub(crate) hash_sum: HashSum,
}

impl From<Chunk> for VerifiedChunk {
    fn from(chunk: Chunk) -> Self {
        Self::new(chunk)
    }
}

impl VerifiedChunk {
    /// Create a new verified chunk by calculating its id.
    pub fn new(chunk: Chunk) -> Self {
        Self {
            hash_sum: HashSum::digest(chunk.data()),
            chunk,
        }
    }
    /// Create from a chunk and an id already known to match it.
    pub(crate) fn from_parts(hash_sum: HashSum, chunk: Chunk) -> Self {
        debug_assert_eq!(hash_sum, HashSum::digest(chunk.data()));
        Self { hash_sum, chunk }
    }
    /// Size of chunk.
    #[inline]
    pub fn len(&self) -> usize {
        self.chunk.len()
    }
    /// Get chunk.
    #[inline]
    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }
    /// Get chunk data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.chunk.data()
    }
    /// Get id of chunk.
    #[inline]
    pub fn hash(&self) -> &HashSum {
        &self.hash_sum
    }
    /// Split into id and chunk.
    #[inline]
    pub fn into_parts(self) -> (HashSum, Chunk) {
        (self.hash_sum, self.chunk)
    }
}

/// A compressed chunk.
#[derive(Debug, Clone)]
pub struct CompressedChunk {
    pub(crate) data: Bytes,
    pub(crate) source_size: usize,
    pub(crate) compression: Compression,
}

impl CompressedChunk {
    /// Create a compressed chunk.
    pub fn try_compress(
        compression: Compression,
        chunk: Chunk,
    ) -> Result<CompressedChunk, CompressionError> {
        let source_size = chunk.len();
        Ok(Self {
            data: compression.compress(chunk.into_inner())?,
            source_size,
            compression,
        })
    }
    /// Chunk data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }
    /// Size of chunk when compressed.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }
    /// Size of the chunk in source (uncompressed).
    #[inline]
    pub fn source_size(&self) -> usize {
        self.source_size
    }
    /// Decompress the chunk.
    pub fn decompress(self) -> Result<Chunk, CompressionError> {
        Ok(Chunk(
            self.compression.decompress(self.data, self.source_size)?,
        ))
    }
    /// Compression used for chunk.
    #[inline]
    pub fn compression(&self) -> Compression {
        self.compression
    }
    #[inline]
    pub fn into_inner(self) -> (Compression, Bytes) {
        (self.compression, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_computes_id() {
        let chunk = Chunk::from(vec![1u8, 2, 3, 4]);
        let verified = chunk.clone().verify();
        assert_eq!(*verified.hash(), HashSum::digest(chunk.data()));
        assert_eq!(verified.data(), chunk.data());
    }

    #[test]
    fn compress_decompress_roundtrip() {
        let chunk = Chunk::from(vec![0x11u8; 2048]);
        let compressed = chunk.clone().compress(Compression::zstd_default()).unwrap();
        assert_eq!(compressed.source_size(), chunk.len());
        assert!(compressed.len() < chunk.len());
        assert_eq!(compressed.decompress().unwrap(), chunk);
    }
}
