use bytes::BytesMut;

use super::{Chunker, Config};
use crate::{
    rolling_hash::{RollingHash, WINDOW_SIZE},
    Chunk,
};

/// Content-defined chunker scanning with a rolling hash.
///
/// Boundaries fall where the rolling hash sum `h` satisfies
/// `h % discriminator == discriminator - 1`, with the hash updated before
/// each test. No boundary is accepted below the minimum chunk size and one
/// is forced at the maximum.
pub struct RollingHashChunker<H> {
    hasher: H,
    discriminator: u32,
    min_chunk_size: usize,
    max_chunk_size: usize,
    hash_input_limit: usize,
    // Offset in buffer.
    offset: usize,
}

impl<H> RollingHashChunker<H> {
    pub fn new(hasher: H, config: &Config) -> Self {
        // Bytes before this offset don't need to go into the hash at all,
        // the window is refilled completely before the first test.
        let hash_input_limit = config.min_chunk_size.saturating_sub(WINDOW_SIZE);
        Self {
            hasher,
            discriminator: config.discriminator(),
            min_chunk_size: config.min_chunk_size,
            max_chunk_size: config.max_chunk_size,
            hash_input_limit,
            offset: 0,
        }
    }

    fn is_boundary(&self, sum: u32) -> bool {
        sum % self.discriminator == self.discriminator - 1
    }

    fn skip_min_chunk(&mut self, buf: &[u8])
    where
        H: RollingHash,
    {
        if self.hash_input_limit > 0 && self.offset < self.hash_input_limit {
            // Skip past the minimum chunk size to minimize the number of hash inputs.
            self.offset = std::cmp::min(self.hash_input_limit - 1, buf.len());
        }
        if self.offset < self.min_chunk_size {
            // Hash the last window size bytes of the minimal possible chunk.
            // There is no need to check the hash sum here since we're still
            // below the minimal chunk size, but the bytes must be in the
            // window to get a correct sum once we reach past it.
            let hasher = &mut self.hasher;
            let input_end = std::cmp::min(self.min_chunk_size - 1, buf.len());
            buf[self.offset..input_end]
                .iter()
                .for_each(|&val| hasher.input(val));
            self.offset = input_end;
        }
    }

    // Scan until end of buffer, chunk boundary (hash sum match) or max chunk
    // size reached.
    fn scan_for_boundary(&mut self, buf: &[u8]) -> bool
    where
        H: RollingHash,
    {
        let scan_end = std::cmp::min(self.max_chunk_size, buf.len());
        let discriminator = self.discriminator;
        let hasher = &mut self.hasher;
        let mut end_offset = self.offset;
        let found_boundary = buf[self.offset..scan_end]
            .iter()
            .map(|&val| {
                end_offset += 1;
                hasher.input(val);
                hasher.sum()
            })
            .any(|sum| sum % discriminator == discriminator - 1);
        self.offset = end_offset;
        found_boundary || self.offset >= self.max_chunk_size
    }
}

impl<H> Chunker for RollingHashChunker<H>
where
    H: RollingHash,
{
    fn next(&mut self, buf: &mut BytesMut) -> Option<Chunk> {
        // Initialize the hasher if needed.
        while !self.hasher.init_done() && self.offset < buf.len() {
            self.hasher.init(buf[self.offset]);
            self.offset += 1;
        }
        self.skip_min_chunk(&buf[..]);
        // When the minimum chunk size equals the window size the first test
        // position coincides with the freshly initialized window.
        if self.offset == self.min_chunk_size
            && self.hasher.init_done()
            && self.is_boundary(self.hasher.sum())
        {
            let offset = self.offset;
            self.offset = 0;
            self.hasher.reset();
            return Some(Chunk(buf.split_to(offset).freeze()));
        }
        let found_boundary = self.scan_for_boundary(buf);
        if found_boundary {
            let offset = self.offset;
            self.offset = 0;
            // The window does not carry over a boundary, each chunk is
            // hashed from a cleared state.
            self.hasher.reset();
            return Some(Chunk(buf.split_to(offset).freeze()));
        }
        None
    }
}
