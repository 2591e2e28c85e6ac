//! Index file structure (.caibx / .caidx).
//!
//! | Offset        | Size | Description                                          |
//! |---------------|------|------------------------------------------------------|
//! |             0 |    8 | Header size, always 48 (u64 le).                     |
//! |             8 |    8 | Header type `CA_FORMAT_INDEX` (u64 le).              |
//! |            16 |    8 | Feature flags (u64 le).                              |
//! |            24 |   24 | Chunk size min, avg, max (3 x u64 le).               |
//! |            48 |    8 | Table size marker, always `u64::MAX` (u64 le).       |
//! |            56 |    8 | Table type `CA_FORMAT_TABLE` (u64 le).               |
//! |            64 | 40*N | Table items: chunk end offset (u64 le) + 32 byte id. |
//! |     64 + 40*N |   40 | Table tail: 0, 0, 48, table size, tail marker.       |
//!
//! The table size covers the table header, all items and the tail.

use crate::chunker;
use crate::format::{self, u64_from_le_slice};
use crate::hashsum::{HashSum, HASH_SIZE};

const FORMAT_INDEX_SIZE: usize = 48;
const TABLE_HEADER_SIZE: usize = 16;
const TABLE_ITEM_SIZE: usize = 8 + HASH_SIZE;
const TABLE_TAIL_SIZE: usize = 40;
const MIN_INDEX_SIZE: usize = FORMAT_INDEX_SIZE + TABLE_HEADER_SIZE + TABLE_TAIL_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexError {
    BadMagic,
    Truncated,
    BadTail,
    InvalidStructure,
}

impl std::error::Error for IndexError {}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadMagic => write!(f, "not an index file"),
            Self::Truncated => write!(f, "index file ends unexpectedly"),
            Self::BadTail => write!(f, "corrupt index table tail"),
            Self::InvalidStructure => write!(f, "corrupt index structure"),
        }
    }
}

/// Kind of data an index describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    /// A single file or blob (.caibx).
    Blob,
    /// A catar archive stream (.caidx).
    Archive,
}

impl std::fmt::Display for IndexFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blob => write!(f, "caibx"),
            Self::Archive => write!(f, "caidx"),
        }
    }
}

/// A single chunk reference within an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexChunk {
    /// Chunk id.
    pub id: HashSum,
    /// End offset of the chunk within the reconstructed stream.
    pub offset: u64,
    /// Chunk size in bytes.
    pub size: u64,
}

/// An ordered list of chunk references describing how to rebuild a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    feature_flags: u64,
    chunk_size_min: u64,
    chunk_size_avg: u64,
    chunk_size_max: u64,
    chunks: Vec<IndexChunk>,
}

impl Index {
    /// Create an empty index for the given format and chunker parameters.
    pub fn new(format: IndexFormat, config: &chunker::Config) -> Self {
        Self {
            feature_flags: match format {
                IndexFormat::Blob => format::CA_FORMAT_SHA512_256,
                IndexFormat::Archive => 0,
            },
            chunk_size_min: config.min_chunk_size as u64,
            chunk_size_avg: config.avg_chunk_size as u64,
            chunk_size_max: config.max_chunk_size as u64,
            chunks: Vec::new(),
        }
    }
    /// Append a chunk reference, tracking the running end offset.
    pub fn push(&mut self, id: HashSum, size: u64) {
        let offset = self.total_size() + size;
        self.chunks.push(IndexChunk { id, offset, size });
    }
    /// The chunk references in stream order.
    pub fn chunks(&self) -> &[IndexChunk] {
        &self.chunks
    }
    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }
    /// True if the index references no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
    /// Total size of the reconstructed stream.
    pub fn total_size(&self) -> u64 {
        self.chunks.last().map(|chunk| chunk.offset).unwrap_or(0)
    }
    pub fn feature_flags(&self) -> u64 {
        self.feature_flags
    }
    pub fn chunk_size_min(&self) -> u64 {
        self.chunk_size_min
    }
    pub fn chunk_size_avg(&self) -> u64 {
        self.chunk_size_avg
    }
    pub fn chunk_size_max(&self) -> u64 {
        self.chunk_size_max
    }
    /// The format tag implied by the feature flags.
    pub fn format(&self) -> IndexFormat {
        if self.feature_flags & format::CA_FORMAT_SHA512_256 != 0 {
            IndexFormat::Blob
        } else {
            IndexFormat::Archive
        }
    }

    /// Encode into the on-disk representation.
    pub fn encode(&self) -> Vec<u8> {
        let table_size =
            (TABLE_HEADER_SIZE + self.chunks.len() * TABLE_ITEM_SIZE + TABLE_TAIL_SIZE) as u64;
        let mut out = Vec::with_capacity(FORMAT_INDEX_SIZE + table_size as usize);
        out.extend((FORMAT_INDEX_SIZE as u64).to_le_bytes());
        out.extend(format::CA_FORMAT_INDEX.to_le_bytes());
        out.extend(self.feature_flags.to_le_bytes());
        out.extend(self.chunk_size_min.to_le_bytes());
        out.extend(self.chunk_size_avg.to_le_bytes());
        out.extend(self.chunk_size_max.to_le_bytes());
        out.extend(u64::MAX.to_le_bytes());
        out.extend(format::CA_FORMAT_TABLE.to_le_bytes());
        for chunk in &self.chunks {
            out.extend(chunk.offset.to_le_bytes());
            out.extend_from_slice(chunk.id.slice());
        }
        out.extend(0u64.to_le_bytes());
        out.extend(0u64.to_le_bytes());
        out.extend((FORMAT_INDEX_SIZE as u64).to_le_bytes());
        out.extend(table_size.to_le_bytes());
        out.extend(format::CA_FORMAT_TABLE_TAIL_MARKER.to_le_bytes());
        out
    }

    /// Decode from the on-disk representation.
    pub fn decode(buf: &[u8]) -> Result<Self, IndexError> {
        if buf.len() < MIN_INDEX_SIZE {
            return Err(IndexError::Truncated);
        }
        if u64_from_le_slice(&buf[8..16]) != format::CA_FORMAT_INDEX {
            return Err(IndexError::BadMagic);
        }
        if u64_from_le_slice(&buf[0..8]) != FORMAT_INDEX_SIZE as u64 {
            return Err(IndexError::InvalidStructure);
        }
        let feature_flags = u64_from_le_slice(&buf[16..24]);
        let chunk_size_min = u64_from_le_slice(&buf[24..32]);
        let chunk_size_avg = u64_from_le_slice(&buf[32..40]);
        let chunk_size_max = u64_from_le_slice(&buf[40..48]);
        if chunk_size_min > chunk_size_avg || chunk_size_avg > chunk_size_max {
            return Err(IndexError::InvalidStructure);
        }
        if u64_from_le_slice(&buf[48..56]) != u64::MAX
            || u64_from_le_slice(&buf[56..64]) != format::CA_FORMAT_TABLE
        {
            return Err(IndexError::BadMagic);
        }
        let items_len = buf.len() - MIN_INDEX_SIZE;
        if items_len % TABLE_ITEM_SIZE != 0 {
            return Err(IndexError::Truncated);
        }
        let num_chunks = items_len / TABLE_ITEM_SIZE;
        let mut chunks = Vec::with_capacity(num_chunks);
        let mut last_offset = 0u64;
        let mut item = &buf[FORMAT_INDEX_SIZE + TABLE_HEADER_SIZE..];
        for _ in 0..num_chunks {
            let offset = u64_from_le_slice(&item[0..8]);
            if offset <= last_offset {
                return Err(IndexError::InvalidStructure);
            }
            // Size is enforced to be non-zero by the offsets strictly increasing.
            chunks.push(IndexChunk {
                id: HashSum::from_slice(&item[8..8 + HASH_SIZE])
                    .ok_or(IndexError::InvalidStructure)?,
                offset,
                size: offset - last_offset,
            });
            last_offset = offset;
            item = &item[TABLE_ITEM_SIZE..];
        }
        let table_size =
            (TABLE_HEADER_SIZE + num_chunks * TABLE_ITEM_SIZE + TABLE_TAIL_SIZE) as u64;
        let tail = item;
        if u64_from_le_slice(&tail[0..8]) != 0
            || u64_from_le_slice(&tail[8..16]) != 0
            || u64_from_le_slice(&tail[16..24]) != FORMAT_INDEX_SIZE as u64
            || u64_from_le_slice(&tail[24..32]) != table_size
            || u64_from_le_slice(&tail[32..40]) != format::CA_FORMAT_TABLE_TAIL_MARKER
        {
            return Err(IndexError::BadTail);
        }
        Ok(Self {
            feature_flags,
            chunk_size_min,
            chunk_size_avg,
            chunk_size_max,
            chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_index(chunk_sizes: &[u64]) -> Index {
        let mut index = Index::new(IndexFormat::Blob, &chunker::Config::default());
        for (seed, &size) in chunk_sizes.iter().enumerate() {
            index.push(HashSum::digest(&[seed as u8]), size);
        }
        index
    }

    #[test]
    fn empty_index_golden_bytes() {
        let index = Index::new(IndexFormat::Archive, &chunker::Config::default());
        let encoded = index.encode();
        assert_eq!(encoded.len(), 104);
        let mut expected = Vec::new();
        expected.extend(48u64.to_le_bytes());
        expected.extend(0x9682_4d9c_7b12_9ff9u64.to_le_bytes());
        expected.extend(0u64.to_le_bytes());
        expected.extend((16 * 1024u64).to_le_bytes());
        expected.extend((64 * 1024u64).to_le_bytes());
        expected.extend((256 * 1024u64).to_le_bytes());
        expected.extend(u64::MAX.to_le_bytes());
        expected.extend(0xe75b_9e11_2f17_417du64.to_le_bytes());
        expected.extend(0u64.to_le_bytes());
        expected.extend(0u64.to_le_bytes());
        expected.extend(48u64.to_le_bytes());
        expected.extend(56u64.to_le_bytes());
        expected.extend(0x4b4f_050e_5549_ecd1u64.to_le_bytes());
        assert_eq!(encoded, expected);
        assert_eq!(Index::decode(&encoded).unwrap(), index);
    }

    #[test]
    fn roundtrip_both_directions() {
        let index = blob_index(&[16384, 98304, 17000]);
        assert_eq!(index.total_size(), 16384 + 98304 + 17000);
        assert_eq!(index.format(), IndexFormat::Blob);
        let encoded = index.encode();
        assert_eq!(encoded.len(), 104 + 3 * 40);
        let decoded = Index::decode(&encoded).unwrap();
        assert_eq!(decoded, index);
        assert_eq!(decoded.encode(), encoded);
    }

    #[test]
    fn sizes_reconstructed_from_offsets() {
        let index = blob_index(&[20000, 30000, 100]);
        let decoded = Index::decode(&index.encode()).unwrap();
        let sizes: Vec<u64> = decoded.chunks().iter().map(|chunk| chunk.size).collect();
        assert_eq!(sizes, &[20000, 30000, 100]);
        let offsets: Vec<u64> = decoded.chunks().iter().map(|chunk| chunk.offset).collect();
        assert_eq!(offsets, &[20000, 50000, 50100]);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut encoded = blob_index(&[16384]).encode();
        encoded[8] ^= 0xff;
        assert_eq!(Index::decode(&encoded), Err(IndexError::BadMagic));
    }

    #[test]
    fn rejects_truncated() {
        let encoded = blob_index(&[16384, 20000]).encode();
        assert_eq!(Index::decode(&encoded[..40]), Err(IndexError::Truncated));
        assert_eq!(
            Index::decode(&encoded[..encoded.len() - 1]),
            Err(IndexError::Truncated)
        );
    }

    #[test]
    fn rejects_bad_tail() {
        let mut encoded = blob_index(&[16384]).encode();
        let tail_marker = encoded.len() - 1;
        encoded[tail_marker] ^= 0xff;
        assert_eq!(Index::decode(&encoded), Err(IndexError::BadTail));
    }

    #[test]
    fn rejects_non_monotonic_offsets() {
        let index = blob_index(&[16384, 20000]);
        let mut encoded = index.encode();
        // Zero the second item's offset so it no longer increases.
        for byte in encoded.iter_mut().skip(64 + 40).take(8) {
            *byte = 0;
        }
        assert_eq!(Index::decode(&encoded), Err(IndexError::InvalidStructure));
    }

    #[test]
    fn rejects_inconsistent_chunk_size_bounds() {
        let mut encoded = blob_index(&[16384]).encode();
        // Swap min and max.
        let (min, max): (Vec<u8>, Vec<u8>) = (encoded[24..32].to_vec(), encoded[40..48].to_vec());
        encoded[24..32].copy_from_slice(&max);
        encoded[40..48].copy_from_slice(&min);
        assert_eq!(Index::decode(&encoded), Err(IndexError::InvalidStructure));
    }
}
