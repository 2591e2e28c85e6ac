//! casync compatible content-addressed storage engine.
//!
//! Splits streams into content-defined chunks with a buzhash rolling hash,
//! stores chunks by their SHA-512/256 id and rebuilds streams bit-exact
//! from an index and any [`store::ChunkStore`]. Directory trees are carried
//! as catar archive streams which chunk like any other blob.
pub mod api;
pub mod assemble;
pub mod catar;
pub mod chunker;
pub mod format;
pub mod store;

mod cancel;
mod chunk;
mod chunk_file;
mod compression;
mod hashsum;
mod index;
mod rolling_hash;

pub use cancel::CancelFlag;
pub use chunk::{Chunk, CompressedChunk, VerifiedChunk};
pub use chunk_file::{
    decode_chunk_file, encode_chunk_file, encode_chunk_file_wrapped, ChunkFileError,
};
pub use compression::{Compression, CompressionError};
pub use hashsum::{HashSum, HASH_SIZE};
pub use index::{Index, IndexChunk, IndexError, IndexFormat};
pub use rolling_hash::{BuzHash, RollingHash, WINDOW_SIZE};
