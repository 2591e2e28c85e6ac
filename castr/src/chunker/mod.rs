//! Chunker related functions and types.
mod config;
mod rolling_hash;
mod streaming_chunker;

pub use config::{
    Config, InvalidConfig, CHUNK_SIZE_AVG_DEFAULT, CHUNK_SIZE_MAX_DEFAULT, CHUNK_SIZE_MIN_DEFAULT,
};
pub use rolling_hash::RollingHashChunker;
pub use streaming_chunker::StreamingChunker;

use bytes::BytesMut;

use crate::{BuzHash, Chunk};

pub trait Chunker {
    /// Scan for the next chunk in the given buffer.
    ///
    /// If None is returned the caller is expected to append more data to the buffer
    /// and call again. If a chunk is returned then that chunk has been split from
    /// buffer and next() can be called again.
    fn next(&mut self, buf: &mut BytesMut) -> Option<Chunk>;
}

impl Config {
    /// Create a streaming chunker over the given reader using these parameters.
    pub fn new_chunker<R>(&self, reader: R) -> StreamingChunker<RollingHashChunker<BuzHash>, R> {
        StreamingChunker::new(RollingHashChunker::new(BuzHash::new(), self), reader)
    }
}
