use std::collections::HashSet;

use futures_util::{future, StreamExt};
use log::*;
use tokio::io::AsyncRead;

use crate::catar;
use crate::chunk_file::{self, ChunkFileError};
use crate::chunker;
use crate::store::{ChunkStore, StoreError};
use crate::{CancelFlag, Compression, Index, IndexFormat};

/// Options for the encode functions.
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    /// The configuration to use when creating a chunk stream from the input.
    pub chunker_config: chunker::Config,
    /// The compression to use for stored chunk files.
    pub compression: Compression,
    /// Number of chunks in flight while hashing and compressing.
    /// 0 will result in an automatically selected value.
    pub num_chunk_buffers: usize,
    pub cancel: CancelFlag,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            chunker_config: chunker::Config::default(),
            compression: Compression::zstd_default(),
            num_chunk_buffers: 0,
            cancel: CancelFlag::new(),
        }
    }
}

impl EncodeOptions {
    fn get_num_chunk_buffers(&self) -> usize {
        if self.num_chunk_buffers == 0 {
            match num_cpus::get() {
                0 | 1 => 1,
                n => n * 2,
            }
        } else {
            self.num_chunk_buffers
        }
    }
}

/// Output from the encode functions.
#[derive(Debug)]
pub struct EncodeResult {
    /// Index describing the encoded stream.
    pub index: Index,
    /// Total bytes consumed from the source.
    pub source_size: u64,
    /// Unique chunks within the source.
    pub unique_chunks: usize,
    /// Chunks actually written to the store (not deduplicated or present).
    pub stored_chunks: usize,
    /// Bytes written to the store, after compression.
    pub stored_bytes: u64,
}

#[derive(Debug)]
pub enum EncodeError {
    Io(std::io::Error),
    Store(StoreError),
    ChunkFile(ChunkFileError),
    InvalidConfig(chunker::InvalidConfig),
    Cancelled,
    ThreadJoin(tokio::task::JoinError),
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::ChunkFile(err) => Some(err),
            Self::InvalidConfig(err) => Some(err),
            Self::ThreadJoin(err) => Some(err),
            Self::Cancelled => None,
        }
    }
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "i/o error: {}", err),
            Self::Store(err) => write!(f, "store error: {}", err),
            Self::ChunkFile(err) => write!(f, "chunk encode error: {}", err),
            Self::InvalidConfig(err) => write!(f, "invalid chunker config: {}", err),
            Self::Cancelled => write!(f, "cancelled"),
            Self::ThreadJoin(err) => write!(f, "error joining thread: {}", err),
        }
    }
}

impl From<tokio::task::JoinError> for EncodeError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::ThreadJoin(e)
    }
}

/// Chunk a blob stream into a store and build its index (.caibx).
pub async fn encode_blob<R, S>(
    input: R,
    store: &S,
    opts: &EncodeOptions,
) -> Result<EncodeResult, EncodeError>
where
    R: AsyncRead + Unpin + Send,
    S: ChunkStore,
{
    encode_stream(input, store, opts, IndexFormat::Blob).await
}

/// Serialize a tree as a catar stream, chunk it into a store and build the
/// archive index (.caidx).
pub async fn encode_archive<S>(
    tree: &catar::Tree,
    store: &S,
    opts: &EncodeOptions,
) -> Result<EncodeResult, EncodeError>
where
    S: ChunkStore,
{
    let mut archive_buf = Vec::new();
    catar::assemble(tree, &mut archive_buf).map_err(EncodeError::Io)?;
    encode_stream(&archive_buf[..], store, opts, IndexFormat::Archive).await
}

async fn encode_stream<R, S>(
    input: R,
    store: &S,
    opts: &EncodeOptions,
    format: IndexFormat,
) -> Result<EncodeResult, EncodeError>
where
    R: AsyncRead + Unpin + Send,
    S: ChunkStore,
{
    opts.chunker_config
        .check()
        .map_err(EncodeError::InvalidConfig)?;
    let num_chunk_buffers = opts.get_num_chunk_buffers();
    let compression = opts.compression;
    let cancel = opts.cancel.clone();

    let mut index = Index::new(format, &opts.chunker_config);
    let mut seen = HashSet::new();
    let mut source_size = 0u64;
    let mut stored_chunks = 0usize;
    let mut stored_bytes = 0u64;
    {
        let chunker = opts.chunker_config.new_chunker(input);
        let mut chunk_stream = chunker
            .map(|result| {
                let cancel = cancel.clone();
                tokio::task::spawn_blocking(move || {
                    if cancel.is_cancelled() {
                        return Err(EncodeError::Cancelled);
                    }
                    let (offset, chunk) = result.map_err(EncodeError::Io)?;
                    Ok((offset, chunk.verify()))
                })
            })
            .buffered(num_chunk_buffers)
            .filter_map(|joined| {
                // Filter unique chunks to be compressed.
                let result = joined
                    .map_err(EncodeError::ThreadJoin)
                    .and_then(|inner| inner);
                future::ready(match result {
                    Ok((offset, verified)) => {
                        source_size += verified.len() as u64;
                        index.push(*verified.hash(), verified.len() as u64);
                        if seen.insert(*verified.hash()) {
                            debug!(
                                "chunk {} at offset {}, size {}",
                                verified.hash(),
                                offset,
                                verified.len()
                            );
                            Some(Ok(verified))
                        } else {
                            None
                        }
                    }
                    Err(err) => Some(Err(err)),
                })
            })
            .map(|result| {
                tokio::task::spawn_blocking(move || {
                    // Compress each chunk.
                    let verified = result?;
                    let (id, chunk) = verified.into_parts();
                    let file = chunk_file::encode_chunk_file(chunk, compression)
                        .map_err(EncodeError::ChunkFile)?;
                    Ok((id, file))
                })
            })
            .buffered(num_chunk_buffers);

        while let Some(joined) = chunk_stream.next().await {
            let (id, file) = joined
                .map_err(EncodeError::ThreadJoin)
                .and_then(|inner| inner)?;
            if store.has(&id).await.map_err(EncodeError::Store)? {
                debug!("chunk {} already in store", id);
                continue;
            }
            stored_chunks += 1;
            stored_bytes += file.len() as u64;
            store.put(&id, file).await.map_err(EncodeError::Store)?;
        }
    }
    Ok(EncodeResult {
        index,
        source_size,
        unique_chunks: seen.len(),
        stored_chunks,
        stored_bytes,
    })
}
