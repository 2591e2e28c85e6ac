//! Reconstruct a source stream from an index and a chunk store.
use std::path::Path;

use futures_util::{stream, StreamExt};
use log::*;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::chunk_file::{self, ChunkFileError};
use crate::store::{ChunkStore, StoreError};
use crate::{CancelFlag, HashSum, Index};

#[derive(Debug)]
pub enum AssembleError {
    /// No store in the chain holds the chunk.
    MissingChunk(HashSum),
    /// The stored chunk does not decode to content matching its id.
    CorruptChunk(HashSum),
    Store(StoreError),
    Io(std::io::Error),
    Cancelled,
    ThreadJoin(tokio::task::JoinError),
}

impl std::error::Error for AssembleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::ThreadJoin(err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssembleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingChunk(id) => write!(f, "missing chunk {}", id),
            Self::CorruptChunk(id) => write!(f, "corrupt chunk {}", id),
            Self::Store(err) => write!(f, "store error: {}", err),
            Self::Io(err) => write!(f, "i/o error: {}", err),
            Self::Cancelled => write!(f, "cancelled"),
            Self::ThreadJoin(err) => write!(f, "error joining thread: {}", err),
        }
    }
}

impl From<tokio::task::JoinError> for AssembleError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::ThreadJoin(e)
    }
}

/// Assembly options.
#[derive(Default, Clone)]
pub struct Options {
    pub max_buffered_chunks: usize,
    pub verify_output: bool,
    pub cancel: CancelFlag,
}

impl Options {
    /// Set the maximum number of chunks in flight while assembling.
    ///
    /// 0 will result in an automatically selected value.
    pub fn max_buffered_chunks(mut self, num: usize) -> Self {
        self.max_buffered_chunks = num;
        self
    }
    /// Re-read and re-hash the output file after writing it.
    pub fn verify_output(mut self, verify: bool) -> Self {
        self.verify_output = verify;
        self
    }
    /// Use the given cancellation flag.
    pub fn cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }
    pub(crate) fn get_max_buffered_chunks(&self) -> usize {
        if self.max_buffered_chunks == 0 {
            // Single buffer if we have a single core, otherwise number of cores x 2
            match num_cpus::get() {
                0 | 1 => 1,
                n => n * 2,
            }
        } else {
            self.max_buffered_chunks
        }
    }
}

/// Result of an assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssembleStats {
    pub chunks_processed: usize,
    pub bytes_written: u64,
    pub verification_passed: bool,
}

/// Rebuild the stream described by `index` into `output`.
///
/// Chunks are fetched and decoded with bounded concurrency but written
/// strictly in index order. The first failure aborts the assembly.
pub async fn to_writer<S, W>(
    index: &Index,
    store: &S,
    output: &mut W,
    opts: &Options,
) -> Result<AssembleStats, AssembleError>
where
    S: ChunkStore,
    W: AsyncWrite + Unpin,
{
    let cancel = &opts.cancel;
    let mut chunk_stream = stream::iter(index.chunks().iter().copied())
        .map(|chunk| async move {
            if cancel.is_cancelled() {
                return Err(AssembleError::Cancelled);
            }
            let file = match store.get(&chunk.id).await {
                Ok(file) => file,
                Err(StoreError::NotFound(id)) => return Err(AssembleError::MissingChunk(id)),
                Err(err) => return Err(AssembleError::Store(err)),
            };
            tokio::task::spawn_blocking(move || {
                let verified = chunk_file::decode_chunk_file(file, &chunk.id).map_err(
                    |err| match err {
                        ChunkFileError::Io(err) => AssembleError::Io(err),
                        _ => AssembleError::CorruptChunk(chunk.id),
                    },
                )?;
                Ok((chunk, verified))
            })
            .await?
        })
        .buffered(opts.get_max_buffered_chunks());

    let mut stats = AssembleStats {
        chunks_processed: 0,
        bytes_written: 0,
        verification_passed: false,
    };
    while let Some(result) = chunk_stream.next().await {
        let (chunk, verified) = result?;
        debug!(
            "chunk {} of size {} ends at offset {}",
            verified.hash(),
            verified.len(),
            chunk.offset
        );
        output
            .write_all(verified.data())
            .await
            .map_err(AssembleError::Io)?;
        stats.chunks_processed += 1;
        stats.bytes_written += verified.len() as u64;
    }
    output.flush().await.map_err(AssembleError::Io)?;
    stats.verification_passed = stats.bytes_written == index.total_size();
    Ok(stats)
}

/// Rebuild the stream described by `index` into a file at `path`.
///
/// A failed assembly removes the partial output before returning. With
/// `verify_output` set the written file is re-read and every chunk of it
/// hashed against the index again.
pub async fn to_file<S>(
    index: &Index,
    store: &S,
    path: &Path,
    opts: &Options,
) -> Result<AssembleStats, AssembleError>
where
    S: ChunkStore,
{
    let mut output = tokio::fs::File::create(path)
        .await
        .map_err(AssembleError::Io)?;
    let mut stats = match to_writer(index, store, &mut output, opts).await {
        Ok(stats) => stats,
        Err(err) => {
            drop(output);
            if let Err(remove_err) = tokio::fs::remove_file(path).await {
                warn!(
                    "failed to remove partial output {}: {}",
                    path.display(),
                    remove_err
                );
            }
            return Err(err);
        }
    };
    if opts.verify_output {
        stats.verification_passed =
            stats.verification_passed && reverify(index, path).await.map_err(AssembleError::Io)?;
    }
    Ok(stats)
}

async fn reverify(index: &Index, path: &Path) -> Result<bool, std::io::Error> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut buf = Vec::new();
    for chunk in index.chunks() {
        buf.resize(chunk.size as usize, 0);
        if let Err(err) = file.read_exact(&mut buf).await {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                return Ok(false);
            }
            return Err(err);
        }
        if HashSum::digest(&buf) != chunk.id {
            debug!("chunk {} re-hash mismatch in output", chunk.id);
            return Ok(false);
        }
    }
    // The file must also end where the index says it does.
    Ok(file.read(&mut [0u8; 1]).await? == 0)
}
