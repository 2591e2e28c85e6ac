//! Chunk store capability and implementations.
mod local;

pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;

use crate::HashSum;

#[derive(Debug)]
pub enum StoreError {
    /// The store holds no chunk with the given id.
    NotFound(HashSum),
    Io(std::io::Error),
    /// The store does not implement the operation.
    Unsupported(&'static str),
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "no chunk with id {} in store", id),
            Self::Io(err) => write!(f, "i/o error: {}", err),
            Self::Unsupported(op) => write!(f, "store does not support {}", op),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Capabilities the engine needs from a chunk store.
///
/// Implementations map chunk ids to stored chunk file bytes. The engine
/// never assumes anything about where or how the bytes are kept.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// True if the store holds a chunk with the given id.
    async fn has(&self, id: &HashSum) -> Result<bool, StoreError>;
    /// Fetch the stored chunk file bytes for the given id.
    async fn get(&self, id: &HashSum) -> Result<Bytes, StoreError>;
    /// Store chunk file bytes under the given id.
    ///
    /// Must be atomic, a concurrent reader or writer of the same id never
    /// observes a partially written chunk.
    async fn put(&self, id: &HashSum, data: Bytes) -> Result<(), StoreError>;
    /// All chunk ids in the store.
    async fn list(&self) -> Result<Vec<HashSum>, StoreError> {
        Err(StoreError::Unsupported("list"))
    }
}

/// Store reading from a list of stores in order.
///
/// Lookups try each member store until one holds the chunk, writes go to
/// the first member. Used to consult local seed stores before a primary.
#[derive(Default)]
pub struct ChainStore {
    stores: Vec<Box<dyn ChunkStore>>,
}

impl ChainStore {
    pub fn new(stores: Vec<Box<dyn ChunkStore>>) -> Self {
        Self { stores }
    }
    pub fn push(&mut self, store: Box<dyn ChunkStore>) {
        self.stores.push(store);
    }
}

#[async_trait]
impl ChunkStore for ChainStore {
    async fn has(&self, id: &HashSum) -> Result<bool, StoreError> {
        for store in &self.stores {
            if store.has(id).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
    async fn get(&self, id: &HashSum) -> Result<Bytes, StoreError> {
        for store in &self.stores {
            match store.get(id).await {
                Ok(data) => return Ok(data),
                Err(StoreError::NotFound(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(StoreError::NotFound(*id))
    }
    async fn put(&self, id: &HashSum, data: Bytes) -> Result<(), StoreError> {
        match self.stores.first() {
            Some(store) => store.put(id, data).await,
            None => Err(StoreError::Unsupported("put on empty chain")),
        }
    }
}
