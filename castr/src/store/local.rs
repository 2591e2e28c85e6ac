use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::{ChunkStore, StoreError};
use crate::HashSum;

/// Chunk store in a local directory.
///
/// One file per chunk: `<root>/<first two hex chars of id>/<hex id>.cacnk`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
    pub fn root(&self) -> &Path {
        &self.root
    }
    fn chunk_path(&self, id: &HashSum) -> PathBuf {
        let hex = id.to_string();
        self.root.join(&hex[0..2]).join(format!("{}.cacnk", hex))
    }
}

#[async_trait]
impl ChunkStore for LocalStore {
    async fn has(&self, id: &HashSum) -> Result<bool, StoreError> {
        match tokio::fs::metadata(self.chunk_path(id)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn get(&self, id: &HashSum) -> Result<Bytes, StoreError> {
        match tokio::fs::read(self.chunk_path(id)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(*id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn put(&self, id: &HashSum, data: Bytes) -> Result<(), StoreError> {
        let path = self.chunk_path(id);
        let dir = path.parent().expect("chunk path has a parent").to_owned();
        tokio::fs::create_dir_all(&dir).await?;
        // Write to a uniquely named temp file in the same directory and move
        // it in place, concurrent writers of the same chunk never collide.
        tokio::task::spawn_blocking(move || -> Result<(), std::io::Error> {
            let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
            temp.write_all(&data)?;
            temp.persist(&path).map_err(|err| err.error)?;
            Ok(())
        })
        .await
        .map_err(|err| StoreError::Io(std::io::Error::other(err)))??;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<HashSum>, StoreError> {
        let mut ids = Vec::new();
        let mut root_entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(err) => return Err(err.into()),
        };
        while let Some(sub) = root_entries.next_entry().await? {
            if !sub.file_type().await?.is_dir() {
                continue;
            }
            let mut sub_entries = tokio::fs::read_dir(sub.path()).await?;
            while let Some(entry) = sub_entries.next_entry().await? {
                let name = entry.file_name();
                let Some(hex) = name.to_str().and_then(|n| n.strip_suffix(".cacnk")) else {
                    continue;
                };
                if let Some(id) = HashSum::from_hex(hex) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_has_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let data = Bytes::from_static(b"chunk file bytes");
        let id = HashSum::digest(&data);

        assert!(!store.has(&id).await.unwrap());
        assert!(matches!(
            store.get(&id).await,
            Err(StoreError::NotFound(missing)) if missing == id
        ));

        store.put(&id, data.clone()).await.unwrap();
        assert!(store.has(&id).await.unwrap());
        assert_eq!(store.get(&id).await.unwrap(), data);
        assert_eq!(store.list().await.unwrap(), vec![id]);

        // Stored under the two level fan-out layout.
        let hex = id.to_string();
        let path = dir.path().join(&hex[0..2]).join(format!("{}.cacnk", hex));
        assert!(path.is_file());
    }

    #[tokio::test]
    async fn put_overwrites_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let id = HashSum::digest(b"x");
        store.put(&id, Bytes::from_static(b"one")).await.unwrap();
        store.put(&id, Bytes::from_static(b"two")).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap(), Bytes::from_static(b"two"));
        // No temp file leftovers.
        let hex = id.to_string();
        let entries: Vec<_> = std::fs::read_dir(dir.path().join(&hex[0..2]))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn chain_reads_in_order() {
        let seed_dir = tempfile::tempdir().unwrap();
        let primary_dir = tempfile::tempdir().unwrap();
        let seed = LocalStore::new(seed_dir.path());
        let primary = LocalStore::new(primary_dir.path());

        let seeded = Bytes::from_static(b"seeded chunk");
        let seeded_id = HashSum::digest(&seeded);
        seed.put(&seeded_id, seeded.clone()).await.unwrap();

        let chain = super::super::ChainStore::new(vec![Box::new(seed), Box::new(primary.clone())]);
        assert_eq!(chain.get(&seeded_id).await.unwrap(), seeded);

        let missing = HashSum::digest(b"not there");
        assert!(matches!(
            chain.get(&missing).await,
            Err(StoreError::NotFound(id)) if id == missing
        ));

        // Writes land in the first member.
        let put_data = Bytes::from_static(b"written through chain");
        let put_id = HashSum::digest(&put_data);
        chain.put(&put_id, put_data.clone()).await.unwrap();
        assert!(!primary.has(&put_id).await.unwrap());
    }
}
