//! Single-file cell store
//!
//! File format:
//! ```text
//! [HEADER: 64 bytes]
//!   - magic: 8 bytes ("LCELLS01")
//!   - version: 4 bytes (u32 LE)
//!   - flags: 4 bytes
//!   - object_count: 8 bytes (u64 LE)
//!   - index_offset: 8 bytes (u64 LE)
//!   - reserved: 32 bytes
//!
//! [FRAMES: variable]
//!   - zstd-compressed cell encodings, concatenated
//!
//! [INDEX: variable]
//!   - array of (hash, offset, size, status) entries sorted by hash
//! ```
//!
//! The index is only written by [`FileStore::sync`]. Frames appended after
//! the last sync are lost if the process dies before the next one.

use crate::codec;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{Hash, HASH_LENGTH};
use crate::refs::{Ref, RefStatus};
use crate::store::{Loader, Store};
use crate::{MAGIC, VERSION};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const HEADER_SIZE: u64 = 64;

/// hash + offset (u64) + size (u32) + status (u8)
const INDEX_ENTRY_SIZE: usize = HASH_LENGTH + 8 + 4 + 1;

#[derive(Clone, Copy, Debug)]
struct IndexEntry {
    offset: u64,
    size: u32,
    status: RefStatus,
}

/// A content-addressed cell store backed by a single file
pub struct FileStore {
    path: PathBuf,
    file: RwLock<File>,
    index: RwLock<HashMap<Hash, IndexEntry>>,
    /// Current append position
    write_offset: RwLock<u64>,
    compression_level: i32,
    sync_on_drop: bool,
}

impl FileStore {
    /// Create a new store file, truncating any existing one
    pub fn create(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let mut header = [0u8; HEADER_SIZE as usize];
        header[0..8].copy_from_slice(MAGIC);
        header[8..12].copy_from_slice(&VERSION.to_le_bytes());
        file.write_all(&header)?;
        file.sync_all()?;

        info!(path = %path.display(), "created cell store");
        Ok(FileStore {
            path,
            file: RwLock::new(file),
            index: RwLock::new(HashMap::new()),
            write_offset: RwLock::new(HEADER_SIZE),
            compression_level: config.compression_level,
            sync_on_drop: config.sync_on_drop,
        })
    }

    /// Open an existing store file
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)
            .map_err(|_| Error::InvalidFile("truncated header".into()))?;

        if &header[0..8] != MAGIC {
            return Err(Error::InvalidFile("Invalid magic bytes".into()));
        }

        let version = u32::from_le_bytes(le_array(&header[8..12]));
        if version != VERSION {
            return Err(Error::VersionMismatch {
                expected: VERSION,
                found: version,
            });
        }

        let object_count = u64::from_le_bytes(le_array(&header[16..24]));
        let index_offset = u64::from_le_bytes(le_array(&header[24..32]));

        let mut index = HashMap::new();
        if index_offset > 0 && object_count > 0 {
            file.seek(SeekFrom::Start(index_offset))?;
            for _ in 0..object_count {
                let mut buf = [0u8; INDEX_ENTRY_SIZE];
                file.read_exact(&mut buf)?;
                let (hash, entry) = parse_index_entry(&buf)?;
                index.insert(hash, entry);
            }
        }

        // Frames resume where the index starts
        let write_offset = if index_offset > 0 {
            index_offset
        } else {
            file.seek(SeekFrom::End(0))?
        };

        info!(path = %path.display(), objects = index.len(), "opened cell store");
        Ok(FileStore {
            path,
            file: RwLock::new(file),
            index: RwLock::new(index),
            write_offset: RwLock::new(write_offset),
            compression_level: config.compression_level,
            sync_on_drop: config.sync_on_drop,
        })
    }

    pub fn open_or_create(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path, config)
        } else {
            Self::create(path, config)
        }
    }

    /// Number of cells held
    pub fn object_count(&self) -> usize {
        self.index.read().len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw canonical encoding stored under `hash`
    pub fn read_encoding(&self, hash: &Hash) -> Result<Option<Vec<u8>>> {
        let entry = match self.index.read().get(hash).copied() {
            Some(entry) => entry,
            None => return Ok(None),
        };

        let mut data = vec![0u8; entry.size as usize];
        {
            let mut file = self.file.write();
            file.seek(SeekFrom::Start(entry.offset))?;
            file.read_exact(&mut data)?;
        }
        decompress_frame(&data).map(Some)
    }

    /// Write the index and header to disk
    pub fn sync(&self) -> Result<()> {
        let index = self.index.read();
        let write_offset = *self.write_offset.read();
        let mut file = self.file.write();

        file.seek(SeekFrom::Start(16))?;
        file.write_all(&(index.len() as u64).to_le_bytes())?;
        file.write_all(&write_offset.to_le_bytes())?;

        file.seek(SeekFrom::Start(write_offset))?;

        // Sorted by hash so identical contents give identical files
        let mut entries: Vec<_> = index.iter().collect();
        entries.sort_by_key(|(h, _)| **h);

        let mut buf = Vec::with_capacity(entries.len() * INDEX_ENTRY_SIZE);
        for (hash, entry) in entries {
            buf.extend_from_slice(hash.as_bytes());
            buf.extend_from_slice(&entry.offset.to_le_bytes());
            buf.extend_from_slice(&entry.size.to_le_bytes());
            buf.push(entry.status.as_byte());
        }
        file.write_all(&buf)?;
        file.set_len(write_offset + buf.len() as u64)?;
        file.sync_all()?;

        debug!(objects = index.len(), "synced cell store index");
        Ok(())
    }

    // === Internal helpers ===

    fn append_frame(&self, frame: &[u8]) -> Result<u64> {
        let mut write_offset = self.write_offset.write();
        let offset = *write_offset;

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(frame)?;

        *write_offset = offset + frame.len() as u64;
        Ok(offset)
    }
}

impl Store for FileStore {
    fn ref_for_hash(&self, hash: &Hash, loader: &Arc<Loader>) -> Result<Option<Ref>> {
        let status = match self.index.read().get(hash) {
            Some(entry) => entry.status,
            None => return Ok(None),
        };
        let encoding = match self.read_encoding(hash)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        debug!(hash = %hash.short(), "read cell from file store");
        let cell = codec::decode_with(&encoding, loader)?;
        Ok(Some(Ref::direct(cell).with_status(status)))
    }

    fn store_ref(&self, r: &Ref, status: RefStatus) -> Result<Ref> {
        let cell = r.value()?;
        let hash = cell.hash();

        {
            let mut index = self.index.write();
            if let Some(entry) = index.get_mut(&hash) {
                entry.status = entry.status.max(status);
                let held = entry.status;
                return Ok(Ref::direct(cell).with_status(held.max(r.status())));
            }
        }

        let frame = compress_frame(cell.encoding(), self.compression_level)?;
        let size = u32::try_from(frame.len())
            .map_err(|_| Error::invalid("frame larger than 4 GiB"))?;
        let offset = self.append_frame(&frame)?;

        let held = {
            let mut index = self.index.write();
            let entry = index.entry(hash).or_insert(IndexEntry {
                offset,
                size,
                status,
            });
            entry.status = entry.status.max(status);
            entry.status
        };
        debug!(hash = %hash.short(), %held, bytes = size, "appended cell frame");
        Ok(Ref::direct(cell).with_status(held.max(r.status())))
    }

    fn status_of(&self, hash: &Hash) -> Result<Option<RefStatus>> {
        Ok(self.index.read().get(hash).map(|e| e.status))
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if self.sync_on_drop {
            if let Err(e) = self.sync() {
                warn!(error = %e, "failed to sync cell store on drop");
            }
        }
    }
}

fn compress_frame(encoding: &[u8], level: i32) -> Result<Vec<u8>> {
    Ok(zstd::encode_all(encoding, level)?)
}

fn decompress_frame(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Err(Error::Corruption("Empty frame".into()));
    }
    Ok(zstd::decode_all(data)?)
}

fn parse_index_entry(buf: &[u8; INDEX_ENTRY_SIZE]) -> Result<(Hash, IndexEntry)> {
    let hash = Hash::from_slice(&buf[0..HASH_LENGTH])
        .ok_or_else(|| Error::InvalidFile("bad index hash".into()))?;
    let offset = u64::from_le_bytes(le_array(&buf[32..40]));
    let size = u32::from_le_bytes(le_array(&buf[40..44]));
    let status = RefStatus::from_byte(buf[44])
        .ok_or_else(|| Error::InvalidFile(format!("Invalid status byte: {}", buf[44])))?;
    Ok((hash, IndexEntry { offset, size, status }))
}

fn le_array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::store::store_cell;
    use tempfile::tempdir;

    fn config() -> Config {
        Config::default()
    }

    #[test]
    fn test_create_and_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.cells");

        {
            let store = FileStore::create(&path, &config()).unwrap();
            assert_eq!(store.object_count(), 0);
        }

        {
            let store = FileStore::open(&path, &config()).unwrap();
            assert_eq!(store.object_count(), 0);
        }
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.cells");
        std::fs::write(&path, [0u8; 64]).unwrap();
        assert!(matches!(
            FileStore::open(&path, &config()),
            Err(Error::InvalidFile(_))
        ));
    }

    #[test]
    fn test_deduplication() {
        let dir = tempdir().unwrap();
        let store = FileStore::create(dir.path().join("test.cells"), &config()).unwrap();

        let cell = Cell::string("duplicate data").unwrap();
        store_cell(&store, &cell).unwrap();
        store_cell(&store, &cell).unwrap();
        assert_eq!(store.object_count(), 1);
    }

    #[test]
    fn test_persistence_with_status() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.cells");
        let cell = Cell::blob(vec![5u8; 1000]).unwrap();

        {
            let store = FileStore::create(&path, &config()).unwrap();
            store
                .store_ref(&cell.to_ref(), RefStatus::Persisted)
                .unwrap();
            store.sync().unwrap();
        }

        let store = Arc::new(FileStore::open(&path, &config()).unwrap());
        assert_eq!(
            store.status_of(&cell.hash()).unwrap(),
            Some(RefStatus::Persisted)
        );
        assert_eq!(
            store.read_encoding(&cell.hash()).unwrap().unwrap(),
            cell.encoding().to_vec()
        );

        let loader = Loader::new(store, 4).unwrap();
        let loaded = loader.load(&cell.hash()).unwrap();
        assert_eq!(*loaded, *cell);
    }

    #[test]
    fn test_append_after_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.cells");
        let first = Cell::string("first").unwrap();
        let second = Cell::string("second").unwrap();

        {
            let store = FileStore::create(&path, &config()).unwrap();
            store_cell(&store, &first).unwrap();
        }
        {
            let store = FileStore::open(&path, &config()).unwrap();
            store_cell(&store, &second).unwrap();
        }

        let store = FileStore::open(&path, &config()).unwrap();
        assert_eq!(store.object_count(), 2);
        assert_eq!(
            store.read_encoding(&first.hash()).unwrap().unwrap(),
            first.encoding().to_vec()
        );
        assert_eq!(
            store.read_encoding(&second.hash()).unwrap().unwrap(),
            second.encoding().to_vec()
        );
    }
}
