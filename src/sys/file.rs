//! File collaborator: sized reads at offsets, appends, deletes.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Result, ServiceInfoError};

/// Storage seam used by the protocol core.
///
/// `size_of` reports 0 for a missing file; the fetch flow relies on that to
/// abort a transfer whose file disappeared. `read_at` must return exactly
/// `len` bytes or fail.
pub trait FileStore {
    /// Size of the file at `path`, or 0 if it does not exist.
    fn size_of(&self, path: &str) -> u64;

    /// Read exactly `len` bytes starting at `offset`.
    fn read_at(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>>;

    /// Append `data` to the file at `path`, creating it if needed.
    fn append(&mut self, path: &str, data: &[u8]) -> Result<()>;

    /// Delete the file at `path`. Returns `true` if a file was removed.
    fn delete(&mut self, path: &str) -> bool;
}

/// [`FileStore`] backed by the local filesystem.
#[derive(Debug, Default)]
pub struct DiskStore;

impl DiskStore {
    /// Create a disk-backed store.
    pub fn new() -> Self {
        Self
    }
}

impl FileStore for DiskStore {
    fn size_of(&self, path: &str) -> u64 {
        fs::metadata(path).map(|m| m.len()).unwrap_or(0)
    }

    fn read_at(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut file = fs::File::open(path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn append(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(data)?;
        Ok(())
    }

    fn delete(&mut self, path: &str) -> bool {
        if Path::new(path).exists() {
            fs::remove_file(path).is_ok()
        } else {
            false
        }
    }
}

/// In-memory [`FileStore`] for hosts without a filesystem and for tests.
#[derive(Debug, Default)]
pub struct MemStore {
    files: HashMap<String, Vec<u8>>,
}

impl MemStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The full content of `path`, if present.
    pub fn content(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(|v| v.as_slice())
    }

    /// Replace the content of `path`.
    pub fn put(&mut self, path: &str, data: &[u8]) {
        self.files.insert(path.to_owned(), data.to_vec());
    }
}

impl FileStore for MemStore {
    fn size_of(&self, path: &str) -> u64 {
        self.files.get(path).map(|v| v.len() as u64).unwrap_or(0)
    }

    fn read_at(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
        let content = self
            .files
            .get(path)
            .ok_or_else(|| ServiceInfoError::content(format!("no such file '{path}'")))?;
        let start = offset as usize;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= content.len())
            .ok_or_else(|| {
                ServiceInfoError::content(format!("read past end of '{path}' at offset {offset}"))
            })?;
        Ok(content[start..end].to_vec())
    }

    fn append(&mut self, path: &str, data: &[u8]) -> Result<()> {
        self.files
            .entry(path.to_owned())
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    fn delete(&mut self, path: &str) -> bool {
        self.files.remove(path).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_store_append_and_size() {
        let mut store = MemStore::new();
        assert_eq!(store.size_of("f"), 0);
        store.append("f", b"abc").unwrap();
        store.append("f", b"def").unwrap();
        assert_eq!(store.size_of("f"), 6);
        assert_eq!(store.content("f").unwrap(), b"abcdef");
    }

    #[test]
    fn test_mem_store_read_at() {
        let mut store = MemStore::new();
        store.put("f", b"0123456789");
        assert_eq!(store.read_at("f", 3, 4).unwrap(), b"3456");
        assert!(store.read_at("f", 8, 4).is_err());
        assert!(store.read_at("missing", 0, 1).is_err());
    }

    #[test]
    fn test_mem_store_delete() {
        let mut store = MemStore::new();
        store.put("f", b"x");
        assert!(store.delete("f"));
        assert!(!store.delete("f"));
        assert_eq!(store.size_of("f"), 0);
    }

    #[test]
    fn test_disk_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunk.bin");
        let path = path.to_str().unwrap();

        let mut store = DiskStore::new();
        assert_eq!(store.size_of(path), 0);
        store.append(path, b"hello ").unwrap();
        store.append(path, b"world").unwrap();
        assert_eq!(store.size_of(path), 11);
        assert_eq!(store.read_at(path, 6, 5).unwrap(), b"world");

        assert!(store.delete(path));
        assert!(!store.delete(path));
        assert_eq!(store.size_of(path), 0);
    }

    #[test]
    fn test_disk_store_short_read_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        let path = path.to_str().unwrap();

        let mut store = DiskStore::new();
        store.append(path, b"abc").unwrap();
        assert!(store.read_at(path, 2, 10).is_err());
    }
}
