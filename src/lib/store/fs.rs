//! Directory-backed object store.

use crate::errors::{Result, VarsumError};
use crate::store::{ObjectMeta, ObjectStore};
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Object store rooted at a directory; keys are relative paths.
///
/// `put` creates intermediate directories as needed, so summary keys like
/// `vcf-summaries/contig/1/<dataset>/regions/100-5000` map directly onto the
/// filesystem.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a store rooted at `root`, creating the directory if absent.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The store's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
        {
            return Err(VarsumError::Store {
                key: key.to_string(),
                reason: "key must be a relative path without empty or dot segments".to_string(),
                retryable: false,
            });
        }
        Ok(self.root.join(key))
    }

    fn open(&self, key: &str) -> Result<fs::File> {
        let path = self.path_for(key)?;
        fs::File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VarsumError::Store {
                    key: key.to_string(),
                    reason: "object not found".to_string(),
                    retryable: false,
                }
            } else {
                VarsumError::Io(e)
            }
        })
    }

    fn collect_keys(
        &self,
        dir: &Path,
        prefix: &str,
        results: &mut Vec<ObjectMeta>,
    ) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                self.collect_keys(&path, prefix, results)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    let size = entry.metadata()?.len();
                    results.push(ObjectMeta { key, size });
                }
            }
        }
        Ok(())
    }
}

impl ObjectStore for FsStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let mut file = self.open(key)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        let mut file = self.open(key)?;
        let len = file.metadata()?.len();
        if start >= len {
            return Err(VarsumError::Store {
                key: key.to_string(),
                reason: format!("range start {start} is past object end ({len} bytes)"),
                retryable: false,
            });
        }
        let end = end.min(len - 1);
        file.seek(SeekFrom::Start(start))?;
        let mut data = vec![0u8; (end - start + 1) as usize];
        file.read_exact(&mut data)?;
        Ok(data)
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, data)?;
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let mut results = Vec::new();
        if self.root.is_dir() {
            self.collect_keys(&self.root, prefix, &mut results)?;
        }
        results.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(results)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VarsumError::Io(e)),
        }
    }

    fn size(&self, key: &str) -> Result<u64> {
        let file = self.open(key)?;
        Ok(file.metadata()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FsStore) {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_put_creates_nested_directories() {
        let (_dir, store) = store();
        store.put("a/b/c/object", b"deep").unwrap();
        assert_eq!(store.get("a/b/c/object").unwrap(), b"deep");
    }

    #[test]
    fn test_get_missing_is_permanent() {
        let (_dir, store) = store();
        let err = store.get("missing").unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_get_range_clips_at_end() {
        let (_dir, store) = store();
        store.put("k", b"0123456789").unwrap();
        assert_eq!(store.get_range("k", 3, 6).unwrap(), b"3456");
        assert_eq!(store.get_range("k", 8, 1000).unwrap(), b"89");
        assert!(store.get_range("k", 10, 12).is_err());
    }

    #[test]
    fn test_list_recursive_sorted() {
        let (_dir, store) = store();
        store.put("s/2/b", b"yy").unwrap();
        store.put("s/1/a", b"x").unwrap();
        store.put("other/c", b"z").unwrap();

        let listed = store.list("s/").unwrap();
        let keys: Vec<_> = listed.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["s/1/a", "s/2/b"]);
        assert_eq!(listed[1].size, 2);
    }

    #[test]
    fn test_list_empty_prefix_returns_everything() {
        let (_dir, store) = store();
        store.put("a", b"1").unwrap();
        store.put("b/c", b"2").unwrap();
        assert_eq!(store.list("").unwrap().len(), 2);
    }

    #[test]
    fn test_delete_idempotent() {
        let (_dir, store) = store();
        store.put("k", b"x").unwrap();
        store.delete("k").unwrap();
        store.delete("k").unwrap();
        assert!(store.get("k").is_err());
    }

    #[test]
    fn test_rejects_traversal_keys() {
        let (_dir, store) = store();
        assert!(store.get("../outside").is_err());
        assert!(store.put("/absolute", b"x").is_err());
        assert!(store.put("a//b", b"x").is_err());
        assert!(store.put("", b"x").is_err());
    }
}
