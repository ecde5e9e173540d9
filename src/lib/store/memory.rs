//! In-memory object store for tests and in-process pipelines.

use crate::errors::{Result, VarsumError};
use crate::store::{ObjectMeta, ObjectStore};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Mutex-held map of keys to byte buffers.
///
/// The reference [`ObjectStore`] implementation. Supports injecting a burst
/// of transient read failures to exercise retry paths in tests.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    failing_gets: AtomicU32,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` reads fail with a retryable error.
    pub fn fail_next_gets(&self, n: u32) {
        self.failing_gets.store(n, Ordering::SeqCst);
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    /// Whether the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn maybe_fail(&self, key: &str) -> Result<()> {
        // Decrement-if-positive; SeqCst keeps injected failures exact even
        // when hit from several reader threads.
        let mut remaining = self.failing_gets.load(Ordering::SeqCst);
        while remaining > 0 {
            match self.failing_gets.compare_exchange(
                remaining,
                remaining - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    return Err(VarsumError::Store {
                        key: key.to_string(),
                        reason: "injected transient read failure".to_string(),
                        retryable: true,
                    });
                }
                Err(current) => remaining = current,
            }
        }
        Ok(())
    }

    fn missing(key: &str) -> VarsumError {
        VarsumError::Store {
            key: key.to_string(),
            reason: "object not found".to_string(),
            retryable: false,
        }
    }
}

impl ObjectStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.maybe_fail(key)?;
        let objects = self.objects.lock();
        objects.get(key).cloned().ok_or_else(|| Self::missing(key))
    }

    fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        self.maybe_fail(key)?;
        let objects = self.objects.lock();
        let data = objects.get(key).ok_or_else(|| Self::missing(key))?;
        let len = data.len() as u64;
        if start >= len {
            return Err(VarsumError::Store {
                key: key.to_string(),
                reason: format!("range start {start} is past object end ({len} bytes)"),
                retryable: false,
            });
        }
        let end = end.min(len - 1);
        Ok(data[start as usize..=end as usize].to_vec())
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.objects.lock().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let objects = self.objects.lock();
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, data)| ObjectMeta { key: key.clone(), size: data.len() as u64 })
            .collect())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().remove(key);
        Ok(())
    }

    fn size(&self, key: &str) -> Result<u64> {
        let objects = self.objects.lock();
        objects.get(key).map(|d| d.len() as u64).ok_or_else(|| Self::missing(key))
    }
}
