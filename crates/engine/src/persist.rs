//! Persistent state for run-once bookkeeping.

use std::collections::BTreeMap;
use std::io;

/// Bucket under which script executions are recorded.
pub const SCRIPT_BUCKET: &[u8] = b"scripts";

/// A bucketed key/value store for state that must outlive a single run.
///
/// The engine uses it only to remember which `run_once_` scripts already ran,
/// keyed by the script's content digest. Backends are supplied by the caller;
/// [`MemoryState`] covers embedding and tests.
pub trait PersistentState {
    /// Returns the value stored under `bucket`/`key`, if any.
    fn get(&mut self, bucket: &[u8], key: &[u8]) -> io::Result<Option<Vec<u8>>>;

    /// Stores `value` under `bucket`/`key`, replacing any previous value.
    fn set(&mut self, bucket: &[u8], key: &[u8], value: &[u8]) -> io::Result<()>;

    /// Removes the value stored under `bucket`/`key`, if any.
    fn delete(&mut self, bucket: &[u8], key: &[u8]) -> io::Result<()>;
}

/// An in-memory [`PersistentState`].
#[derive(Clone, Debug, Default)]
pub struct MemoryState {
    buckets: BTreeMap<Vec<u8>, BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryState {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentState for MemoryState {
    fn get(&mut self, bucket: &[u8], key: &[u8]) -> io::Result<Option<Vec<u8>>> {
        Ok(self
            .buckets
            .get(bucket)
            .and_then(|bucket| bucket.get(key))
            .cloned())
    }

    fn set(&mut self, bucket: &[u8], key: &[u8], value: &[u8]) -> io::Result<()> {
        self.buckets
            .entry(bucket.to_vec())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, bucket: &[u8], key: &[u8]) -> io::Result<()> {
        if let Some(bucket) = self.buckets.get_mut(bucket) {
            bucket.remove(key);
        }
        Ok(())
    }
}
