//! Bounded memo of parsed env files.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::file::load_raw_pairs;
use super::source::RawMapping;
use super::ConfigError;

/// Capacity of the process-wide cache.
pub const DEFAULT_CAPACITY: usize = 32;

static GLOBAL: LazyLock<Arc<ParseCache>> =
    LazyLock::new(|| Arc::new(ParseCache::new(DEFAULT_CAPACITY)));

type Loader = dyn Fn(&Path) -> Result<RawMapping, ConfigError> + Send + Sync;

#[derive(Debug, Default)]
struct Entries {
    by_path: HashMap<PathBuf, RawMapping>,
    // Insertion order, oldest first.
    order: VecDeque<PathBuf>,
}

/// Caches parsed env files by path.
///
/// Holds at most `capacity` files; inserting past that evicts the entry that
/// was inserted first, regardless of how recently it was read. Every lookup
/// returns an owned copy, so callers can never corrupt a cached entry.
pub struct ParseCache {
    capacity: usize,
    loader: Box<Loader>,
    entries: Mutex<Entries>,
}

impl ParseCache {
    /// Creates a cache that reads files with [`load_raw_pairs`].
    pub fn new(capacity: usize) -> Self {
        Self::with_loader(capacity, load_raw_pairs)
    }

    /// Creates a cache backed by a custom loader.
    pub fn with_loader<F>(capacity: usize, loader: F) -> Self
    where
        F: Fn(&Path) -> Result<RawMapping, ConfigError> + Send + Sync + 'static,
    {
        assert!(capacity > 0, "cache capacity must be positive");
        Self {
            capacity,
            loader: Box::new(loader),
            entries: Mutex::new(Entries::default()),
        }
    }

    /// The process-wide cache used by loaders that don't set their own.
    pub fn global() -> Arc<ParseCache> {
        Arc::clone(&GLOBAL)
    }

    /// Returns the parsed pairs of `path`, loading them on first use.
    ///
    /// The file must exist even when its contents are cached.
    pub fn get_or_load(&self, path: &Path) -> Result<RawMapping, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let mut entries = self.lock();
        if let Some(pairs) = entries.by_path.get(path) {
            debug!(path = %path.display(), "env file cache hit");
            return Ok(pairs.clone());
        }

        debug!(path = %path.display(), "env file cache miss");
        let pairs = (self.loader)(path)?;

        while entries.order.len() >= self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                debug!(path = %oldest.display(), "evicting env file from cache");
                entries.by_path.remove(&oldest);
            }
        }
        entries.order.push_back(path.to_path_buf());
        entries.by_path.insert(path.to_path_buf(), pairs.clone());

        Ok(pairs)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().by_path.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.lock().by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.by_path.clear();
        entries.order.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // Entries are always left consistent, so a poisoned lock is still usable.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ParseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
