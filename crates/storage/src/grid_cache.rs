//! In-memory cache of opened grid datasets.
//!
//! Keyed by file path. Holds both successful opens and failed ones so that a
//! broken file is attempted only once per run. Unbounded by default; an LRU
//! bound on the number of distinct files can be set with
//! [`DatasetCache::with_capacity`].

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use colloc_common::{CollocError, CollocResult, GridDataset};
use lru::LruCache;
use serde::Serialize;

/// Reason a cached open failed, kept in a clonable form.
#[derive(Debug, Clone, PartialEq)]
pub enum FailedOpen {
    OpenFailed(String),
    AxisInvalid { axis: String, message: String },
    Other(String),
}

impl FailedOpen {
    pub fn from_error(err: &CollocError) -> Self {
        match err {
            CollocError::OpenFailed { message, .. } => FailedOpen::OpenFailed(message.clone()),
            CollocError::AxisInvalid { axis, message } => FailedOpen::AxisInvalid {
                axis: axis.clone(),
                message: message.clone(),
            },
            other => FailedOpen::Other(other.to_string()),
        }
    }

    /// Rebuild the error for `path`.
    pub fn to_error(&self, path: &Path) -> CollocError {
        match self {
            FailedOpen::OpenFailed(message) => CollocError::open_failed(path, message.clone()),
            FailedOpen::AxisInvalid { axis, message } => {
                CollocError::axis_invalid(axis.clone(), message.clone())
            }
            FailedOpen::Other(message) => CollocError::open_failed(path, message.clone()),
        }
    }
}

/// Outcome of opening one path.
#[derive(Debug, Clone)]
pub enum CachedOpen {
    Ready(Arc<GridDataset>),
    Failed(FailedOpen),
}

impl CachedOpen {
    /// The dataset, or the cached failure rebuilt as an error for `path`.
    pub fn into_result(self, path: &Path) -> CollocResult<Arc<GridDataset>> {
        match self {
            CachedOpen::Ready(dataset) => Ok(dataset),
            CachedOpen::Failed(failure) => Err(failure.to_error(path)),
        }
    }
}

/// Statistics for the dataset cache
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DatasetCacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Open attempts, successful or not
    pub opens: u64,
    pub failed_opens: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl DatasetCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Path-keyed cache of dataset handles.
pub struct DatasetCache {
    cache: LruCache<PathBuf, CachedOpen>,
    stats: DatasetCacheStats,
    capacity: Option<usize>,
}

impl DatasetCache {
    /// Cache without a size bound (one run holds every file it touches).
    pub fn unbounded() -> Self {
        Self {
            cache: LruCache::unbounded(),
            stats: DatasetCacheStats::default(),
            capacity: None,
        }
    }

    /// Cache holding at most `capacity` distinct files (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            stats: DatasetCacheStats::default(),
            capacity: Some(capacity.get()),
        }
    }

    /// Look up a path; records a hit or a miss.
    pub fn get(&mut self, path: &Path) -> Option<CachedOpen> {
        match self.cache.get(path) {
            Some(entry) => {
                self.stats.hits += 1;
                Some(entry.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Record the outcome of an open attempt.
    pub fn insert(&mut self, path: PathBuf, entry: CachedOpen) {
        self.stats.opens += 1;
        if matches!(entry, CachedOpen::Failed(_)) {
            self.stats.failed_opens += 1;
        }

        if let Some((evicted, _)) = self.cache.push(path.clone(), entry) {
            if evicted != path {
                self.stats.evictions += 1;
            }
        }
        self.stats.entries = self.cache.len();
    }

    pub fn stats(&self) -> DatasetCacheStats {
        let mut stats = self.stats.clone();
        stats.entries = self.cache.len();
        stats
    }

    /// Drop every handle. Statistics are kept for the run report.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.stats.entries = 0;
    }

    /// Drop every handle and zero the statistics.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.stats = DatasetCacheStats::default();
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for DatasetCache {
    fn default() -> Self {
        Self::unbounded()
    }
}
