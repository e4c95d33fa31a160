//! Cached access to gridded files for the duration of one run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use colloc_common::{CollocResult, GridDataset, GridField, GridSource};
use tracing::{debug, warn};

use crate::grid_cache::{CachedOpen, DatasetCache, DatasetCacheStats, FailedOpen};

/// Open in progress for one path; the first caller fills it, others wait on it.
type OpenSlot = Arc<OnceLock<CachedOpen>>;

/// Opens gridded files through a [`GridSource`], at most once per path.
///
/// Concurrent callers asking for the same path share one open through a
/// per-path slot. Opens of different paths run side by side; the cache lock
/// is only held for lookups and inserts.
pub struct GridAccessor {
    source: Arc<dyn GridSource>,
    cache: Mutex<DatasetCache>,
    in_flight: Mutex<HashMap<PathBuf, OpenSlot>>,
}

impl GridAccessor {
    /// Accessor with an unbounded per-run cache.
    pub fn new(source: Arc<dyn GridSource>) -> Self {
        Self::from_cache(source, DatasetCache::unbounded())
    }

    /// Accessor whose cache keeps at most `capacity` distinct files.
    pub fn with_capacity(source: Arc<dyn GridSource>, capacity: usize) -> Self {
        Self::from_cache(source, DatasetCache::with_capacity(capacity))
    }

    fn from_cache(source: Arc<dyn GridSource>, cache: DatasetCache) -> Self {
        Self {
            source,
            cache: Mutex::new(cache),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DatasetCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<PathBuf, OpenSlot>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open `path`, returning the cached handle (or cached failure) when
    /// the path was seen before.
    pub fn open(&self, path: &Path) -> CollocResult<Arc<GridDataset>> {
        // Lock order: in_flight, then cache. A finished open is inserted into
        // the cache before its slot is removed, so a caller holding in_flight
        // sees either the cached entry or the slot.
        let slot = {
            let mut in_flight = self.lock_in_flight();
            if let Some(entry) = self.lock().get(path) {
                return entry.into_result(path);
            }
            in_flight.entry(path.to_path_buf()).or_default().clone()
        };

        let mut opened_here = false;
        let entry = slot
            .get_or_init(|| {
                opened_here = true;
                self.open_uncached(path)
            })
            .clone();

        if opened_here {
            self.lock().insert(path.to_path_buf(), entry.clone());
            self.lock_in_flight().remove(path);
        }
        entry.into_result(path)
    }

    fn open_uncached(&self, path: &Path) -> CachedOpen {
        debug!(path = %path.display(), "Opening grid file");
        match self.source.open(path) {
            Ok(dataset) => CachedOpen::Ready(Arc::new(dataset)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to open grid file");
                CachedOpen::Failed(FailedOpen::from_error(&e))
            }
        }
    }

    /// Latitude and longitude axes of an opened dataset.
    pub fn axes<'a>(&self, dataset: &'a GridDataset) -> (&'a [f64], &'a [f64]) {
        dataset.axes()
    }

    /// 2-D raw field of `variable` at `time_index`.
    ///
    /// An absent variable yields `VariableAbsent`; the dataset stays usable.
    /// Collocation itself reads single cells with `collocation::extract`; this
    /// copies the whole layer for callers that want it in one piece.
    pub fn field(
        &self,
        dataset: &GridDataset,
        variable: &str,
        time_index: Option<usize>,
    ) -> CollocResult<GridField> {
        dataset.field(variable, time_index)
    }

    pub fn stats(&self) -> DatasetCacheStats {
        self.lock().stats()
    }

    /// Drop every cached handle (end of run). Counters are kept.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drop every cached handle and zero the counters (start of run).
    pub fn reset(&self) {
        self.lock().reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloc_common::CollocError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Condvar;
    use std::thread;
    use std::time::Duration;

    struct FlakySource {
        opens: AtomicUsize,
    }

    impl GridSource for FlakySource {
        fn open(&self, path: &Path) -> CollocResult<GridDataset> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if path.to_string_lossy().contains("bad") {
                return Err(CollocError::open_failed(path, "corrupt header"));
            }
            Ok(GridDataset::new(path, vec![0.0, 1.0], vec![0.0, 1.0]))
        }
    }

    #[test]
    fn test_open_is_cached() {
        let source = Arc::new(FlakySource {
            opens: AtomicUsize::new(0),
        });
        let accessor = GridAccessor::new(source.clone());

        let a = accessor.open(Path::new("a.nc")).unwrap();
        let b = accessor.open(Path::new("a.nc")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(source.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_open_is_cached() {
        let source = Arc::new(FlakySource {
            opens: AtomicUsize::new(0),
        });
        let accessor = GridAccessor::new(source.clone());

        for _ in 0..3 {
            let err = accessor.open(Path::new("bad.nc")).unwrap_err();
            assert!(matches!(err, CollocError::OpenFailed { .. }));
        }
        assert_eq!(source.opens.load(Ordering::SeqCst), 1);

        let stats = accessor.stats();
        assert_eq!(stats.failed_opens, 1);
        assert_eq!(stats.hits, 2);
    }

    #[test]
    fn test_absent_field() {
        let accessor = GridAccessor::new(Arc::new(FlakySource {
            opens: AtomicUsize::new(0),
        }));
        let ds = accessor.open(Path::new("a.nc")).unwrap();
        assert!(matches!(
            accessor.field(&ds, "CHL", None),
            Err(CollocError::VariableAbsent(_))
        ));
        let (lat, lon) = accessor.axes(&ds);
        assert_eq!((lat.len(), lon.len()), (2, 2));
    }

    /// Source whose opens wait until `expected` opens are running at once,
    /// or a timeout passes.
    struct RendezvousSource {
        expected: usize,
        running: Mutex<usize>,
        arrived: Condvar,
        peak: AtomicUsize,
        opens: AtomicUsize,
    }

    impl RendezvousSource {
        fn new(expected: usize) -> Self {
            Self {
                expected,
                running: Mutex::new(0),
                arrived: Condvar::new(),
                peak: AtomicUsize::new(0),
                opens: AtomicUsize::new(0),
            }
        }
    }

    impl GridSource for RendezvousSource {
        fn open(&self, path: &Path) -> CollocResult<GridDataset> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let mut running = self.running.lock().unwrap();
            *running += 1;
            self.peak.fetch_max(*running, Ordering::SeqCst);
            self.arrived.notify_all();
            let (mut running, _) = self
                .arrived
                .wait_timeout_while(running, Duration::from_millis(500), |n| *n < self.expected)
                .unwrap();
            *running -= 1;
            Ok(GridDataset::new(path, vec![0.0, 1.0], vec![0.0, 1.0]))
        }
    }

    #[test]
    fn test_different_paths_open_concurrently() {
        let source = Arc::new(RendezvousSource::new(2));
        let accessor = GridAccessor::new(source.clone());

        thread::scope(|s| {
            s.spawn(|| accessor.open(Path::new("a.nc")).unwrap());
            s.spawn(|| accessor.open(Path::new("b.nc")).unwrap());
        });

        assert_eq!(source.peak.load(Ordering::SeqCst), 2);
        assert_eq!(accessor.stats().opens, 2);
    }

    #[test]
    fn test_same_path_opened_once_under_contention() {
        let source = Arc::new(RendezvousSource::new(usize::MAX));
        let accessor = GridAccessor::new(source.clone());

        let handles: Vec<Arc<GridDataset>> = thread::scope(|s| {
            let workers: Vec<_> = (0..8)
                .map(|_| s.spawn(|| accessor.open(Path::new("a.nc")).unwrap()))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(source.opens.load(Ordering::SeqCst), 1);
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
        assert_eq!(accessor.stats().opens, 1);
    }

    #[test]
    fn test_reset_reopens() {
        let source = Arc::new(FlakySource {
            opens: AtomicUsize::new(0),
        });
        let accessor = GridAccessor::new(source.clone());

        accessor.open(Path::new("a.nc")).unwrap();
        accessor.reset();
        assert_eq!(accessor.stats().opens, 0);
        accessor.open(Path::new("a.nc")).unwrap();
        assert_eq!(source.opens.load(Ordering::SeqCst), 2);
    }
}
