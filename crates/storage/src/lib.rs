//! File-level storage for gridded inputs.
//!
//! Provides:
//! - [`GridFileIndex`]: resolves a (date, variable group) key to file paths
//! - [`GridAccessor`]: opens each file at most once per run and hands out
//!   shared dataset handles
//! - [`DatasetCache`]: the path-keyed cache behind the accessor

pub mod accessor;
pub mod file_index;
pub mod grid_cache;

pub use accessor::GridAccessor;
pub use file_index::{DirLayout, FileGroup, GridFileIndex};
pub use grid_cache::{CachedOpen, DatasetCache, DatasetCacheStats, FailedOpen};
