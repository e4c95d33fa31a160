//! Date-to-file resolution for gridded products.
//!
//! Each variable group (e.g. `plankton`, `optics`, `sst`) has a root
//! directory laid out by year:
//!
//! ```text
//! <root>/2016/20160615_plankton.nc
//! <root>/2016/20160616_plankton.nc
//! <root>/2017/...
//! ```
//!
//! A file matches a date when its stem contains the `YYYYMMDD` token (not as
//! part of a longer digit run), its extension is accepted, and its name
//! contains the group's tag if one is configured. Only the year directory of
//! the requested date is listed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

/// Directory layout under a group root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirLayout {
    /// `<root>/<YYYY>/`
    #[default]
    ByYear,
    /// `<root>/`
    Flat,
}

fn default_extensions() -> Vec<String> {
    vec!["nc".to_string()]
}

/// Where and how one variable group's files are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileGroup {
    pub root: PathBuf,
    #[serde(default)]
    pub layout: DirLayout,
    /// Substring the file name must contain, e.g. `plankton`.
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl FileGroup {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            layout: DirLayout::ByYear,
            tag: None,
            extensions: default_extensions(),
        }
    }

    pub fn with_layout(mut self, layout: DirLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    fn directory_for(&self, year: i32) -> PathBuf {
        match self.layout {
            DirLayout::ByYear => self.root.join(format!("{:04}", year)),
            DirLayout::Flat => self.root.clone(),
        }
    }

    fn accepts_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|accepted| accepted.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

type ListingKey = (String, Option<i32>);

/// Resolves (date, group) keys to gridded file paths.
///
/// Directory listings are memoized until [`GridFileIndex::clear`], which the
/// collocator calls at the start and end of every run.
pub struct GridFileIndex {
    groups: HashMap<String, FileGroup>,
    listings: Mutex<HashMap<ListingKey, Arc<Vec<PathBuf>>>>,
}

impl GridFileIndex {
    pub fn new() -> Self {
        Self {
            groups: HashMap::new(),
            listings: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_group(mut self, name: impl Into<String>, group: FileGroup) -> Self {
        self.register(name, group);
        self
    }

    pub fn register(&mut self, name: impl Into<String>, group: FileGroup) {
        self.groups.insert(name.into(), group);
    }

    pub fn group(&self, name: &str) -> Option<&FileGroup> {
        self.groups.get(name)
    }

    /// Forget memoized directory listings.
    pub fn clear(&self) {
        self.listings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Files holding `group` for `date`, sorted and deduplicated.
    ///
    /// Unknown groups, missing directories and misses all give an empty vector.
    pub fn resolve(&self, date: NaiveDate, group: &str) -> Vec<PathBuf> {
        let Some(files) = self.groups.get(group) else {
            debug!(group = %group, "Unknown variable group");
            return Vec::new();
        };

        let listing = self.listing(group, files, date.year());
        let token = date.format("%Y%m%d").to_string();

        let mut matches: Vec<PathBuf> = listing
            .iter()
            .filter(|path| file_matches(path, &token, files))
            .cloned()
            .collect();
        matches.sort();
        matches.dedup();

        if matches.is_empty() {
            debug!(group = %group, date = %date, "No grid file for date");
        }
        matches
    }

    fn listing(&self, group: &str, files: &FileGroup, year: i32) -> Arc<Vec<PathBuf>> {
        let key = (
            group.to_string(),
            match files.layout {
                DirLayout::ByYear => Some(year),
                DirLayout::Flat => None,
            },
        );

        let mut listings = self
            .listings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        listings
            .entry(key)
            .or_insert_with(|| Arc::new(list_files(&files.directory_for(year))))
            .clone()
    }
}

impl Default for GridFileIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Regular files directly inside `dir`; a missing directory lists as empty.
fn list_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "Grid directory does not exist");
        return Vec::new();
    }

    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

fn file_matches(path: &Path, token: &str, files: &FileGroup) -> bool {
    if !files.accepts_extension(path) {
        return false;
    }
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    if let Some(tag) = &files.tag {
        if !stem.contains(tag.as_str()) {
            return false;
        }
    }
    contains_date_token(stem, token)
}

/// Whether `token` occurs in `s` with no digit directly before or after it.
fn contains_date_token(s: &str, token: &str) -> bool {
    let bytes = s.as_bytes();
    s.match_indices(token).any(|(start, _)| {
        let end = start + token.len();
        let before_ok = start == 0 || !bytes[start - 1].is_ascii_digit();
        let after_ok = end == bytes.len() || !bytes[end].is_ascii_digit();
        before_ok && after_ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_date_token_boundaries() {
        assert!(contains_date_token("20160615_plankton", "20160615"));
        assert!(contains_date_token("cmems_20160615", "20160615"));
        assert!(contains_date_token("20160615", "20160615"));
        assert!(!contains_date_token("120160615", "20160615"));
        assert!(!contains_date_token("2016061512", "20160615"));
    }

    #[test]
    fn test_resolve_by_year() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("2016/20160615_plankton.nc"));
        touch(&dir.path().join("2016/20160616_plankton.nc"));
        touch(&dir.path().join("2016/20160615_plankton.txt"));
        touch(&dir.path().join("2017/20160615_plankton.nc"));

        let index = GridFileIndex::new().with_group("plankton", FileGroup::new(dir.path()));
        let date = NaiveDate::from_ymd_opt(2016, 6, 15).unwrap();

        let files = index.resolve(date, "plankton");
        assert_eq!(files, vec![dir.path().join("2016/20160615_plankton.nc")]);
    }

    #[test]
    fn test_resolve_respects_tag_and_extension_case() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("2016/20160615_plankton.NC"));
        touch(&dir.path().join("2016/20160615_optics.nc"));

        let index = GridFileIndex::new()
            .with_group("plankton", FileGroup::new(dir.path()).with_tag("plankton"))
            .with_group("optics", FileGroup::new(dir.path()).with_tag("optics"));
        let date = NaiveDate::from_ymd_opt(2016, 6, 15).unwrap();

        assert_eq!(
            index.resolve(date, "plankton"),
            vec![dir.path().join("2016/20160615_plankton.NC")]
        );
        assert_eq!(
            index.resolve(date, "optics"),
            vec![dir.path().join("2016/20160615_optics.nc")]
        );
    }

    #[test]
    fn test_resolve_sorted_when_ambiguous() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("2016/20160615_v2.nc"));
        touch(&dir.path().join("2016/20160615_v1.nc"));

        let index = GridFileIndex::new().with_group("sst", FileGroup::new(dir.path()));
        let files = index.resolve(NaiveDate::from_ymd_opt(2016, 6, 15).unwrap(), "sst");
        assert_eq!(
            files,
            vec![
                dir.path().join("2016/20160615_v1.nc"),
                dir.path().join("2016/20160615_v2.nc"),
            ]
        );
    }

    #[test]
    fn test_soft_failures_are_empty() {
        let dir = TempDir::new().unwrap();
        let index = GridFileIndex::new().with_group("sst", FileGroup::new(dir.path()));
        let date = NaiveDate::from_ymd_opt(2001, 1, 1).unwrap();

        assert!(index.resolve(date, "sst").is_empty());
        assert!(index.resolve(date, "unknown").is_empty());
    }

    #[test]
    fn test_flat_layout() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("sst_20160615.nc"));

        let index = GridFileIndex::new().with_group(
            "sst",
            FileGroup::new(dir.path()).with_layout(DirLayout::Flat),
        );
        let files = index.resolve(NaiveDate::from_ymd_opt(2016, 6, 15).unwrap(), "sst");
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_listing_is_memoized() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("2016/20160615.nc"));

        let index = GridFileIndex::new().with_group("sst", FileGroup::new(dir.path()));
        let date = NaiveDate::from_ymd_opt(2016, 6, 15).unwrap();
        assert_eq!(index.resolve(date, "sst").len(), 1);

        // Files added after the first listing are not seen during this run
        touch(&dir.path().join("2016/20160616.nc"));
        let next = NaiveDate::from_ymd_opt(2016, 6, 16).unwrap();
        assert!(index.resolve(next, "sst").is_empty());

        index.clear();
        assert_eq!(index.resolve(next, "sst"), vec![dir.path().join("2016/20160616.nc")]);
    }
}
