use std::collections::BTreeMap;
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use crate::codec::ImageCodec;
use crate::error::{Error, Result};
use crate::format::has_image_extension;
use crate::record::FileRecord;

/// The supported images of one working directory, ordered by path.
///
/// Reconciliation is by polling: the directory is only re-read when its own
/// modification time moved past the last scan.
pub struct DirectoryIndex {
    working_directory: PathBuf,
    entries: BTreeMap<PathBuf, FileRecord>,
    last_scan: Option<SystemTime>,
    follow_links: bool,
}

impl Default for DirectoryIndex {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(cwd)
    }
}

impl DirectoryIndex {
    pub fn new(working_directory: PathBuf) -> Self {
        Self {
            working_directory,
            entries: BTreeMap::new(),
            last_scan: None,
            follow_links: false,
        }
    }

    pub fn with_follow_links(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    /// Point the index at another directory. The next `reconcile` does a
    /// full scan. Records of a previous directory are evicted and handed back
    /// so the caller can release their elements.
    pub fn set_working_directory(&mut self, path: &Path) -> Result<Vec<FileRecord>> {
        let dir = fs::canonicalize(path)
            .ok()
            .filter(|p| p.is_dir())
            .ok_or_else(|| Error::InvalidDirectory(path.to_path_buf()))?;

        self.last_scan = None;
        if dir == self.working_directory {
            return Ok(Vec::new());
        }

        log::info!("working directory: {}", dir.display());
        self.working_directory = dir;
        Ok(self.drain())
    }

    /// Insert records for supported image files that appeared since the last
    /// scan. Returns how many were added. Files that vanished are left alone.
    pub fn reconcile(&mut self, codec: &dyn ImageCodec) -> Result<usize> {
        let dir_modified = fs::metadata(&self.working_directory)
            .and_then(|m| m.modified())
            .map_err(|e| Error::io(&self.working_directory, e))?;

        if let Some(last) = self.last_scan {
            if dir_modified <= last {
                return Ok(0);
            }
        }

        let start_time = Instant::now();
        let entries = fs::read_dir(&self.working_directory)
            .map_err(|e| Error::io(&self.working_directory, e))?;

        let mut added = 0;
        for entry in entries.filter_map(|e| e.ok()) {
            let Ok(ft) = entry.file_type() else {
                continue;
            };
            if ft.is_symlink() && !self.follow_links {
                continue;
            }

            let path = entry.path();
            if !path.is_file() || !has_image_extension(&path) || self.entries.contains_key(&path) {
                continue;
            }

            let record = match FileRecord::open(path, codec) {
                Ok(record) => record,
                Err(e) => {
                    log::debug!("skipping unreadable file: {}", e);
                    continue;
                }
            };
            if !record.format().is_supported() {
                log::debug!("skipping {}: not a supported image", record.path().display());
                continue;
            }

            self.insert(record)?;
            added += 1;
        }

        self.last_scan = Some(dir_modified);
        log::info!(
            "Scanned {} in {:.2}ms: {} new, {} tracked",
            self.working_directory.display(),
            start_time.elapsed().as_secs_f64() * 1000.0,
            added,
            self.entries.len()
        );
        Ok(added)
    }

    pub fn insert(&mut self, record: FileRecord) -> Result<()> {
        if self.entries.contains_key(record.path()) {
            return Err(Error::DuplicateEntry(record.path().to_path_buf()));
        }
        self.entries.insert(record.path().to_path_buf(), record);
        Ok(())
    }

    pub fn remove(&mut self, key: &Path) -> Result<FileRecord> {
        self.entries
            .remove(key)
            .ok_or_else(|| Error::NotFound(key.to_path_buf()))
    }

    /// Next key in path order, wrapping from the last to the first.
    pub fn successor(&self, key: &Path) -> Result<PathBuf> {
        self.check_key(key)?;
        self.entries
            .range::<Path, _>((Bound::Excluded(key), Bound::Unbounded))
            .next()
            .or_else(|| self.entries.iter().next())
            .map(|(k, _)| k.clone())
            .ok_or(Error::EmptyIndex)
    }

    /// Previous key in path order, wrapping from the first to the last.
    pub fn predecessor(&self, key: &Path) -> Result<PathBuf> {
        self.check_key(key)?;
        self.entries
            .range::<Path, _>((Bound::Unbounded, Bound::Excluded(key)))
            .next_back()
            .or_else(|| self.entries.iter().next_back())
            .map(|(k, _)| k.clone())
            .ok_or(Error::EmptyIndex)
    }

    fn check_key(&self, key: &Path) -> Result<()> {
        if self.entries.is_empty() {
            return Err(Error::EmptyIndex);
        }
        if !self.entries.contains_key(key) {
            return Err(Error::NotFound(key.to_path_buf()));
        }
        Ok(())
    }

    pub fn first(&self) -> Option<PathBuf> {
        self.entries.keys().next().cloned()
    }

    pub fn last(&self) -> Option<PathBuf> {
        self.entries.keys().next_back().cloned()
    }

    pub fn get(&self, key: &Path) -> Option<&FileRecord> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &Path) -> Option<&mut FileRecord> {
        self.entries.get_mut(key)
    }

    pub fn contains(&self, key: &Path) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 1-based slot of `key` in path order.
    pub fn position(&self, key: &Path) -> Option<usize> {
        self.keys().position(|k| k == key).map(|i| i + 1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    /// Remove every record; the next `reconcile` rescans from scratch.
    pub fn drain(&mut self) -> Vec<FileRecord> {
        self.last_scan = None;
        std::mem::take(&mut self.entries).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ImageFormat;
    use crate::test_utils::{
        touch_dir, write_image, write_png, write_text, CountingCodec,
    };
    use tempfile::tempdir;

    fn names(index: &DirectoryIndex) -> Vec<String> {
        index
            .keys()
            .map(|k| k.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    fn scanned(dir: &Path) -> DirectoryIndex {
        let (codec, _) = CountingCodec::new();
        let mut index = DirectoryIndex::default();
        index.set_working_directory(dir).expect("valid directory");
        index.reconcile(&codec).expect("reconcile");
        index
    }

    #[test]
    fn rejects_missing_directory_and_plain_files() {
        let dir = tempdir().expect("failed to create temp dir");
        let file = write_png(dir.path(), "a.png");
        let mut index = DirectoryIndex::default();

        assert!(matches!(
            index.set_working_directory(&dir.path().join("nope")),
            Err(Error::InvalidDirectory(_))
        ));
        assert!(matches!(
            index.set_working_directory(&file),
            Err(Error::InvalidDirectory(_))
        ));
    }

    #[test]
    fn reconcile_tracks_only_supported_images_in_order() {
        let dir = tempdir().expect("failed to create temp dir");
        write_image(dir.path(), "c.bmp", image::ImageFormat::Bmp);
        write_png(dir.path(), "a.png");
        write_image(dir.path(), "b.jpg", image::ImageFormat::Jpeg);
        write_text(dir.path(), "notes.txt", "not an image");
        write_text(dir.path(), "fake.png", "plain text with an image name");
        fs::create_dir(dir.path().join("sub.png")).expect("create subdir");

        let index = scanned(dir.path());
        assert_eq!(names(&index), ["a.png", "b.jpg", "c.bmp"]);
        let b = index.working_directory().join("b.jpg");
        assert_eq!(index.get(&b).map(|r| r.format()), Some(ImageFormat::Jpg));
    }

    #[test]
    fn unchanged_directory_is_not_rescanned() {
        let dir = tempdir().expect("failed to create temp dir");
        write_png(dir.path(), "a.png");
        write_png(dir.path(), "b.png");

        let (codec, calls) = CountingCodec::new();
        let mut index = DirectoryIndex::default();
        index.set_working_directory(dir.path()).expect("valid directory");

        assert_eq!(index.reconcile(&codec).expect("first scan"), 2);
        let detects = calls.detects();
        assert_eq!(detects, 2);

        assert_eq!(index.reconcile(&codec).expect("second scan"), 0);
        assert_eq!(calls.detects(), detects);
        assert_eq!(calls.decodes(), 0);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn new_files_are_picked_up_and_known_ones_not_resniffed() {
        let dir = tempdir().expect("failed to create temp dir");
        write_png(dir.path(), "a.png");

        let (codec, calls) = CountingCodec::new();
        let mut index = DirectoryIndex::default();
        index.set_working_directory(dir.path()).expect("valid directory");
        index.reconcile(&codec).expect("first scan");

        write_png(dir.path(), "b.png");
        touch_dir(dir.path());
        assert_eq!(index.reconcile(&codec).expect("rescan"), 1);
        assert_eq!(calls.detects(), 2);
        assert_eq!(names(&index), ["a.png", "b.png"]);
    }

    #[test]
    fn deleted_files_stay_until_removed() {
        let dir = tempdir().expect("failed to create temp dir");
        let a = write_png(dir.path(), "a.png");
        write_png(dir.path(), "b.png");
        let mut index = scanned(dir.path());

        fs::remove_file(&a).expect("remove file");
        touch_dir(dir.path());
        let (codec, _) = CountingCodec::new();
        index.reconcile(&codec).expect("rescan");
        assert_eq!(index.len(), 2);

        let key = index.working_directory().join("a.png");
        index.remove(&key).expect("remove record");
        assert!(!index.contains(&key));
        assert!(matches!(index.remove(&key), Err(Error::NotFound(_))));
    }

    #[test]
    fn duplicate_insert_fails() {
        let mut index = DirectoryIndex::new(PathBuf::from("/images"));
        let path = PathBuf::from("/images/a.png");
        index
            .insert(FileRecord::new(path.clone(), ImageFormat::Png))
            .expect("first insert");
        assert!(matches!(
            index.insert(FileRecord::new(path.clone(), ImageFormat::Png)),
            Err(Error::DuplicateEntry(p)) if p == path
        ));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn traversal_wraps_in_both_directions() {
        let mut index = DirectoryIndex::new(PathBuf::from("/images"));
        for name in ["b.png", "c.bmp", "a.png"] {
            let path = Path::new("/images").join(name);
            index
                .insert(FileRecord::new(path, ImageFormat::Png))
                .expect("insert");
        }
        let a = Path::new("/images/a.png");
        let b = Path::new("/images/b.png");
        let c = Path::new("/images/c.bmp");

        assert_eq!(index.successor(a).unwrap(), b);
        assert_eq!(index.successor(c).unwrap(), a);
        assert_eq!(index.predecessor(a).unwrap(), c);
        assert_eq!(index.predecessor(c).unwrap(), b);
        assert_eq!(index.first().as_deref(), Some(a));
        assert_eq!(index.last().as_deref(), Some(c));
        assert_eq!(index.position(b), Some(2));
    }

    #[test]
    fn single_entry_is_its_own_neighbor() {
        let mut index = DirectoryIndex::new(PathBuf::from("/images"));
        let a = PathBuf::from("/images/a.png");
        index
            .insert(FileRecord::new(a.clone(), ImageFormat::Png))
            .expect("insert");
        assert_eq!(index.successor(&a).unwrap(), a);
        assert_eq!(index.predecessor(&a).unwrap(), a);
    }

    #[test]
    fn traversal_errors() {
        let mut index = DirectoryIndex::new(PathBuf::from("/images"));
        let a = Path::new("/images/a.png");
        assert!(matches!(index.successor(a), Err(Error::EmptyIndex)));
        assert!(matches!(index.predecessor(a), Err(Error::EmptyIndex)));

        index
            .insert(FileRecord::new(PathBuf::from("/images/b.png"), ImageFormat::Png))
            .expect("insert");
        assert!(matches!(index.successor(a), Err(Error::NotFound(_))));
        assert!(matches!(index.predecessor(a), Err(Error::NotFound(_))));
    }

    #[test]
    fn changing_directory_evicts_previous_records() {
        let first = tempdir().expect("failed to create temp dir");
        let second = tempdir().expect("failed to create temp dir");
        write_png(first.path(), "a.png");
        write_png(second.path(), "z.png");

        let (codec, _) = CountingCodec::new();
        let mut index = scanned(first.path());
        assert!(index.set_working_directory(first.path()).expect("same dir").is_empty());

        let evicted = index.set_working_directory(second.path()).expect("other dir");
        assert_eq!(evicted.len(), 1);
        assert!(index.is_empty());
        index.reconcile(&codec).expect("scan second");
        assert_eq!(names(&index), ["z.png"]);
    }

    #[test]
    fn symlinks_follow_the_configured_policy() {
        let dir = tempdir().expect("failed to create temp dir");
        let other = tempdir().expect("failed to create temp dir");
        let target = write_png(other.path(), "real.png");
        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, dir.path().join("link.png")).expect("symlink");
        #[cfg(not(unix))]
        let _ = target;

        let (codec, _) = CountingCodec::new();
        let mut skipping = DirectoryIndex::default();
        skipping.set_working_directory(dir.path()).expect("valid directory");
        skipping.reconcile(&codec).expect("scan");
        assert!(skipping.is_empty());

        #[cfg(unix)]
        {
            let mut following = DirectoryIndex::default().with_follow_links(true);
            following.set_working_directory(dir.path()).expect("valid directory");
            following.reconcile(&codec).expect("scan");
            assert_eq!(names(&following), ["link.png"]);
        }
    }
}
