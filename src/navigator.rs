use std::path::{Path, PathBuf};

use crate::codec::ImageCodec;
use crate::element::{Element, Renderer};
use crate::error::{Error, Result};
use crate::index::DirectoryIndex;
use crate::record::FileRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavState {
    /// No supported image in the working directory.
    Empty,
    /// Key of the active record. Its element may or may not be loaded.
    Selected(PathBuf),
    ShutDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Owns the directory index and the notion of "the image on screen".
///
/// Every navigation request rescans the directory first, then moves, then
/// lazily decodes the newly active file. Files that vanished from disk are
/// dropped from the index when navigation runs into them.
pub struct Navigator {
    index: DirectoryIndex,
    codec: Box<dyn ImageCodec>,
    renderer: Box<dyn Renderer>,
    state: NavState,
}

impl Navigator {
    pub fn new(
        index: DirectoryIndex,
        codec: Box<dyn ImageCodec>,
        renderer: Box<dyn Renderer>,
    ) -> Self {
        Self {
            index,
            codec,
            renderer,
            state: NavState::Empty,
        }
    }

    pub fn state(&self) -> &NavState {
        &self.state
    }

    pub fn index(&self) -> &DirectoryIndex {
        &self.index
    }

    pub fn active_path(&self) -> Option<&Path> {
        match &self.state {
            NavState::Selected(key) => Some(key.as_path()),
            _ => None,
        }
    }

    pub fn active_record(&self) -> Option<&FileRecord> {
        self.active_path().and_then(|key| self.index.get(key))
    }

    /// The active element as last loaded, without touching the disk.
    pub fn loaded(&self) -> Option<&Element> {
        self.active_record().and_then(FileRecord::element)
    }

    pub fn active_element_mut(&mut self) -> Option<&mut Element> {
        let NavState::Selected(key) = &self.state else {
            return None;
        };
        self.index.get_mut(key).and_then(FileRecord::element_mut)
    }

    /// 1-based slot of the active image and the number of tracked images.
    pub fn position(&self) -> Option<(usize, usize)> {
        let key = self.active_path()?;
        Some((self.index.position(key)?, self.index.len()))
    }

    pub fn set_working_directory(&mut self, path: &Path) -> Result<()> {
        self.ensure_usable()?;
        let evicted = self.index.set_working_directory(path)?;
        self.release(evicted);
        let orphaned = self
            .active_path()
            .is_some_and(|key| !self.index.contains(key));
        if orphaned {
            self.state = NavState::Empty;
        }
        Ok(())
    }

    /// Show `target`: a directory opens on its first image, a file opens its
    /// directory with that file active (or the first image if the file is
    /// not a supported image).
    pub fn open(&mut self, target: &Path) -> Result<Option<&Element>> {
        self.ensure_usable()?;
        if target.is_dir() {
            self.set_working_directory(target)?;
            return self.first();
        }

        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        self.set_working_directory(dir)?;
        self.rescan();

        let wanted = target
            .file_name()
            .map(|name| self.index.working_directory().join(name))
            .filter(|key| self.index.contains(key));
        let key = match wanted {
            Some(key) => Some(key),
            None => {
                log::warn!(
                    "{} is not a supported image, showing the first one instead",
                    target.display()
                );
                self.index.first()
            }
        };
        self.select(key);
        self.current()
    }

    /// The active element, (re)decoded if needed. `None` when there is no
    /// image or the active file cannot be decoded right now.
    pub fn current(&mut self) -> Result<Option<&Element>> {
        self.ensure_usable()?;
        loop {
            let Some(key) = self.active_path().map(Path::to_path_buf) else {
                return Ok(None);
            };

            let Some(record) = self.index.get_mut(&key) else {
                let first = self.index.first();
                self.select(first);
                continue;
            };

            let loaded = record
                .ensure_loaded(self.codec.as_ref(), self.renderer.as_mut())
                .map(|_| ());
            match loaded {
                Ok(()) => break,
                Err(Error::FileMissing(path)) => {
                    log::warn!("{} no longer exists, showing the first image", path.display());
                    self.forget(&key);
                    let first = self.index.first();
                    self.select(first);
                }
                Err(e) => {
                    log::warn!("{}", e);
                    return Ok(None);
                }
            }
        }
        Ok(self.loaded())
    }

    pub fn next(&mut self) -> Result<Option<&Element>> {
        self.step(Direction::Forward)
    }

    pub fn previous(&mut self) -> Result<Option<&Element>> {
        self.step(Direction::Backward)
    }

    pub fn first(&mut self) -> Result<Option<&Element>> {
        self.jump(Direction::Forward)
    }

    pub fn last(&mut self) -> Result<Option<&Element>> {
        self.jump(Direction::Backward)
    }

    /// Pick up directory changes without moving, unless nothing was shown.
    pub fn refresh(&mut self) -> Result<Option<&Element>> {
        self.ensure_usable()?;
        self.rescan();
        if self.state == NavState::Empty {
            let first = self.index.first();
            self.select(first);
        }
        self.current()
    }

    /// Release every element. The navigator is unusable afterwards.
    pub fn shutdown(&mut self) -> Result<()> {
        self.ensure_usable()?;
        self.state = NavState::ShutDown;
        let records = self.index.drain();
        let count = records.len();
        self.release(records);
        log::info!("shut down, released {} tracked files", count);
        Ok(())
    }

    fn ensure_usable(&self) -> Result<()> {
        match self.state {
            NavState::ShutDown => Err(Error::AlreadyShutDown),
            _ => Ok(()),
        }
    }

    fn rescan(&mut self) -> usize {
        let added = match self.index.reconcile(self.codec.as_ref()) {
            Ok(added) => added,
            Err(e) => {
                log::warn!("could not rescan: {}", e);
                0
            }
        };
        if self.index.is_empty() {
            log::debug!(
                "no supported images in {}",
                self.index.working_directory().display()
            );
        }
        added
    }

    fn edge(&self, direction: Direction) -> Option<PathBuf> {
        match direction {
            Direction::Forward => self.index.first(),
            Direction::Backward => self.index.last(),
        }
    }

    fn jump(&mut self, direction: Direction) -> Result<Option<&Element>> {
        self.ensure_usable()?;
        self.rescan();
        let target = self.edge(direction);
        self.select(target);
        self.current()
    }

    fn step(&mut self, direction: Direction) -> Result<Option<&Element>> {
        self.ensure_usable()?;
        self.rescan();

        let active = self.active_path().map(Path::to_path_buf);
        let target = match active {
            Some(key) => {
                let neighbor = match direction {
                    Direction::Forward => self.index.successor(&key),
                    Direction::Backward => self.index.predecessor(&key),
                };
                let neighbor = neighbor.ok().or_else(|| self.edge(direction));

                let vanished = !self
                    .index
                    .get(&key)
                    .is_some_and(FileRecord::exists_on_disk);
                if vanished {
                    log::warn!("{} no longer exists", key.display());
                    self.forget(&key);
                    neighbor.filter(|k| *k != key)
                } else {
                    neighbor
                }
            }
            None => self.edge(direction),
        };

        self.select(target);
        self.current()
    }

    /// Make `key` active, releasing the element of the image navigated away
    /// from.
    fn select(&mut self, key: Option<PathBuf>) {
        let previous = self.active_path().map(Path::to_path_buf);
        if previous != key {
            log::debug!("[nav] {:?} -> {:?}", previous, key);
            if let Some(prev) = previous.as_deref() {
                if let Some(record) = self.index.get_mut(prev) {
                    record.close(self.renderer.as_mut());
                }
            }
        }
        self.state = match key {
            Some(key) => NavState::Selected(key),
            None => NavState::Empty,
        };
    }

    fn forget(&mut self, key: &Path) {
        if let Ok(mut record) = self.index.remove(key) {
            record.close(self.renderer.as_mut());
        }
    }

    fn release(&mut self, records: Vec<FileRecord>) {
        for mut record in records {
            record.close(self.renderer.as_mut());
        }
    }
}

impl Drop for Navigator {
    fn drop(&mut self) {
        if self.state != NavState::ShutDown {
            log::debug!("navigator dropped before shutdown()");
            let _ = self.shutdown();
        }
    }
}
