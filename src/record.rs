use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};

use crate::codec::{CodecError, ImageCodec};
use crate::element::{Element, Renderer};
use crate::error::{Error, Result};
use crate::format::{self, ImageFormat, PROLOG_LIMIT, SNIFF_LEN};

/// One tracked image file and its lazily decoded element.
///
/// Not `Clone`: the record exclusively owns its element.
pub struct FileRecord {
    path: PathBuf,
    format: ImageFormat,
    last_modified: Option<SystemTime>,
    element: Option<Element>,
    /// Reason of the last failed decode at `last_modified`.
    failure: Option<String>,
}

impl FileRecord {
    pub fn new(path: PathBuf, format: ImageFormat) -> Self {
        Self {
            path,
            format,
            last_modified: None,
            element: None,
            failure: None,
        }
    }

    /// Create a record whose format is sniffed from the file contents.
    pub fn open(path: PathBuf, codec: &dyn ImageCodec) -> Result<Self> {
        let format = detect_format(&path, codec)?;
        Ok(Self::new(path, format))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    pub fn element(&self) -> Option<&Element> {
        self.element.as_ref()
    }

    pub fn element_mut(&mut self) -> Option<&mut Element> {
        self.element.as_mut()
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn exists_on_disk(&self) -> bool {
        self.path.is_file()
    }

    /// Return the element, decoding the file first if it was never read or
    /// changed on disk since the last read.
    ///
    /// A failed decode is remembered together with the file time, so the
    /// codec is not invoked again until the file is modified.
    pub fn ensure_loaded(
        &mut self,
        codec: &dyn ImageCodec,
        renderer: &mut dyn Renderer,
    ) -> Result<&Element> {
        let modified = self.modified_on_disk()?;
        if self.is_stale(modified) {
            if let Err(source) = self.reload(modified, codec, renderer) {
                return Err(Error::Decode {
                    path: self.path.clone(),
                    source,
                });
            }
        }

        self.element.as_ref().ok_or_else(|| Error::Decode {
            path: self.path.clone(),
            source: CodecError::Cached(self.failure.clone().unwrap_or_default()),
        })
    }

    /// Release the element and forget the cached file time. Returns whether
    /// an element was released; closing twice is harmless.
    pub fn close(&mut self, renderer: &mut dyn Renderer) -> bool {
        self.last_modified = None;
        self.failure = None;
        self.release(renderer)
    }

    fn is_stale(&self, modified: SystemTime) -> bool {
        match self.last_modified() {
            Some(cached) => modified > cached,
            None => true,
        }
    }

    fn modified_on_disk(&self) -> Result<SystemTime> {
        match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(t) => Ok(t),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::FileMissing(self.path.clone()))
            }
            Err(e) => Err(Error::Decode {
                path: self.path.clone(),
                source: CodecError::Read(e),
            }),
        }
    }

    fn release(&mut self, renderer: &mut dyn Renderer) -> bool {
        match self.element.take() {
            Some(element) => {
                renderer.destroy_element(element);
                true
            }
            None => false,
        }
    }

    fn reload(
        &mut self,
        modified: SystemTime,
        codec: &dyn ImageCodec,
        renderer: &mut dyn Renderer,
    ) -> std::result::Result<(), CodecError> {
        self.release(renderer);
        self.last_modified = Some(modified);

        let decoded = fs::read(&self.path)
            .map_err(CodecError::Read)
            .and_then(|bytes| codec.decode(&bytes, self.format));

        match decoded {
            Ok(pixels) => {
                log::debug!(
                    "loaded {} ({}, {}x{}, modified {})",
                    self.path.display(),
                    self.format,
                    pixels.width,
                    pixels.height,
                    DateTime::<Local>::from(modified).format("%Y-%m-%d %H:%M:%S")
                );
                self.element = Some(renderer.create_element(pixels));
                self.failure = None;
                Ok(())
            }
            Err(e) => {
                log::warn!("could not load {}: {}", self.path.display(), e);
                self.failure = Some(e.to_string());
                Err(e)
            }
        }
    }
}

impl Drop for FileRecord {
    fn drop(&mut self) {
        if self.element.is_some() {
            log::debug!("{} dropped without close()", self.path.display());
        }
    }
}

/// Sniff the format of `path` from its leading bytes. An XML document whose
/// prolog fills the sniffed prefix is read further and sniffed again from its
/// root element.
pub fn detect_format(path: &Path, codec: &dyn ImageCodec) -> Result<ImageFormat> {
    let mut file = fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let mut header = Vec::with_capacity(SNIFF_LEN);
    (&mut file)
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut header)
        .map_err(|e| Error::io(path, e))?;

    let format = codec.detect(&header);
    if format.is_supported()
        || header.len() < SNIFF_LEN
        || !format::starts_with_xml_markup(&header)
    {
        return Ok(format);
    }

    file.take(PROLOG_LIMIT)
        .read_to_end(&mut header)
        .map_err(|e| Error::io(path, e))?;
    let Some(start) = format::skip_xml_prolog(&header) else {
        return Ok(format);
    };
    let end = header.len().min(start + SNIFF_LEN);
    Ok(codec.detect(&header[start..end]))
}
