//! Fixtures shared by the unit tests: real image files in temp directories,
//! explicit file times, and a codec that counts how often it is used.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, SystemTime};

use image::{Rgb, RgbImage};

use crate::codec::{CodecError, ImageCodec, PixelBuffer, StandardCodec};
use crate::element::{Element, ElementPool, Renderer};
use crate::format::ImageFormat;

/// A fixed point in the past so tests never race the filesystem clock.
pub fn base_time() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

pub fn at(offset_secs: u64) -> SystemTime {
    base_time() + Duration::from_secs(offset_secs)
}

/// Write a small real image encoded as `format` under `dir/name`.
pub fn write_image(dir: &Path, name: &str, format: image::ImageFormat) -> PathBuf {
    let path = dir.join(name);
    let img = RgbImage::from_pixel(4, 3, Rgb([200, 100, 50]));
    img.save_with_format(&path, format)
        .expect("failed to write test image");
    path
}

pub fn write_png(dir: &Path, name: &str) -> PathBuf {
    write_image(dir, name, image::ImageFormat::Png)
}

pub fn write_text(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("failed to write test file");
    path
}

/// Set the modification time of a file or directory.
pub fn set_mtime(path: &Path, time: SystemTime) {
    fs::File::open(path)
        .and_then(|f| f.set_modified(time))
        .expect("failed to set modification time");
}

/// Push the directory's modification time well past anything a scan saw.
pub fn touch_dir(dir: &Path) {
    set_mtime(dir, SystemTime::now() + Duration::from_secs(3600));
}

#[derive(Default, Clone)]
pub struct CodecCalls {
    pub detects: Rc<Cell<usize>>,
    pub decodes: Rc<Cell<usize>>,
}

impl CodecCalls {
    pub fn detects(&self) -> usize {
        self.detects.get()
    }

    pub fn decodes(&self) -> usize {
        self.decodes.get()
    }
}

/// Wraps [`StandardCodec`] and records every call.
#[derive(Default)]
pub struct CountingCodec {
    inner: StandardCodec,
    pub calls: CodecCalls,
}

impl CountingCodec {
    pub fn new() -> (Self, CodecCalls) {
        let codec = Self::default();
        let calls = codec.calls.clone();
        (codec, calls)
    }
}

impl ImageCodec for CountingCodec {
    fn detect(&self, header: &[u8]) -> ImageFormat {
        self.calls.detects.set(self.calls.detects.get() + 1);
        self.inner.detect(header)
    }

    fn decode(&self, bytes: &[u8], format: ImageFormat) -> Result<PixelBuffer, CodecError> {
        self.calls.decodes.set(self.calls.decodes.get() + 1);
        self.inner.decode(bytes, format)
    }
}

/// [`ElementPool`] whose live count stays observable after being boxed.
#[derive(Default)]
pub struct CountingRenderer {
    pool: ElementPool,
    pub live: Rc<Cell<usize>>,
}

impl CountingRenderer {
    pub fn new() -> (Self, Rc<Cell<usize>>) {
        let renderer = Self::default();
        let live = Rc::clone(&renderer.live);
        (renderer, live)
    }
}

impl Renderer for CountingRenderer {
    fn create_element(&mut self, pixels: PixelBuffer) -> Element {
        let element = self.pool.create_element(pixels);
        self.live.set(self.pool.live());
        element
    }

    fn destroy_element(&mut self, element: Element) {
        self.pool.destroy_element(element);
        self.live.set(self.pool.live());
    }
}
