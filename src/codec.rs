use resvg::{tiny_skia, usvg};
use thiserror::Error;

use crate::format::{self, ImageFormat};

// ---------------------------------------------------------------------------
// Decoded pixel data (straight-alpha RGBA8, row-major)
// ---------------------------------------------------------------------------

pub struct PixelBuffer {
    pub rgba_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PixelBuffer {
    pub fn mem_size(&self) -> u64 {
        self.rgba_bytes.len() as u64
    }
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("no decoder available for {0}")]
    Unsupported(ImageFormat),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("SVG: {0}")]
    Svg(String),

    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),

    /// The previous attempt failed and the file has not changed since.
    #[error("{0} (unchanged since last attempt)")]
    Cached(String),
}

/// Format detection and decoding, kept behind a trait so the navigation core
/// can run against a scripted codec in tests.
pub trait ImageCodec {
    fn detect(&self, header: &[u8]) -> ImageFormat {
        format::sniff(header)
    }

    fn decode(&self, bytes: &[u8], format: ImageFormat) -> Result<PixelBuffer, CodecError>;
}

// ---------------------------------------------------------------------------
// Default codec: `image` for raster formats, `resvg` for SVG
// ---------------------------------------------------------------------------

type Decoder = fn(&[u8], ImageFormat) -> Result<PixelBuffer, CodecError>;

const DECODERS: &[(ImageFormat, Decoder)] = &[
    (ImageFormat::Bmp, decode_raster),
    (ImageFormat::Jpg, decode_raster),
    (ImageFormat::Png, decode_raster),
    (ImageFormat::Gif, decode_raster),
    (ImageFormat::Webp, decode_raster),
    (ImageFormat::Tif, decode_raster),
    (ImageFormat::Svg, decode_svg),
    (ImageFormat::Ico, decode_raster),
    (ImageFormat::Cur, decode_cursor),
    (ImageFormat::Pnm, decode_raster),
    (ImageFormat::Tga, decode_raster),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct StandardCodec;

impl ImageCodec for StandardCodec {
    fn decode(&self, bytes: &[u8], format: ImageFormat) -> Result<PixelBuffer, CodecError> {
        let decoder = DECODERS
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, d)| *d)
            .ok_or(CodecError::Unsupported(format))?;
        decoder(bytes, format)
    }
}

fn raster_format(format: ImageFormat) -> Option<image::ImageFormat> {
    Some(match format {
        ImageFormat::Bmp => image::ImageFormat::Bmp,
        ImageFormat::Jpg => image::ImageFormat::Jpeg,
        ImageFormat::Png => image::ImageFormat::Png,
        ImageFormat::Gif => image::ImageFormat::Gif,
        ImageFormat::Webp => image::ImageFormat::WebP,
        ImageFormat::Tif => image::ImageFormat::Tiff,
        ImageFormat::Ico | ImageFormat::Cur => image::ImageFormat::Ico,
        ImageFormat::Pnm => image::ImageFormat::Pnm,
        ImageFormat::Tga => image::ImageFormat::Tga,
        _ => return None,
    })
}

fn decode_raster(bytes: &[u8], format: ImageFormat) -> Result<PixelBuffer, CodecError> {
    let target = raster_format(format).ok_or(CodecError::Unsupported(format))?;
    let rgba = image::load_from_memory_with_format(bytes, target)?.to_rgba8();
    let (width, height) = (rgba.width(), rgba.height());
    Ok(PixelBuffer {
        rgba_bytes: rgba.into_raw(),
        width,
        height,
    })
}

// A cursor file is an icon directory with type 2 and hotspots in place of
// planes/bpp; the icon decoder reads the embedded images the same way.
fn decode_cursor(bytes: &[u8], format: ImageFormat) -> Result<PixelBuffer, CodecError> {
    let mut patched = bytes.to_vec();
    if patched.len() > 2 {
        patched[2] = 1;
    }
    decode_raster(&patched, format)
}

fn decode_svg(bytes: &[u8], _format: ImageFormat) -> Result<PixelBuffer, CodecError> {
    let tree = usvg::Tree::from_data(bytes, &usvg::Options::default())
        .map_err(|e| CodecError::Svg(e.to_string()))?;

    let size = tree.size().to_int_size();
    let (width, height) = (size.width(), size.height());
    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| CodecError::Svg("SVG has empty dimensions".into()))?;

    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    // tiny-skia stores premultiplied alpha
    let rgba_bytes = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();

    Ok(PixelBuffer {
        rgba_bytes,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(img: &RgbaImage, format: image::ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img.clone())
            .to_rgb8()
            .write_to(&mut out, format)
            .expect("encode test image");
        out.into_inner()
    }

    #[test]
    fn decodes_png_to_rgba() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        let bytes = encode(&img, image::ImageFormat::Png);

        let codec = StandardCodec;
        assert_eq!(codec.detect(&bytes), ImageFormat::Png);
        let pixels = codec.decode(&bytes, ImageFormat::Png).expect("decode png");
        assert_eq!((pixels.width, pixels.height), (3, 2));
        assert_eq!(pixels.mem_size(), 3 * 2 * 4);
        assert_eq!(&pixels.rgba_bytes[0..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn cursor_decodes_through_icon_decoder() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Ico)
            .expect("encode test icon");
        let mut bytes = out.into_inner();
        bytes[2] = 2;

        assert_eq!(StandardCodec.detect(&bytes), ImageFormat::Cur);
        let pixels = StandardCodec
            .decode(&bytes, ImageFormat::Cur)
            .expect("decode cursor");
        assert_eq!((pixels.width, pixels.height), (2, 2));
        assert_eq!(&pixels.rgba_bytes[0..4], &[0, 0, 255, 255]);
    }

    #[test]
    fn rasterizes_svg() {
        let svg = br##"<svg xmlns="http://www.w3.org/2000/svg" width="8" height="4">
            <rect width="8" height="4" fill="#ff0000"/></svg>"##;
        let pixels = StandardCodec
            .decode(svg, ImageFormat::Svg)
            .expect("decode svg");
        assert_eq!((pixels.width, pixels.height), (8, 4));
        assert_eq!(&pixels.rgba_bytes[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn recognized_but_undecodable_formats_report_unsupported() {
        let err = StandardCodec
            .decode(b"gimp xcf v011", ImageFormat::Xcf)
            .err()
            .expect("xcf has no decoder");
        assert!(matches!(err, CodecError::Unsupported(ImageFormat::Xcf)));
    }

    #[test]
    fn corrupt_data_is_an_error() {
        let err = StandardCodec.decode(b"\x89PNG\r\n\x1a\ntruncated", ImageFormat::Png);
        assert!(matches!(err, Err(CodecError::Image(_))));
    }
}
