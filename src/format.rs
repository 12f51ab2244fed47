use std::fmt;
use std::path::Path;

/// Number of leading bytes handed to the detectors.
pub const SNIFF_LEN: usize = 4096;

/// How far into an XML document the scanner reads to get past its prolog.
pub const PROLOG_LIMIT: u64 = 1 << 20;

// Used only to skip obviously unrelated files while scanning a directory.
// The format itself always comes from the file contents.
const IMAGE_EXTENSIONS: &[&str] = &[
    "ico", "cur", "bmp", "gif", "jpg", "jpeg", "jpe", "jfif", "lbm", "iff", "pcx", "png", "pnm",
    "pbm", "pgm", "ppm", "svg", "tga", "tif", "tiff", "xcf", "xpm", "xv", "webp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Unsupported,
    Ico,
    Cur,
    Bmp,
    Gif,
    Jpg,
    Lbm,
    Pcx,
    Png,
    Pnm,
    Svg,
    Tga,
    Tif,
    Xcf,
    Xpm,
    Xv,
    Webp,
}

type Detector = fn(&[u8]) -> bool;

// First match wins. TGA carries no signature and is never sniffed.
const DETECTORS: &[(ImageFormat, Detector)] = &[
    (ImageFormat::Bmp, is_bmp),
    (ImageFormat::Jpg, is_jpg),
    (ImageFormat::Png, is_png),
    (ImageFormat::Gif, is_gif),
    (ImageFormat::Webp, is_webp),
    (ImageFormat::Tif, is_tif),
    (ImageFormat::Svg, is_svg),
    (ImageFormat::Ico, is_ico),
    (ImageFormat::Cur, is_cur),
    (ImageFormat::Lbm, is_lbm),
    (ImageFormat::Pcx, is_pcx),
    (ImageFormat::Pnm, is_pnm),
    (ImageFormat::Xcf, is_xcf),
    (ImageFormat::Xpm, is_xpm),
    (ImageFormat::Xv, is_xv),
];

impl ImageFormat {
    pub fn is_supported(self) -> bool {
        self != ImageFormat::Unsupported
    }

    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Unsupported => "unsupported",
            ImageFormat::Ico => "ICO",
            ImageFormat::Cur => "CUR",
            ImageFormat::Bmp => "BMP",
            ImageFormat::Gif => "GIF",
            ImageFormat::Jpg => "JPG",
            ImageFormat::Lbm => "LBM",
            ImageFormat::Pcx => "PCX",
            ImageFormat::Png => "PNG",
            ImageFormat::Pnm => "PNM",
            ImageFormat::Svg => "SVG",
            ImageFormat::Tga => "TGA",
            ImageFormat::Tif => "TIF",
            ImageFormat::Xcf => "XCF",
            ImageFormat::Xpm => "XPM",
            ImageFormat::Xv => "XV",
            ImageFormat::Webp => "WEBP",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identify the format from the leading bytes of a file.
pub fn sniff(header: &[u8]) -> ImageFormat {
    DETECTORS
        .iter()
        .find(|(_, detect)| detect(header))
        .map(|(format, _)| *format)
        .unwrap_or(ImageFormat::Unsupported)
}

pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Whether `header` opens with XML markup that may push an `<svg` root past
/// the sniffed prefix.
pub fn starts_with_xml_markup(header: &[u8]) -> bool {
    let h = header.strip_prefix(UTF8_BOM).unwrap_or(header);
    let start = h.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(h.len());
    let h = &h[start..];
    h.starts_with(b"<?") || h.starts_with(b"<!--") || h.starts_with(b"<!DOCTYPE")
}

/// Offset of the first element after the XML declaration, processing
/// instructions, comments, DOCTYPE and whitespace. `None` if `data` ends
/// inside the prolog.
pub fn skip_xml_prolog(data: &[u8]) -> Option<usize> {
    let mut pos = if data.starts_with(UTF8_BOM) { UTF8_BOM.len() } else { 0 };
    loop {
        while data.get(pos).is_some_and(|b| b.is_ascii_whitespace()) {
            pos += 1;
        }
        let rest = &data[pos..];
        let node_len = if rest.starts_with(b"<?") {
            find(rest, b"?>").map(|i| i + 2)
        } else if rest.starts_with(b"<!--") {
            find(&rest[4..], b"-->").map(|i| 4 + i + 3)
        } else if rest.starts_with(b"<!DOCTYPE") {
            doctype_len(rest)
        } else {
            return Some(pos);
        };
        pos += node_len?;
    }
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// An internal subset `[ ... ]` may itself contain `>`.
fn doctype_len(rest: &[u8]) -> Option<usize> {
    let close = find(rest, b">")?;
    match find(rest, b"[") {
        Some(open) if open < close => {
            let subset_end = open + find(&rest[open..], b"]")?;
            find(&rest[subset_end..], b">").map(|i| subset_end + i + 1)
        }
        _ => Some(close + 1),
    }
}

fn is_bmp(h: &[u8]) -> bool {
    h.starts_with(b"BM")
}

fn is_jpg(h: &[u8]) -> bool {
    h.starts_with(&[0xFF, 0xD8, 0xFF])
}

fn is_png(h: &[u8]) -> bool {
    h.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
}

fn is_gif(h: &[u8]) -> bool {
    h.starts_with(b"GIF87a") || h.starts_with(b"GIF89a")
}

fn is_webp(h: &[u8]) -> bool {
    h.len() >= 12 && &h[0..4] == b"RIFF" && &h[8..12] == b"WEBP"
}

fn is_tif(h: &[u8]) -> bool {
    h.starts_with(b"II*\0") || h.starts_with(b"MM\0*")
}

fn is_svg(h: &[u8]) -> bool {
    h.windows(4).any(|w| w == b"<svg")
}

// ICONDIR: reserved 0, type (1 = icon, 2 = cursor), non-zero image count.
fn icon_dir_type(h: &[u8]) -> Option<u16> {
    if h.len() < 6 || h[0] != 0 || h[1] != 0 {
        return None;
    }
    let kind = u16::from_le_bytes([h[2], h[3]]);
    let count = u16::from_le_bytes([h[4], h[5]]);
    (count > 0).then_some(kind)
}

fn is_ico(h: &[u8]) -> bool {
    icon_dir_type(h) == Some(1)
}

fn is_cur(h: &[u8]) -> bool {
    icon_dir_type(h) == Some(2)
}

fn is_lbm(h: &[u8]) -> bool {
    h.len() >= 12 && &h[0..4] == b"FORM" && (&h[8..12] == b"ILBM" || &h[8..12] == b"PBM ")
}

fn is_pcx(h: &[u8]) -> bool {
    // ZSoft manufacturer byte, known version, RLE or raw encoding.
    h.len() >= 3 && h[0] == 0x0A && matches!(h[1], 0 | 2 | 3 | 4 | 5) && h[2] <= 1
}

fn is_pnm(h: &[u8]) -> bool {
    h.len() >= 3
        && h[0] == b'P'
        && (b'1'..=b'6').contains(&h[1])
        && h[2].is_ascii_whitespace()
}

fn is_xcf(h: &[u8]) -> bool {
    h.starts_with(b"gimp xcf")
}

fn is_xpm(h: &[u8]) -> bool {
    h.starts_with(b"/* XPM */")
}

fn is_xv(h: &[u8]) -> bool {
    h.starts_with(b"P7 332")
}
