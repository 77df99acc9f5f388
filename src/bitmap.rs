use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgb, RgbImage};

pub const JPEG_EXTENSION: &str = "jpg";

const REDIRECTED_EXTENSIONS: &[&str] = &[
    "png", "webp", "gif", "bmp", "tif", "tiff", "jpeg", "jpe", "tga", "ico", "avif", "qoi",
];

/// Composites a possibly-transparent bitmap over opaque white.
pub fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgb = RgbImage::new(width, height);

    for (src, dst) in rgba.pixels().zip(rgb.pixels_mut()) {
        let [r, g, b, a] = src.0;
        let a = u32::from(a);
        let inv = 255 - a;
        let blend = |c: u8| ((u32::from(c) * a + 255 * inv + 127) / 255) as u8;
        *dst = Rgb([blend(r), blend(g), blend(b)]);
    }

    rgb
}

/// 3-channel 8-bit copy of `image`; alpha is flattened onto white, any other
/// representation (gray, 16-bit, float) is converted.
pub fn to_truecolor(image: &DynamicImage) -> RgbImage {
    if image.color().has_alpha() {
        flatten_onto_white(image)
    } else {
        image.to_rgb8()
    }
}

/// Rewrites still-image extensions (and a missing one) to `.jpg`.
pub fn normalize_jpeg_path(path: &Path) -> PathBuf {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some(JPEG_EXTENSION) => path.to_path_buf(),
        Some(e) if REDIRECTED_EXTENSIONS.contains(&e) => path.with_extension(JPEG_EXTENSION),
        None => path.with_extension(JPEG_EXTENSION),
        // unknown suffixes (e.g. "cover.v2") are part of the stem
        Some(_) => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".");
            name.push(JPEG_EXTENSION);
            PathBuf::from(name)
        }
    }
}
