use image::{ExtendedColorType, ImageEncoder, RgbImage, codecs::jpeg::JpegEncoder};

use crate::error::{PressError, PressResult};

/// Lossy truecolor codec driven by a 0..=100 quality knob.
///
/// The size-targeted encoder only ever talks to this trait, so the search can
/// be exercised against a synthetic codec in tests.
pub trait JpegCodec {
    fn encode(&self, image: &RgbImage, quality: u8) -> PressResult<Vec<u8>>;
}

/// Baseline JPEG through the `image` crate. Output is deterministic for a
/// given bitmap and quality.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageJpegCodec;

impl JpegCodec for ImageJpegCodec {
    fn encode(&self, image: &RgbImage, quality: u8) -> PressResult<Vec<u8>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PressError::encode(format!(
                "cannot encode empty bitmap ({width}x{height})"
            )));
        }

        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
            .write_image(image.as_raw(), width, height, ExtendedColorType::Rgb8)
            .map_err(|e| PressError::encode(e.to_string()))?;
        Ok(buf)
    }
}

impl<C: JpegCodec + ?Sized> JpegCodec for &C {
    fn encode(&self, image: &RgbImage, quality: u8) -> PressResult<Vec<u8>> {
        (**self).encode(image, quality)
    }
}
