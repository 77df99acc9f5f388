//! Gaussian blur for shadow layers.

use image::RgbaImage;

use crate::{
    composite::{PremulRgba8, premultiply, unpremultiply},
    error::{PressError, PressResult},
};

/// Gaussian blur of a straight-alpha image with standard deviation `sigma`
/// pixels (kernel half-width `ceil(3 * sigma)`).
///
/// Colour is filtered premultiplied, so transparent pixels don't bleed black
/// into their neighbours. Lines are extended by repeating their end pixels,
/// which makes a uniform image a fixed point.
pub fn gaussian_blur(image: &RgbaImage, sigma: f32) -> PressResult<RgbaImage> {
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(PressError::validation("blur sigma must be finite and >= 0"));
    }
    let radius = (sigma * 3.0).ceil() as usize;
    let (width, height) = image.dimensions();
    if radius == 0 || width == 0 || height == 0 {
        return Ok(image.clone());
    }

    let taps = kernel_q16(sigma, radius);
    let w = width as usize;
    let h = height as usize;
    let mut px: Vec<PremulRgba8> = image.pixels().map(|p| premultiply(*p)).collect();

    let mut line = Vec::with_capacity(w.max(h));
    for row in px.chunks_exact_mut(w) {
        line.clear();
        line.extend_from_slice(row);
        convolve_line(&line, row, &taps);
    }

    let mut column = vec![[0u8; 4]; h];
    for x in 0..w {
        line.clear();
        line.extend((0..h).map(|y| px[y * w + x]));
        convolve_line(&line, &mut column, &taps);
        for (y, v) in column.iter().enumerate() {
            px[y * w + x] = *v;
        }
    }

    Ok(RgbaImage::from_fn(width, height, |x, y| {
        unpremultiply(px[y as usize * w + x as usize])
    }))
}

/// `2 * radius + 1` Q16 taps summing to exactly `1 << 16`.
fn kernel_q16(sigma: f32, radius: usize) -> Vec<u32> {
    let two_var = 2.0 * f64::from(sigma).powi(2);
    let centre = radius as f64;
    let raw: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let d = i as f64 - centre;
            (-d * d / two_var).exp()
        })
        .collect();
    let total: f64 = raw.iter().sum();

    // quantize the running sum, so rounding never accumulates
    let mut taps = Vec::with_capacity(raw.len());
    let mut running = 0.0;
    let mut prev = 0u32;
    for w in raw {
        running += w;
        let edge = ((running / total) * 65536.0).round().min(65536.0) as u32;
        taps.push(edge.saturating_sub(prev));
        prev = edge;
    }
    if let Some(last) = taps.last_mut() {
        *last += 65536u32.saturating_sub(prev);
    }
    taps
}

fn convolve_line(src: &[PremulRgba8], dst: &mut [PremulRgba8], taps: &[u32]) {
    let radius = taps.len() / 2;
    let last = src.len() - 1;
    for (i, out) in dst.iter_mut().enumerate() {
        // taps sum to 1 << 16, so each channel stays below 256 << 16
        let mut acc = [0u32; 4];
        for (k, &weight) in taps.iter().enumerate() {
            let j = (i + k).saturating_sub(radius).min(last);
            for (a, c) in acc.iter_mut().zip(src[j]) {
                *a += weight * u32::from(c);
            }
        }
        *out = acc.map(|a| ((a + (1 << 15)) >> 16) as u8);
    }
}
