//! Cosmetic layer effects: rounded corners, drop shadows and circular
//! avatars. Every effect returns a straight-alpha RGBA layer ready for
//! [`crate::composite::paste_over`].

use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};

use crate::{
    blur::gaussian_blur,
    composite::paste_over,
    error::{PressError, PressResult},
};

pub const MAX_SHADOW_BLUR: u32 = 256;
pub const MAX_SHADOW_OFFSET: u32 = 4096;
pub const MAX_BORDER_WIDTH: u32 = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ShadowStyle {
    pub offset_x: i32,
    pub offset_y: i32,
    /// Gaussian sigma in pixels; also the extra margin around the photo.
    pub blur: u32,
    /// Shadow alpha, 0..=255.
    pub opacity: u8,
}

impl Default for ShadowStyle {
    fn default() -> Self {
        Self {
            offset_x: 5,
            offset_y: 5,
            blur: 10,
            opacity: 100,
        }
    }
}

impl ShadowStyle {
    pub fn validate(&self) -> PressResult<()> {
        if self.blur > MAX_SHADOW_BLUR {
            return Err(PressError::validation(format!(
                "shadow blur must be <= {MAX_SHADOW_BLUR}, got {}",
                self.blur
            )));
        }
        if self.offset_x.unsigned_abs() > MAX_SHADOW_OFFSET
            || self.offset_y.unsigned_abs() > MAX_SHADOW_OFFSET
        {
            return Err(PressError::validation(format!(
                "shadow offsets must be within +-{MAX_SHADOW_OFFSET}"
            )));
        }
        Ok(())
    }

    /// Transparent margin added on each side of the photo, per axis.
    pub fn margin(&self) -> PressResult<(u32, u32)> {
        let axis = |offset: i32| {
            offset
                .unsigned_abs()
                .checked_add(self.blur)
                .ok_or_else(|| PressError::validation("shadow margin overflows u32"))
        };
        Ok((axis(self.offset_x)?, axis(self.offset_y)?))
    }
}

/// `size + 2 * margin`, or a validation error when it does not fit in `u32`.
fn grown(size: u32, margin: u32) -> PressResult<u32> {
    margin
        .checked_mul(2)
        .and_then(|m| m.checked_add(size))
        .ok_or_else(|| PressError::validation("layer size overflows u32"))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AvatarBorder {
    pub inner_width: u32,
    pub inner_color: Rgba<u8>,
    pub outer_width: u32,
    pub outer_color: Rgba<u8>,
}

impl Default for AvatarBorder {
    fn default() -> Self {
        Self {
            inner_width: 8,
            inner_color: Rgba([255, 255, 255, 255]),
            outer_width: 3,
            outer_color: Rgba([220, 220, 220, 255]),
        }
    }
}

/// Hard-edged rounded-rectangle coverage mask. `radius` is clamped to half
/// the shorter side.
pub fn rounded_rect_mask(width: u32, height: u32, radius: u32) -> GrayImage {
    let r = radius.min(width / 2).min(height / 2) as f32;
    let (w, h) = (width as f32, height as f32);

    GrayImage::from_fn(width, height, |x, y| {
        let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
        // nearest corner-circle centre, only relevant inside a corner square
        let cx = if px < r {
            r
        } else if px > w - r {
            w - r
        } else {
            return Luma([255]);
        };
        let cy = if py < r {
            r
        } else if py > h - r {
            h - r
        } else {
            return Luma([255]);
        };
        let inside = (px - cx).powi(2) + (py - cy).powi(2) <= r * r;
        Luma([if inside { 255 } else { 0 }])
    })
}

/// Inscribed-disc coverage mask for a `size`x`size` square.
pub fn circle_mask(size: u32) -> GrayImage {
    let c = size as f32 / 2.0;
    GrayImage::from_fn(size, size, |x, y| {
        let d2 = (x as f32 + 0.5 - c).powi(2) + (y as f32 + 0.5 - c).powi(2);
        Luma([if d2 <= c * c { 255 } else { 0 }])
    })
}

/// Multiplies the alpha channel by `mask`.
pub fn apply_mask(image: &mut RgbaImage, mask: &GrayImage) {
    debug_assert_eq!(image.dimensions(), mask.dimensions());
    for (px, m) in image.pixels_mut().zip(mask.pixels()) {
        px.0[3] = ((u32::from(px.0[3]) * u32::from(m.0[0]) + 127) / 255) as u8;
    }
}

pub fn center_crop_square(image: &DynamicImage) -> DynamicImage {
    let (w, h) = (image.width(), image.height());
    if w == h {
        return image.clone();
    }
    let size = w.min(h);
    image.crop_imm((w - size) / 2, (h - size) / 2, size, size)
}

pub fn round_corners(image: &DynamicImage, radius: u32) -> RgbaImage {
    let mut rgba = image.to_rgba8();
    let mask = rounded_rect_mask(rgba.width(), rgba.height(), radius);
    apply_mask(&mut rgba, &mask);
    rgba
}

/// Rounded photo over a blurred, offset, rounded shadow.
///
/// The returned layer is larger than the photo by [`ShadowStyle::margin`] on
/// every side; the photo itself sits at `margin` (the shadow, not the photo,
/// carries the offset).
pub fn rounded_with_shadow(
    image: &DynamicImage,
    radius: u32,
    style: &ShadowStyle,
) -> PressResult<RgbaImage> {
    style.validate()?;
    let (w, h) = (image.width(), image.height());
    let (mx, my) = style.margin()?;
    let mut canvas = RgbaImage::new(grown(w, mx)?, grown(h, my)?);

    let mut shadow = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, style.opacity]));
    apply_mask(&mut shadow, &rounded_rect_mask(w, h, radius));
    paste_over(
        &mut canvas,
        &shadow,
        i64::from(mx) + i64::from(style.offset_x),
        i64::from(my) + i64::from(style.offset_y),
    );
    let mut canvas = gaussian_blur(&canvas, style.blur as f32)?;

    paste_over(
        &mut canvas,
        &round_corners(image, radius),
        i64::from(mx),
        i64::from(my),
    );
    Ok(canvas)
}

/// Centre-cropped circular photo inside a two-tone ring: `inner_color`
/// touching the photo, `outer_color` outside it.
pub fn circular_avatar(image: &DynamicImage, border: &AvatarBorder) -> PressResult<RgbaImage> {
    if border.inner_width > MAX_BORDER_WIDTH || border.outer_width > MAX_BORDER_WIDTH {
        return Err(PressError::validation(format!(
            "avatar border widths must be <= {MAX_BORDER_WIDTH}"
        )));
    }
    let square = center_crop_square(image);
    let size = square.width();
    let mut photo = square.to_rgba8();
    apply_mask(&mut photo, &circle_mask(size));

    let ring = border.inner_width + border.outer_width;
    let canvas_size = grown(size, ring)?;
    let mut canvas = RgbaImage::new(canvas_size, canvas_size);

    fill_disc(&mut canvas, 0, border.outer_color);
    fill_disc(&mut canvas, border.outer_width, border.inner_color);
    paste_over(&mut canvas, &photo, i64::from(ring), i64::from(ring));
    Ok(canvas)
}

/// Overwrites the disc inscribed in `canvas` shrunk by `inset` on each side.
fn fill_disc(canvas: &mut RgbaImage, inset: u32, color: Rgba<u8>) {
    let size = canvas.width();
    let c = size as f32 / 2.0;
    let r = c - inset as f32;
    if r <= 0.0 {
        return;
    }
    for (x, y, px) in canvas.enumerate_pixels_mut() {
        let d2 = (x as f32 + 0.5 - c).powi(2) + (y as f32 + 0.5 - c).powi(2);
        if d2 <= r * r {
            *px = color;
        }
    }
}
