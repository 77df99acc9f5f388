use image::{DynamicImage, Rgba, RgbaImage, imageops::FilterType};

use crate::bitmap::flatten_onto_white;

pub type PremulRgba8 = [u8; 4];

/// Premultiplied source-over with an extra opacity multiplier.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = add_sat_u8(sc, dc);
    }
    out
}

pub fn premultiply(px: Rgba<u8>) -> PremulRgba8 {
    let [r, g, b, a] = px.0;
    let a16 = u16::from(a);
    [
        mul_div255(u16::from(r), a16),
        mul_div255(u16::from(g), a16),
        mul_div255(u16::from(b), a16),
        a,
    ]
}

pub fn unpremultiply(px: PremulRgba8) -> Rgba<u8> {
    let [r, g, b, a] = px;
    if a == 0 {
        return Rgba([0, 0, 0, 0]);
    }
    let a32 = u32::from(a);
    let un = |c: u8| ((u32::from(c) * 255 + a32 / 2) / a32).min(255) as u8;
    Rgba([un(r), un(g), un(b), a])
}

/// Composites straight-alpha `src` onto `dst` with its top-left corner at
/// `(x, y)`. Parts of `src` outside `dst` are clipped.
pub fn paste_over(dst: &mut RgbaImage, src: &RgbaImage, x: i64, y: i64) {
    let (dw, dh) = (i64::from(dst.width()), i64::from(dst.height()));
    let (sw, sh) = (i64::from(src.width()), i64::from(src.height()));

    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + sw).min(dw);
    let y1 = (y + sh).min(dh);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    for dy in y0..y1 {
        for dx in x0..x1 {
            let s = *src.get_pixel((dx - x) as u32, (dy - y) as u32);
            if s.0[3] == 0 {
                continue;
            }
            let d = dst.get_pixel_mut(dx as u32, dy as u32);
            *d = unpremultiply(over(premultiply(*d), premultiply(s), 1.0));
        }
    }
}

/// Centre offset for placing a `(w, h)` layer on a `(canvas_w, canvas_h)` canvas.
pub fn centered_offset(canvas_w: u32, canvas_h: u32, w: u32, h: u32) -> (i64, i64) {
    (
        (i64::from(canvas_w) - i64::from(w)).div_euclid(2),
        (i64::from(canvas_h) - i64::from(h)).div_euclid(2),
    )
}

/// Source-over of `layer` on `base`, resizing `layer` to `base`'s size first
/// when they differ.
pub fn overlay(base: &DynamicImage, layer: &DynamicImage) -> RgbaImage {
    let mut out = base.to_rgba8();
    let layer = if (layer.width(), layer.height()) == (base.width(), base.height()) {
        layer.to_rgba8()
    } else {
        layer
            .resize_exact(base.width(), base.height(), FilterType::Lanczos3)
            .to_rgba8()
    };
    paste_over(&mut out, &layer, 0, 0);
    out
}

/// Opaque RGBA copy of a template image; transparent areas become white.
pub fn flatten_template(template: &DynamicImage) -> RgbaImage {
    if !template.color().has_alpha() {
        return template.to_rgba8();
    }
    DynamicImage::ImageRgb8(flatten_onto_white(template)).to_rgba8()
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_opacity_0_is_noop() {
        let dst = [1, 2, 3, 4];
        let src = [200, 200, 200, 200];
        assert_eq!(over(dst, src, 0.0), dst);
    }

    #[test]
    fn over_src_alpha_0_is_noop() {
        let dst = [10, 20, 30, 40];
        let src = [255, 255, 255, 0];
        assert_eq!(over(dst, src, 1.0), dst);
    }

    #[test]
    fn over_src_opaque_replaces_dst() {
        let dst = [0, 0, 0, 255];
        let src = [255, 0, 0, 255];
        assert_eq!(over(dst, src, 1.0), src);
    }

    #[test]
    fn premultiply_round_trips_opaque_and_clears_transparent() {
        let px = Rgba([12, 34, 56, 255]);
        assert_eq!(unpremultiply(premultiply(px)), px);
        assert_eq!(premultiply(Rgba([200, 100, 50, 0])), [0, 0, 0, 0]);
    }

    #[test]
    fn paste_clips_negative_offsets() {
        let mut dst = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let src = RgbaImage::from_pixel(3, 3, Rgba([255, 255, 255, 255]));
        paste_over(&mut dst, &src, -2, -2);
        assert_eq!(dst.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(dst.get_pixel(1, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(dst.get_pixel(0, 1), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn paste_fully_outside_is_noop() {
        let mut dst = RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255]));
        let before = dst.clone();
        let src = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        paste_over(&mut dst, &src, 5, 0);
        paste_over(&mut dst, &src, 0, -2);
        assert_eq!(dst, before);
    }

    #[test]
    fn paste_half_transparent_black_darkens_white() {
        let mut dst = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255]));
        let src = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 100]));
        paste_over(&mut dst, &src, 0, 0);
        let p = dst.get_pixel(0, 0).0;
        assert_eq!(p[3], 255);
        // 255 * (1 - 100/255) = 155
        assert!((i16::from(p[0]) - 155).abs() <= 1, "{p:?}");
    }

    #[test]
    fn centered_offset_handles_oversized_layers() {
        assert_eq!(centered_offset(100, 80, 50, 40), (25, 20));
        assert_eq!(centered_offset(10, 10, 13, 10), (-2, 0));
    }

    #[test]
    fn overlay_resizes_layer_to_base() {
        let base = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 6, Rgba([0, 0, 255, 255])));
        let layer = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255])));
        let out = overlay(&base, &layer);
        assert_eq!(out.dimensions(), (8, 6));
        let p = out.get_pixel(4, 3).0;
        assert!(p[0] >= 250 && p[2] <= 5 && p[3] == 255, "{p:?}");
    }

    #[test]
    fn flatten_template_is_opaque_white_under_alpha() {
        let t = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));
        let out = flatten_template(&t);
        assert!(out.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }
}
