use image::{DynamicImage, Rgb, Rgba, RgbaImage, imageops::FilterType};

use crate::{
    composite::flatten_template,
    error::{PressError, PressResult},
};

/// Parses `#rgb`, `#rrggbb` or `rrggbb` (case-insensitive).
pub fn parse_hex_color(s: &str) -> PressResult<Rgb<u8>> {
    let hex = s.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    let invalid = || PressError::validation(format!("invalid hex colour '{s}'"));

    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());

    match hex.len() {
        3 => {
            let mut out = [0u8; 3];
            for (i, c) in hex.char_indices() {
                // "f" expands to "ff"
                out[i] = channel(&hex[i..i + c.len_utf8()])? * 17;
            }
            Ok(Rgb(out))
        }
        6 => Ok(Rgb([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        ])),
        _ => Err(invalid()),
    }
}

/// Canvas a collage is composed onto.
#[derive(Clone, Debug)]
pub enum Background {
    Template(DynamicImage),
    Solid(Rgb<u8>),
}

impl Background {
    /// A valid `color` wins over the template; an invalid one is logged and
    /// ignored.
    pub fn resolve(template: DynamicImage, color: Option<&str>) -> Self {
        let Some(color) = color else {
            return Self::Template(template);
        };
        match parse_hex_color(color) {
            Ok(rgb) => Self::Solid(rgb),
            Err(err) => {
                tracing::warn!(color, error = %err, "falling back to template background");
                Self::Template(template)
            }
        }
    }

    /// Opaque `width`x`height` canvas.
    pub fn render(&self, width: u32, height: u32) -> RgbaImage {
        match self {
            Self::Solid(Rgb([r, g, b])) => {
                RgbaImage::from_pixel(width, height, Rgba([*r, *g, *b, 255]))
            }
            Self::Template(img) if (img.width(), img.height()) == (width, height) => {
                flatten_template(img)
            }
            Self::Template(img) => {
                flatten_template(&img.resize_exact(width, height, FilterType::Lanczos3))
            }
        }
    }
}
