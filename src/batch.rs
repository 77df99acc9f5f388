//! Directory-driven batch compositing.
//!
//! Each immediate subdirectory of the batch root is a unit of work. Its photos
//! are composed one by one onto the shared background and written through the
//! size-targeted encoder into a sibling `<dir><suffix>` directory. A directory
//! whose result directory already exists is treated as done. Failures are
//! logged and counted at the photo and directory level; a batch only aborts on
//! invalid configuration, an unreadable overlay or an unreadable root.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use image::{DynamicImage, RgbaImage, imageops::FilterType};

use crate::{
    background::Background,
    codec::{ImageJpegCodec, JpegCodec},
    composite::{centered_offset, overlay, paste_over},
    config::{AvatarLayout, BadgeCorner, BatchConfig, PhotoLayout},
    effects::{center_crop_square, circular_avatar, rounded_with_shadow},
    encoder::{EncodeOutcome, SizeTargetedEncoder},
    error::{PressError, PressResult},
    window::SizeWindow,
};

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

#[derive(Clone, Debug)]
pub enum DirOutcome {
    Skipped,
    Processed {
        written: Vec<EncodeOutcome>,
        failed: usize,
    },
}

#[derive(Clone, Debug, Default)]
pub struct BatchReport {
    pub directories: usize,
    pub skipped: usize,
    pub failed_directories: usize,
    pub written: Vec<EncodeOutcome>,
    pub failed_items: usize,
}

impl BatchReport {
    pub fn fallback_count(&self) -> usize {
        self.written.iter().filter(|o| o.used_fallback()).count()
    }

    pub fn is_clean(&self) -> bool {
        self.failed_directories == 0 && self.failed_items == 0
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

fn read_dir_sorted(dir: &Path) -> PressResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| PressError::storage(dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        paths.push(entry.map_err(|e| PressError::storage(dir, e))?.path());
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Photo files directly inside `dir`, sorted by file name.
pub fn discover_images(dir: &Path) -> PressResult<Vec<PathBuf>> {
    Ok(read_dir_sorted(dir)?
        .into_iter()
        .filter(|p| p.is_file() && has_image_extension(p))
        .collect())
}

/// Work directories directly under `root`, skipping result directories.
pub fn discover_work_dirs(root: &Path, suffix: &str) -> PressResult<Vec<PathBuf>> {
    Ok(read_dir_sorted(root)?
        .into_iter()
        .filter(|p| p.is_dir())
        .filter(|p| {
            !p.file_name()
                .is_some_and(|n| n.to_string_lossy().ends_with(suffix))
        })
        .collect())
}

/// `<dir><suffix>` next to `dir`.
pub fn result_dir(dir: &Path, suffix: &str) -> PathBuf {
    let mut name = dir.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    dir.with_file_name(name)
}

/// Size of the photo on a `canvas_w`x`canvas_h` background: a fixed share of
/// the width with aspect kept, capped in height.
pub fn photo_dimensions(
    canvas_w: u32,
    canvas_h: u32,
    photo_w: u32,
    photo_h: u32,
    cfg: &BatchConfig,
) -> (u32, u32) {
    let aspect = f64::from(photo_h) / f64::from(photo_w);
    let mut w = (f64::from(canvas_w) * cfg.photo_width_ratio).round();
    let mut h = (w * aspect).round();

    let max_h = (f64::from(canvas_h) * cfg.photo_max_height_ratio).floor();
    if h > max_h {
        h = max_h;
        w = (h / aspect).round();
    }
    ((w as u32).max(1), (h as u32).max(1))
}

fn ensure_nonempty(photo: &DynamicImage) -> PressResult<()> {
    if photo.width() == 0 || photo.height() == 0 {
        return Err(PressError::validation("photo has zero width or height"));
    }
    Ok(())
}

/// Places `photo`, rounded and shadowed, at the centre of `canvas`.
pub fn compose_single(
    canvas: &RgbaImage,
    photo: &DynamicImage,
    cfg: &BatchConfig,
) -> PressResult<RgbaImage> {
    ensure_nonempty(photo)?;
    let (cw, ch) = canvas.dimensions();
    let (pw, ph) = photo_dimensions(cw, ch, photo.width(), photo.height(), cfg);

    let resized = photo.resize_exact(pw, ph, FilterType::Lanczos3);
    let layer = rounded_with_shadow(&resized, cfg.corner_radius, &cfg.shadow)?;

    let (x, y) = centered_offset(cw, ch, pw, ph);
    let (mx, my) = cfg.shadow.margin()?;
    let mut out = canvas.clone();
    paste_over(&mut out, &layer, x - i64::from(mx), y - i64::from(my));
    Ok(out)
}

fn scaled(size: u32, ratio: f64) -> u32 {
    ((f64::from(size) * ratio).round() as u32).max(1)
}

/// Keeps a `len`-long span starting at `pos` inside `0..limit` when it fits.
fn clamp_span(pos: i64, len: u32, limit: u32) -> i64 {
    let max = (i64::from(limit) - i64::from(len)).max(0);
    pos.clamp(0, max)
}

/// Rounded, shadowed square crop of `photo` near the top of `canvas`, with a
/// ringed circular crop of the same photo overlapping one bottom corner.
pub fn compose_avatar(
    canvas: &RgbaImage,
    photo: &DynamicImage,
    cfg: &BatchConfig,
    layout: &AvatarLayout,
) -> PressResult<RgbaImage> {
    ensure_nonempty(photo)?;
    let (cw, ch) = canvas.dimensions();
    let side = scaled(cw, layout.square_width_ratio);
    let square_x = (i64::from(cw) - i64::from(side)) / 2;
    let square_y = (f64::from(ch) * layout.square_top_ratio).round() as i64;

    let square = center_crop_square(photo).resize_exact(side, side, FilterType::Lanczos3);
    let layer = rounded_with_shadow(&square, cfg.corner_radius, &cfg.shadow)?;
    let (mx, my) = cfg.shadow.margin()?;
    let mut out = canvas.clone();
    paste_over(
        &mut out,
        &layer,
        square_x - i64::from(mx),
        square_y - i64::from(my),
    );

    let diameter = scaled(side, layout.badge_diameter_ratio);
    let overlap = (f64::from(diameter) * layout.badge_overlap_ratio).round() as i64;
    let badge_photo =
        center_crop_square(photo).resize_exact(diameter, diameter, FilterType::Lanczos3);
    let badge = circular_avatar(&badge_photo, &layout.border())?;
    let badge_size = i64::from(badge.width());

    let bottom = square_y + i64::from(side);
    let x = match layout.badge_corner {
        BadgeCorner::BottomRight => square_x + i64::from(side) - badge_size + overlap,
        BadgeCorner::BottomLeft => square_x - overlap,
    };
    let y = bottom - badge_size + overlap;
    paste_over(
        &mut out,
        &badge,
        clamp_span(x, badge.width(), cw),
        clamp_span(y, badge.height(), ch),
    );
    Ok(out)
}

/// Composes `photo` onto `canvas` using the configured layout.
pub fn compose_photo(
    canvas: &RgbaImage,
    photo: &DynamicImage,
    cfg: &BatchConfig,
) -> PressResult<RgbaImage> {
    match &cfg.layout {
        PhotoLayout::Framed => compose_single(canvas, photo, cfg),
        PhotoLayout::Avatar(layout) => compose_avatar(canvas, photo, cfg, layout),
    }
}

/// What every photo of a run is composed between: the rendered background
/// below and an optional overlay (a frame, a watermark) above.
#[derive(Clone, Debug)]
pub struct Stage {
    pub canvas: RgbaImage,
    pub overlay: Option<DynamicImage>,
}

impl Stage {
    /// Renders the background at the template's size and loads
    /// `cfg.overlay_path` if set.
    pub fn new(template: &DynamicImage, cfg: &BatchConfig) -> PressResult<Self> {
        let background = Background::resolve(template.clone(), cfg.background_color.as_deref());
        let canvas = background.render(template.width(), template.height());
        let overlay = match &cfg.overlay_path {
            Some(path) => Some(
                image::open(path)
                    .map_err(|e| PressError::decode(format!("overlay {}: {e}", path.display())))?,
            ),
            None => None,
        };
        Ok(Self { canvas, overlay })
    }

    pub fn compose(&self, photo: &DynamicImage, cfg: &BatchConfig) -> PressResult<RgbaImage> {
        let composed = compose_photo(&self.canvas, photo, cfg)?;
        Ok(match &self.overlay {
            Some(layer) => overlay(&DynamicImage::ImageRgba8(composed), layer),
            None => composed,
        })
    }
}

/// `<out_dir>/<stem>.jpg` for a photo.
pub fn output_path(photo: &Path, out_dir: &Path) -> PathBuf {
    let stem = photo.file_stem().unwrap_or_default().to_string_lossy();
    out_dir.join(format!("{stem}.jpg"))
}

fn process_photo<C: JpegCodec>(
    path: &Path,
    out_path: &Path,
    stage: &Stage,
    cfg: &BatchConfig,
    encoder: &SizeTargetedEncoder<C>,
    window: &SizeWindow,
) -> PressResult<EncodeOutcome> {
    let photo = image::open(path)
        .map_err(|e| PressError::decode(format!("{}: {e}", path.display())))?;
    let composed = stage.compose(&photo, cfg)?;
    encoder.encode(&DynamicImage::ImageRgba8(composed), out_path, window)
}

#[tracing::instrument(skip_all, fields(dir = %dir.display()))]
pub fn process_directory<C: JpegCodec>(
    dir: &Path,
    stage: &Stage,
    cfg: &BatchConfig,
    encoder: &SizeTargetedEncoder<C>,
    window: &SizeWindow,
) -> PressResult<DirOutcome> {
    let out_dir = result_dir(dir, &cfg.result_suffix);
    if out_dir.exists() && !cfg.overwrite_existing {
        tracing::info!(result = %out_dir.display(), "result directory exists, skipping");
        return Ok(DirOutcome::Skipped);
    }

    let photos = discover_images(dir)?;
    tracing::debug!(photos = photos.len(), "processing directory");

    let mut written = Vec::with_capacity(photos.len());
    let mut failed = 0;
    let mut claimed = HashSet::new();
    for path in &photos {
        let out_path = output_path(path, &out_dir);
        if !claimed.insert(out_path.clone()) {
            // `a.png` after `a.jpg`: the first photo in name order keeps the slot
            tracing::error!(
                photo = %path.display(),
                output = %out_path.display(),
                "another photo in this directory already maps to this output, skipping"
            );
            failed += 1;
            continue;
        }
        match process_photo(path, &out_path, stage, cfg, encoder, window) {
            Ok(outcome) => written.push(outcome),
            Err(err) => {
                tracing::error!(photo = %path.display(), error = %err, "photo failed, continuing");
                failed += 1;
            }
        }
    }
    Ok(DirOutcome::Processed { written, failed })
}

/// [`run_batch_with`] using the default JPEG codec.
pub fn run_batch(
    root: &Path,
    template: &DynamicImage,
    cfg: &BatchConfig,
) -> PressResult<BatchReport> {
    run_batch_with(root, template, cfg, &SizeTargetedEncoder::<ImageJpegCodec>::new())
}

/// Composes every photo of every work directory under `root` onto
/// `template` (or the configured solid colour at the template's size),
/// under the configured overlay if any.
pub fn run_batch_with<C: JpegCodec>(
    root: &Path,
    template: &DynamicImage,
    cfg: &BatchConfig,
    encoder: &SizeTargetedEncoder<C>,
) -> PressResult<BatchReport> {
    cfg.validate()?;
    let window = cfg.size_window()?;
    if !root.is_dir() {
        return Err(PressError::validation(format!(
            "batch root '{}' is not a directory",
            root.display()
        )));
    }

    let stage = Stage::new(template, cfg)?;

    let mut report = BatchReport::default();
    for dir in discover_work_dirs(root, &cfg.result_suffix)? {
        report.directories += 1;
        match process_directory(&dir, &stage, cfg, encoder, &window) {
            Ok(DirOutcome::Skipped) => report.skipped += 1,
            Ok(DirOutcome::Processed { written, failed }) => {
                report.written.extend(written);
                report.failed_items += failed;
            }
            Err(err) => {
                tracing::error!(dir = %dir.display(), error = %err, "directory failed, continuing");
                report.failed_directories += 1;
            }
        }
    }

    tracing::info!(
        directories = report.directories,
        skipped = report.skipped,
        written = report.written.len(),
        fallbacks = report.fallback_count(),
        failed_items = report.failed_items,
        failed_directories = report.failed_directories,
        "batch finished"
    );
    Ok(report)
}
