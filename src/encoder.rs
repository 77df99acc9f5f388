//! Size-targeted JPEG output.
//!
//! The encoder searches the (quality, resolution) space of a lossy codec until
//! the encoded artifact lands inside a [`SizeWindow`]:
//!
//! 1. sweep quality 95, 90, .., 30 at full resolution, stopping on the first
//!    in-window size or the first undershoot;
//! 2. if the closest-to-target candidate was still too large, downscale by
//!    `sqrt(target / best)` and sweep again from 85 down to 30, falling back
//!    to the quality-30 encode when nothing fits;
//! 3. if the closest candidate was too small, keep it as-is. Files are never
//!    grown back toward the window by upscaling or raising quality above 95.
//!
//! The search runs in memory; only the chosen bytes are written, atomically.

use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbImage, imageops::FilterType};

use crate::{
    bitmap::{normalize_jpeg_path, to_truecolor},
    codec::{ImageJpegCodec, JpegCodec},
    error::PressResult,
    storage::write_atomic,
    window::{KIB, SizeWindow},
};

pub const FULL_RES_START_QUALITY: u8 = 95;
pub const RESWEEP_START_QUALITY: u8 = 85;
pub const FLOOR_QUALITY: u8 = 30;
pub const QUALITY_STEP: u8 = 5;

/// Which branch of the search produced the written artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchPhase {
    /// In-window hit during the full-resolution sweep.
    FullResolution,
    /// Downscaled resweep ended on an in-window hit or an accepted undershoot.
    Downscaled,
    /// Downscaled resweep never fit; floor-quality encode of the resized bitmap.
    FloorFallback,
    /// Full-resolution output was already below the window; best candidate kept.
    Undershoot,
}

/// One codec invocation made during the search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodeAttempt {
    pub quality: u8,
    pub bytes: u64,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug)]
pub struct EncodeOutcome {
    /// Final artifact location (extension normalized to `.jpg`).
    pub path: PathBuf,
    pub quality: u8,
    /// Size of the persisted file.
    pub bytes: u64,
    pub width: u32,
    pub height: u32,
    pub phase: SearchPhase,
    pub in_window: bool,
    pub attempts: Vec<EncodeAttempt>,
}

impl EncodeOutcome {
    pub fn used_fallback(&self) -> bool {
        matches!(
            self.phase,
            SearchPhase::FloorFallback | SearchPhase::Undershoot
        )
    }

    pub fn downscaled(&self) -> bool {
        matches!(
            self.phase,
            SearchPhase::Downscaled | SearchPhase::FloorFallback
        )
    }
}

#[derive(Clone)]
struct Candidate {
    quality: u8,
    data: Vec<u8>,
}

impl Candidate {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}

enum SweepEnd {
    Hit(Candidate),
    /// `last` is the undershoot that stopped the sweep, or the floor-quality
    /// encode when every step overshot.
    Missed { best: Candidate, last: Candidate },
}

struct Decision {
    candidate: Candidate,
    phase: SearchPhase,
    width: u32,
    height: u32,
}

#[derive(Clone, Debug, Default)]
pub struct SizeTargetedEncoder<C = ImageJpegCodec> {
    codec: C,
}

impl SizeTargetedEncoder<ImageJpegCodec> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: JpegCodec> SizeTargetedEncoder<C> {
    pub fn with_codec(codec: C) -> Self {
        Self { codec }
    }

    /// Encodes `image` as JPEG at `output_path`, aiming for `window`.
    ///
    /// Missing the window is not an error: a file is always written, and the
    /// outcome records how it was chosen. Errors come from the storage layer
    /// (or from the codec rejecting an empty bitmap).
    #[tracing::instrument(
        skip_all,
        fields(
            path = %output_path.display(),
            width = image.width(),
            height = image.height(),
        )
    )]
    pub fn encode(
        &self,
        image: &DynamicImage,
        output_path: &Path,
        window: &SizeWindow,
    ) -> PressResult<EncodeOutcome> {
        let path = normalize_jpeg_path(output_path);
        if path != output_path {
            tracing::debug!(
                requested = %output_path.display(),
                actual = %path.display(),
                "output redirected to jpeg"
            );
        }

        let rgb = to_truecolor(image);
        let mut attempts = Vec::new();
        let decision = self.search(&rgb, window, &mut attempts)?;
        let bytes = write_atomic(&path, &decision.candidate.data)?;

        tracing::info!(
            quality = decision.candidate.quality,
            size_kib = bytes as f64 / KIB as f64,
            phase = ?decision.phase,
            width = decision.width,
            height = decision.height,
            attempts = attempts.len(),
            "saved size-targeted jpeg"
        );

        Ok(EncodeOutcome {
            path,
            quality: decision.candidate.quality,
            bytes,
            width: decision.width,
            height: decision.height,
            phase: decision.phase,
            in_window: window.contains(bytes),
            attempts,
        })
    }

    fn search(
        &self,
        rgb: &RgbImage,
        window: &SizeWindow,
        attempts: &mut Vec<EncodeAttempt>,
    ) -> PressResult<Decision> {
        let (width, height) = rgb.dimensions();

        let best = match self.sweep(rgb, FULL_RES_START_QUALITY, window, attempts)? {
            SweepEnd::Hit(candidate) => {
                return Ok(Decision {
                    candidate,
                    phase: SearchPhase::FullResolution,
                    width,
                    height,
                });
            }
            SweepEnd::Missed { best, .. } => best,
        };

        if best.len() < window.min_bytes() {
            // no upscaling: the closest full-resolution encode is final
            return Ok(Decision {
                candidate: best,
                phase: SearchPhase::Undershoot,
                width,
                height,
            });
        }

        let scale = (window.target_bytes() as f64 / best.len() as f64).sqrt();
        let (new_w, new_h) = scaled_dimensions(width, height, scale);
        tracing::debug!(
            best_quality = best.quality,
            best_bytes = best.len(),
            scale,
            new_w,
            new_h,
            "full-resolution sweep missed the window, downscaling"
        );
        let resized = image::imageops::resize(rgb, new_w, new_h, FilterType::Lanczos3);

        let (candidate, phase) =
            match self.sweep(&resized, RESWEEP_START_QUALITY, window, attempts)? {
                SweepEnd::Hit(c) => (c, SearchPhase::Downscaled),
                SweepEnd::Missed { last, .. } if last.len() < window.min_bytes() => {
                    (last, SearchPhase::Downscaled)
                }
                // every step overshot; `last` is the floor-quality encode
                SweepEnd::Missed { last, .. } => (last, SearchPhase::FloorFallback),
            };

        Ok(Decision {
            candidate,
            phase,
            width: new_w,
            height: new_h,
        })
    }

    /// Descending quality sweep from `start` to [`FLOOR_QUALITY`].
    fn sweep(
        &self,
        rgb: &RgbImage,
        start: u8,
        window: &SizeWindow,
        attempts: &mut Vec<EncodeAttempt>,
    ) -> PressResult<SweepEnd> {
        let (width, height) = rgb.dimensions();
        let mut best: Option<Candidate> = None;
        let mut quality = start;

        loop {
            let data = self.codec.encode(rgb, quality)?;
            let candidate = Candidate { quality, data };
            let bytes = candidate.len();
            attempts.push(EncodeAttempt {
                quality,
                bytes,
                width,
                height,
            });
            tracing::debug!(quality, bytes, width, height, "encode attempt");

            if window.contains(bytes) {
                return Ok(SweepEnd::Hit(candidate));
            }

            // strict comparison: ties keep the earlier, higher-quality candidate
            let closer = best.as_ref().is_none_or(|b| {
                window.distance_to_target(bytes) < window.distance_to_target(b.len())
            });
            if closer {
                best = Some(candidate.clone());
            }

            let next = quality
                .checked_sub(QUALITY_STEP)
                .filter(|q| *q >= FLOOR_QUALITY);
            match next {
                Some(q) if bytes > window.max_bytes() => quality = q,
                _ => {
                    let best = best.unwrap_or_else(|| candidate.clone());
                    return Ok(SweepEnd::Missed {
                        best,
                        last: candidate,
                    });
                }
            }
        }
    }
}

/// Scales both dimensions by `scale`, flooring each independently and
/// keeping at least one pixel.
pub fn scaled_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    let dim = |v: u32| ((f64::from(v) * scale).floor() as u32).max(1);
    (dim(width), dim(height))
}

/// [`SizeTargetedEncoder::encode`] with the default JPEG codec.
pub fn encode_to_window(
    image: &DynamicImage,
    output_path: &Path,
    window: &SizeWindow,
) -> PressResult<EncodeOutcome> {
    SizeTargetedEncoder::new().encode(image, output_path, window)
}
