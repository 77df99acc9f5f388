use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    effects::{AvatarBorder, MAX_BORDER_WIDTH, ShadowStyle},
    error::{PressError, PressResult},
    window::{DEFAULT_MAX_BYTES, DEFAULT_MIN_BYTES, DEFAULT_TARGET_BYTES, KIB, SizeWindow},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub min_kib: u64,
    pub max_kib: u64,
    pub target_kib: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            min_kib: DEFAULT_MIN_BYTES / KIB,
            max_kib: DEFAULT_MAX_BYTES / KIB,
            target_kib: DEFAULT_TARGET_BYTES / KIB,
        }
    }
}

impl WindowConfig {
    pub fn to_window(&self) -> PressResult<SizeWindow> {
        SizeWindow::from_kib(self.min_kib, self.max_kib, self.target_kib)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeCorner {
    #[default]
    BottomRight,
    BottomLeft,
}

/// Rounded-square portrait with a circular badge of the same photo
/// overlapping one of its bottom corners. All ratios are caller-supplied.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarLayout {
    /// Square side as a fraction of the canvas width.
    pub square_width_ratio: f64,
    /// Distance from the canvas top to the square, as a fraction of the canvas height.
    pub square_top_ratio: f64,
    /// Badge diameter as a fraction of the square side.
    pub badge_diameter_ratio: f64,
    /// How far the badge pokes out past the square, as a fraction of its diameter.
    pub badge_overlap_ratio: f64,
    pub badge_corner: BadgeCorner,
    pub inner_border: u32,
    pub outer_border: u32,
}

impl Default for AvatarLayout {
    fn default() -> Self {
        Self {
            square_width_ratio: 0.7,
            square_top_ratio: 0.15,
            badge_diameter_ratio: 0.5,
            badge_overlap_ratio: 1.0 / 3.0,
            badge_corner: BadgeCorner::BottomRight,
            inner_border: 8,
            outer_border: 3,
        }
    }
}

impl AvatarLayout {
    pub fn border(&self) -> AvatarBorder {
        AvatarBorder {
            inner_width: self.inner_border,
            outer_width: self.outer_border,
            ..AvatarBorder::default()
        }
    }

    pub fn validate(&self) -> PressResult<()> {
        let checks = [
            ("square_width_ratio", self.square_width_ratio, false),
            ("square_top_ratio", self.square_top_ratio, true),
            ("badge_diameter_ratio", self.badge_diameter_ratio, false),
            ("badge_overlap_ratio", self.badge_overlap_ratio, true),
        ];
        for (name, value, zero_ok) in checks {
            let low_ok = if zero_ok { value >= 0.0 } else { value > 0.0 };
            if !(value.is_finite() && low_ok && value <= 1.0) {
                return Err(PressError::validation(format!(
                    "avatar {name} must be within {}0, 1], got {value}",
                    if zero_ok { "[" } else { "(" }
                )));
            }
        }
        if self.inner_border > MAX_BORDER_WIDTH || self.outer_border > MAX_BORDER_WIDTH {
            return Err(PressError::validation(format!(
                "avatar borders must be <= {MAX_BORDER_WIDTH}"
            )));
        }
        Ok(())
    }
}

/// How each photo is placed on the background.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhotoLayout {
    /// Centred photo with rounded corners and a drop shadow.
    #[default]
    Framed,
    Avatar(AvatarLayout),
}

/// Settings for a batch collage run. Every field has a default, so a JSON
/// file only needs to name what it overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub window: WindowConfig,
    pub corner_radius: u32,
    pub shadow: ShadowStyle,
    pub layout: PhotoLayout,
    /// Photo width as a fraction of the background width.
    pub photo_width_ratio: f64,
    /// Upper bound on photo height as a fraction of the background height.
    pub photo_max_height_ratio: f64,
    /// `#rgb` / `#rrggbb`; when absent the template image is used.
    pub background_color: Option<String>,
    /// Image composited over every result (resized to the canvas), e.g. a frame.
    pub overlay_path: Option<PathBuf>,
    /// Appended to a work directory's name to form its output directory.
    pub result_suffix: String,
    pub overwrite_existing: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            corner_radius: 25,
            shadow: ShadowStyle::default(),
            layout: PhotoLayout::default(),
            photo_width_ratio: 0.6825,
            photo_max_height_ratio: 0.9,
            background_color: None,
            overlay_path: None,
            result_suffix: "_result".to_owned(),
            overwrite_existing: false,
        }
    }
}

impl BatchConfig {
    pub fn from_json_str(s: &str) -> PressResult<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| PressError::validation(format!("batch config json: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> PressResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PressError::storage(path, e))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> PressResult<()> {
        let ratio_ok = |r: f64| r.is_finite() && r > 0.0 && r <= 1.0;
        if !ratio_ok(self.photo_width_ratio) {
            return Err(PressError::validation(
                "photo_width_ratio must be in (0, 1]",
            ));
        }
        if !ratio_ok(self.photo_max_height_ratio) {
            return Err(PressError::validation(
                "photo_max_height_ratio must be in (0, 1]",
            ));
        }
        if self.result_suffix.is_empty() {
            return Err(PressError::validation("result_suffix must be non-empty"));
        }
        self.shadow.validate()?;
        if let PhotoLayout::Avatar(layout) = &self.layout {
            layout.validate()?;
        }
        self.window.to_window()?;
        Ok(())
    }

    pub fn size_window(&self) -> PressResult<SizeWindow> {
        self.window.to_window()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_collage_pipeline() {
        let cfg = BatchConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.size_window().unwrap(), SizeWindow::default());
        assert_eq!(cfg.corner_radius, 25);
        assert_eq!(cfg.shadow, ShadowStyle::default());
        assert_eq!(cfg.result_suffix, "_result");
        assert!(!cfg.overwrite_existing);
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let cfg = BatchConfig::from_json_str(
            r##"{ "corner_radius": 10, "window": { "max_kib": 500 }, "background_color": "#123" }"##,
        )
        .unwrap();
        assert_eq!(cfg.corner_radius, 10);
        assert_eq!(cfg.window.max_kib, 500);
        assert_eq!(cfg.window.min_kib, 200);
        assert_eq!(cfg.background_color.as_deref(), Some("#123"));
        assert_eq!(cfg.shadow.blur, 10);
    }

    #[test]
    fn rejects_bad_ratios_suffix_and_window() {
        let mut cfg = BatchConfig {
            photo_width_ratio: 0.0,
            ..BatchConfig::default()
        };
        assert!(cfg.validate().is_err());

        cfg.photo_width_ratio = 0.5;
        cfg.photo_max_height_ratio = 1.5;
        assert!(cfg.validate().is_err());

        cfg.photo_max_height_ratio = 1.0;
        cfg.result_suffix.clear();
        assert!(cfg.validate().is_err());

        cfg.result_suffix = "_out".to_owned();
        cfg.window = WindowConfig {
            min_kib: 400,
            max_kib: 300,
            target_kib: 350,
        };
        assert!(matches!(cfg.validate(), Err(PressError::Validation(_))));
    }

    #[test]
    fn unbounded_shadow_is_rejected_at_load() {
        for json in [
            r#"{ "shadow": { "blur": 4294967295 } }"#,
            r#"{ "shadow": { "blur": 100000 } }"#,
            r#"{ "shadow": { "offset_x": -2147483648 } }"#,
        ] {
            assert!(
                matches!(BatchConfig::from_json_str(json), Err(PressError::Validation(_))),
                "{json}"
            );
        }
    }

    #[test]
    fn avatar_layout_parses_with_defaults_and_is_validated() {
        let cfg = BatchConfig::from_json_str(
            r#"{ "layout": { "kind": "avatar", "badge_corner": "bottom_left" } }"#,
        )
        .unwrap();
        let PhotoLayout::Avatar(layout) = cfg.layout else {
            panic!("expected avatar layout, got {:?}", cfg.layout);
        };
        assert_eq!(layout.badge_corner, BadgeCorner::BottomLeft);
        assert_eq!(layout.square_width_ratio, 0.7);
        assert_eq!(layout.border(), AvatarBorder::default());

        for json in [
            r#"{ "layout": { "kind": "avatar", "square_width_ratio": 0 } }"#,
            r#"{ "layout": { "kind": "avatar", "outer_border": 5000 } }"#,
        ] {
            assert!(BatchConfig::from_json_str(json).is_err(), "{json}");
        }
        assert_eq!(
            BatchConfig::from_json_str(r#"{ "layout": { "kind": "framed" } }"#)
                .unwrap()
                .layout,
            PhotoLayout::Framed
        );
    }

    #[test]
    fn malformed_json_is_a_validation_error() {
        assert!(matches!(
            BatchConfig::from_json_str("{ not json"),
            Err(PressError::Validation(_))
        ));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("press.json");
        std::fs::write(&path, r#"{ "overwrite_existing": true }"#).unwrap();
        assert!(BatchConfig::load(&path).unwrap().overwrite_existing);
        assert!(BatchConfig::load(&dir.path().join("missing.json")).unwrap_err().is_storage());
    }
}
