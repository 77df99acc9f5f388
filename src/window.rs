use crate::error::{PressError, PressResult};

pub const KIB: u64 = 1024;

pub const DEFAULT_MIN_BYTES: u64 = 200 * KIB;
pub const DEFAULT_MAX_BYTES: u64 = 300 * KIB;
pub const DEFAULT_TARGET_BYTES: u64 = 250 * KIB;

/// Acceptable encoded-size range plus the preferred size inside it.
///
/// Invariant: `min_bytes <= target_bytes <= max_bytes` and `max_bytes > 0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeWindow {
    min_bytes: u64,
    max_bytes: u64,
    target_bytes: u64,
}

impl SizeWindow {
    /// Builds a window, clamping `target_bytes` into `[min_bytes, max_bytes]`.
    /// An inverted window (`min_bytes > max_bytes`) is rejected.
    pub fn new(min_bytes: u64, max_bytes: u64, target_bytes: u64) -> PressResult<Self> {
        if max_bytes == 0 {
            return Err(PressError::validation("size window max_bytes must be > 0"));
        }
        if min_bytes > max_bytes {
            return Err(PressError::validation(format!(
                "size window is inverted: min_bytes ({min_bytes}) > max_bytes ({max_bytes})"
            )));
        }

        let clamped = target_bytes.clamp(min_bytes, max_bytes);
        if clamped != target_bytes {
            tracing::debug!(
                requested = target_bytes,
                clamped,
                "size window target clamped into range"
            );
        }

        Ok(Self {
            min_bytes,
            max_bytes,
            target_bytes: clamped,
        })
    }

    pub fn from_kib(min_kib: u64, max_kib: u64, target_kib: u64) -> PressResult<Self> {
        let kib = |v: u64| {
            v.checked_mul(KIB)
                .ok_or_else(|| PressError::validation("size window overflows u64 bytes"))
        };
        Self::new(kib(min_kib)?, kib(max_kib)?, kib(target_kib)?)
    }

    pub fn min_bytes(&self) -> u64 {
        self.min_bytes
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn target_bytes(&self) -> u64 {
        self.target_bytes
    }

    pub fn contains(&self, bytes: u64) -> bool {
        (self.min_bytes..=self.max_bytes).contains(&bytes)
    }

    pub fn distance_to_target(&self, bytes: u64) -> u64 {
        bytes.abs_diff(self.target_bytes)
    }
}

impl Default for SizeWindow {
    fn default() -> Self {
        Self {
            min_bytes: DEFAULT_MIN_BYTES,
            max_bytes: DEFAULT_MAX_BYTES,
            target_bytes: DEFAULT_TARGET_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_200_to_300_kib_with_250_target() {
        let w = SizeWindow::default();
        assert_eq!(w.min_bytes(), 204_800);
        assert_eq!(w.max_bytes(), 307_200);
        assert_eq!(w.target_bytes(), 256_000);
        assert_eq!(w, SizeWindow::from_kib(200, 300, 250).unwrap());
    }

    #[test]
    fn target_below_range_is_clamped_to_min() {
        let w = SizeWindow::new(100, 200, 10).unwrap();
        assert_eq!(w.target_bytes(), 100);
    }

    #[test]
    fn target_above_range_is_clamped_to_max() {
        let w = SizeWindow::new(100, 200, 5_000).unwrap();
        assert_eq!(w.target_bytes(), 200);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let err = SizeWindow::new(300, 200, 250).unwrap_err();
        assert!(matches!(err, PressError::Validation(_)));
    }

    #[test]
    fn zero_max_is_rejected() {
        assert!(SizeWindow::new(0, 0, 0).is_err());
    }

    #[test]
    fn degenerate_single_byte_window_is_allowed() {
        let w = SizeWindow::new(1, 1, 1).unwrap();
        assert!(w.contains(1));
        assert!(!w.contains(0));
        assert!(!w.contains(2));
    }

    #[test]
    fn contains_is_inclusive_on_both_ends() {
        let w = SizeWindow::new(10, 20, 15).unwrap();
        assert!(w.contains(10));
        assert!(w.contains(20));
        assert!(!w.contains(9));
        assert!(!w.contains(21));
    }

    #[test]
    fn distance_is_absolute() {
        let w = SizeWindow::new(10, 20, 15).unwrap();
        assert_eq!(w.distance_to_target(12), 3);
        assert_eq!(w.distance_to_target(18), 3);
    }

    #[test]
    fn from_kib_rejects_overflow() {
        assert!(SizeWindow::from_kib(0, u64::MAX, 1).is_err());
    }
}
