//! Error type for the CABC engine.
//!
//! The per-frame algorithm itself cannot fail. Errors only come from the
//! boundary checks on caller-supplied input.

/// Errors returned by [`CabcEngine`](crate::CabcEngine) and
/// [`CabcController`](crate::CabcController) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CabcError {
    /// The histogram did not contain exactly [`HIST_BINS`](crate::HIST_BINS) bins.
    InvalidHistogramLength {
        /// Number of bins actually supplied.
        len: usize,
    },
    /// Panel width or height was zero.
    InvalidDimensions,
    /// `min_backlight` was above the fixed maximum backlight.
    InvalidBacklightRange {
        /// Requested lower clamp bound.
        min: u16,
        /// Fixed upper clamp bound.
        max: u16,
    },
}

impl core::fmt::Display for CabcError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidHistogramLength { len } => write!(
                f,
                "histogram must have {} bins, got {len}",
                crate::HIST_BINS
            ),
            Self::InvalidDimensions => write!(f, "panel dimensions must be non-zero"),
            Self::InvalidBacklightRange { min, max } => {
                write!(f, "min backlight {min} exceeds max backlight {max}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CabcError {}

#[cfg(test)]
mod tests {
    use super::CabcError;

    #[test]
    fn test_display_histogram_length() {
        let e = CabcError::InvalidHistogramLength { len: 16 };
        assert_eq!(format!("{e}"), "histogram must have 32 bins, got 16");
    }

    #[test]
    fn test_display_backlight_range() {
        let e = CabcError::InvalidBacklightRange { min: 2000, max: 1020 };
        assert_eq!(format!("{e}"), "min backlight 2000 exceeds max backlight 1020");
    }
}
