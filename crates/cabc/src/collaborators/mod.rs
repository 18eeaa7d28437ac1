//! Collaborators the engine calls out to once per frame.
//!
//! - [`SceneDetector`] classifies a frame as a scene change from the current
//!   and previous histograms.
//! - [`GainCompensator`] maps the chosen backlight to a pixel gain that keeps
//!   perceived brightness constant.
//!
//! Both are infallible. Reference implementations live here; recording test
//! doubles live in [`mock`].

pub mod mock;

use crate::histogram::HIST_BINS;

/// Unity pixel gain (1.0 in the colour-matrix fixed-point format).
pub const GAIN_UNITY: u16 = 0x400;

/// The four histograms handed to a [`SceneDetector`].
#[derive(Debug, Clone, Copy)]
pub struct SceneFrames<'a> {
    /// Cumulative histogram of the current frame.
    pub current_cumulative: &'a [i32; HIST_BINS],
    /// Cumulative histogram of the previous frame.
    pub previous_cumulative: &'a [i32; HIST_BINS],
    /// Reversed raw histogram of the current frame.
    pub current_reversed: &'a [i32; HIST_BINS],
    /// Reversed raw histogram of the previous frame.
    pub previous_reversed: &'a [i32; HIST_BINS],
}

/// Scene-change classifier.
pub trait SceneDetector {
    /// Return `true` when the current frame starts a new scene.
    ///
    /// `pixel_total` is the panel's pixel count and `threshold` the
    /// configured detection threshold.
    fn detect(&mut self, frames: SceneFrames<'_>, pixel_total: i32, threshold: i32) -> bool;
}

/// Backlight to pixel-gain mapping.
pub trait GainCompensator {
    /// Gain for `backlight_level`, which is the clamped backlight divided by 4.
    fn gain(&mut self, backlight_level: u16) -> u16;
}

impl<T: SceneDetector + ?Sized> SceneDetector for &mut T {
    fn detect(&mut self, frames: SceneFrames<'_>, pixel_total: i32, threshold: i32) -> bool {
        (**self).detect(frames, pixel_total, threshold)
    }
}

impl<T: GainCompensator + ?Sized> GainCompensator for &mut T {
    fn gain(&mut self, backlight_level: u16) -> u16 {
        (**self).gain(backlight_level)
    }
}

/// Detector that never reports a scene change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NeverSceneChange;

impl SceneDetector for NeverSceneChange {
    fn detect(&mut self, _frames: SceneFrames<'_>, _pixel_total: i32, _threshold: i32) -> bool {
        false
    }
}

/// Detector comparing per-bin histogram movement against a share of the
/// panel's pixels.
///
/// Reports a scene change when the summed absolute difference of the
/// reversed histograms exceeds `threshold` percent of `pixel_total`. A
/// non-positive `pixel_total` never reports a change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistogramDiffDetector;

impl SceneDetector for HistogramDiffDetector {
    #[allow(clippy::arithmetic_side_effects)] // 32 bins of |i32 - i32| fit in i64
    fn detect(&mut self, frames: SceneFrames<'_>, pixel_total: i32, threshold: i32) -> bool {
        if pixel_total <= 0 {
            return false;
        }
        let moved: i64 = frames
            .current_reversed
            .iter()
            .zip(frames.previous_reversed.iter())
            .map(|(&cur, &prev)| (i64::from(cur) - i64::from(prev)).abs())
            .sum();
        moved * 100 > i64::from(threshold) * i64::from(pixel_total)
    }
}

/// Compensator that never changes pixel values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnityGain;

impl GainCompensator for UnityGain {
    fn gain(&mut self, _backlight_level: u16) -> u16 {
        GAIN_UNITY
    }
}

/// Compensator boosting pixels in inverse proportion to the backlight.
///
/// `gain = GAIN_UNITY * 255 / level`, capped at `max_gain`. Level 0 yields
/// the cap. Levels at or above 255 give unity or less.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InverseGain {
    max_gain: u16,
}

impl InverseGain {
    /// Full-scale level: the backlight level (in quarter units) at which the
    /// gain is unity.
    pub const FULL_SCALE: u16 = 255;

    /// Compensator with an explicit gain cap.
    #[must_use]
    pub const fn new(max_gain: u16) -> Self {
        Self { max_gain }
    }

    /// Gain cap.
    #[must_use]
    pub const fn max_gain(&self) -> u16 {
        self.max_gain
    }
}

impl Default for InverseGain {
    /// Capped at 2.0.
    fn default() -> Self {
        Self::new(GAIN_UNITY.saturating_mul(2))
    }
}

impl GainCompensator for InverseGain {
    fn gain(&mut self, backlight_level: u16) -> u16 {
        let numerator = u32::from(GAIN_UNITY).saturating_mul(u32::from(Self::FULL_SCALE));
        let raw = numerator
            .checked_div(u32::from(backlight_level))
            .unwrap_or(u32::MAX);
        u16::try_from(raw)
            .unwrap_or(u16::MAX)
            .min(self.max_gain)
    }
}
