//! Tuning parameters and fixed constants.
//!
//! Parameters are set once (or whenever the driver reloads its module
//! parameters) through [`TuningParameters::configure`] and read on every
//! frame. The upper backlight bound is a build-time constant for this panel
//! generation and has no setter.

use crate::error::CabcError;
use crate::histogram::HIST_BINS;

/// Upper clamp bound for the smoothed backlight.
///
/// Fixed for this driver generation. [`TuningParameters::configure`] only
/// updates the lower bound.
pub const MAX_BACKLIGHT: u16 = 1020;

/// Default lower clamp bound for the smoothed backlight.
pub const DEFAULT_MIN_BACKLIGHT: u16 = 408;

/// Initial value of the UI "brighter gradually" step.
pub const STEP2_INIT: u8 = 2;

/// Default percentile threshold (percent of the total pixel count).
pub const DEFAULT_PERCENT_TH: i32 = 10;

/// Default scene-change threshold reported to the driver.
pub const DEFAULT_SCENE_CHANGE_THR: u16 = 80;

/// Default threshold handed to the scene detector.
pub const DEFAULT_SCENE_DETECT_THR: i32 = 30;

/// Histogram-bin index to candidate backlight level lookup table.
///
/// Entry 0 is the bottom of the usable brightness range, see
/// [`BrightnessSteps::min_step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct BrightnessSteps(pub [u16; HIST_BINS]);

/// Default brightness-step table: 52 to [`MAX_BACKLIGHT`], evenly spaced.
pub const DEFAULT_BRIGHTNESS_STEPS: BrightnessSteps = BrightnessSteps([
    52, 83, 114, 146, 177, 208, 239, 271, 302, 333, 364, 395, 427, 458, 489, 520, 552, 583, 614,
    645, 677, 708, 739, 770, 801, 833, 864, 895, 926, 958, 989, 1020,
]);

impl BrightnessSteps {
    /// `BRIGHTNESS_STEP_MIN`: the first entry of the table.
    ///
    /// Several smoothing branches special-case a raw target equal to this
    /// value ("settling at the bottom of the table").
    #[must_use]
    #[allow(clippy::indexing_slicing)] // HIST_BINS is non-zero
    pub const fn min_step(&self) -> u16 {
        self.0[0]
    }

    /// Candidate backlight level for histogram bin `bin`, if in range.
    #[must_use]
    pub fn get(&self, bin: usize) -> Option<u16> {
        self.0.get(bin).copied()
    }
}

impl Default for BrightnessSteps {
    fn default() -> Self {
        DEFAULT_BRIGHTNESS_STEPS
    }
}

/// Process-wide tuning, read-only from the per-frame algorithm's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TuningParameters {
    /// Base step for the video path and the UI de-correction step.
    pub step0: u8,
    /// UI step used when brightening toward the target.
    pub step1: u8,
    /// Base for the adaptive UI step (`gen_step2`).
    pub step2: u8,
    /// Lower clamp bound of the reported backlight.
    pub min_backlight: u16,
    /// Percentile threshold used to pick the raw target bin.
    pub percent_th: i32,
    /// Scene-change threshold. Stored and exposed, not consumed by the engine.
    pub scene_change_thr: u16,
    /// Threshold passed through to the scene detector.
    pub scene_detect_thr: i32,
    /// Bin-to-level lookup table.
    pub brightness_steps: BrightnessSteps,
}

/// Module-parameter defaults used by the display driver on top of
/// [`TuningParameters::default`].
pub const DRIVER_DEFAULTS: TuningParameters = TuningParameters {
    step0: 8,
    step1: 72,
    step2: 28,
    min_backlight: DEFAULT_MIN_BACKLIGHT,
    percent_th: DEFAULT_PERCENT_TH,
    scene_change_thr: DEFAULT_SCENE_CHANGE_THR,
    scene_detect_thr: DEFAULT_SCENE_DETECT_THR,
    brightness_steps: DEFAULT_BRIGHTNESS_STEPS,
};

impl TuningParameters {
    /// Upper clamp bound. Always [`MAX_BACKLIGHT`].
    #[must_use]
    pub const fn max_backlight(&self) -> u16 {
        MAX_BACKLIGHT
    }

    /// Update the step sizes, scene-change threshold and lower clamp bound.
    ///
    /// Mirrors the driver's `step_set` entry point: the maximum backlight is
    /// deliberately not a parameter.
    pub fn configure(
        &mut self,
        step0: u8,
        step1: u8,
        step2: u8,
        scene_change_thr: u16,
        min_backlight: u16,
    ) {
        self.step0 = step0;
        self.step1 = step1;
        self.step2 = step2;
        self.scene_change_thr = scene_change_thr;
        self.min_backlight = min_backlight;
    }

    /// Check that the clamp range is non-empty.
    ///
    /// The engine does not require this (out-of-range tuning produces a
    /// defined, if useless, output) but callers loading tuning from files
    /// should reject it.
    pub fn validate(&self) -> Result<(), CabcError> {
        if self.min_backlight > MAX_BACKLIGHT {
            return Err(CabcError::InvalidBacklightRange {
                min: self.min_backlight,
                max: MAX_BACKLIGHT,
            });
        }
        Ok(())
    }
}

impl Default for TuningParameters {
    fn default() -> Self {
        Self {
            step0: 2,
            step1: 2,
            step2: STEP2_INIT,
            min_backlight: DEFAULT_MIN_BACKLIGHT,
            percent_th: DEFAULT_PERCENT_TH,
            scene_change_thr: DEFAULT_SCENE_CHANGE_THR,
            scene_detect_thr: DEFAULT_SCENE_DETECT_THR,
            brightness_steps: DEFAULT_BRIGHTNESS_STEPS,
        }
    }
}
