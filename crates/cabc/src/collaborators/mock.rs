//! Recording collaborators for host-side testing
//!
//! Both doubles remember how they were called so tests can assert on the
//! engine's calling contract.

#![cfg(any(test, feature = "std"))]

use super::{GainCompensator, SceneDetector, SceneFrames};

/// Scene detector returning a scripted answer and recording every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpySceneDetector {
    /// Value returned by [`SceneDetector::detect`].
    pub answer: bool,
    /// Number of calls so far.
    pub calls: usize,
    /// `pixel_total` of the last call.
    pub last_pixel_total: Option<i32>,
    /// `threshold` of the last call.
    pub last_threshold: Option<i32>,
    /// Total pixel count of the current cumulative histogram on the last call.
    pub last_current_total: Option<i32>,
}

impl SpySceneDetector {
    /// Detector that always answers `answer`.
    #[must_use]
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            ..Self::default()
        }
    }
}

impl SceneDetector for SpySceneDetector {
    #[allow(clippy::arithmetic_side_effects)] // Mock counter; overflow not a concern in tests
    fn detect(&mut self, frames: SceneFrames<'_>, pixel_total: i32, threshold: i32) -> bool {
        self.calls += 1;
        self.last_pixel_total = Some(pixel_total);
        self.last_threshold = Some(threshold);
        self.last_current_total = frames.current_cumulative.last().copied();
        self.answer
    }
}

/// Gain compensator returning a fixed gain and recording the levels it saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedGain {
    /// Value returned by [`GainCompensator::gain`].
    pub gain: u16,
    /// Number of calls so far.
    pub calls: usize,
    /// `backlight_level` of the last call.
    pub last_level: Option<u16>,
}

impl FixedGain {
    /// Compensator that always answers `gain`.
    #[must_use]
    pub const fn new(gain: u16) -> Self {
        Self {
            gain,
            calls: 0,
            last_level: None,
        }
    }
}

impl Default for FixedGain {
    fn default() -> Self {
        Self::new(super::GAIN_UNITY)
    }
}

impl GainCompensator for FixedGain {
    #[allow(clippy::arithmetic_side_effects)] // Mock counter; overflow not a concern in tests
    fn gain(&mut self, backlight_level: u16) -> u16 {
        self.calls += 1;
        self.last_level = Some(backlight_level);
        self.gain
    }
}
