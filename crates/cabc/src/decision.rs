//! Raw backlight-target decision.
//!
//! The target is the brightness step of the first cumulative bin that holds
//! at least `percent_th` percent of the frame's pixels. Scene-change
//! classification is delegated to a [`SceneDetector`](crate::SceneDetector)
//! and driven by the engine.

use crate::config::BrightnessSteps;
use crate::histogram::HIST_BINS;

/// Pick the raw target backlight from a cumulative histogram.
///
/// Scans bins `0..32` and returns `brightness_steps[i]` for the first `i`
/// where `cumulative[i] * 100 >= cumulative[31] * percent_th`. Falls back to
/// `min_backlight` when no bin qualifies. Products wrap on `i32` overflow.
#[must_use]
#[allow(clippy::indexing_slicing)] // constant index below HIST_BINS
pub fn decide_target(
    cumulative: &[i32; HIST_BINS],
    percent_th: i32,
    brightness_steps: &BrightnessSteps,
    min_backlight: u16,
) -> u16 {
    let threshold = cumulative[HIST_BINS - 1].wrapping_mul(percent_th);
    cumulative
        .iter()
        .zip(brightness_steps.0.iter())
        .find(|(&count, _)| count.wrapping_mul(100) >= threshold)
        .map_or(min_backlight, |(_, &step)| step)
}
