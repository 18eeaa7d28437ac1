//! Persistent per-pipe state carried from frame to frame.

use crate::config::STEP2_INIT;

/// Raw and smoothed backlight values of the last four frames.
///
/// `cur` is the unclamped raw target of the frame being processed. The
/// smoothed values are kept as `i32` because intermediate smoothing results
/// may leave the `u16` range before the final clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BacklightHistory {
    /// Raw target of the current frame.
    pub cur: u16,
    /// Raw target one frame back.
    pub pre: u16,
    /// Raw target two frames back.
    pub pre2: u16,
    /// Raw target three frames back.
    pub pre3: u16,
    /// Smoothed UI-path value of the current frame.
    pub cur_fix_ui: i32,
    /// Smoothed UI-path value of the previous UI frame.
    pub pre_fix_ui: i32,
    /// Smoothed video-path value of the current frame.
    pub cur_fix_video: i32,
    /// Smoothed video-path value of the previous video frame.
    pub pre_fix_video: i32,
}

impl BacklightHistory {
    /// History with every field set to `max_backlight`.
    #[must_use]
    pub const fn new(max_backlight: u16) -> Self {
        let max = max_backlight as i32;
        Self {
            cur: max_backlight,
            pre: max_backlight,
            pre2: max_backlight,
            pre3: max_backlight,
            cur_fix_ui: max,
            pre_fix_ui: max,
            cur_fix_video: max,
            pre_fix_video: max,
        }
    }

    /// Reset every field to `max_backlight`.
    pub fn reset(&mut self, max_backlight: u16) {
        *self = Self::new(max_backlight);
    }

    /// End of frame: `pre3 <- pre2 <- pre <- cur`.
    pub fn shift(&mut self) {
        self.pre3 = self.pre2;
        self.pre2 = self.pre;
        self.pre = self.cur;
    }
}

/// Counters feeding back into the UI smoothing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChangeCounters {
    /// Last adaptive step used by the UI path.
    pub step2: u16,
    /// `true` while the UI path is actively transitioning, `false` once it
    /// settled at the bottom brightness step.
    pub change_flag: bool,
    /// Cumulative-histogram delta at the content-change bin.
    pub hist_num_diff: i32,
}

impl ChangeCounters {
    /// Power-on values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            step2: STEP2_INIT as u16,
            change_flag: true,
            hist_num_diff: 0,
        }
    }
}

impl Default for ChangeCounters {
    fn default() -> Self {
        Self::new()
    }
}
