//! Vsync window in which the engine is run.
//!
//! After every mode set the driver skips the first vsyncs (histograms are
//! not settled yet), then runs CABC on every second vsync for a bounded
//! number of frames.

/// Range of vsync counts on which a CABC frame is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunWindow {
    /// First eligible vsync count (inclusive).
    pub start: u32,
    /// End of the window (exclusive).
    pub end: u32,
    /// Run on every `every`-th vsync count.
    pub every: u32,
}

impl RunWindow {
    /// Window used by the display driver: vsyncs 9 to 150, even counts only.
    pub const DRIVER: Self = Self {
        start: 9,
        end: 151,
        every: 2,
    };

    /// `true` when a CABC frame should run on `vsync_count`.
    ///
    /// An `every` of zero disables the window.
    #[must_use]
    pub fn should_run(&self, vsync_count: u32) -> bool {
        (self.start..self.end).contains(&vsync_count)
            && vsync_count
                .checked_rem(self.every)
                .is_some_and(|r| r == 0)
    }

    /// Number of frames the window schedules.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        (self.start..self.end)
            .filter(|&c| self.should_run(c))
            .count()
    }
}

impl Default for RunWindow {
    fn default() -> Self {
        Self::DRIVER
    }
}
