//! Histogram accumulator.
//!
//! The DPU reports a 32-bin luminance histogram per frame (bin 0 darkest,
//! bin 31 brightest). The engine keeps two derived views of it:
//!
//! - a cumulative histogram, seeded from the brightest bin and summed toward
//!   the darker bins, used for the percentile lookup;
//! - the raw histogram reversed, used only by the scene detector.
//!
//! Both views are kept for the current and the previous frame.

/// Number of histogram bins reported per frame.
pub const HIST_BINS: usize = 32;

/// Cumulative-histogram bin whose frame-to-frame delta estimates how much the
/// content changed.
pub const NUM_DIFF_BIN: usize = 13;

/// The two per-frame views derived from a raw histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumulatedHistogram {
    /// `cumulative[i]` is the pixel count of the `i + 1` brightest bins.
    /// `cumulative[31]` is the total pixel count.
    pub cumulative: [i32; HIST_BINS],
    /// `reversed[i] == raw[31 - i]`.
    pub reversed: [i32; HIST_BINS],
}

impl AccumulatedHistogram {
    /// All-zero histogram, the state before the first frame.
    pub const ZERO: Self = Self {
        cumulative: [0; HIST_BINS],
        reversed: [0; HIST_BINS],
    };

    /// Total pixel count of the frame (last cumulative bin).
    #[must_use]
    #[allow(clippy::indexing_slicing)] // constant index below HIST_BINS
    pub fn total(&self) -> i32 {
        self.cumulative[HIST_BINS - 1]
    }
}

impl Default for AccumulatedHistogram {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Build the cumulative and reversed views of `raw`.
///
/// The running sum starts at the brightest bin and walks toward darker bins,
/// writing into increasing output indices. Counts are reinterpreted as `i32`
/// and summed with wrapping arithmetic, as the hardware registers are.
#[must_use]
#[allow(clippy::indexing_slicing)] // all indices are in 0..HIST_BINS
#[allow(clippy::arithmetic_side_effects)] // index arithmetic stays in 0..HIST_BINS
#[allow(clippy::cast_possible_wrap)] // bin counts are stored as i32 downstream
pub fn accumulate(raw: &[u32; HIST_BINS]) -> AccumulatedHistogram {
    let mut cumulative = [0i32; HIST_BINS];
    cumulative[0] = raw[31] as i32;
    for j in (0..=30usize).rev() {
        // cumulative[30 - (j - 1)] = cumulative[30 - j] + raw[j]
        cumulative[31 - j] = cumulative[30 - j].wrapping_add(raw[j] as i32);
    }

    let mut reversed = [0i32; HIST_BINS];
    for (i, slot) in reversed.iter_mut().enumerate() {
        *slot = raw[HIST_BINS - 1 - i] as i32;
    }

    AccumulatedHistogram {
        cumulative,
        reversed,
    }
}

/// Current and previous frame histograms for one display pipe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistogramPair {
    /// Views of the frame being processed.
    pub current: AccumulatedHistogram,
    /// Views of the previous processed frame.
    pub previous: AccumulatedHistogram,
}

impl HistogramPair {
    /// Both frames zeroed.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: AccumulatedHistogram::ZERO,
            previous: AccumulatedHistogram::ZERO,
        }
    }

    /// Replace the current frame with the views of `raw`.
    pub fn load(&mut self, raw: &[u32; HIST_BINS]) {
        self.current = accumulate(raw);
    }

    /// Cumulative delta at [`NUM_DIFF_BIN`] between the current and previous
    /// frame (wrapping).
    #[must_use]
    #[allow(clippy::indexing_slicing)] // constant index below HIST_BINS
    pub fn num_diff(&self) -> i32 {
        self.current.cumulative[NUM_DIFF_BIN]
            .wrapping_sub(self.previous.cumulative[NUM_DIFF_BIN])
    }

    /// End of frame: the current views become the previous ones.
    pub fn commit(&mut self) {
        self.previous = self.current;
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    fn ramp() -> [u32; HIST_BINS] {
        core::array::from_fn(|i| i as u32 + 1)
    }

    #[test]
    fn test_cumulative_seeded_from_brightest_bin() {
        let mut raw = [0u32; HIST_BINS];
        raw[31] = 1000;
        let acc = accumulate(&raw);
        assert!(acc.cumulative.iter().all(|&c| c == 1000));
        assert_eq!(acc.total(), 1000);
    }

    #[test]
    fn test_cumulative_is_suffix_sum() {
        let raw = ramp();
        let acc = accumulate(&raw);
        for i in 0..HIST_BINS {
            let expected: u32 = raw[31 - i..].iter().sum();
            assert_eq!(acc.cumulative[i], expected as i32, "bin {i}");
        }
        // 1 + 2 + ... + 32
        assert_eq!(acc.total(), 528);
    }

    #[test]
    fn test_cumulative_darkest_bin_lands_last() {
        let mut raw = [0u32; HIST_BINS];
        raw[0] = 7;
        let acc = accumulate(&raw);
        assert_eq!(acc.cumulative[30], 0);
        assert_eq!(acc.cumulative[31], 7);
    }

    #[test]
    fn test_reversed_is_plain_reversal() {
        let raw = ramp();
        let acc = accumulate(&raw);
        assert_eq!(acc.reversed[0], 32);
        assert_eq!(acc.reversed[31], 1);
        for i in 0..HIST_BINS {
            assert_eq!(acc.reversed[i], raw[31 - i] as i32);
        }
    }

    #[test]
    fn test_overflowing_counts_wrap() {
        let raw = [u32::MAX; HIST_BINS];
        let acc = accumulate(&raw);
        // u32::MAX reinterpreted as i32 is -1
        assert_eq!(acc.cumulative[0], -1);
        assert_eq!(acc.total(), -32);
    }

    #[test]
    fn test_pair_num_diff_and_commit() {
        let mut pair = HistogramPair::new();
        let mut raw = [0u32; HIST_BINS];
        raw[31] = 100;
        pair.load(&raw);
        assert_eq!(pair.num_diff(), 100);
        pair.commit();
        assert_eq!(pair.previous, pair.current);

        raw[31] = 40;
        pair.load(&raw);
        assert_eq!(pair.num_diff(), -60);
    }

    #[test]
    fn test_num_diff_ignores_bins_below_window() {
        let mut pair = HistogramPair::new();
        let mut raw = [0u32; HIST_BINS];
        // bin 18 only reaches cumulative index 13 and above
        raw[18] = 5;
        pair.load(&raw);
        assert_eq!(pair.num_diff(), 5);
        raw[18] = 0;
        raw[17] = 5;
        pair.commit();
        pair.load(&raw);
        assert_eq!(pair.current.cumulative[NUM_DIFF_BIN], 0);
        assert_eq!(pair.num_diff(), -5);
    }
}
