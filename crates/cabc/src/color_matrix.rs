//! Colour-matrix gain application.
//!
//! The display engine's 3x4 colour matrix holds fixed-point coefficients
//! where `0x400` is 1.0. The compensation gain chosen by the engine scales
//! the three diagonal coefficients so pixels brighten as the backlight dims.

use crate::collaborators::GAIN_UNITY;

/// Colour-matrix coefficients, row-major (`coef[row][col]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColorMatrix {
    /// Row `r` holds `coef_r0 ..= coef_r3`.
    pub coef: [[u16; 4]; 3],
}

impl ColorMatrix {
    /// Identity transform.
    pub const IDENTITY: Self = Self {
        coef: [
            [GAIN_UNITY, 0, 0, 0],
            [0, GAIN_UNITY, 0, 0],
            [0, 0, GAIN_UNITY, 0],
        ],
    };

    /// All-zero matrix, as left by a user space that never programmed one.
    pub const ZERO: Self = Self {
        coef: [[0; 4]; 3],
    };

    /// The diagonal coefficients `coef00`, `coef11`, `coef22`.
    #[must_use]
    #[allow(clippy::indexing_slicing)] // constant indices inside [[u16; 4]; 3]
    pub const fn diagonal(&self) -> [u16; 3] {
        [self.coef[0][0], self.coef[1][1], self.coef[2][2]]
    }

    /// Copy of `self` with `gain` applied to the diagonal.
    ///
    /// A matrix with an all-zero diagonal gets `gain` written directly.
    /// Otherwise each diagonal coefficient is scaled by `gain / 0x400`.
    #[must_use]
    pub fn with_gain(&self, gain: u16) -> Self {
        if self.diagonal() == [0, 0, 0] {
            let mut out = *self;
            out.set_diagonal([gain; 3]);
            out
        } else {
            self.scaled(gain)
        }
    }

    /// Copy of `self` with each diagonal coefficient scaled by
    /// `gain / 0x400`, saturating at `u16::MAX`.
    #[must_use]
    pub fn scaled(&self, gain: u16) -> Self {
        let mut out = *self;
        let scale = |c: u16| {
            let v = u32::from(c)
                .saturating_mul(u32::from(gain))
                .checked_div(u32::from(GAIN_UNITY))
                .unwrap_or(0);
            u16::try_from(v).unwrap_or(u16::MAX)
        };
        let [d0, d1, d2] = self.diagonal();
        out.set_diagonal([scale(d0), scale(d1), scale(d2)]);
        out
    }

    #[allow(clippy::indexing_slicing)] // constant indices inside [[u16; 4]; 3]
    fn set_diagonal(&mut self, values: [u16; 3]) {
        self.coef[0][0] = values[0];
        self.coef[1][1] = values[1];
        self.coef[2][2] = values[2];
    }

    /// Register words: for each row, `(coef_r1 << 16) | coef_r0` then
    /// `(coef_r3 << 16) | coef_r2`.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // u16 shifted into the high half of a u32
    pub fn packed(&self) -> [u32; 6] {
        let mut words = [0u32; 6];
        for (word, pair) in words
            .iter_mut()
            .zip(self.coef.iter().flat_map(|row| row.chunks_exact(2)))
        {
            if let [lo, hi] = pair {
                *word = (u32::from(*hi) << 16) | u32::from(*lo);
            }
        }
        words
    }
}

impl Default for ColorMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}
