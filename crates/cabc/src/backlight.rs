//! Backlight level scaling between the brightness property, the engine's
//! 0..=1020 range and the PWM duty cycle.

use crate::config::MAX_BACKLIGHT;

/// Full-scale value of the user-visible brightness property.
pub const BRIGHTNESS_FULL_SCALE: u8 = 255;

/// Map the brightness property onto the panel's PWM level range.
///
/// `brightness * (max_level - min_level) / 255`, truncating. An inverted
/// level range maps everything to 0.
#[must_use]
pub fn nominal_level(brightness: u8, min_level: u16, max_level: u16) -> u16 {
    let span = u32::from(max_level.saturating_sub(min_level));
    let level = u32::from(brightness)
        .saturating_mul(span)
        .checked_div(u32::from(BRIGHTNESS_FULL_SCALE))
        .unwrap_or(0);
    u16::try_from(level).unwrap_or(u16::MAX)
}

/// Scale the engine's backlight decision onto the nominal level.
///
/// `backlight_fix * refer_level / 1020`, truncating.
#[must_use]
pub fn cabc_level(backlight_fix: u16, refer_level: u16) -> u16 {
    let level = u32::from(backlight_fix)
        .saturating_mul(u32::from(refer_level))
        .checked_div(u32::from(MAX_BACKLIGHT))
        .unwrap_or(0);
    u16::try_from(level).unwrap_or(u16::MAX)
}

/// PWM level with CABC active: `cabc_level * level / refer_level`, rounded
/// to the closest integer.
///
/// `refer_level` is the nominal level at the time the decision was made and
/// `level` the current nominal level, so a brightness change between two
/// decisions is followed immediately. A zero `refer_level` yields 0.
#[must_use]
pub fn pwm_level(cabc_level: u16, level: u16, refer_level: u16) -> u32 {
    let numerator = u64::from(cabc_level).saturating_mul(u64::from(level));
    let Some(rounded) = div_round_closest(numerator, u64::from(refer_level)) else {
        return 0;
    };
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

/// PWM duty cycle for `level` out of `scale`, given the PWM `period`.
///
/// A zero `scale` yields 0.
#[must_use]
pub fn duty_cycle(level: u32, period: u64, scale: u32) -> u64 {
    u64::from(level)
        .saturating_mul(period)
        .checked_div(u64::from(scale))
        .unwrap_or(0)
}

#[allow(clippy::arithmetic_side_effects)] // divisor checked non-zero; half-divisor add cannot overflow u64 for u32 inputs
fn div_round_closest(numerator: u64, divisor: u64) -> Option<u64> {
    if divisor == 0 {
        return None;
    }
    Some(numerator.saturating_add(divisor / 2) / divisor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nominal_level() {
        assert_eq!(nominal_level(255, 0, 255), 255);
        assert_eq!(nominal_level(128, 0, 255), 128);
        assert_eq!(nominal_level(255, 0, 1023), 1023);
        // 100 * 1000 / 255 = 392.15
        assert_eq!(nominal_level(100, 23, 1023), 392);
        assert_eq!(nominal_level(0, 0, 255), 0);
        assert_eq!(nominal_level(200, 300, 100), 0);
    }

    #[test]
    fn test_cabc_level() {
        assert_eq!(cabc_level(1020, 200), 200);
        assert_eq!(cabc_level(510, 200), 100);
        // 408 * 255 / 1020 = 102
        assert_eq!(cabc_level(408, 255), 102);
        assert_eq!(cabc_level(700, 0), 0);
    }

    #[test]
    fn test_pwm_level_rounds_to_closest() {
        assert_eq!(pwm_level(100, 200, 200), 100);
        // 100 * 150 / 200 = 75
        assert_eq!(pwm_level(100, 150, 200), 75);
        // 7 * 3 / 4 = 5.25 -> 5
        assert_eq!(pwm_level(7, 3, 4), 5);
        // 7 * 5 / 2 = 17.5 -> 18
        assert_eq!(pwm_level(7, 5, 2), 18);
    }

    #[test]
    fn test_pwm_level_zero_reference() {
        assert_eq!(pwm_level(100, 200, 0), 0);
    }

    #[test]
    fn test_duty_cycle() {
        assert_eq!(duty_cycle(128, 40_000, 255), 20_078);
        assert_eq!(duty_cycle(255, 40_000, 255), 40_000);
        assert_eq!(duty_cycle(1, 40_000, 0), 0);
    }
}
