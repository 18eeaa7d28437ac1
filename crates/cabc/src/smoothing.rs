//! Temporal smoothing and rate limiting of the raw backlight target.
//!
//! Two independent state machines share the [`BacklightHistory`]:
//!
//! - [`backlight_fix_ui`] for composited UI content. It uses an adaptive step
//!   derived from the last three frame-to-frame trends ([`gen_step2`]) and a
//!   histogram-based change ratio to decide how fast to follow the target.
//! - [`backlight_fix_video`] for frames driven by the video pipeline. It only
//!   moves by a fixed step when the trend is consistent and snaps on large
//!   jumps.
//!
//! The bracket boundaries, step formulas and special cases are tuned for
//! visual behaviour on the panel and are kept exactly as the driver ships
//! them, including the UI path only ever adding the adaptive step. Integer
//! arithmetic on histogram-derived quantities wraps instead of panicking.

use core::cmp::Ordering;

use crate::history::{BacklightHistory, ChangeCounters};

/// Change ratio at or above which the UI content is treated as static.
pub const STATIC_CHANGE_RATIO: i32 = 80;

/// Largest raw-target swing the video path still smooths. Larger swings snap.
pub const VIDEO_SNAP_SWING: i32 = 64;

/// Fixed bump applied to the adaptive step on scene changes.
pub const SCENE_STEP_BUMP: u16 = 8;

/// Adaptive-step increment for jumps above the last bracket.
pub const FAST_FORWARD_STEP: u16 = 400;

/// `div_result` above which a jump counts as large.
const LARGE_JUMP_DIV: u8 = 16;

/// Step sizes in effect for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepSizes {
    /// Video step and UI de-correction step.
    pub step0: u8,
    /// UI brightening step.
    pub step1: u8,
    /// Base of the adaptive UI step.
    pub step2: u8,
}

impl StepSizes {
    /// All steps forced to zero, used while the nominal backlight is very low.
    pub const FROZEN: Self = Self {
        step0: 0,
        step1: 0,
        step2: 0,
    };
}

/// `1` if `a > b`, `-1` if `a < b`, `0` otherwise.
#[must_use]
pub fn sign_diff(a: i32, b: i32) -> i32 {
    match a.cmp(&b) {
        Ordering::Greater => 1,
        Ordering::Less => -1,
        Ordering::Equal => 0,
    }
}

/// Two-sided saturation of `value` into `[bottom, top]`.
///
/// The upper bound is applied first, so an inverted range yields `bottom`.
#[must_use]
pub fn clip(value: i32, bottom: u16, top: u16) -> i32 {
    let mut v = value;
    if v > i32::from(top) {
        v = i32::from(top);
    }
    if v < i32::from(bottom) {
        v = i32::from(bottom);
    }
    v
}

/// Piecewise-linear adaptive step keyed on the backlight jump `diff`.
///
/// | `diff`         | result                              |
/// |----------------|-------------------------------------|
/// | `<= 80`        | `base_step + div_result * extra`     |
/// | `<= 160`       | `base_step + div_result * (extra+2)` |
/// | `<= 240`       | `base_step + div_result * (extra+4)` |
/// | `> 240`        | `base_step + 400`                    |
#[must_use]
#[allow(
    clippy::arithmetic_side_effects, // operands are widened u8 values, the sum fits u32
    clippy::cast_possible_truncation, // callers pass extra <= 3, so the result stays below 2100
)]
pub fn smooth_step2(diff: u16, div_result: u8, base_step: u8, extra: u8) -> u16 {
    let base = u32::from(base_step);
    let div = u32::from(div_result);
    let extra = u32::from(extra);
    let result = if diff <= 80 {
        base + div * extra
    } else if diff <= 160 {
        base + div * (2 + extra)
    } else if diff <= 240 {
        base + div * (4 + extra)
    } else {
        base + u32::from(FAST_FORWARD_STEP)
    };
    result as u16
}

/// Adaptive UI step from the three-frame trend.
///
/// `cur_pre` is the raw difference `cur - pre`; `pre_pre2` and `pre2_pre3`
/// are signs. The chosen step is persisted in `persistent_step2` except in
/// the two "keep brightening" cases, which reuse the persisted value.
///
/// | trend                                   | step                                  |
/// |-----------------------------------------|---------------------------------------|
/// | darkening, no brightening in history    | bump on scene change + large jump, else ramp `extra = 0` |
/// | flat, brightened one frame ago          | persisted                             |
/// | flat, brightened two frames ago         | persisted                             |
/// | brightening after a flat history        | ramp `extra = 3` on large jumps, bump on scene change, else ramp `extra = 1` |
/// | brightening after any movement          | bump on scene change, else ramp `extra = 3` |
/// | anything else                           | `step0`, persisted                    |
#[must_use]
#[allow(clippy::too_many_arguments)]
#[allow(clippy::arithmetic_side_effects)] // u8 base plus a small constant, fits u16
pub fn gen_step2(
    cur_pre: i32,
    pre_pre2: i32,
    pre2_pre3: i32,
    scene_flag: bool,
    div_result: u8,
    persistent_step2: &mut u16,
    step0: u8,
    step2_base: u8,
    abs_diff: u16,
) -> u16 {
    let bump = u16::from(step2_base) + SCENE_STEP_BUMP;
    let large_jump = div_result > LARGE_JUMP_DIV;

    if cur_pre < 0 && pre_pre2 <= 0 && pre2_pre3 <= 0 {
        // darker gradually with smaller step
        *persistent_step2 = if scene_flag && large_jump {
            bump
        } else {
            smooth_step2(abs_diff, div_result, step2_base, 0)
        };
        *persistent_step2
    } else if cur_pre == 0 && pre_pre2 > 0 && pre2_pre3 == 0 {
        // still brightening, second frame
        *persistent_step2
    } else if cur_pre == 0 && pre_pre2 == 0 && pre2_pre3 > 0 {
        // still brightening, third frame
        *persistent_step2
    } else if cur_pre > 0 && pre_pre2 == 0 && pre2_pre3 == 0 {
        // brightening, first frame
        *persistent_step2 = if large_jump && !scene_flag {
            smooth_step2(abs_diff, div_result, step2_base, 3)
        } else if large_jump && scene_flag {
            bump
        } else {
            smooth_step2(abs_diff, div_result, step2_base, 1)
        };
        *persistent_step2
    } else if cur_pre > 0 && (pre_pre2 != 0 || pre2_pre3 != 0) {
        *persistent_step2 = if scene_flag {
            bump
        } else {
            smooth_step2(abs_diff, div_result, step2_base, 3)
        };
        *persistent_step2
    } else {
        *persistent_step2 = u16::from(step0);
        u16::from(step0)
    }
}

/// UI-path smoothing. Writes `bl.cur_fix_ui` and may update `counters`.
///
/// `hist_num` is the frame pixel total and `counters.hist_num_diff` the
/// cumulative delta; their ratio estimates how static the content is.
/// `min_step` is the bottom of the brightness-step table.
#[allow(
    clippy::arithmetic_side_effects, // u16-range differences and step * sign in i32
    clippy::cast_possible_truncation, // |cur - pre| <= u16::MAX; /10 fits u8 for table levels
)]
pub fn backlight_fix_ui(
    bl: &mut BacklightHistory,
    counters: &mut ChangeCounters,
    steps: StepSizes,
    scene_flag: bool,
    hist_num: i32,
    min_step: u16,
) {
    let cur = i32::from(bl.cur);
    let diff_cur_pre = cur - i32::from(bl.pre);
    let sign_pre_pre2 = sign_diff(i32::from(bl.pre), i32::from(bl.pre2));
    let sign_pre2_pre3 = sign_diff(i32::from(bl.pre2), i32::from(bl.pre3));
    let abs_diff = diff_cur_pre.unsigned_abs() as u16;
    let sign_fix_cur = sign_diff(bl.pre_fix_ui, cur);
    let step0 = i32::from(steps.step0);
    let step1 = i32::from(steps.step1);

    let change_ratio = if counters.hist_num_diff != 0 {
        hist_num.wrapping_div(counters.hist_num_diff)
    } else {
        hist_num
    };
    let div_result = (abs_diff / 10) as u8;

    if diff_cur_pre == 0 && sign_pre_pre2 == 0 {
        // stable
        if change_ratio >= STATIC_CHANGE_RATIO {
            if bl.cur == min_step && !counters.change_flag {
                bl.cur_fix_ui = bl.pre_fix_ui.wrapping_add(step1);
            } else {
                counters.change_flag = true;
                bl.cur_fix_ui = bl.pre_fix_ui.wrapping_sub(step0 * sign_fix_cur);
            }
        } else {
            counters.change_flag = true;
            if sign_fix_cur >= 0 {
                bl.cur_fix_ui = bl.pre_fix_ui;
            } else {
                let motion = STATIC_CHANGE_RATIO.wrapping_sub(change_ratio).wrapping_abs();
                bl.cur_fix_ui = bl.pre_fix_ui.wrapping_add(step1.wrapping_mul(motion));
            }
        }
    } else if sign_pre_pre2 == 0 && sign_pre2_pre3 == 0 && diff_cur_pre < 0 && bl.cur == min_step
    {
        // settled history dropping into the bottom step
        counters.change_flag = false;
        bl.cur_fix_ui = bl.pre_fix_ui.wrapping_add(step1);
    } else if diff_cur_pre == 0 && bl.cur == min_step && !counters.change_flag {
        bl.cur_fix_ui = bl.pre_fix_ui.wrapping_add(step1);
    } else {
        counters.change_flag = true;
        let step = gen_step2(
            diff_cur_pre,
            sign_pre_pre2,
            sign_pre2_pre3,
            scene_flag,
            div_result,
            &mut counters.step2,
            steps.step0,
            steps.step2,
            abs_diff,
        );
        bl.cur_fix_ui = bl.pre_fix_ui.wrapping_add(i32::from(step));
    }

    // to avoid shaking
    if counters.change_flag
        && ((sign_fix_cur > 0 && bl.cur_fix_ui < cur) || (sign_fix_cur < 0 && bl.cur_fix_ui > cur))
    {
        bl.cur_fix_ui = cur;
    }
}

/// Video-path smoothing. Writes `bl.cur_fix_video`.
///
/// `min_backlight` and `max_backlight` identify the saturated-edge case: a
/// flat history pinned at a clamp bound followed by two moves in the same
/// direction. When that case does not hold, `cur_fix_video` keeps its value.
#[allow(clippy::arithmetic_side_effects)] // clipped history levels plus one u8 step in i32
pub fn backlight_fix_video(
    scene_change: bool,
    step0: u8,
    bl: &mut BacklightHistory,
    min_backlight: u16,
    max_backlight: u16,
) {
    let cur = i32::from(bl.cur);
    let pre = i32::from(bl.pre);
    let step0 = i32::from(step0);
    let swing = (cur - pre).abs();
    let cur_fix_diff = cur - bl.pre_fix_video;
    let sign_cur_pre = sign_diff(cur, pre);
    let sign_cur_fix = sign_diff(cur, bl.pre_fix_video);

    if !scene_change {
        let sign_1 = sign_diff(i32::from(bl.pre2), i32::from(bl.pre3));
        let sign_2 = sign_diff(pre, i32::from(bl.pre2));
        let sign_3 = sign_cur_pre;
        if (sign_1 > 0 && sign_2 > 0 && sign_3 > 0) || (sign_1 < 0 && sign_2 < 0 && sign_3 < 0) {
            bl.cur_fix_video = bl.pre_fix_video + step0 * sign_3;
        } else if sign_1 == 0 && sign_2 * sign_3 > 0 {
            if bl.pre2 == min_backlight || bl.pre2 == max_backlight {
                bl.cur_fix_video = bl.pre_fix_video + step0 * sign_3;
            }
        } else if swing <= VIDEO_SNAP_SWING {
            if cur_fix_diff != 0 {
                bl.cur_fix_video = bl.pre_fix_video + step0 * sign_cur_fix;
            } else {
                bl.cur_fix_video = bl.pre_fix_video;
            }
        } else {
            bl.cur_fix_video = cur;
        }
    } else if sign_cur_pre * sign_cur_fix < 0 {
        bl.cur_fix_video = bl.pre_fix_video;
    } else if sign_cur_pre * sign_cur_fix > 0 {
        bl.cur_fix_video = bl.pre_fix_video + step0 * sign_cur_pre;
    } else if sign_cur_pre == 0 && sign_cur_fix != 0 {
        if sign_cur_fix > 0 {
            bl.cur_fix_video = (bl.pre_fix_video + step0).min(cur);
        } else {
            bl.cur_fix_video = (bl.pre_fix_video - step0).max(cur);
        }
    } else if sign_cur_fix == 0 {
        bl.cur_fix_video = bl.pre_fix_video;
    }
}
