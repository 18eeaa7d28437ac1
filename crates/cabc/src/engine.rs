//! Per-frame CABC decision engine.
//!
//! [`CabcEngine`] owns every piece of state that survives between frames:
//! tuning, smoothing history, change counters, the histogram pair, the
//! scene flag and the video-pipeline debounce counter. One engine serves one
//! display pipe. All operations take `&mut self`, so concurrent callers have
//! to serialise through a lock or a single owning task (see
//! [`SharedController`](crate::SharedController)).
//!
//! # Frame sequence
//!
//! ```text
//! histogram ─▶ accumulate ─▶ debounce VSP ─▶ gate steps ─▶ scene detect
//!                                                              │
//!      gain ◀── clip ◀── smooth (UI | video) ◀── decide target ◀┘
//! ```

use crate::collaborators::{GainCompensator, SceneDetector, SceneFrames};
use crate::config::{TuningParameters, MAX_BACKLIGHT};
use crate::decision::decide_target;
use crate::error::CabcError;
use crate::histogram::{HistogramPair, HIST_BINS};
use crate::history::{BacklightHistory, ChangeCounters};
use crate::smoothing::{backlight_fix_ui, backlight_fix_video, clip, StepSizes};

/// Consecutive video-pipeline frames required before the video path is used.
pub const VSP_DEBOUNCE_FRAMES: u16 = 20;

/// Nominal backlight at or below which all smoothing steps are frozen.
pub const LOW_BACKLIGHT_GATE: u16 = 50;

/// Content class selecting the smoothing state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ContentPath {
    /// Composited UI content.
    #[default]
    Ui,
    /// Frames driven by the video pipeline.
    Video,
}

impl ContentPath {
    /// Short lowercase name, for logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ui => "ui",
            Self::Video => "video",
        }
    }
}

/// Result of one [`CabcEngine::trigger`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TriggerOutput {
    /// Backlight to apply, in `[min_backlight, MAX_BACKLIGHT]`.
    pub backlight: u16,
    /// Pixel gain from the gain compensator.
    pub gain: u16,
    /// Scene flag in effect for this frame.
    pub scene_change: bool,
    /// Smoothing path taken after debouncing.
    pub path: ContentPath,
    /// Raw (unsmoothed) target chosen from the histogram.
    pub target: u16,
}

/// Content-adaptive backlight decision engine for one display pipe.
pub struct CabcEngine<S, G> {
    scene: S,
    gain: G,
    params: TuningParameters,
    history: BacklightHistory,
    counters: ChangeCounters,
    histograms: HistogramPair,
    scene_flag: bool,
    pixel_total: i32,
    vsp_frames: u16,
    previous_path: ContentPath,
}

impl<S: SceneDetector, G: GainCompensator> CabcEngine<S, G> {
    /// Engine with power-on state. Call [`init`](Self::init) before the
    /// first frame.
    pub fn new(scene: S, gain: G, params: TuningParameters) -> Self {
        Self {
            scene,
            gain,
            params,
            history: BacklightHistory::new(MAX_BACKLIGHT),
            counters: ChangeCounters::new(),
            histograms: HistogramPair::new(),
            scene_flag: false,
            pixel_total: 0,
            vsp_frames: 0,
            previous_path: ContentPath::Ui,
        }
    }

    /// Record the panel size and reset the backlight history to full scale.
    ///
    /// Safe to call again on every mode set. Counters, histograms and the
    /// scene flag are carried over.
    pub fn init(&mut self, width: u32, height: u32) -> Result<(), CabcError> {
        if width == 0 || height == 0 {
            return Err(CabcError::InvalidDimensions);
        }
        let pixels = u64::from(width).saturating_mul(u64::from(height));
        self.pixel_total = i32::try_from(pixels).unwrap_or(i32::MAX);
        self.history.reset(MAX_BACKLIGHT);

        #[cfg(feature = "tracing")]
        tracing::debug!(width, height, pixel_total = self.pixel_total, "cabc init");
        #[cfg(feature = "defmt")]
        defmt::debug!("cabc init {=u32}x{=u32}", width, height);

        Ok(())
    }

    /// Update step sizes, scene-change threshold and minimum backlight.
    ///
    /// Takes effect on the next [`trigger`](Self::trigger).
    pub fn configure(
        &mut self,
        step0: u8,
        step1: u8,
        step2: u8,
        scene_change_thr: u16,
        min_backlight: u16,
    ) {
        self.params
            .configure(step0, step1, step2, scene_change_thr, min_backlight);

        #[cfg(feature = "tracing")]
        tracing::trace!(step0, step1, step2, scene_change_thr, min_backlight, "cabc configure");
    }

    /// Replace the whole tuning set.
    pub fn set_params(&mut self, params: TuningParameters) {
        self.params = params;
    }

    /// Process one frame histogram and decide backlight and gain.
    ///
    /// `histogram` must hold exactly [`HIST_BINS`] counts. On error no state
    /// is modified. `frame_no` is 1 on the first real frame after
    /// [`init`](Self::init) and greater afterwards.
    pub fn trigger(
        &mut self,
        histogram: &[u32],
        current_backlight: u16,
        video_pipeline_active: bool,
        frame_no: u32,
    ) -> Result<TriggerOutput, CabcError> {
        let raw: &[u32; HIST_BINS] =
            histogram
                .try_into()
                .map_err(|_| CabcError::InvalidHistogramLength {
                    len: histogram.len(),
                })?;

        self.histograms.load(raw);
        self.counters.hist_num_diff = self.histograms.num_diff();

        let path = self.debounce(video_pipeline_active);
        let steps = self.gated_steps(current_backlight);

        if frame_no > 1 {
            self.detect_scene();
        }

        let max = self.params.max_backlight();
        let min = self.params.min_backlight;
        let target = decide_target(
            &self.histograms.current.cumulative,
            self.params.percent_th,
            &self.params.brightness_steps,
            min,
        );
        self.history.cur = target;

        let smoothed = match path {
            ContentPath::Ui => self.run_ui(frame_no, steps, min, max),
            ContentPath::Video => self.run_video(frame_no, steps, min, max),
        };

        // First frame: report the nominal level, smoothing has no history yet.
        let reported = if frame_no == 1 {
            clip(i32::from(current_backlight), min, max)
        } else {
            smoothed
        };
        let backlight = u16::try_from(reported).unwrap_or(max);
        let gain = self.gain.gain(backlight / 4);

        #[cfg(feature = "tracing")]
        tracing::trace!(
            frame_no,
            target,
            backlight,
            gain,
            path = path.as_str(),
            scene_change = self.scene_flag,
            "cabc frame"
        );
        #[cfg(feature = "defmt")]
        defmt::trace!(
            "cabc frame {=u32}: target={=u16} bl={=u16} gain={=u16} path={}",
            frame_no,
            target,
            backlight,
            gain,
            path
        );

        self.history.shift();
        self.previous_path = path;
        self.histograms.commit();

        Ok(TriggerOutput {
            backlight,
            gain,
            scene_change: self.scene_flag,
            path,
            target,
        })
    }

    /// Count consecutive video-pipeline frames; the video path is only taken
    /// once the count reaches [`VSP_DEBOUNCE_FRAMES`].
    fn debounce(&mut self, video_pipeline_active: bool) -> ContentPath {
        if video_pipeline_active {
            self.vsp_frames = self.vsp_frames.saturating_add(1);
            if self.vsp_frames < VSP_DEBOUNCE_FRAMES {
                ContentPath::Ui
            } else {
                ContentPath::Video
            }
        } else {
            self.vsp_frames = 0;
            ContentPath::Ui
        }
    }

    fn gated_steps(&self, current_backlight: u16) -> StepSizes {
        if current_backlight <= LOW_BACKLIGHT_GATE {
            StepSizes::FROZEN
        } else {
            StepSizes {
                step0: self.params.step0,
                step1: self.params.step1,
                step2: self.params.step2,
            }
        }
    }

    fn detect_scene(&mut self) {
        let frames = SceneFrames {
            current_cumulative: &self.histograms.current.cumulative,
            previous_cumulative: &self.histograms.previous.cumulative,
            current_reversed: &self.histograms.current.reversed,
            previous_reversed: &self.histograms.previous.reversed,
        };
        let changed = self
            .scene
            .detect(frames, self.pixel_total, self.params.scene_detect_thr);

        if changed != self.scene_flag {
            #[cfg(feature = "tracing")]
            tracing::debug!(scene_change = changed, "cabc scene flag changed");
            #[cfg(feature = "defmt")]
            defmt::debug!("cabc scene flag -> {}", changed);
        }
        self.scene_flag = changed;
    }

    fn run_ui(&mut self, frame_no: u32, steps: StepSizes, min: u16, max: u16) -> i32 {
        if self.previous_path == ContentPath::Video {
            self.history.pre_fix_ui = self.history.pre_fix_video;
            log_handover(ContentPath::Ui);
        }
        if frame_no == 1 {
            self.history.cur_fix_ui = i32::from(max);
        } else {
            backlight_fix_ui(
                &mut self.history,
                &mut self.counters,
                steps,
                self.scene_flag,
                self.pixel_total,
                self.params.brightness_steps.min_step(),
            );
        }
        self.history.cur_fix_ui = clip(self.history.cur_fix_ui, min, max);
        self.history.pre_fix_ui = self.history.cur_fix_ui;
        self.history.cur_fix_ui
    }

    fn run_video(&mut self, frame_no: u32, steps: StepSizes, min: u16, max: u16) -> i32 {
        if self.previous_path == ContentPath::Ui {
            self.history.pre_fix_video = self.history.pre_fix_ui;
            log_handover(ContentPath::Video);
        }
        if frame_no == 1 {
            self.history.cur_fix_video = i32::from(self.history.cur);
        } else {
            backlight_fix_video(self.scene_flag, steps.step0, &mut self.history, min, max);
            self.history.cur_fix_video = clip(self.history.cur_fix_video, min, max);
        }
        self.history.pre_fix_video = self.history.cur_fix_video;
        clip(self.history.cur_fix_video, min, max)
    }

    /// Smoothing history.
    pub fn history(&self) -> &BacklightHistory {
        &self.history
    }

    /// UI change counters.
    pub fn counters(&self) -> &ChangeCounters {
        &self.counters
    }

    /// Current and previous histograms.
    pub fn histograms(&self) -> &HistogramPair {
        &self.histograms
    }

    /// Tuning in effect.
    pub fn params(&self) -> &TuningParameters {
        &self.params
    }

    /// Scene flag of the last detection.
    pub fn scene_flag(&self) -> bool {
        self.scene_flag
    }

    /// Panel pixel count recorded by [`init`](Self::init).
    pub fn pixel_total(&self) -> i32 {
        self.pixel_total
    }

    /// Consecutive frames the video pipeline has been active.
    pub fn video_frames(&self) -> u16 {
        self.vsp_frames
    }

    /// Scene detector.
    pub fn scene_detector(&self) -> &S {
        &self.scene
    }

    /// Gain compensator.
    pub fn gain_compensator(&self) -> &G {
        &self.gain
    }
}

#[allow(unused_variables)]
fn log_handover(to: ContentPath) {
    #[cfg(feature = "tracing")]
    tracing::debug!(to = to.as_str(), "cabc path handover");
    #[cfg(feature = "defmt")]
    defmt::debug!("cabc path handover -> {}", to);
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use crate::collaborators::mock::{FixedGain, SpySceneDetector};
    use crate::collaborators::{NeverSceneChange, UnityGain, GAIN_UNITY};
    use crate::config::DRIVER_DEFAULTS;

    type SpyEngine = CabcEngine<SpySceneDetector, FixedGain>;

    fn spy_engine(scene: bool) -> SpyEngine {
        let mut e = CabcEngine::new(
            SpySceneDetector::new(scene),
            FixedGain::new(0x480),
            DRIVER_DEFAULTS,
        );
        e.init(720, 1280).unwrap();
        e
    }

    /// Histogram whose 10th percentile lands on `bin` of the cumulative view.
    fn hist_at(bin: usize) -> [u32; HIST_BINS] {
        let mut raw = [0u32; HIST_BINS];
        raw[31 - bin] = 1000;
        raw
    }

    #[test]
    fn test_wrong_length_is_rejected_without_side_effects() {
        let mut e = spy_engine(false);
        let before = *e.history();
        let err = e.trigger(&[0u32; 31], 700, false, 1).unwrap_err();
        assert_eq!(err, CabcError::InvalidHistogramLength { len: 31 });
        assert_eq!(*e.history(), before);
        assert_eq!(e.gain_compensator().calls, 0);
    }

    #[test]
    fn test_init_rejects_empty_panel() {
        let mut e = CabcEngine::new(NeverSceneChange, UnityGain, DRIVER_DEFAULTS);
        assert_eq!(e.init(0, 1280), Err(CabcError::InvalidDimensions));
        assert_eq!(e.pixel_total(), 0);
    }

    #[test]
    fn test_init_records_pixel_total() {
        let e = spy_engine(false);
        assert_eq!(e.pixel_total(), 921_600);
    }

    #[test]
    fn test_init_saturates_pixel_total() {
        let mut e = CabcEngine::new(NeverSceneChange, UnityGain, DRIVER_DEFAULTS);
        e.init(u32::MAX, u32::MAX).unwrap();
        assert_eq!(e.pixel_total(), i32::MAX);
    }

    #[test]
    fn test_first_frame_reports_clamped_nominal() {
        let mut e = spy_engine(false);
        let out = e.trigger(&hist_at(0), 700, false, 1).unwrap();
        assert_eq!(out.backlight, 700);
        assert_eq!(out.target, 52);
        assert_eq!(out.path, ContentPath::Ui);
        assert_eq!(e.gain_compensator().last_level, Some(175));
        // UI state starts from full scale
        assert_eq!(e.history().pre_fix_ui, 1020);

        let mut e = spy_engine(false);
        let out = e.trigger(&hist_at(0), 10, false, 1).unwrap();
        assert_eq!(out.backlight, 408);
    }

    #[test]
    fn test_scene_detection_skipped_on_first_frame() {
        let mut e = spy_engine(true);
        let out = e.trigger(&hist_at(0), 700, false, 1).unwrap();
        assert!(!out.scene_change);
        assert_eq!(e.scene_detector().calls, 0);

        let out = e.trigger(&hist_at(0), 700, false, 2).unwrap();
        assert!(out.scene_change);
        assert_eq!(e.scene_detector().calls, 1);
        assert_eq!(e.scene_detector().last_pixel_total, Some(921_600));
        assert_eq!(e.scene_detector().last_threshold, Some(30));
        assert_eq!(e.scene_detector().last_current_total, Some(1000));
    }

    #[test]
    fn test_first_frame_retains_raised_scene_flag() {
        let mut e = spy_engine(true);
        e.trigger(&hist_at(0), 700, false, 1).unwrap();
        assert!(e.trigger(&hist_at(0), 700, false, 2).unwrap().scene_change);
        assert_eq!(e.scene_detector().calls, 1);

        e.init(720, 1280).unwrap();
        let out = e.trigger(&hist_at(5), 700, false, 1).unwrap();
        assert!(out.scene_change);
        assert!(e.scene_flag());
        assert_eq!(e.scene_detector().calls, 1);
    }

    #[test]
    fn test_gain_called_once_per_frame_with_quarter_level() {
        let mut e = spy_engine(false);
        let out = e.trigger(&hist_at(31), 700, false, 1).unwrap();
        let out2 = e.trigger(&hist_at(31), 700, false, 2).unwrap();
        assert_eq!(out.gain, 0x480);
        assert_eq!(e.gain_compensator().calls, 2);
        assert_eq!(e.gain_compensator().last_level, Some(out2.backlight / 4));
    }

    #[test]
    fn test_output_stays_in_clamp_range() {
        let mut e = spy_engine(false);
        for frame in 1..40u32 {
            let bin = (frame as usize * 7) % HIST_BINS;
            let out = e.trigger(&hist_at(bin), 700, frame % 3 == 0, frame.min(2)).unwrap();
            assert!((408..=1020).contains(&out.backlight), "frame {frame}");
        }
    }

    #[test]
    fn test_video_debounce_needs_twenty_frames() {
        let mut e = spy_engine(false);
        e.trigger(&hist_at(31), 700, false, 1).unwrap();
        for n in 1..VSP_DEBOUNCE_FRAMES {
            let out = e.trigger(&hist_at(31), 700, true, 2).unwrap();
            assert_eq!(out.path, ContentPath::Ui, "active frame {n}");
        }
        let out = e.trigger(&hist_at(31), 700, true, 2).unwrap();
        assert_eq!(out.path, ContentPath::Video);
        assert_eq!(e.video_frames(), VSP_DEBOUNCE_FRAMES);

        let out = e.trigger(&hist_at(31), 700, false, 2).unwrap();
        assert_eq!(out.path, ContentPath::Ui);
        assert_eq!(e.video_frames(), 0);
    }

    #[test]
    fn test_path_handover_carries_smoothed_value() {
        let mut e = spy_engine(false);
        e.trigger(&hist_at(31), 700, false, 1).unwrap();
        for _ in 0..5 {
            e.trigger(&hist_at(31), 700, false, 2).unwrap();
        }
        let ui_value = e.history().pre_fix_ui;
        for _ in 1..VSP_DEBOUNCE_FRAMES {
            e.trigger(&hist_at(31), 700, true, 2).unwrap();
        }
        let ui_value_before_switch = e.history().pre_fix_ui;
        let out = e.trigger(&hist_at(31), 700, true, 2).unwrap();
        assert_eq!(out.path, ContentPath::Video);
        // video starts from the last UI value, never jumps back to full scale
        let expected = i32::from(out.backlight);
        assert!((expected - ui_value_before_switch).abs() <= 8);
        assert!(ui_value <= 1020);
    }

    #[test]
    fn test_low_backlight_freezes_steps() {
        let mut e = spy_engine(false);
        e.trigger(&hist_at(31), 40, false, 1).unwrap();
        // stable content at full target: UI de-correction step is zero
        let a = e.trigger(&hist_at(31), 40, false, 2).unwrap();
        let b = e.trigger(&hist_at(31), 40, false, 2).unwrap();
        assert_eq!(a.backlight, b.backlight);
    }

    #[test]
    fn test_configure_updates_params() {
        let mut e = spy_engine(false);
        e.configure(1, 2, 3, 99, 500);
        let p = e.params();
        assert_eq!((p.step0, p.step1, p.step2), (1, 2, 3));
        assert_eq!(p.scene_change_thr, 99);
        assert_eq!(p.min_backlight, 500);
        let out = e.trigger(&hist_at(0), 100, false, 1).unwrap();
        assert_eq!(out.backlight, 500);
    }

    #[test]
    fn test_history_shifts_and_histograms_commit() {
        let mut e = spy_engine(false);
        e.trigger(&hist_at(5), 700, false, 1).unwrap();
        let target5 = e.params().brightness_steps.0[5];
        assert_eq!(e.history().pre, target5);
        assert_eq!(e.histograms().previous, e.histograms().current);
        e.trigger(&hist_at(9), 700, false, 2).unwrap();
        assert_eq!(e.history().pre2, target5);
        assert_eq!(e.history().pre, e.params().brightness_steps.0[9]);
    }

    #[test]
    fn test_unity_gain_engine() {
        let mut e = CabcEngine::new(NeverSceneChange, UnityGain, DRIVER_DEFAULTS);
        e.init(1080, 2400).unwrap();
        let out = e.trigger(&hist_at(31), 1020, false, 1).unwrap();
        assert_eq!(out.gain, GAIN_UNITY);
        assert_eq!(out.backlight, 1020);
    }
}
