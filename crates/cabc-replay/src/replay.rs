//! Replaying a trace through [`CabcEngine`] and checking the results.

use cabc::{
    CabcEngine, GainCompensator, HistogramDiffDetector, InverseGain, NeverSceneChange,
    SceneDetector, SceneFrames, TriggerOutput, UnityGain,
};
use clap::ValueEnum;
use serde::Serialize;

use crate::trace::{Trace, TraceError};

/// Scene detector used for a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DetectorKind {
    /// Never report a scene change.
    Never,
    /// Histogram-difference detector.
    #[default]
    Diff,
}

/// Gain compensator used for a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum GainKind {
    /// Always unity gain.
    Unity,
    /// Gain inversely proportional to the backlight, capped at 2x.
    #[default]
    Inverse,
}

impl SceneDetector for DetectorKind {
    fn detect(&mut self, frames: SceneFrames<'_>, pixel_total: i32, threshold: i32) -> bool {
        match self {
            Self::Never => NeverSceneChange.detect(frames, pixel_total, threshold),
            Self::Diff => HistogramDiffDetector.detect(frames, pixel_total, threshold),
        }
    }
}

impl GainCompensator for GainKind {
    fn gain(&mut self, backlight_level: u16) -> u16 {
        match self {
            Self::Unity => UnityGain.gain(backlight_level),
            Self::Inverse => InverseGain::default().gain(backlight_level),
        }
    }
}

/// Engine output for one replayed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameReport {
    /// Zero-based frame index in the trace.
    pub index: usize,
    /// Frame number handed to the engine (1 for the first frame, then 2).
    pub frame_no: u32,
    /// Engine output.
    #[serde(flatten)]
    pub output: TriggerOutput,
}

/// First frame whose output differs from its expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    /// Zero-based frame index.
    pub index: usize,
    /// Expected backlight.
    pub expected_backlight: u16,
    /// Produced backlight.
    pub actual_backlight: u16,
    /// Expected gain, if recorded.
    pub expected_gain: Option<u16>,
    /// Produced gain.
    pub actual_gain: u16,
}

impl core::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "frame {}: expected backlight {}, got {}",
            self.index, self.expected_backlight, self.actual_backlight
        )?;
        if let Some(gain) = self.expected_gain {
            write!(f, "; expected gain {gain}, got {}", self.actual_gain)?;
        }
        Ok(())
    }
}

/// Run every frame of `trace` through a fresh engine.
pub fn replay(
    trace: &Trace,
    detector: DetectorKind,
    gain: GainKind,
) -> Result<Vec<FrameReport>, TraceError> {
    let mut engine = CabcEngine::new(detector, gain, trace.tuning());
    engine
        .init(trace.width, trace.height)
        .map_err(TraceError::Panel)?;

    tracing::info!(
        width = trace.width,
        height = trace.height,
        frames = trace.frames.len(),
        "replaying trace"
    );

    let mut reports = Vec::with_capacity(trace.frames.len());
    for (index, frame) in trace.frames.iter().enumerate() {
        let frame_no = if index == 0 { 1 } else { 2 };
        let output = engine
            .trigger(&frame.histogram, frame.backlight, frame.video, frame_no)
            .map_err(|source| TraceError::Engine {
                frame: index,
                source,
            })?;
        tracing::debug!(
            index,
            target = output.target,
            backlight = output.backlight,
            gain = output.gain,
            path = output.path.as_str(),
            "frame replayed"
        );
        reports.push(FrameReport {
            index,
            frame_no,
            output,
        });
    }
    Ok(reports)
}

/// Compare `reports` against the expectations recorded in `trace`.
///
/// Returns the first mismatch, or `None` when every recorded expectation
/// holds. Frames without an expectation are skipped.
pub fn verify(trace: &Trace, reports: &[FrameReport]) -> Option<Mismatch> {
    trace
        .frames
        .iter()
        .zip(reports)
        .find_map(|(frame, report)| {
            let expect = frame.expect?;
            let out = report.output;
            let gain_ok = expect.gain.map_or(true, |g| g == out.gain);
            if expect.backlight == out.backlight && gain_ok {
                None
            } else {
                Some(Mismatch {
                    index: report.index,
                    expected_backlight: expect.backlight,
                    actual_backlight: out.backlight,
                    expected_gain: expect.gain,
                    actual_gain: out.gain,
                })
            }
        })
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::trace::{Expectation, TraceFrame};
    use cabc::{ContentPath, DRIVER_DEFAULTS, GAIN_UNITY, HIST_BINS};

    fn frame(raw_bin: usize, backlight: u16, video: bool) -> TraceFrame {
        let mut histogram = vec![0u32; HIST_BINS];
        histogram[raw_bin] = 921_600;
        TraceFrame {
            histogram,
            backlight,
            video,
            expect: None,
        }
    }

    fn trace(frames: Vec<TraceFrame>) -> Trace {
        Trace {
            width: 720,
            height: 1280,
            tuning: None,
            frames,
        }
    }

    #[test]
    fn test_replay_numbers_frames() {
        let t = trace(vec![frame(31, 700, false), frame(31, 700, false), frame(0, 700, false)]);
        let reports = replay(&t, DetectorKind::Never, GainKind::Unity).unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].frame_no, 1);
        assert_eq!(reports[1].frame_no, 2);
        assert_eq!(reports[2].frame_no, 2);
        assert_eq!(reports[0].output.backlight, 700);
        assert_eq!(reports[0].output.gain, GAIN_UNITY);
        assert_eq!(reports[2].output.path, ContentPath::Ui);
    }

    #[test]
    fn test_replay_detector_choice() {
        let t = trace(vec![frame(31, 700, false), frame(31, 700, false), frame(0, 700, false)]);
        let never = replay(&t, DetectorKind::Never, GainKind::Unity).unwrap();
        let diff = replay(&t, DetectorKind::Diff, GainKind::Unity).unwrap();
        assert!(!never[2].output.scene_change);
        assert!(diff[2].output.scene_change);
    }

    #[test]
    fn test_replay_gain_choice() {
        let t = trace(vec![frame(31, 408, false)]);
        let inverse = replay(&t, DetectorKind::Never, GainKind::Inverse).unwrap();
        assert_eq!(inverse[0].output.gain, 0x800);
    }

    #[test]
    fn test_replay_reports_bad_frame_index() {
        let mut bad = frame(0, 700, false);
        bad.histogram.truncate(16);
        let t = trace(vec![frame(0, 700, false), bad]);
        let err = replay(&t, DetectorKind::Never, GainKind::Unity).unwrap_err();
        assert!(matches!(err, TraceError::Engine { frame: 1, .. }));
    }

    #[test]
    fn test_replay_uses_trace_tuning() {
        let mut t = trace(vec![frame(31, 100, false)]);
        let mut tuning = DRIVER_DEFAULTS;
        tuning.min_backlight = 600;
        t.tuning = Some(tuning);
        let reports = replay(&t, DetectorKind::Never, GainKind::Unity).unwrap();
        assert_eq!(reports[0].output.backlight, 600);
    }

    #[test]
    fn test_verify_passes_and_fails() {
        let mut t = trace(vec![frame(31, 700, false), frame(31, 700, false)]);
        t.frames[0].expect = Some(Expectation {
            backlight: 700,
            gain: Some(GAIN_UNITY),
        });
        let reports = replay(&t, DetectorKind::Never, GainKind::Unity).unwrap();
        assert_eq!(verify(&t, &reports), None);

        t.frames[1].expect = Some(Expectation {
            backlight: 1,
            gain: None,
        });
        let m = verify(&t, &reports).unwrap();
        assert_eq!(m.index, 1);
        assert_eq!(m.expected_backlight, 1);
        assert_eq!(m.actual_backlight, reports[1].output.backlight);
        assert_eq!(
            m.to_string(),
            format!("frame 1: expected backlight 1, got {}", reports[1].output.backlight)
        );
    }

    #[test]
    fn test_verify_checks_gain_when_recorded() {
        let mut t = trace(vec![frame(31, 700, false)]);
        t.frames[0].expect = Some(Expectation {
            backlight: 700,
            gain: Some(0x123),
        });
        let reports = replay(&t, DetectorKind::Never, GainKind::Unity).unwrap();
        let m = verify(&t, &reports).unwrap();
        assert_eq!(m.actual_gain, GAIN_UNITY);
        assert!(m.to_string().ends_with("expected gain 291, got 1024"));
    }
}
