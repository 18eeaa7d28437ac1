//! Recorded histogram traces.
//!
//! A trace is a JSON document captured from a running panel:
//!
//! ```json
//! {
//!   "width": 720,
//!   "height": 1280,
//!   "tuning": { "step0": 8, "step1": 72, "step2": 28 },
//!   "frames": [
//!     { "histogram": [0, 0, ...], "backlight": 700, "video": false,
//!       "expect": { "backlight": 700, "gain": 1024 } }
//!   ]
//! }
//! ```
//!
//! Without `tuning` the driver defaults apply. A partial `tuning` block takes
//! its missing fields from [`DRIVER_DEFAULTS`] as well.
//! `expect` is optional per frame and only used by `verify`.

use std::fs;
use std::path::{Path, PathBuf};

use cabc::{CabcError, TuningParameters, DRIVER_DEFAULTS};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror_no_std::Error;

/// Errors while loading or replaying a trace.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The trace file could not be read.
    #[error("failed to read trace {}: {source}", .path.display())]
    Io {
        /// Trace file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The trace is not valid JSON or does not match the trace format.
    #[error("malformed trace: {0}")]
    Parse(#[from] serde_json::Error),
    /// The trace has no frames.
    #[error("trace contains no frames")]
    Empty,
    /// The trace's tuning block is out of range.
    #[error("invalid tuning: {0}")]
    Tuning(#[source] CabcError),
    /// The trace's panel size was rejected.
    #[error("invalid panel size: {0}")]
    Panel(#[source] CabcError),
    /// The engine rejected a frame.
    #[error("frame {frame}: {source}")]
    Engine {
        /// Zero-based frame index.
        frame: usize,
        /// Engine error.
        source: CabcError,
    },
}

/// Values a frame is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
    /// Expected backlight decision.
    pub backlight: u16,
    /// Expected gain; unchecked when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain: Option<u16>,
}

/// One recorded frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFrame {
    /// Raw 32-bin histogram as read from the display engine.
    pub histogram: Vec<u32>,
    /// Nominal backlight at the time of the frame.
    pub backlight: u16,
    /// Whether the video pipeline was active.
    #[serde(default)]
    pub video: bool,
    /// Expected output, if recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<Expectation>,
}

/// A complete recorded trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    /// Panel width in pixels.
    pub width: u32,
    /// Panel height in pixels.
    pub height: u32,
    /// Tuning override, layered over the driver defaults.
    #[serde(
        default,
        deserialize_with = "driver_tuning",
        skip_serializing_if = "Option::is_none"
    )]
    pub tuning: Option<TuningParameters>,
    /// Frames in capture order.
    pub frames: Vec<TraceFrame>,
}

impl Trace {
    /// Read and parse a trace file.
    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let text = fs::read_to_string(path).map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse a trace from JSON text and check it is replayable.
    pub fn from_json(text: &str) -> Result<Self, TraceError> {
        let trace: Self = serde_json::from_str(text)?;
        if trace.frames.is_empty() {
            return Err(TraceError::Empty);
        }
        trace.tuning().validate().map_err(TraceError::Tuning)?;
        Ok(trace)
    }

    /// Tuning to replay with.
    pub fn tuning(&self) -> TuningParameters {
        self.tuning.unwrap_or(DRIVER_DEFAULTS)
    }

    /// Number of frames carrying an expectation.
    pub fn expectation_count(&self) -> usize {
        self.frames.iter().filter(|f| f.expect.is_some()).count()
    }
}

/// Deserialize a possibly partial tuning block over [`DRIVER_DEFAULTS`].
fn driver_tuning<'de, D>(deserializer: D) -> Result<Option<TuningParameters>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(fields) = Option::<Map<String, Value>>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let mut merged = match serde_json::to_value(DRIVER_DEFAULTS).map_err(D::Error::custom)? {
        Value::Object(defaults) => defaults,
        _ => return Err(D::Error::custom("tuning defaults are not an object")),
    };
    merged.extend(fields);
    serde_json::from_value(Value::Object(merged))
        .map(Some)
        .map_err(D::Error::custom)
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn frame_json(backlight: u16) -> String {
        let hist = vec!["0"; 31].join(",");
        format!(r#"{{"histogram":[{hist},1000],"backlight":{backlight}}}"#)
    }

    #[test]
    fn test_minimal_trace_uses_driver_defaults() {
        let text = format!(r#"{{"width":720,"height":1280,"frames":[{}]}}"#, frame_json(700));
        let trace = Trace::from_json(&text).unwrap();
        assert_eq!(trace.tuning(), DRIVER_DEFAULTS);
        assert_eq!(trace.frames.len(), 1);
        assert!(!trace.frames[0].video);
        assert_eq!(trace.expectation_count(), 0);
    }

    #[test]
    fn test_partial_tuning_fills_defaults() {
        let text = format!(
            r#"{{"width":720,"height":1280,"tuning":{{"step0":4,"min_backlight":300}},"frames":[{}]}}"#,
            frame_json(700)
        );
        let trace = Trace::from_json(&text).unwrap();
        let t = trace.tuning();
        assert_eq!(t.step0, 4);
        assert_eq!(t.min_backlight, 300);
        // unspecified fields keep the driver values
        assert_eq!(t.step1, DRIVER_DEFAULTS.step1);
        assert_eq!(t.step2, DRIVER_DEFAULTS.step2);
        assert_eq!(t.percent_th, DRIVER_DEFAULTS.percent_th);
        assert_eq!(t.brightness_steps, DRIVER_DEFAULTS.brightness_steps);
    }

    #[test]
    fn test_single_field_tuning_keeps_driver_steps() {
        let text = format!(
            r#"{{"width":720,"height":1280,"tuning":{{"min_backlight":300}},"frames":[{}]}}"#,
            frame_json(700)
        );
        let t = Trace::from_json(&text).unwrap().tuning();
        assert_eq!(t.min_backlight, 300);
        assert_eq!((t.step0, t.step1, t.step2), (8, 72, 28));
    }

    #[test]
    fn test_null_tuning_uses_driver_defaults() {
        let text = format!(
            r#"{{"width":720,"height":1280,"tuning":null,"frames":[{}]}}"#,
            frame_json(700)
        );
        let trace = Trace::from_json(&text).unwrap();
        assert_eq!(trace.tuning, None);
        assert_eq!(trace.tuning(), DRIVER_DEFAULTS);
    }

    #[test]
    fn test_unknown_tuning_type_rejected() {
        let text = format!(
            r#"{{"width":720,"height":1280,"tuning":{{"step0":"fast"}},"frames":[{}]}}"#,
            frame_json(700)
        );
        assert!(matches!(Trace::from_json(&text), Err(TraceError::Parse(_))));
    }

    #[test]
    fn test_empty_trace_rejected() {
        let err = Trace::from_json(r#"{"width":1,"height":1,"frames":[]}"#).unwrap_err();
        assert!(matches!(err, TraceError::Empty));
    }

    #[test]
    fn test_bad_tuning_rejected() {
        let text = format!(
            r#"{{"width":1,"height":1,"tuning":{{"min_backlight":5000}},"frames":[{}]}}"#,
            frame_json(700)
        );
        let err = Trace::from_json(&text).unwrap_err();
        assert!(matches!(err, TraceError::Tuning(CabcError::InvalidBacklightRange { .. })));
        assert!(err.to_string().contains("5000"));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = Trace::from_json("{ not json").unwrap_err();
        assert!(matches!(err, TraceError::Parse(_)));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = Trace::load(Path::new("/nonexistent/trace.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/trace.json"));
    }
}
