//! Offline replay of recorded CABC histogram traces.
//!
//! A trace ([`Trace`]) holds the per-frame histograms and nominal backlight
//! captured from a panel. [`replay`] pushes them through a fresh
//! [`cabc::CabcEngine`] and [`verify`] compares the outputs with any
//! expectations recorded alongside the frames.

pub mod replay;
pub mod trace;

pub use replay::{replay, verify, DetectorKind, FrameReport, GainKind, Mismatch};
pub use trace::{Expectation, Trace, TraceError, TraceFrame};
