//! Content-adaptive backlight control (CABC)
//!
//! Once per display frame the engine takes the 32-bin luminance histogram
//! produced by the display processor and decides a backlight level plus a
//! pixel gain that compensates for it, saving panel power on dark content
//! without visible flicker.
//!
//! # Layers
//!
//! ```text
//! Display driver (vsync work, backlight update)
//!         ↓
//! CabcController  (lifecycle, schedule, colour matrix, PWM scaling)
//!         ↓
//! CabcEngine      (histogram → target → smoothing → clip → gain)
//!         ↓
//! SceneDetector / GainCompensator (collaborators)
//! ```
//!
//! # Features
//!
//! - `std`: `std::error::Error` for [`CabcError`] and the recording test
//!   doubles in [`collaborators::mock`]
//! - `serde`: (de)serialisation of tuning, matrices and frame outputs
//! - `defmt`: defmt logging and `defmt::Format` derives (hardware builds)
//! - `tracing`: tracing events at the same points (host builds)
//!
//! # Example
//!
//! ```
//! use cabc::{CabcEngine, HistogramDiffDetector, InverseGain, TuningParameters};
//!
//! let mut engine = CabcEngine::new(
//!     HistogramDiffDetector,
//!     InverseGain::default(),
//!     TuningParameters::default(),
//! );
//! engine.init(720, 1280)?;
//!
//! let mut histogram = [0u32; cabc::HIST_BINS];
//! histogram[16] = 720 * 1280;
//! let out = engine.trigger(&histogram, 700, false, 1)?;
//! assert!((408..=1020).contains(&out.backlight));
//! # Ok::<(), cabc::CabcError>(())
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)] // plain accessors, callers decide
#![allow(clippy::doc_markdown)] // register names in doc comments

#[cfg(all(feature = "std", not(test)))]
extern crate std;

pub mod backlight;
pub mod collaborators;
pub mod color_matrix;
pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod histogram;
pub mod history;
pub mod lifecycle;
pub mod schedule;
pub mod smoothing;

pub use collaborators::{
    GainCompensator, HistogramDiffDetector, InverseGain, NeverSceneChange, SceneDetector,
    SceneFrames, UnityGain, GAIN_UNITY,
};
pub use color_matrix::ColorMatrix;
pub use config::{
    BrightnessSteps, TuningParameters, DEFAULT_BRIGHTNESS_STEPS, DRIVER_DEFAULTS, MAX_BACKLIGHT,
};
pub use engine::{CabcEngine, ContentPath, TriggerOutput};
pub use error::CabcError;
pub use histogram::{AccumulatedHistogram, HistogramPair, HIST_BINS};
pub use history::{BacklightHistory, ChangeCounters};
pub use lifecycle::{CabcController, CabcState, CabcUpdate, FrameAction, SharedController};
pub use schedule::RunWindow;
