//! Driver-side CABC lifecycle.
//!
//! [`CabcController`] wraps a [`CabcEngine`] with the state the display
//! driver keeps around it: the enable/stop/disabled state machine, the
//! driver frame counter, the tuning applied before every frame, the colour
//! matrix saved from user space and the last backlight decision.
//!
//! ```text
//!            enable()                disable()
//! Disabled ───────────▶ Working ───────────▶ Stopping
//!    ▲                                          │
//!    └──────────── on_frame(): Restore ◀────────┘
//! ```
//!
//! While working, the first frame after `enable` only sets up the hardware
//! ([`FrameAction::Setup`]); the engine is triggered from the second one on.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::backlight;
use crate::collaborators::{GainCompensator, SceneDetector};
use crate::color_matrix::ColorMatrix;
use crate::config::{TuningParameters, DRIVER_DEFAULTS};
use crate::engine::{CabcEngine, ContentPath};
use crate::error::CabcError;
use crate::schedule::RunWindow;

/// Controller state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CabcState {
    /// Engine runs on scheduled frames.
    Working,
    /// Disable requested; the next frame restores the colour matrix.
    Stopping,
    /// Nothing runs.
    #[default]
    Disabled,
}

impl CabcState {
    /// Short lowercase name, for logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::Stopping => "stopping",
            Self::Disabled => "disabled",
        }
    }
}

/// Everything the driver applies after a triggered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CabcUpdate {
    /// Engine backlight decision, `0..=1020`.
    pub backlight_fix: u16,
    /// Pixel gain applied to `matrix`.
    pub gain: u16,
    /// Decision scaled onto the nominal level.
    pub cabc_level: u16,
    /// Nominal level the decision was made against.
    pub refer_level: u16,
    /// Saved colour matrix with `gain` applied.
    pub matrix: ColorMatrix,
    /// Scene flag of the frame.
    pub scene_change: bool,
    /// Smoothing path of the frame.
    pub path: ContentPath,
}

/// Outcome of [`CabcController::on_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameAction {
    /// CABC is disabled; nothing to do.
    Idle,
    /// CABC just stopped: program `matrix` back and restore the plain
    /// backlight.
    Restore {
        /// Colour matrix as last set by user space.
        matrix: ColorMatrix,
    },
    /// First frame after enable: hardware setup only, no decision.
    Setup,
    /// New decision to apply.
    Update(CabcUpdate),
}

/// CABC driver state around one [`CabcEngine`].
pub struct CabcController<S, G> {
    engine: CabcEngine<S, G>,
    state: CabcState,
    frame_no: u32,
    tuning: TuningParameters,
    window: RunWindow,
    saved_matrix: ColorMatrix,
    last_update: Option<CabcUpdate>,
}

impl<S: SceneDetector, G: GainCompensator> CabcController<S, G> {
    /// Disabled controller using the driver's default tuning.
    pub fn new(scene: S, gain: G) -> Self {
        Self::with_tuning(scene, gain, DRIVER_DEFAULTS)
    }

    /// Disabled controller with explicit tuning.
    pub fn with_tuning(scene: S, gain: G, tuning: TuningParameters) -> Self {
        Self {
            engine: CabcEngine::new(scene, gain, tuning),
            state: CabcState::Disabled,
            frame_no: 0,
            tuning,
            window: RunWindow::DRIVER,
            saved_matrix: ColorMatrix::IDENTITY,
            last_update: None,
        }
    }

    /// Start CABC for a `width` x `height` panel.
    ///
    /// Re-initialises the engine and restarts the frame counter, so the next
    /// frame is a setup frame.
    pub fn enable(&mut self, width: u32, height: u32) -> Result<(), CabcError> {
        self.engine.init(width, height)?;
        self.frame_no = 0;
        self.set_state(CabcState::Working);
        Ok(())
    }

    /// Request a stop. Takes effect on the next [`on_frame`](Self::on_frame).
    pub fn disable(&mut self) {
        if self.state == CabcState::Working {
            self.set_state(CabcState::Stopping);
        }
    }

    /// Current state.
    pub fn state(&self) -> CabcState {
        self.state
    }

    /// Replace the tuning applied before every triggered frame.
    pub fn set_tuning(&mut self, tuning: TuningParameters) -> Result<(), CabcError> {
        tuning.validate()?;
        self.tuning = tuning;
        self.engine.set_params(tuning);
        Ok(())
    }

    /// Tuning applied before every triggered frame.
    pub fn tuning(&self) -> &TuningParameters {
        &self.tuning
    }

    /// Replace the vsync run window.
    pub fn set_window(&mut self, window: RunWindow) {
        self.window = window;
    }

    /// `true` when a frame should be processed on `vsync_count`.
    ///
    /// A stopping controller is scheduled too, so the restore frame runs.
    pub fn should_run(&self, vsync_count: u32) -> bool {
        self.state != CabcState::Disabled && self.window.should_run(vsync_count)
    }

    /// Save a colour matrix from user space.
    ///
    /// Returns the matrix to program now: `matrix` scaled by the last gain
    /// while a decision is active, `matrix` unchanged otherwise.
    pub fn set_color_matrix(&mut self, matrix: ColorMatrix) -> ColorMatrix {
        self.saved_matrix = matrix;
        match self.last_update {
            Some(update) if update.gain != 0 => matrix.scaled(update.gain),
            _ => matrix,
        }
    }

    /// Colour matrix as last set by user space.
    pub fn saved_color_matrix(&self) -> &ColorMatrix {
        &self.saved_matrix
    }

    /// Last applied decision, cleared when CABC stops.
    pub fn last_update(&self) -> Option<&CabcUpdate> {
        self.last_update.as_ref()
    }

    /// Driver frame counter: 0 before the setup frame, then 1, then 2.
    pub fn frame_no(&self) -> u32 {
        self.frame_no
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &CabcEngine<S, G> {
        &self.engine
    }

    /// Process one scheduled frame.
    ///
    /// `nominal_backlight` is the nominal level the decision is scaled
    /// against (see [`backlight::nominal_level`]).
    pub fn on_frame(
        &mut self,
        histogram: &[u32],
        nominal_backlight: u16,
        video_active: bool,
    ) -> Result<FrameAction, CabcError> {
        match self.state {
            CabcState::Disabled => Ok(FrameAction::Idle),
            CabcState::Stopping => {
                self.last_update = None;
                self.set_state(CabcState::Disabled);
                Ok(FrameAction::Restore {
                    matrix: self.saved_matrix,
                })
            }
            CabcState::Working if self.frame_no == 0 => {
                self.frame_no = 1;
                Ok(FrameAction::Setup)
            }
            CabcState::Working => {
                let t = self.tuning;
                self.engine.configure(
                    t.step0,
                    t.step1,
                    t.step2,
                    t.scene_change_thr,
                    t.min_backlight,
                );
                let out = self.engine.trigger(
                    histogram,
                    nominal_backlight,
                    video_active,
                    self.frame_no,
                )?;
                if self.frame_no == 1 {
                    self.frame_no = 2;
                }

                let update = CabcUpdate {
                    backlight_fix: out.backlight,
                    gain: out.gain,
                    cabc_level: backlight::cabc_level(out.backlight, nominal_backlight),
                    refer_level: nominal_backlight,
                    matrix: self.saved_matrix.with_gain(out.gain),
                    scene_change: out.scene_change,
                    path: out.path,
                };
                self.last_update = Some(update);
                Ok(FrameAction::Update(update))
            }
        }
    }

    /// PWM level for the current nominal `level`.
    ///
    /// Scaled by the last decision while working, `level` unchanged
    /// otherwise. A zero `level` always switches the backlight off.
    pub fn pwm_level(&self, level: u16) -> u32 {
        if level == 0 {
            return 0;
        }
        match (self.state, self.last_update) {
            (CabcState::Working, Some(update)) => {
                backlight::pwm_level(update.cabc_level, level, update.refer_level)
            }
            _ => u32::from(level),
        }
    }

    fn set_state(&mut self, state: CabcState) {
        #[cfg(feature = "tracing")]
        tracing::debug!(from = self.state.as_str(), to = state.as_str(), "cabc state change");
        #[cfg(feature = "defmt")]
        defmt::debug!("cabc state {} -> {}", self.state, state);
        self.state = state;
    }
}

/// A [`CabcController`] shared between execution contexts.
///
/// The vsync work and the backlight update path both touch the controller.
/// Every access runs inside the blocking mutex `M`, so the two never
/// interleave.
pub struct SharedController<M: RawMutex, S, G> {
    inner: Mutex<M, RefCell<CabcController<S, G>>>,
}

impl<M: RawMutex, S: SceneDetector, G: GainCompensator> SharedController<M, S, G> {
    /// Wrap `controller`.
    pub const fn new(controller: CabcController<S, G>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(controller)),
        }
    }

    /// Run `f` with exclusive access to the controller.
    ///
    /// `f` must not call back into the same `SharedController`.
    pub fn with<R>(&self, f: impl FnOnce(&mut CabcController<S, G>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Locked [`CabcController::on_frame`].
    pub fn on_frame(
        &self,
        histogram: &[u32],
        nominal_backlight: u16,
        video_active: bool,
    ) -> Result<FrameAction, CabcError> {
        self.with(|c| c.on_frame(histogram, nominal_backlight, video_active))
    }

    /// Locked [`CabcController::pwm_level`].
    pub fn pwm_level(&self, level: u16) -> u32 {
        self.with(|c| c.pwm_level(level))
    }

    /// Release the controller.
    pub fn into_inner(self) -> CabcController<S, G> {
        self.inner.into_inner().into_inner()
    }
}
