//! Core traits and error types for the capture orchestration.

use std::path::Path;

use crate::settings::{CaptureSettings, Resolution};

/// Error type for camera and trigger operations.
#[derive(Debug)]
pub enum CameraError {
    /// The diagnostic stream of a calibration run lacked an expected pattern.
    CalibrationParse(String),
    /// The camera resource was busy or absent at acquisition.
    BackendUnavailable(String),
    /// A capture attempt failed after the backend was acquired.
    Capture(String),
    /// I/O error.
    Io(std::io::Error),
}

impl std::fmt::Display for CameraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CalibrationParse(msg) => write!(f, "Calibration output unparseable: {msg}"),
            Self::BackendUnavailable(msg) => write!(f, "Camera backend unavailable: {msg}"),
            Self::Capture(msg) => write!(f, "Capture failed: {msg}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for CameraError {}

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// Result type for camera operations.
pub type Result<T> = std::result::Result<T, CameraError>;

/// Abstraction over a still-capture backend.
///
/// Exactly two implementations exist: [`V4L2Backend`](crate::device::V4L2Backend)
/// drives the camera through a driver library, [`RaspistillBackend`](crate::raspistill::RaspistillBackend)
/// shells out to the external capture tool. Selection is a configuration-time
/// choice made when the controller is constructed.
pub trait CameraBackend {
    /// Run a throwaway measurement pass and return the converged exposure
    /// and white-balance parameters for the given resolution.
    fn calibrate(&self, resolution: Resolution) -> Result<CaptureSettings>;

    /// Capture one image to `path` at `resolution` with auto-exposure and
    /// auto-white-balance disabled, applying `settings` verbatim.
    fn capture(&self, path: &Path, resolution: Resolution, settings: &CaptureSettings)
        -> Result<()>;
}

/// A controllable light source driven by the indicator lock.
///
/// Pixel math and idle animation live outside the core; the lock only needs
/// brightness, a solid fill and a latch-to-hardware call.
pub trait LightStrip {
    /// Set global brightness in the range `0.0..=1.0`.
    fn set_brightness(&mut self, level: f32);

    /// Fill every pixel with one RGB color.
    fn fill(&mut self, color: (u8, u8, u8));

    /// Latch the pending brightness/fill state to the hardware.
    fn show(&mut self);
}

/// Source of capture-request events (the big physical button).
///
/// Debouncing is the trigger's responsibility, not the controller's.
pub trait TriggerSource {
    /// Block until the input is asserted once.
    fn wait_for_press(&mut self) -> Result<()>;
}
