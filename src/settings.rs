//! Calibrated capture parameter types.

/// Target capture resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Create a new resolution.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Exposure and white-balance parameters produced by a calibration pass.
///
/// A value of this type is only ever produced by
/// [`CameraBackend::calibrate`](crate::traits::CameraBackend::calibrate) and
/// consumed read-only by capture. The controller replaces its cached value
/// wholesale under the indicator lock; it is never mutated in place, so a
/// capture in flight always sees an internally consistent snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    /// Analog sensor gain. `None` when the backend cannot read it back
    /// (the library-mode backend has no access to the converged gain).
    pub analog_gain: Option<f64>,
    /// Digital sensor gain. `None` under the same limitation as
    /// `analog_gain`.
    pub digital_gain: Option<f64>,
    /// Shutter speed in microseconds.
    pub shutter_speed_us: f64,
    /// Auto-white-balance gains as a (red, blue) pair.
    pub awb_gains: (f64, f64),
}
