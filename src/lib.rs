//! Booth-Cam: capture orchestration for a photo-booth appliance
//!
//! A physical button triggers a still capture while a ring of LEDs signals
//! device state. This crate provides the camera abstraction with
//! auto-calibrated exposure settings, the periodic recalibration timer, and
//! the indicator lock that serializes all camera access, with two
//! interchangeable backends: one driving the camera through a library, one
//! shelling out to `raspistill` and scraping its diagnostic output.

pub mod button;
pub mod controller;
pub mod device;
pub mod indicator;
pub mod raspistill;
pub mod settings;
pub mod traits;

#[cfg(test)]
pub mod mock;

pub use button::GpioButton;
pub use controller::{CaptureController, RECALIBRATION_INTERVAL};
pub use device::V4L2Backend;
pub use indicator::{IndicatorLock, Purpose};
pub use raspistill::RaspistillBackend;
pub use settings::{CaptureSettings, Resolution};
pub use traits::{CameraBackend, CameraError, LightStrip, TriggerSource};
