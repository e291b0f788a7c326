//! Mock implementations for testing without booth hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::settings::{CaptureSettings, Resolution};
use crate::traits::{CameraBackend, CameraError, LightStrip, Result};

/// One observable backend call, recorded in order.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// A calibration entered its critical section.
    CalibrateStart,
    /// A calibration completed successfully.
    CalibrateEnd,
    /// A capture ran with the given settings snapshot.
    Capture(CaptureSettings),
}

struct BackendState {
    calibrate_delay: Mutex<Duration>,
    fail_next: AtomicBool,
    next_settings: Mutex<CaptureSettings>,
    events: Mutex<Vec<BackendEvent>>,
}

/// Recording camera backend. Clones share state, so tests keep a handle
/// while the controller owns another.
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<BackendState>,
}

impl MockBackend {
    /// Create a backend whose calibrations yield `settings`.
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            state: Arc::new(BackendState {
                calibrate_delay: Mutex::new(Duration::ZERO),
                fail_next: AtomicBool::new(false),
                next_settings: Mutex::new(settings),
                events: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Make every calibration sleep inside its critical section, simulating
    /// a slow settle.
    #[must_use]
    pub fn with_calibrate_delay(self, delay: Duration) -> Self {
        *self
            .state
            .calibrate_delay
            .lock()
            .expect("lock poisoned") = delay;
        self
    }

    /// Change the settings the next calibrations will produce.
    pub fn set_next_settings(&self, settings: CaptureSettings) {
        *self
            .state
            .next_settings
            .lock()
            .expect("lock poisoned") = settings;
    }

    /// Make the next calibration fail with a parse error.
    pub fn fail_next_calibration(&self) {
        self.state.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of completed calibrations.
    pub fn calibrations(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| **event == BackendEvent::CalibrateEnd)
            .count()
    }

    /// Number of calibrations that entered their critical section.
    pub fn calibration_starts(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| **event == BackendEvent::CalibrateStart)
            .count()
    }

    /// All recorded events in order.
    pub fn events(&self) -> Vec<BackendEvent> {
        self.state.events.lock().expect("lock poisoned").clone()
    }

    fn push(&self, event: BackendEvent) {
        self.state.events.lock().expect("lock poisoned").push(event);
    }
}

impl CameraBackend for MockBackend {
    fn calibrate(&self, _resolution: Resolution) -> Result<CaptureSettings> {
        self.push(BackendEvent::CalibrateStart);

        let delay = *self.state.calibrate_delay.lock().expect("lock poisoned");
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        if self.state.fail_next.swap(false, Ordering::SeqCst) {
            return Err(CameraError::CalibrationParse(
                "injected calibration failure".to_owned(),
            ));
        }

        let settings = self
            .state
            .next_settings
            .lock()
            .expect("lock poisoned")
            .clone();
        self.push(BackendEvent::CalibrateEnd);
        Ok(settings)
    }

    fn capture(
        &self,
        _path: &std::path::Path,
        _resolution: Resolution,
        settings: &CaptureSettings,
    ) -> Result<()> {
        self.push(BackendEvent::Capture(settings.clone()));
        Ok(())
    }
}

/// One light strip mutation, recorded in order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StripEvent {
    /// Global brightness change.
    Brightness(f32),
    /// Solid fill with an RGB color.
    Fill((u8, u8, u8)),
    /// Pending state latched to hardware.
    Show,
}

/// Shared view into a [`MockStrip`]'s recorded events.
#[derive(Clone)]
pub struct StripLog(Arc<Mutex<Vec<StripEvent>>>);

impl StripLog {
    /// All recorded events in order.
    pub fn events(&self) -> Vec<StripEvent> {
        self.0.lock().expect("lock poisoned").clone()
    }
}

/// Recording light strip for indicator tests.
pub struct MockStrip {
    log: StripLog,
}

impl Default for MockStrip {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStrip {
    /// Create a strip with an empty event log.
    pub fn new() -> Self {
        Self {
            log: StripLog(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    /// Handle onto the event log, usable after the strip moves into a lock.
    pub fn log(&self) -> StripLog {
        self.log.clone()
    }

    fn push(&self, event: StripEvent) {
        self.log.0.lock().expect("lock poisoned").push(event);
    }
}

impl LightStrip for MockStrip {
    fn set_brightness(&mut self, level: f32) {
        self.push(StripEvent::Brightness(level));
    }

    fn fill(&mut self, color: (u8, u8, u8)) {
        self.push(StripEvent::Fill(color));
    }

    fn show(&mut self) {
        self.push(StripEvent::Show);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn settings() -> CaptureSettings {
        CaptureSettings {
            analog_gain: None,
            digital_gain: None,
            shutter_speed_us: 1500.0,
            awb_gains: (1.5, 1.25),
        }
    }

    #[test]
    fn test_mock_backend_records_in_order() {
        let backend = MockBackend::new(settings());
        let calibrated = backend
            .calibrate(crate::settings::Resolution::new(640, 480))
            .expect("calibrate should succeed");
        backend
            .capture(Path::new("/tmp/x.jpg"), crate::settings::Resolution::new(640, 480), &calibrated)
            .expect("capture should succeed");

        assert_eq!(
            backend.events(),
            vec![
                BackendEvent::CalibrateStart,
                BackendEvent::CalibrateEnd,
                BackendEvent::Capture(settings()),
            ]
        );
    }

    #[test]
    fn test_mock_backend_injected_failure_is_one_shot() {
        let backend = MockBackend::new(settings());
        backend.fail_next_calibration();

        let resolution = crate::settings::Resolution::new(640, 480);
        assert!(backend.calibrate(resolution).is_err());
        assert!(backend.calibrate(resolution).is_ok());
        assert_eq!(backend.calibration_starts(), 2);
        assert_eq!(backend.calibrations(), 1);
    }
}
