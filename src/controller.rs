//! Capture controller: cached settings, recalibration timer and the
//! serialization of both against the indicator lock.

use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{error, info};

use crate::indicator::{IndicatorLock, Purpose};
use crate::settings::{CaptureSettings, Resolution};
use crate::traits::{CameraBackend, LightStrip, Result};

/// Interval between automatic recalibrations.
pub const RECALIBRATION_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Serializes photo captures and settings updates over one camera.
///
/// Construction runs a first blocking calibration, then a background timer
/// thread recalibrates every [`RECALIBRATION_INTERVAL`] for the rest of the
/// controller's life. Captures and recalibrations are mutually exclusive via
/// the indicator lock: whichever fires second blocks until the in-flight
/// operation releases. Dropping the controller cancels the pending timer but
/// never aborts an operation already in flight.
pub struct CaptureController<B, S>
where
    B: CameraBackend + Send + Sync + 'static,
    S: LightStrip + Send + 'static,
{
    inner: Arc<Inner<B, S>>,
    cancel: Sender<()>,
    timer: Option<JoinHandle<()>>,
}

struct Inner<B, S: LightStrip> {
    backend: B,
    resolution: Resolution,
    indicator: Arc<IndicatorLock<S>>,
    settings: Mutex<CaptureSettings>,
}

impl<B, S> Inner<B, S>
where
    B: CameraBackend,
    S: LightStrip,
{
    /// Recalibrate and atomically replace the cached settings.
    ///
    /// On failure the cache is untouched and the previous settings stay in
    /// use; the indicator is released by the guard either way.
    fn update_settings(&self) -> Result<()> {
        let flash = self.indicator.acquire(Purpose::Calibrating);
        let fresh = self.backend.calibrate(self.resolution)?;
        info!(
            analog_gain = ?fresh.analog_gain,
            digital_gain = ?fresh.digital_gain,
            shutter_speed_us = fresh.shutter_speed_us,
            awb_gains = ?fresh.awb_gains,
            "settings updated"
        );
        *self
            .settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = fresh;
        drop(flash);
        Ok(())
    }

    fn take_photo(&self, path: &Path) -> Result<()> {
        let _flash = self.indicator.acquire(Purpose::Capturing);
        // Snapshot under the indicator lock: the cache only ever holds a
        // fully completed calibration, and no writer can run while we hold
        // the indicator.
        let snapshot = self
            .settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.backend.capture(path, self.resolution, &snapshot)
    }
}

impl<B, S> CaptureController<B, S>
where
    B: CameraBackend + Send + Sync + 'static,
    S: LightStrip + Send + 'static,
{
    /// Build a controller with the production recalibration interval.
    ///
    /// Blocks for the initial calibration; fails if it fails.
    pub fn new(
        backend: B,
        resolution: Resolution,
        indicator: Arc<IndicatorLock<S>>,
    ) -> Result<Self> {
        Self::with_interval(backend, resolution, indicator, RECALIBRATION_INTERVAL)
    }

    /// Build a controller recalibrating at a custom interval.
    pub fn with_interval(
        backend: B,
        resolution: Resolution,
        indicator: Arc<IndicatorLock<S>>,
        interval: Duration,
    ) -> Result<Self> {
        let initial = {
            let _flash = indicator.acquire(Purpose::Calibrating);
            backend.calibrate(resolution)?
        };

        let inner = Arc::new(Inner {
            backend,
            resolution,
            indicator,
            settings: Mutex::new(initial),
        });

        let (cancel, wakeup) = mpsc::channel::<()>();
        let timer_inner = Arc::clone(&inner);
        let timer = std::thread::Builder::new()
            .name("settings-update".to_owned())
            .spawn(move || loop {
                match wakeup.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Err(err) = timer_inner.update_settings() {
                            error!(%err, "scheduled recalibration failed, keeping previous settings");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(Self {
            inner,
            cancel,
            timer: Some(timer),
        })
    }

    /// Capture a photo to `path` using the currently cached settings.
    ///
    /// Blocks while a recalibration is in flight, and runs the countdown cue
    /// on the indicator before the exposure.
    pub fn take_photo(&self, path: &Path) -> Result<()> {
        self.inner.take_photo(path)
    }

    /// Force a recalibration outside the regular schedule.
    pub fn update_settings(&self) -> Result<()> {
        self.inner.update_settings()
    }

    /// Snapshot of the currently cached settings.
    pub fn settings(&self) -> CaptureSettings {
        self.inner
            .settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Cancel the recalibration timer and wait for the timer thread to
    /// finish. An in-flight recalibration completes first.
    pub fn shutdown(mut self) {
        let _ = self.cancel.send(());
        if let Some(timer) = self.timer.take() {
            let _ = timer.join();
        }
    }
}

impl<B, S> Drop for CaptureController<B, S>
where
    B: CameraBackend + Send + Sync + 'static,
    S: LightStrip + Send + 'static,
{
    fn drop(&mut self) {
        // Cancel the pending recalibration without blocking; the timer
        // thread exits at its next wakeup.
        let _ = self.cancel.send(());
    }
}
