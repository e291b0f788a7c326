//! Library-mode backend driving the camera through the v4l crate.
//!
//! Each call opens a device session scoped to that call: calibration streams
//! for a fixed settle period so the hardware auto-exposure and auto-white-
//! balance converge, then reads the live values back; capture locks those
//! values in through manual controls and writes one MJPG frame to disk.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::debug;
use v4l::buffer::Type;
use v4l::control::{Control, Value};
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::Device;

use crate::settings::{CaptureSettings, Resolution};
use crate::traits::{CameraBackend, CameraError, Result};

// Control IDs from videodev2.h.
const CID_AUTO_WHITE_BALANCE: u32 = 0x0098_090c;
const CID_RED_BALANCE: u32 = 0x0098_090e;
const CID_BLUE_BALANCE: u32 = 0x0098_090f;
const CID_EXPOSURE_AUTO: u32 = 0x009a_0901;
const CID_EXPOSURE_ABSOLUTE: u32 = 0x009a_0902;

const EXPOSURE_AUTO: i64 = 0;
const EXPOSURE_MANUAL: i64 = 1;

// V4L2_CID_EXPOSURE_ABSOLUTE is expressed in 100 us units.
const EXPOSURE_UNIT_US: f64 = 100.0;

/// How long auto-exposure gets to converge during calibration.
const SETTLE_TIME: Duration = Duration::from_secs(2);

const STREAM_BUFFERS: u32 = 4;

/// Library-mode backend wrapping a V4L2 device.
#[derive(Debug, Clone, Copy)]
pub struct V4L2Backend {
    index: usize,
}

impl V4L2Backend {
    /// Use the device at the given index (e.g. 0 for /dev/video0).
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self { index }
    }

    fn open(&self, resolution: Resolution) -> Result<Device> {
        let device = Device::new(self.index)
            .map_err(|err| CameraError::BackendUnavailable(err.to_string()))?;

        let mut format = device
            .format()
            .map_err(|err| CameraError::Capture(err.to_string()))?;
        format.width = resolution.width;
        format.height = resolution.height;
        format.fourcc = v4l::FourCC::new(b"MJPG");
        device
            .set_format(&format)
            .map_err(|err| CameraError::Capture(err.to_string()))?;

        Ok(device)
    }
}

impl CameraBackend for V4L2Backend {
    fn calibrate(&self, resolution: Resolution) -> Result<CaptureSettings> {
        let device = self.open(resolution)?;

        set_control(&device, CID_EXPOSURE_AUTO, Value::Integer(EXPOSURE_AUTO))?;
        set_control(&device, CID_AUTO_WHITE_BALANCE, Value::Boolean(true))?;

        // The driver only runs AE/AWB while frames flow, so stream until the
        // settle period elapses before reading anything back.
        let mut stream = Stream::with_buffers(&device, Type::VideoCapture, STREAM_BUFFERS)
            .map_err(|err| CameraError::Capture(err.to_string()))?;
        let start = Instant::now();
        while start.elapsed() < SETTLE_TIME {
            stream
                .next()
                .map_err(|err| CameraError::Capture(err.to_string()))?;
        }

        let exposure = integer_control(&device, CID_EXPOSURE_ABSOLUTE)?;
        let red = integer_control(&device, CID_RED_BALANCE)?;
        let blue = integer_control(&device, CID_BLUE_BALANCE)?;
        debug!(exposure, red, blue, "auto-exposure settled");

        #[allow(clippy::cast_precision_loss)]
        let shutter_speed_us = exposure as f64 * EXPOSURE_UNIT_US;
        #[allow(clippy::cast_precision_loss)]
        let awb_gains = (red as f64, blue as f64);

        // Converged analog/digital gain is not readable through this
        // interface; the fields stay unset and capture omits them.
        Ok(CaptureSettings {
            analog_gain: None,
            digital_gain: None,
            shutter_speed_us,
            awb_gains,
        })
    }

    fn capture(
        &self,
        path: &Path,
        resolution: Resolution,
        settings: &CaptureSettings,
    ) -> Result<()> {
        let device = self.open(resolution)?;

        #[allow(clippy::cast_possible_truncation)]
        let exposure = (settings.shutter_speed_us / EXPOSURE_UNIT_US).round() as i64;
        set_control(&device, CID_EXPOSURE_AUTO, Value::Integer(EXPOSURE_MANUAL))?;
        set_control(&device, CID_EXPOSURE_ABSOLUTE, Value::Integer(exposure.max(1)))?;
        set_control(&device, CID_AUTO_WHITE_BALANCE, Value::Boolean(false))?;
        #[allow(clippy::cast_possible_truncation)]
        let (red, blue) = (
            settings.awb_gains.0.round() as i64,
            settings.awb_gains.1.round() as i64,
        );
        set_control(&device, CID_RED_BALANCE, Value::Integer(red))?;
        set_control(&device, CID_BLUE_BALANCE, Value::Integer(blue))?;

        let mut stream = Stream::with_buffers(&device, Type::VideoCapture, STREAM_BUFFERS)
            .map_err(|err| CameraError::Capture(err.to_string()))?;

        // The first frame predates the locked-in controls; discard it.
        stream
            .next()
            .map_err(|err| CameraError::Capture(err.to_string()))?;
        let (buf, meta) = stream
            .next()
            .map_err(|err| CameraError::Capture(err.to_string()))?;

        let used = meta.bytesused as usize;
        let data = buf.get(..used).unwrap_or(buf);
        std::fs::write(path, data)?;
        debug!(?path, bytes = data.len(), "frame written");
        Ok(())
    }
}

fn set_control(device: &Device, id: u32, value: Value) -> Result<()> {
    device
        .set_control(Control { id, value })
        .map_err(|err| CameraError::Capture(format!("control {id:#x}: {err}")))
}

fn integer_control(device: &Device, id: u32) -> Result<i64> {
    let control = device
        .control(id)
        .map_err(|err| CameraError::Capture(format!("control {id:#x}: {err}")))?;
    match control.value {
        Value::Integer(value) => Ok(value),
        Value::Boolean(value) => Ok(i64::from(value)),
        other => Err(CameraError::Capture(format!(
            "control {id:#x} has non-integer value {other:?}"
        ))),
    }
}
