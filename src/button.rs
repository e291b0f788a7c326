//! GPIO button trigger polled over sysfs.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::traits::{Result, TriggerSource};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// The booth's big arcade button, wired active-low against a pull-up.
///
/// The 20 ms poll doubles as debounce: by the time the level reads low the
/// contact has settled, and the caller only asks again after the capture
/// sequence (several seconds) is over.
pub struct GpioButton {
    value_path: PathBuf,
}

impl GpioButton {
    /// Poll the exported GPIO at `/sys/class/gpio/gpio<pin>/value`.
    #[must_use]
    pub fn new(pin: u8) -> Self {
        Self::with_value_path(PathBuf::from(format!("/sys/class/gpio/gpio{pin}/value")))
    }

    /// Poll an explicit value file instead of the default sysfs path.
    #[must_use]
    pub const fn with_value_path(value_path: PathBuf) -> Self {
        Self { value_path }
    }
}

impl TriggerSource for GpioButton {
    fn wait_for_press(&mut self) -> Result<()> {
        loop {
            let raw = std::fs::read_to_string(&self.value_path)?;
            if raw.trim() == "0" {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}
