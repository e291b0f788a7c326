//! External-tool backend shelling out to `raspistill`.
//!
//! Calibration runs the tool in its settings-probe mode and scrapes the
//! converged exposure and white-balance values from the `mmal:` diagnostic
//! lines on stderr. Only the **last** occurrence of each line counts; the
//! probe logs one line per auto-exposure iteration and earlier ones have not
//! converged yet.
//!
//! The tool hangs when the display is powered down, so every invocation is
//! bracketed by the display power side-channel: hop through a spare virtual
//! terminal to force the screen on beforehand, power it back off afterwards.

use std::path::{Path, PathBuf};
use std::process::Command;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::settings::{CaptureSettings, Resolution};
use crate::traits::{CameraBackend, CameraError, Result};

static EXPOSURE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"mmal: Exposure now (?P<exposure>[0-9]+), analog gain (?P<analog_gain_n>[0-9]+)/(?P<analog_gain_d>[0-9]+), digital gain (?P<digital_gain_n>[0-9]+)/(?P<digital_gain_d>[0-9]+)",
    )
    .expect("exposure pattern compiles")
});

static AWB_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"mmal: AWB R=(?P<awb_r_n>[0-9]+)/(?P<awb_r_d>[0-9]+), B=(?P<awb_b_n>[0-9]+)/(?P<awb_b_d>[0-9]+)")
        .expect("awb pattern compiles")
});

/// Backend invoking the external `raspistill` executable per call.
#[derive(Debug, Clone)]
pub struct RaspistillBackend {
    tool: PathBuf,
    chvt: PathBuf,
    tvservice: PathBuf,
}

impl Default for RaspistillBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RaspistillBackend {
    /// Create the external-tool backend using the commands on PATH.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tool: PathBuf::from("raspistill"),
            chvt: PathBuf::from("chvt"),
            tvservice: PathBuf::from("tvservice"),
        }
    }

    /// Override the capture tool and display power commands. Tests point
    /// these at scripts standing in for the real binaries.
    #[must_use]
    pub fn with_commands(mut self, tool: PathBuf, chvt: PathBuf, tvservice: PathBuf) -> Self {
        self.tool = tool;
        self.chvt = chvt;
        self.tvservice = tvservice;
        self
    }

    /// Force the display on by cycling through a spare virtual terminal;
    /// raspistill hangs while it is powered down.
    fn display_on(&self) {
        display_command(&self.chvt, &["6"]);
        display_command(&self.chvt, &["7"]);
    }

    /// Power the display back off once the tool has run.
    fn display_off(&self) {
        display_command(&self.tvservice, &["-o"]);
    }
}

impl CameraBackend for RaspistillBackend {
    fn calibrate(&self, resolution: Resolution) -> Result<CaptureSettings> {
        self.display_on();

        let probe = Command::new(&self.tool)
            .args(["--width", &resolution.width.to_string()])
            .args(["--height", &resolution.height.to_string()])
            .arg("--nopreview")
            .arg("--settings")
            .output();

        // Power off again whether or not the probe ran.
        self.display_off();

        let output = probe.map_err(|err| CameraError::BackendUnavailable(err.to_string()))?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(bytes = stderr.len(), "raspistill probe finished");

        parse_probe_output(&stderr)
    }

    fn capture(
        &self,
        path: &Path,
        resolution: Resolution,
        settings: &CaptureSettings,
    ) -> Result<()> {
        let mut cmd = Command::new(&self.tool);
        cmd.arg("--output")
            .arg(path)
            .args(["--thumb", "none"])
            .args(["--width", &resolution.width.to_string()])
            .args(["--height", &resolution.height.to_string()])
            .args(["--exposure", "off"])
            .args(["--shutter", &format!("{:.0}", settings.shutter_speed_us)])
            .args(["--awb", "off"])
            .args([
                "--awbgains",
                &format!("{},{}", settings.awb_gains.0, settings.awb_gains.1),
            ])
            .args(["--timeout", "1"])
            .arg("--nopreview");

        if let Some(gain) = settings.analog_gain {
            cmd.args(["--analoggain", &gain.to_string()]);
        }
        if let Some(gain) = settings.digital_gain {
            cmd.args(["--digitalgain", &gain.to_string()]);
        }

        // The capture invocation hangs with the display off just like the
        // probe does, so it gets the same bracket.
        self.display_on();
        let result = cmd.output();
        self.display_off();

        let output = result.map_err(|err| CameraError::BackendUnavailable(err.to_string()))?;
        if !output.status.success() {
            return Err(CameraError::Capture(format!(
                "raspistill exited with {}",
                output.status
            )));
        }
        Ok(())
    }
}

/// Run a display power side-channel command, tolerating failure.
///
/// These commands are best-effort: a missing or failing `chvt`/`tvservice`
/// only costs us the screen workaround, never the calibration or capture
/// result, so failures are logged and swallowed.
fn display_command(program: &Path, args: &[&str]) {
    match Command::new(program).args(args).status() {
        Ok(status) if !status.success() => {
            warn!(program = %program.display(), ?status, "display command failed");
        }
        Err(err) => {
            warn!(program = %program.display(), %err, "display command did not run");
        }
        Ok(_) => {}
    }
}

/// Extract the converged settings from a probe's diagnostic stream.
fn parse_probe_output(stderr: &str) -> Result<CaptureSettings> {
    let exposure = EXPOSURE_LINE
        .captures_iter(stderr)
        .last()
        .ok_or_else(|| CameraError::CalibrationParse("no exposure line in probe output".to_owned()))?;
    let awb = AWB_LINE
        .captures_iter(stderr)
        .last()
        .ok_or_else(|| CameraError::CalibrationParse("no AWB line in probe output".to_owned()))?;

    Ok(CaptureSettings {
        analog_gain: Some(fraction(&exposure, "analog_gain_n", "analog_gain_d")?),
        digital_gain: Some(fraction(&exposure, "digital_gain_n", "digital_gain_d")?),
        shutter_speed_us: field(&exposure, "exposure")?,
        awb_gains: (
            fraction(&awb, "awb_r_n", "awb_r_d")?,
            fraction(&awb, "awb_b_n", "awb_b_d")?,
        ),
    })
}

fn field(caps: &Captures<'_>, name: &str) -> Result<f64> {
    caps.name(name)
        .ok_or_else(|| CameraError::CalibrationParse(format!("missing capture group {name}")))?
        .as_str()
        .parse()
        .map_err(|err| CameraError::CalibrationParse(format!("{name}: {err}")))
}

fn fraction(caps: &Captures<'_>, numerator: &str, denominator: &str) -> Result<f64> {
    let num = field(caps, numerator)?;
    let den = field(caps, denominator)?;
    if den == 0.0 {
        return Err(CameraError::CalibrationParse(format!(
            "{numerator}/{denominator} has zero denominator"
        )));
    }
    Ok(num / den)
}
