//! Photo-booth control binary: wires the trigger, indicator and camera
//! controller together and runs the capture loop.
//!
//! The NeoPixel ring itself is driven by a separate renderer process; it
//! plugs into the core by providing a [`LightStrip`] implementation in place
//! of [`LogStrip`], which only makes the indicator's acquire/release
//! transitions observable in the logs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use booth_cam::{
    CameraBackend, CaptureController, GpioButton, IndicatorLock, LightStrip, RaspistillBackend,
    Resolution, TriggerSource, V4L2Backend,
};

/// Which camera backend drives the booth. A configuration-time choice; the
/// two implementations are never swapped at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Shell out to the raspistill executable per operation.
    Raspistill,
    /// Drive the camera through the V4L2 driver interface.
    V4l2,
}

#[derive(Debug, Parser)]
#[command(name = "booth-cam", about = "Photo-booth capture appliance")]
struct Args {
    /// Camera backend to use.
    #[arg(long, value_enum, default_value_t = Backend::Raspistill)]
    backend: Backend,

    /// V4L2 device index (v4l2 backend only).
    #[arg(long, default_value_t = 0)]
    device: usize,

    /// Capture width in pixels.
    #[arg(long, default_value_t = 951)]
    width: u32,

    /// Capture height in pixels.
    #[arg(long, default_value_t = 1268)]
    height: u32,

    /// Directory receiving finished photos (watched by the viewer).
    #[arg(long, default_value = "photos")]
    photos_dir: PathBuf,

    /// GPIO pin wired to the big button.
    #[arg(long, default_value_t = 27)]
    button_pin: u8,
}

/// Light strip stand-in that logs state transitions.
///
/// The LED renderer is a separate collaborator that observes the indicator's
/// acquire/release signals; this binary only needs the transitions to be
/// visible.
struct LogStrip;

impl LightStrip for LogStrip {
    fn set_brightness(&mut self, level: f32) {
        debug!(level, "strip brightness");
    }

    fn fill(&mut self, color: (u8, u8, u8)) {
        debug!(?color, "strip fill");
    }

    fn show(&mut self) {}
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(err) = run(&args) {
        error!(%err, "booth stopped");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> booth_cam::traits::Result<()> {
    std::fs::create_dir_all(&args.photos_dir)?;

    let resolution = Resolution::new(args.width, args.height);
    let indicator = Arc::new(IndicatorLock::new(LogStrip));
    let trigger = GpioButton::new(args.button_pin);

    info!(?resolution, backend = ?args.backend, "starting booth");
    match args.backend {
        Backend::Raspistill => {
            let controller =
                CaptureController::new(RaspistillBackend::new(), resolution, indicator)?;
            control_loop(&controller, trigger, &args.photos_dir)
        }
        Backend::V4l2 => {
            let controller =
                CaptureController::new(V4L2Backend::new(args.device), resolution, indicator)?;
            control_loop(&controller, trigger, &args.photos_dir)
        }
    }
}

fn control_loop<B, S, T>(
    controller: &CaptureController<B, S>,
    mut trigger: T,
    photos_dir: &Path,
) -> booth_cam::traits::Result<()>
where
    B: CameraBackend + Send + Sync + 'static,
    S: LightStrip + Send + 'static,
    T: TriggerSource,
{
    loop {
        info!("waiting for button press");
        trigger.wait_for_press()?;

        let name = format!(
            "photo-{}.jpg",
            chrono::Local::now().format("%Y%m%d-%H%M%S%.3f")
        );
        let path = photos_dir.join(name);
        info!(path = %path.display(), "taking a photo");

        // A failed capture is logged and the loop keeps serving presses;
        // the indicator guard has already released the lock.
        if let Err(err) = controller.take_photo(&path) {
            error!(%err, "capture failed");
        }
    }
}
