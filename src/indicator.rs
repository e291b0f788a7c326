//! Indicator lock: mutual exclusion fused with the "busy" light.
//!
//! Every camera operation system-wide funnels through [`IndicatorLock`]; it
//! is the sole synchronization primitive of the core. Acquiring it raises the
//! light to flash brightness (optionally after the countdown cue) and returns
//! an RAII guard. Dropping the guard restores the idle state and unblocks the
//! next waiter, so the lock is released on every exit path, including error
//! returns out of the held critical section.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::traits::LightStrip;

/// Brightness while an operation holds the lock.
pub const FLASH_BRIGHTNESS: f32 = 0.2;
/// Brightness restored on release.
pub const IDLE_BRIGHTNESS: f32 = 0.05;

const COUNTDOWN_CYCLES: u32 = 3;
const COUNTDOWN_ON: Duration = Duration::from_millis(500);
const COUNTDOWN_OFF: Duration = Duration::from_millis(1000);

const RED: (u8, u8, u8) = (255, 0, 0);
const WHITE: (u8, u8, u8) = (255, 255, 255);
const OFF: (u8, u8, u8) = (0, 0, 0);

/// Why the lock is being held. `Capturing` additionally runs the countdown
/// blink cue before the solid flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// A recalibration pass holds the camera.
    Calibrating,
    /// A photo capture holds the camera.
    Capturing,
}

/// Mutual-exclusion primitive wrapping the booth's light strip.
pub struct IndicatorLock<S: LightStrip> {
    strip: Mutex<S>,
    countdown_on: Duration,
    countdown_off: Duration,
}

impl<S: LightStrip> IndicatorLock<S> {
    /// Wrap a light strip with the production countdown timings.
    pub fn new(strip: S) -> Self {
        Self {
            strip: Mutex::new(strip),
            countdown_on: COUNTDOWN_ON,
            countdown_off: COUNTDOWN_OFF,
        }
    }

    /// Override the countdown blink timings. Tests pass zero durations so
    /// the cue completes instantly.
    #[must_use]
    pub fn with_timings(mut self, on: Duration, off: Duration) -> Self {
        self.countdown_on = on;
        self.countdown_off = off;
        self
    }

    /// Block until no other purpose holds the lock, then turn the flash on.
    ///
    /// For [`Purpose::Capturing`] the 3-cycle red countdown cue runs first
    /// (still inside the critical section), then the strip fills solid white.
    /// There is no acquisition timeout: a stuck holder stalls the caller
    /// indefinitely.
    ///
    /// Not recursive: acquiring twice from one thread deadlocks.
    pub fn acquire(&self, purpose: Purpose) -> IndicatorGuard<'_, S> {
        let mut strip = self.strip.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(?purpose, "indicator acquired");

        strip.set_brightness(FLASH_BRIGHTNESS);

        if purpose == Purpose::Capturing {
            for _ in 0..COUNTDOWN_CYCLES {
                strip.fill(RED);
                strip.show();
                thread::sleep(self.countdown_on);
                strip.fill(OFF);
                strip.show();
                thread::sleep(self.countdown_off);
            }
        }

        strip.fill(WHITE);
        strip.show();

        IndicatorGuard { strip, purpose }
    }
}

/// Guard proving exclusive camera access; the flash stays on while it lives.
pub struct IndicatorGuard<'a, S: LightStrip> {
    strip: MutexGuard<'a, S>,
    purpose: Purpose,
}

impl<S: LightStrip> Drop for IndicatorGuard<'_, S> {
    fn drop(&mut self) {
        self.strip.set_brightness(IDLE_BRIGHTNESS);
        self.strip.fill(OFF);
        self.strip.show();
        debug!(purpose = ?self.purpose, "indicator released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockStrip, StripEvent};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn instant_lock(strip: MockStrip) -> IndicatorLock<MockStrip> {
        IndicatorLock::new(strip).with_timings(Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn test_calibrating_skips_countdown() {
        let strip = MockStrip::new();
        let log = strip.log();
        let lock = instant_lock(strip);

        drop(lock.acquire(Purpose::Calibrating));

        let events = log.events();
        assert_eq!(
            events,
            vec![
                StripEvent::Brightness(FLASH_BRIGHTNESS),
                StripEvent::Fill(WHITE),
                StripEvent::Show,
                StripEvent::Brightness(IDLE_BRIGHTNESS),
                StripEvent::Fill(OFF),
                StripEvent::Show,
            ]
        );
    }

    #[test]
    fn test_capturing_runs_countdown_cue() {
        let strip = MockStrip::new();
        let log = strip.log();
        let lock = instant_lock(strip);

        drop(lock.acquire(Purpose::Capturing));

        let fills: Vec<_> = log
            .events()
            .into_iter()
            .filter_map(|event| match event {
                StripEvent::Fill(color) => Some(color),
                _ => None,
            })
            .collect();
        // 3 x (red, off), solid white, then cleared on release.
        assert_eq!(fills, vec![RED, OFF, RED, OFF, RED, OFF, WHITE, OFF]);
    }

    #[test]
    fn test_concurrent_acquire_is_mutually_exclusive() {
        let lock = Arc::new(instant_lock(MockStrip::new()));
        let held = Arc::new(AtomicBool::new(false));

        let thread_lock = Arc::clone(&lock);
        let thread_held = Arc::clone(&held);
        let holder = std::thread::spawn(move || {
            let guard = thread_lock.acquire(Purpose::Calibrating);
            thread_held.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(100));
            thread_held.store(false, Ordering::SeqCst);
            drop(guard);
        });

        // Wait until the holder is inside the critical section.
        while !held.load(Ordering::SeqCst) {
            std::thread::yield_now();
        }

        let start = Instant::now();
        let guard = lock.acquire(Purpose::Calibrating);
        assert!(
            !held.load(Ordering::SeqCst),
            "second acquire ran while the first still held the lock"
        );
        assert!(
            start.elapsed() >= Duration::from_millis(50),
            "second acquire did not block"
        );
        drop(guard);

        holder.join().expect("holder thread panicked");
    }
}
