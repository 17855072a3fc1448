//! Status LED with mode-dependent blink patterns. Independent of the
//! buffering logic; the mainline loop picks the mode and supplies the clock.

use embedded_hal::digital::OutputPin;
use fugit::TimerInstantU32;

/// Millisecond instant (1 kHz tick) supplied by the caller's clock.
pub type Instant = TimerInstantU32<1000>;

type Duration = fugit::MillisDurationU32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlinkMode {
    /// Short blip once a second: powered, not logging.
    Idle,
    /// Even 1 Hz blink: logging in progress.
    Run,
    /// Fast flicker: something went wrong.
    Error,
    /// Slow 0.25 Hz blink: no storage medium present.
    NoStorage,
}

impl BlinkMode {
    fn timings(self) -> (Duration, Duration) {
        match self {
            BlinkMode::Idle => (Duration::millis(50), Duration::millis(950)),
            BlinkMode::Run => (Duration::millis(500), Duration::millis(500)),
            BlinkMode::Error => (Duration::millis(100), Duration::millis(100)),
            BlinkMode::NoStorage => (Duration::millis(2000), Duration::millis(2000)),
        }
    }
}

pub struct Heartbeat<P> {
    pin: P,
    on: Duration,
    off: Duration,
    interval: Duration,
    lit: bool,
    last_change: Instant,
}

impl<P: OutputPin> Heartbeat<P> {
    pub fn new(pin: P) -> Self {
        let (on, off) = BlinkMode::Idle.timings();
        Self {
            pin,
            on,
            off,
            interval: Duration::millis(0),
            lit: false,
            last_change: Instant::from_ticks(0),
        }
    }

    /// Start blinking in the given mode with the LED dark.
    pub fn begin(&mut self, mode: BlinkMode, now: Instant) {
        let _ = self.pin.set_low();
        self.lit = false;
        self.set_mode(mode, now);
    }

    /// Switch patterns. The LED restarts its cycle and lights immediately.
    pub fn set_mode(&mut self, mode: BlinkMode, now: Instant) {
        let (on, off) = mode.timings();
        self.on = on;
        self.off = off;
        self.lit = false;
        self.interval = Duration::millis(0);
        self.last_change = now;
        self.poll(now);
    }

    /// Advance the blink state machine. Call from the mainline loop.
    pub fn poll(&mut self, now: Instant) {
        let due = now
            .checked_duration_since(self.last_change)
            .map_or(false, |elapsed| elapsed >= self.interval);
        if due {
            self.last_change = now;
            self.lit = !self.lit;
            if self.lit {
                let _ = self.pin.set_high();
            } else {
                let _ = self.pin.set_low();
            }
            self.interval = if self.lit { self.on } else { self.off };
        }
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }
}
