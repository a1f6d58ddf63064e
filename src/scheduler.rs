//! Update scheduling and timing utilities.
//!
//! Provides portable update pacing without async/await or platform-specific timers.
//! The caller is responsible for sleeping/waiting between ticks.

use embassy_time::{Duration, Instant};

use crate::OutputDriver;
use crate::engine::{Engine, FrameListener};
use crate::image::ImageReducer;

/// Result of one scheduler tick.
#[derive(Debug, Clone, Copy)]
pub struct TickResult {
    /// The deadline for the next tick.
    pub next_deadline: Instant,
    /// How long to wait until the next tick (may be zero if behind schedule).
    pub sleep_duration: Duration,
}

/// Portable update scheduler that manages timing without async.
///
/// This scheduler:
/// - Tracks tick timing with drift correction
/// - Runs one engine cycle per tick
/// - Returns timing info so the caller can sleep appropriately
///
/// The tick interval follows the engine's preferred cadence, so it
/// tightens automatically while a decay interpolation or a short
/// update interval is active.
///
/// # Usage
///
/// ```ignore
/// let mut scheduler = UpdateScheduler::new(engine);
///
/// loop {
///     let now = get_current_time_ms();
///     let result = scheduler.tick(Instant::from_millis(now));
///
///     // Platform-specific sleep
///     sleep_ms(result.sleep_duration.as_millis() as u64);
/// }
/// ```
pub struct UpdateScheduler<
    'a,
    O,
    R,
    L,
    const MAX_LEDS: usize,
    const MAX_PIXELS: usize,
    const COMMAND_CAP: usize,
> where
    O: OutputDriver,
    R: ImageReducer<MAX_PIXELS>,
    L: FrameListener,
{
    engine: Engine<'a, O, R, L, MAX_LEDS, MAX_PIXELS, COMMAND_CAP>,
    next_tick: Instant,
}

impl<'a, O, R, L, const MAX_LEDS: usize, const MAX_PIXELS: usize, const COMMAND_CAP: usize>
    UpdateScheduler<'a, O, R, L, MAX_LEDS, MAX_PIXELS, COMMAND_CAP>
where
    O: OutputDriver,
    R: ImageReducer<MAX_PIXELS>,
    L: FrameListener,
{
    /// Create a new update scheduler around an engine.
    pub const fn new(engine: Engine<'a, O, R, L, MAX_LEDS, MAX_PIXELS, COMMAND_CAP>) -> Self {
        Self {
            engine,
            next_tick: Instant::from_millis(0),
        }
    }

    /// Process one engine cycle and return timing information.
    ///
    /// This method:
    /// 1. Applies drift correction if we've fallen too far behind
    /// 2. Runs one engine tick
    /// 3. Returns the deadline for the next tick
    ///
    /// The caller is responsible for waiting until `next_deadline` before
    /// calling `tick` again.
    pub fn tick(&mut self, now: Instant) -> TickResult {
        let interval = self.engine.preferred_interval();

        // Drift correction: if we've fallen too far behind, reset to now
        // This prevents catch-up bursts after long stalls
        let max_drift_ms = interval.as_millis() * 2;
        if now.as_millis() > self.next_tick.as_millis() + max_drift_ms {
            self.next_tick = now;
        }

        self.engine.tick(now);

        // The interval may have changed with the visible channel's
        // smoothing profile; pace the next tick on the fresh value.
        self.next_tick += self.engine.preferred_interval();

        let sleep_duration = if self.next_tick.as_millis() > now.as_millis() {
            Duration::from_millis(self.next_tick.as_millis() - now.as_millis())
        } else {
            Duration::from_millis(0)
        };

        TickResult {
            next_deadline: self.next_tick,
            sleep_duration,
        }
    }

    /// Get a reference to the engine.
    pub const fn engine(&self) -> &Engine<'a, O, R, L, MAX_LEDS, MAX_PIXELS, COMMAND_CAP> {
        &self.engine
    }

    /// Get a mutable reference to the engine.
    pub const fn engine_mut(
        &mut self,
    ) -> &mut Engine<'a, O, R, L, MAX_LEDS, MAX_PIXELS, COMMAND_CAP> {
        &mut self.engine
    }
}
