//! The update driver.
//!
//! One engine instance owns the muxer, the smoothing engine and the
//! output driver, and is the single place where their state is mutated.
//! Producers feed it through the command channel; `tick` drains the
//! channel, re-arbitrates, reduces image payloads, applies the wiring
//! order and pushes the result through smoothing to the device.

use embassy_time::{Duration, Instant};
use heapless::Vec;

#[cfg(feature = "esp32-log")]
use esp_println::println;

use crate::OutputDriver;
use crate::color::{BLACK, ColorOrder, Rgb, fill_tiled};
use crate::command::{Command, CommandReceiver};
use crate::component::Component;
use crate::image::{ImageFrame, ImageReducer};
use crate::muxer::{InputInfo, MAX_PRIORITIES, MuxerError, PriorityMuxer};
use crate::smoothing::{CFG_SYSTEM, Smoothing, SmoothingCfg, SmoothingError};

/// Default update cadence of the driver (40 Hz).
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(25);

/// Observer of pipeline signals.
///
/// All callbacks default to no-ops. The frame callbacks are
/// independently rate-limited by the engine so a slow observer never
/// sees the full device rate.
pub trait FrameListener {
    /// The set of active priorities or the visible selection changed.
    fn priorities_changed(&mut self, _active: &[i32], _visible: i32) {}

    /// The visible priority changed.
    fn visible_changed(&mut self, _priority: i32) {}

    /// The raw image payload currently being reduced, row-major.
    fn raw_image(&mut self, _width: usize, _height: usize, _pixels: &[Rgb]) {}

    /// The resolved per-LED colors, before wiring-order correction.
    fn raw_colors(&mut self, _colors: &[Rgb]) {}

    /// The final buffer as written to the device.
    fn output(&mut self, _colors: &[Rgb]) {}
}

/// A listener that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullListener;

impl FrameListener for NullListener {}

/// Elapsed-time rate limiter for one observer signal.
#[derive(Debug, Clone, Copy, Default)]
struct SignalThrottle {
    min_interval_us: i64,
    last_us: Option<i64>,
}

impl SignalThrottle {
    const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval_us: min_interval.as_micros() as i64,
            last_us: None,
        }
    }

    fn ready(&mut self, now_us: i64) -> bool {
        let due = self
            .last_us
            .is_none_or(|last| now_us - last >= self.min_interval_us);
        if due {
            self.last_us = Some(now_us);
        }
        due
    }
}

/// Static engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of physical LEDs (must not exceed `MAX_LEDS`).
    pub led_count: usize,
    /// Wiring order of the LED color channels.
    pub color_order: ColorOrder,
    /// The system smoothing profile (config slot 0).
    pub smoothing: SmoothingCfg,
    /// Start with smoothing enabled.
    pub smoothing_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            led_count: 1,
            color_order: ColorOrder::Rgb,
            smoothing: SmoothingCfg::default(),
            smoothing_enabled: true,
        }
    }
}

/// The update driver: command drain, arbitration, reduction, ordering,
/// smoothing, emission.
pub struct Engine<'a, O, R, L, const MAX_LEDS: usize, const MAX_PIXELS: usize, const COMMAND_CAP: usize>
where
    O: OutputDriver,
    R: ImageReducer<MAX_PIXELS>,
    L: FrameListener,
{
    commands: CommandReceiver<'a, MAX_LEDS, MAX_PIXELS, COMMAND_CAP>,
    muxer: PriorityMuxer<MAX_LEDS, MAX_PIXELS>,
    smoothing: Smoothing<MAX_LEDS>,
    output: O,
    reducer: R,
    listener: L,

    color_order: ColorOrder,
    led_count: usize,
    /// Resolved per-LED colors of the visible channel, logical RGB.
    led_buffer: Vec<Rgb, MAX_LEDS>,
    /// Last frame handed to smoothing/device, to suppress no-op writes.
    last_pushed: Vec<Rgb, MAX_LEDS>,

    raw_image_throttle: SignalThrottle,
    raw_colors_throttle: SignalThrottle,
    output_throttle: SignalThrottle,
}

impl<'a, O, R, L, const MAX_LEDS: usize, const MAX_PIXELS: usize, const COMMAND_CAP: usize>
    Engine<'a, O, R, L, MAX_LEDS, MAX_PIXELS, COMMAND_CAP>
where
    O: OutputDriver,
    R: ImageReducer<MAX_PIXELS>,
    L: FrameListener,
{
    /// Create an engine.
    ///
    /// # Panics
    ///
    /// Panics when `led_count` is zero or exceeds `MAX_LEDS`.
    pub fn new(
        output: O,
        reducer: R,
        listener: L,
        commands: CommandReceiver<'a, MAX_LEDS, MAX_PIXELS, COMMAND_CAP>,
        config: &EngineConfig,
    ) -> Self {
        let led_count = config.led_count;
        assert!(led_count > 0 && led_count <= MAX_LEDS);
        let mut smoothing = Smoothing::new(config.smoothing.clone());
        smoothing.set_enable(config.smoothing_enabled);

        Self {
            commands,
            muxer: PriorityMuxer::new(led_count),
            smoothing,
            output,
            reducer,
            listener,
            color_order: config.color_order,
            led_count,
            led_buffer: Vec::new(),
            last_pushed: Vec::new(),
            raw_image_throttle: SignalThrottle::new(raw_image_interval(MAX_PIXELS)),
            raw_colors_throttle: SignalThrottle::new(raw_colors_interval(led_count)),
            output_throttle: SignalThrottle::new(output_interval(led_count)),
        }
    }

    /// One driver cycle; call at [`preferred_interval`](Self::preferred_interval)
    /// cadence or immediately after same-thread mutations.
    pub fn tick(&mut self, now: Instant) {
        self.process_commands(now);
        let update = self.muxer.update(now);

        if update.priorities_changed {
            let active = self.muxer.priorities();
            self.listener
                .priorities_changed(&active, self.muxer.current_priority());
        }
        if let Some(visible) = update.visible_changed {
            let smooth_cfg = self
                .muxer
                .input_info(visible)
                .map_or(CFG_SYSTEM, |info| info.smooth_cfg);
            self.smoothing.select_config(smooth_cfg);
            self.listener.visible_changed(visible);
            #[cfg(feature = "esp32-log")]
            println!("[engine] visible priority changed to {}", visible);
        }

        let now_us = now.as_micros() as i64;
        self.resolve_payload(now_us);

        if self.raw_colors_throttle.ready(now_us) {
            self.listener.raw_colors(&self.led_buffer);
        }

        let mut frame: Vec<Rgb, MAX_LEDS> = Vec::new();
        let _ = frame.extend_from_slice(&self.led_buffer);
        self.color_order.apply_all(&mut frame);

        if self.smoothing.is_enabled() {
            // Smoothing restarts its settling window on every write, so
            // only an actual content change is pushed.
            if self.led_buffer != self.last_pushed {
                self.last_pushed.clear();
                let _ = self.last_pushed.extend_from_slice(&self.led_buffer);
                let _ = self.smoothing.write(now, &frame);
            }
        } else {
            // Unsmoothed, the device runs at the driver cadence: every
            // cycle writes, changed or not.
            self.output.write(&frame);
            if self.output_throttle.ready(now_us) {
                self.listener.output(&frame);
            }
            self.last_pushed.clear();
            let _ = self.last_pushed.extend_from_slice(&self.led_buffer);
        }

        let mut sink = DeviceTap {
            device: &mut self.output,
            listener: &mut self.listener,
            throttle: &mut self.output_throttle,
            now_us,
        };
        self.smoothing.tick(now, &mut sink);
    }

    /// The cadence the engine wants to be ticked at, never below 1 ms.
    pub fn preferred_interval(&self) -> Duration {
        let mut interval = DEFAULT_UPDATE_INTERVAL;
        if self.smoothing.is_enabled() {
            let smoothing = self.smoothing.tick_interval();
            if smoothing < interval {
                interval = smoothing;
            }
        }
        // Sub-millisecond pacing degrades to a bounded 1 ms yield.
        interval.max(Duration::from_millis(1))
    }

    // ── Producer-facing API (same-thread) ───────────────────────────

    /// Register (or refresh) a priority channel.
    pub fn register_input(
        &mut self,
        priority: i32,
        component: Component,
        origin: &str,
        owner: &str,
        smooth_cfg: usize,
    ) {
        self.muxer
            .register_input(priority, component, origin, owner, smooth_cfg);
    }

    /// Write a color payload, tiled to the hardware LED count.
    ///
    /// Auto-registers the priority as a color channel when unknown;
    /// with `clear_effects`, a running effect on the same priority is
    /// replaced.
    pub fn set_color(
        &mut self,
        priority: i32,
        colors: &[Rgb],
        timeout_ms: i64,
        clear_effects: bool,
        now: Instant,
    ) -> Result<(), MuxerError> {
        if clear_effects
            && self
                .muxer
                .input_info(priority)
                .is_ok_and(|info| info.component == Component::Effect)
        {
            let _ = self.muxer.clear_input(priority);
        }
        if !self.muxer.has_priority(priority) {
            self.muxer
                .register_input(priority, Component::Color, "System", "", CFG_SYSTEM);
        }
        let mut tiled: Vec<Rgb, MAX_LEDS> = Vec::new();
        fill_tiled(self.led_count, colors, &mut tiled);
        self.muxer.set_input(priority, &tiled, timeout_ms, now)
    }

    /// Write an image payload; requires prior registration.
    pub fn set_image(
        &mut self,
        priority: i32,
        image: ImageFrame<MAX_PIXELS>,
        timeout_ms: i64,
        now: Instant,
    ) -> Result<(), MuxerError> {
        self.muxer.set_input_image(priority, image, timeout_ms, now)
    }

    /// Take a channel out of arbitration, keeping its registration.
    pub fn set_input_inactive(&mut self, priority: i32) -> bool {
        self.muxer.set_input_inactive(priority)
    }

    /// Remove one priority channel.
    pub fn clear(&mut self, priority: i32) -> Result<bool, MuxerError> {
        self.muxer.clear_input(priority)
    }

    /// Remove all channels; `force` also removes protected ones.
    pub fn clear_all(&mut self, force: bool) {
        self.muxer.clear_all(force);
    }

    /// Enable or disable lowest-wins auto-selection.
    pub fn set_source_auto_select(&mut self, enable: bool) {
        self.muxer.set_source_auto_select(enable);
    }

    /// Pin the visible priority manually.
    pub fn set_visible_priority(&mut self, priority: i32) -> bool {
        self.muxer.set_priority(priority)
    }

    /// The currently visible priority.
    pub const fn current_priority(&self) -> i32 {
        self.muxer.current_priority()
    }

    /// Sorted list of active priorities.
    pub fn active_priorities(&self) -> Vec<i32, MAX_PRIORITIES> {
        self.muxer.priorities()
    }

    /// Channel snapshot for one priority.
    pub fn priority_info(
        &self,
        priority: i32,
    ) -> Result<&InputInfo<MAX_LEDS, MAX_PIXELS>, MuxerError> {
        self.muxer.input_info(priority)
    }

    /// Register an additional smoothing profile; returns its id.
    pub fn add_smoothing_config(&mut self, cfg: SmoothingCfg) -> Result<usize, SmoothingError> {
        self.smoothing.add_config(cfg)
    }

    /// Replace (or append) a smoothing profile.
    pub fn update_smoothing_config(
        &mut self,
        id: usize,
        cfg: SmoothingCfg,
    ) -> Result<usize, SmoothingError> {
        self.smoothing.update_config(id, cfg)
    }

    /// Enable or disable the smoothing engine.
    pub fn set_smoothing_enable(&mut self, enable: bool) {
        self.smoothing.set_enable(enable);
        if enable {
            // Force a re-push so smoothing reseeds from current state.
            self.last_pushed.clear();
        }
    }

    /// Suppress or resume smoothed device emission.
    pub fn set_smoothing_pause(&mut self, pause: bool) {
        self.smoothing.set_pause(pause);
    }

    /// Direct access to the smoothing engine.
    pub fn smoothing(&self) -> &Smoothing<MAX_LEDS> {
        &self.smoothing
    }

    /// Direct access to the muxer.
    pub fn muxer(&self) -> &PriorityMuxer<MAX_LEDS, MAX_PIXELS> {
        &self.muxer
    }

    /// Get a reference to the output driver.
    pub fn output(&self) -> &O {
        &self.output
    }

    /// Get a mutable reference to the output driver.
    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    /// Number of physical LEDs.
    pub const fn led_count(&self) -> usize {
        self.led_count
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Drain pending commands in arrival order.
    fn process_commands(&mut self, now: Instant) {
        while let Ok(command) = self.commands.try_receive() {
            match command {
                Command::Register {
                    priority,
                    component,
                    origin,
                    owner,
                    smooth_cfg,
                } => {
                    self.muxer
                        .register_input(priority, component, &origin, &owner, smooth_cfg);
                }
                Command::SetColor {
                    priority,
                    colors,
                    timeout_ms,
                    clear_effects,
                } => {
                    // A rejected write drops this producer's update for
                    // the cycle; visible state stays unchanged.
                    let _ = self.set_color(priority, &colors, timeout_ms, clear_effects, now);
                }
                Command::SetImage {
                    priority,
                    image,
                    timeout_ms,
                } => {
                    let _ = self.set_image(priority, image, timeout_ms, now);
                }
                Command::SetInactive { priority } => {
                    self.muxer.set_input_inactive(priority);
                }
                Command::Clear { priority } => {
                    let _ = self.muxer.clear_input(priority);
                }
                Command::ClearAll { force } => self.muxer.clear_all(force),
                Command::SetAutoSelect(enable) => self.muxer.set_source_auto_select(enable),
                Command::SetVisiblePriority(priority) => {
                    self.muxer.set_priority(priority);
                }
                Command::SetSmoothingEnable(enable) => self.set_smoothing_enable(enable),
                Command::SetSmoothingPause(pause) => self.smoothing.set_pause(pause),
            }
        }
    }

    /// Resolve the visible channel's payload into `led_buffer`.
    fn resolve_payload(&mut self, now_us: i64) {
        let info = self.muxer.current_info();
        if let Some(image) = info.image.as_ref().filter(|img| img.len() > 1) {
            if self.raw_image_throttle.ready(now_us) {
                self.listener
                    .raw_image(image.width(), image.height(), image.pixels());
            }
            self.reducer
                .reduce(image, self.led_count, &mut self.led_buffer);
        } else if info.led_colors.is_empty() {
            // No active channel at all: explicit black, never stale
            // output.
            self.led_buffer.clear();
            for _ in 0..self.led_count {
                let _ = self.led_buffer.push(BLACK);
            }
        } else {
            fill_tiled(self.led_count, &info.led_colors, &mut self.led_buffer);
        }
    }
}

/// Forwards smoothing output to the device and, rate-limited, to the
/// listener.
struct DeviceTap<'d, O: OutputDriver, L> {
    device: &'d mut O,
    listener: &'d mut L,
    throttle: &'d mut SignalThrottle,
    now_us: i64,
}

impl<O: OutputDriver, L: FrameListener> OutputDriver for DeviceTap<'_, O, L> {
    fn write(&mut self, colors: &[Rgb]) {
        self.device.write(colors);
        if self.throttle.ready(self.now_us) {
            self.listener.output(colors);
        }
    }
}

const fn raw_image_interval(max_pixels: usize) -> Duration {
    // Bigger frames flood observers faster; back off harder.
    if max_pixels > 128 * 72 {
        Duration::from_millis(100)
    } else {
        Duration::from_millis(40)
    }
}

const fn raw_colors_interval(led_count: usize) -> Duration {
    if led_count > 256 {
        Duration::from_millis(100)
    } else {
        Duration::from_millis(50)
    }
}

const fn output_interval(led_count: usize) -> Duration {
    if led_count > 256 {
        Duration::from_millis(50)
    } else {
        Duration::from_millis(25)
    }
}
