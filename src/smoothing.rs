//! Temporal smoothing of LED frames.
//!
//! Sits between the update driver and the output device and turns
//! abrupt target changes into gradual transitions. Two algorithms are
//! supported:
//!
//!  - **Linear**: step interpolation from the previously written frame
//!    towards the target, finishing exactly at the settling deadline.
//!  - **Decay**: a weighted moving average over the frames received
//!    during the settling window. A decay power of 1 weighs frames by
//!    the fraction of the window they were visible; higher powers bias
//!    towards newer frames. Interpolation and device writes run as
//!    independently paced sub-loops inside one tick.
//!
//! Averaged values are accumulated in 64-bit fixed point and rounded
//! half away from zero once at the end. Optional temporal dithering
//! carries the per-component rounding residue into the next frame to
//! reduce banding at low brightness.
//!
//! Like the rest of the crate this module never reads the clock; `now`
//! is passed into `write` and `tick`.

use embassy_time::{Duration, Instant};
use heapless::{Deque, Vec};
use libm::{ceilf, powf, roundf};

#[cfg(feature = "esp32-log")]
use esp_println::println;

use crate::OutputDriver;
use crate::color::Rgb;

/// Config slot holding the system-wide smoothing settings.
pub const CFG_SYSTEM: usize = 0;
/// Config slot that suppresses output (used during hand-offs).
pub const CFG_PAUSE: usize = 1;

/// Maximum number of registered smoothing configurations.
pub const MAX_CONFIGS: usize = 8;
/// Maximum depth of the output-delay FIFO.
pub const MAX_OUTPUT_DELAY: usize = 15;

const OUTPUT_QUEUE_CAP: usize = MAX_OUTPUT_DELAY + 1;
const FRAME_QUEUE_CAP: usize = 32;

/// Fixed-point scale for the moving-average accumulation (16
/// fractional bits).
const FP_ONE: f32 = 65536.0;

/// Interval between render statistic log lines, in microseconds.
#[cfg(feature = "esp32-log")]
const STATS_INTERVAL_US: i64 = 60_000_000;

/// Failures surfaced by the smoothing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoothingError {
    /// `write` was called while smoothing is disabled; the caller must
    /// fall back to a direct device write.
    Disabled,
    /// The configuration table is full.
    ConfigTableFull,
}

/// The smoothing algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmoothingType {
    #[default]
    Linear,
    Decay,
}

impl SmoothingType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Decay => "decay",
        }
    }
}

/// One smoothing profile, selectable by index.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingCfg {
    /// Suppress device writes while this profile is active.
    pub pause: bool,
    /// Width of the interpolation/averaging window.
    pub settling_time: Duration,
    /// Device write cadence for the Linear type; zero means
    /// sub-millisecond pacing.
    pub update_interval: Duration,
    /// Device write rate for the Decay type.
    pub output_rate_hz: f32,
    /// Interpolation rate for the Decay type; decoupled from the
    /// device write rate.
    pub interpolation_rate_hz: f32,
    /// Frames of extra latency buffering before emission.
    pub output_delay: usize,
    /// Carry quantization residue across frames (Decay only).
    pub dithering: bool,
    /// Decay power; exactly 1.0 weighs frames by visible time.
    pub decay: f32,
    pub smoothing_type: SmoothingType,
}

impl SmoothingCfg {
    /// Linear profile from a settling time and device update frequency.
    pub fn linear(settling_time: Duration, update_frequency_hz: f32, output_delay: usize) -> Self {
        Self {
            pause: false,
            settling_time,
            update_interval: interval_from_hz(update_frequency_hz),
            output_rate_hz: update_frequency_hz,
            interpolation_rate_hz: 0.0,
            output_delay,
            dithering: false,
            decay: 1.0,
            smoothing_type: SmoothingType::Linear,
        }
    }

    /// Decay profile with decoupled interpolation and output rates.
    pub fn decay(
        settling_time: Duration,
        output_rate_hz: f32,
        interpolation_rate_hz: f32,
        output_delay: usize,
        dithering: bool,
        decay: f32,
    ) -> Self {
        Self {
            pause: false,
            settling_time,
            update_interval: interval_from_hz(output_rate_hz),
            output_rate_hz,
            interpolation_rate_hz,
            output_delay,
            dithering,
            decay,
            smoothing_type: SmoothingType::Decay,
        }
    }

    /// The hand-off profile: keeps computing, emits nothing.
    pub fn paused() -> Self {
        Self {
            pause: true,
            ..Self::default()
        }
    }
}

impl Default for SmoothingCfg {
    fn default() -> Self {
        Self::linear(Duration::from_millis(200), 25.0, 0)
    }
}

fn interval_from_hz(hz: f32) -> Duration {
    if hz <= 0.0 {
        return Duration::from_millis(0);
    }
    Duration::from_micros((1_000_000.0 / hz) as u64)
}

const fn interval_us(interval: Duration) -> i64 {
    interval.as_micros() as i64
}

/// A timestamped target snapshot kept for the Decay moving average.
#[derive(Debug, Clone)]
struct RememberedFrame<const MAX_LEDS: usize> {
    time_us: i64,
    colors: Vec<Rgb, MAX_LEDS>,
}

/// The smoothing engine.
pub struct Smoothing<const MAX_LEDS: usize> {
    enabled: bool,
    pause: bool,

    cfgs: Vec<SmoothingCfg, MAX_CONFIGS>,
    current_cfg: usize,

    smoothing_type: SmoothingType,
    settling_time: Duration,
    update_interval: Duration,
    output_interval_us: i64,
    interpolation_interval_us: i64,
    output_delay: usize,
    dithering: bool,
    decay: f32,

    /// Absolute time at which the current target is fully applied.
    target_time_us: i64,
    previous_write_time_us: i64,
    previous_interpolation_time_us: i64,

    target_values: Vec<Rgb, MAX_LEDS>,
    previous_values: Vec<Rgb, MAX_LEDS>,

    frame_queue: Deque<RememberedFrame<MAX_LEDS>, FRAME_QUEUE_CAP>,
    output_queue: Deque<Vec<Rgb, MAX_LEDS>, OUTPUT_QUEUE_CAP>,

    /// Windowed mean per LED component, 0..=255 float domain.
    mean_values: Vec<[f32; 3], MAX_LEDS>,
    /// Quantization residue carried between frames when dithering.
    residuals: Vec<[f32; 3], MAX_LEDS>,

    rendered_counter: u64,
    interpolation_counter: u64,
    #[cfg(feature = "esp32-log")]
    stats_time_us: i64,
}

impl<const MAX_LEDS: usize> Smoothing<MAX_LEDS> {
    /// Create a smoothing engine seeded with the system profile.
    ///
    /// Slot [`CFG_SYSTEM`] holds `system_cfg`, slot [`CFG_PAUSE`] the
    /// output-suppressing hand-off profile.
    pub fn new(system_cfg: SmoothingCfg) -> Self {
        let mut cfgs: Vec<SmoothingCfg, MAX_CONFIGS> = Vec::new();
        let _ = cfgs.push(system_cfg);
        let _ = cfgs.push(SmoothingCfg::paused());

        let mut smoothing = Self {
            enabled: true,
            pause: false,
            cfgs,
            current_cfg: CFG_SYSTEM,
            smoothing_type: SmoothingType::Linear,
            settling_time: Duration::from_millis(0),
            update_interval: Duration::from_millis(0),
            output_interval_us: 0,
            interpolation_interval_us: 0,
            output_delay: 0,
            dithering: false,
            decay: 1.0,
            target_time_us: 0,
            previous_write_time_us: 0,
            previous_interpolation_time_us: 0,
            target_values: Vec::new(),
            previous_values: Vec::new(),
            frame_queue: Deque::new(),
            output_queue: Deque::new(),
            mean_values: Vec::new(),
            residuals: Vec::new(),
            rendered_counter: 0,
            interpolation_counter: 0,
            #[cfg(feature = "esp32-log")]
            stats_time_us: 0,
        };
        smoothing.apply_config(CFG_SYSTEM);
        smoothing
    }

    /// Feed a new target frame.
    ///
    /// The first accepted write seeds the previous-frame state; every
    /// write restarts the settling window. Fails with
    /// [`SmoothingError::Disabled`] while disabled.
    ///
    /// # Panics
    ///
    /// Panics on an empty buffer or on a length that differs from
    /// earlier writes; both are programming errors upstream.
    pub fn write(&mut self, now: Instant, led_values: &[Rgb]) -> Result<(), SmoothingError> {
        if !self.enabled {
            return Err(SmoothingError::Disabled);
        }
        assert!(!led_values.is_empty(), "empty target frame");
        assert!(led_values.len() <= MAX_LEDS, "target frame exceeds capacity");

        let now_us = now.as_micros() as i64;
        if self.previous_values.is_empty() {
            let _ = self.previous_values.extend_from_slice(led_values);
            self.previous_write_time_us = now_us;
            self.previous_interpolation_time_us = now_us;
            self.init_component_buffers(led_values);
        } else {
            assert_eq!(
                led_values.len(),
                self.previous_values.len(),
                "target frame length changed"
            );
        }

        self.target_time_us = now_us + interval_us(self.settling_time);
        self.target_values.clear();
        let _ = self.target_values.extend_from_slice(led_values);

        if self.smoothing_type == SmoothingType::Decay {
            self.remember_frame(now_us, led_values);
        }
        Ok(())
    }

    /// Advance the engine and emit due frames to `sink`.
    ///
    /// A no-op while disabled or before the first write.
    pub fn tick<O: OutputDriver>(&mut self, now: Instant, sink: &mut O) {
        if !self.enabled || self.previous_values.is_empty() {
            return;
        }
        let now_us = now.as_micros() as i64;
        match self.smoothing_type {
            SmoothingType::Linear => self.perform_linear(now_us, sink),
            SmoothingType::Decay => self.perform_decay(now_us, sink),
        }
        #[cfg(feature = "esp32-log")]
        self.log_stats(now_us);
    }

    /// Register an additional profile; returns its config id.
    pub fn add_config(&mut self, cfg: SmoothingCfg) -> Result<usize, SmoothingError> {
        self.cfgs
            .push(cfg)
            .map_err(|_| SmoothingError::ConfigTableFull)?;
        Ok(self.cfgs.len() - 1)
    }

    /// Replace the profile at `id`, appending when it does not exist.
    ///
    /// Updating the active profile re-applies it immediately.
    pub fn update_config(&mut self, id: usize, cfg: SmoothingCfg) -> Result<usize, SmoothingError> {
        if id >= self.cfgs.len() {
            return self.add_config(cfg);
        }
        self.cfgs[id] = cfg;
        if id == self.current_cfg {
            self.apply_config(id);
        }
        Ok(id)
    }

    /// Switch to the profile at `id`; unknown ids fall back to
    /// [`CFG_SYSTEM`] and return false.
    ///
    /// In-flight previous/target values and the settling window survive
    /// the switch; the new pacing applies from the next due comparison,
    /// so a priority hand-off does not glitch the output.
    pub fn select_config(&mut self, id: usize) -> bool {
        let known = id < self.cfgs.len();
        let idx = if known { id } else { CFG_SYSTEM };
        if idx != self.current_cfg {
            self.apply_config(idx);
            #[cfg(feature = "esp32-log")]
            println!(
                "[smoothing] config {} selected ({})",
                idx,
                self.smoothing_type.name()
            );
        }
        known
    }

    /// Index of the active profile.
    pub const fn current_config(&self) -> usize {
        self.current_cfg
    }

    /// Enable or disable the engine.
    ///
    /// Disabling flushes the output queue and the remembered-frame
    /// history; re-enabling starts clean from the next write.
    pub fn set_enable(&mut self, enable: bool) {
        if self.enabled == enable {
            return;
        }
        self.enabled = enable;
        if !enable {
            self.output_queue.clear();
            self.frame_queue.clear();
            self.previous_values.clear();
            self.target_values.clear();
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Suppress or resume device emission. Frames keep being computed
    /// while paused, so resuming continues seamlessly.
    pub fn set_pause(&mut self, pause: bool) {
        self.pause = pause;
    }

    pub const fn is_paused(&self) -> bool {
        self.pause
    }

    /// The shortest cadence the engine wants to be ticked at.
    pub fn tick_interval(&self) -> Duration {
        match self.smoothing_type {
            SmoothingType::Linear => self.update_interval,
            SmoothingType::Decay => {
                let mut us = self.output_interval_us;
                if self.interpolation_interval_us > 0 {
                    us = us.min(self.interpolation_interval_us);
                }
                Duration::from_micros(us.max(0) as u64)
            }
        }
    }

    /// Total frames written to the device and frames interpolated.
    pub const fn stats(&self) -> (u64, u64) {
        (self.rendered_counter, self.interpolation_counter)
    }

    /// The previous write/interpolation times stay untouched: they are
    /// the reference points of the in-flight settling window, and the
    /// new pacing takes effect through the next due comparison anyway.
    fn apply_config(&mut self, idx: usize) {
        let cfg = self.cfgs[idx].clone();
        self.smoothing_type = cfg.smoothing_type;
        self.settling_time = cfg.settling_time;
        self.update_interval = cfg.update_interval;
        self.output_interval_us = interval_us(interval_from_hz(cfg.output_rate_hz));
        self.interpolation_interval_us = interval_us(interval_from_hz(cfg.interpolation_rate_hz));
        self.output_delay = cfg.output_delay.min(MAX_OUTPUT_DELAY);
        self.dithering = cfg.dithering;
        self.decay = cfg.decay;
        self.pause = cfg.pause;
        self.current_cfg = idx;
    }

    fn init_component_buffers(&mut self, led_values: &[Rgb]) {
        self.mean_values.clear();
        self.residuals.clear();
        for led in led_values {
            let _ = self
                .mean_values
                .push([f32::from(led.r), f32::from(led.g), f32::from(led.b)]);
            let _ = self.residuals.push([0.0; 3]);
        }
    }

    fn perform_linear<O: OutputDriver>(&mut self, now_us: i64, sink: &mut O) {
        if now_us < self.previous_write_time_us + interval_us(self.update_interval) {
            return;
        }
        if now_us >= self.target_time_us {
            self.write_direct(now_us, sink);
            return;
        }
        let window = self.target_time_us - self.previous_write_time_us;
        if window <= 0 {
            self.write_direct(now_us, sink);
            return;
        }

        // Fraction of the remaining window that has elapsed since the
        // last written frame.
        let k = 1.0 - (self.target_time_us - now_us) as f32 / window as f32;
        for (prev, target) in self.previous_values.iter_mut().zip(&self.target_values) {
            prev.r = step_toward(prev.r, target.r, k);
            prev.g = step_toward(prev.g, target.g, k);
            prev.b = step_toward(prev.b, target.b, k);
        }
        self.previous_write_time_us = now_us;
        self.queue_colors(sink);
    }

    fn perform_decay<O: OutputDriver>(&mut self, now_us: i64, sink: &mut O) {
        let settled = now_us >= self.target_time_us;
        if !settled
            && now_us >= self.previous_interpolation_time_us + self.interpolation_interval_us
        {
            self.interpolate_frame(now_us);
            self.previous_interpolation_time_us = now_us;
            self.interpolation_counter += 1;
        }

        if now_us >= self.previous_write_time_us + self.output_interval_us {
            if settled {
                self.write_direct(now_us, sink);
            } else {
                if self.dithering {
                    self.assemble_and_dither_frame();
                } else {
                    self.assemble_frame();
                }
                self.previous_write_time_us = now_us;
                self.queue_colors(sink);
            }
        }
    }

    /// Weighted moving average over the frames overlapping the current
    /// settling window.
    fn interpolate_frame(&mut self, now_us: i64) {
        let window_us = interval_us(self.settling_time);
        if window_us <= 0 {
            return;
        }
        let window_start = now_us - window_us;

        // Drop frames that ended (next frame started) before the
        // window; the newest frame always stays.
        loop {
            if self.frame_queue.len() < 2 {
                break;
            }
            let second_start = self
                .frame_queue
                .iter()
                .nth(1)
                .map_or(i64::MAX, |f| f.time_us);
            if second_start <= window_start {
                self.frame_queue.pop_front();
            } else {
                break;
            }
        }
        if self.frame_queue.is_empty() {
            return;
        }

        let mut starts: Vec<i64, FRAME_QUEUE_CAP> = Vec::new();
        for frame in &self.frame_queue {
            let _ = starts.push(frame.time_us);
        }
        let count = starts.len();
        let inv_window = 1.0 / window_us as f32;
        let decay = self.decay;

        let led_count = self.mean_values.len();
        let mut accum: Vec<[u64; 3], MAX_LEDS> = Vec::new();
        for _ in 0..led_count {
            let _ = accum.push([0u64; 3]);
        }
        let mut total_weight: u64 = 0;

        for (idx, frame) in self.frame_queue.iter().enumerate() {
            let frame_start = starts[idx].max(window_start);
            let frame_end = if idx + 1 < count {
                starts[idx + 1].min(now_us)
            } else {
                now_us
            };
            if frame_end <= frame_start {
                continue;
            }
            let weight = frame_weight(decay, inv_window, frame_start, frame_end, window_start);
            let weight_fp = (weight * FP_ONE) as u64;
            if weight_fp == 0 {
                continue;
            }
            total_weight += weight_fp;
            for (acc, color) in accum.iter_mut().zip(frame.colors.iter()) {
                acc[0] += weight_fp * u64::from(color.r);
                acc[1] += weight_fp * u64::from(color.g);
                acc[2] += weight_fp * u64::from(color.b);
            }
        }
        if total_weight == 0 {
            return;
        }

        let scale = 1.0 / total_weight as f32;
        for (mean, acc) in self.mean_values.iter_mut().zip(&accum) {
            mean[0] = acc[0] as f32 * scale;
            mean[1] = acc[1] as f32 * scale;
            mean[2] = acc[2] as f32 * scale;
        }
    }

    /// Downsample the windowed means with temporal error diffusion.
    fn assemble_and_dither_frame(&mut self) {
        for ((prev, mean), residual) in self
            .previous_values
            .iter_mut()
            .zip(&self.mean_values)
            .zip(self.residuals.iter_mut())
        {
            prev.r = quantize_dithered(mean[0], &mut residual[0]);
            prev.g = quantize_dithered(mean[1], &mut residual[1]);
            prev.b = quantize_dithered(mean[2], &mut residual[2]);
        }
    }

    /// Downsample the windowed means with plain rounding.
    fn assemble_frame(&mut self) {
        for (prev, mean) in self.previous_values.iter_mut().zip(&self.mean_values) {
            prev.r = quantize(mean[0]);
            prev.g = quantize(mean[1]);
            prev.b = quantize(mean[2]);
        }
        for residual in &mut self.residuals {
            *residual = [0.0; 3];
        }
    }

    /// Write the raw target, bypassing interpolation.
    fn write_direct<O: OutputDriver>(&mut self, now_us: i64, sink: &mut O) {
        self.previous_values.clear();
        let _ = self.previous_values.extend_from_slice(&self.target_values);
        for (mean, target) in self.mean_values.iter_mut().zip(&self.target_values) {
            *mean = [
                f32::from(target.r),
                f32::from(target.g),
                f32::from(target.b),
            ];
        }
        self.previous_write_time_us = now_us;
        self.queue_colors(sink);
    }

    /// Push the assembled frame through the output-delay FIFO and emit
    /// the oldest one, unless paused.
    fn queue_colors<O: OutputDriver>(&mut self, sink: &mut O) {
        self.rendered_counter += 1;
        if self.output_delay == 0 {
            if !self.pause {
                sink.write(&self.previous_values);
            }
            return;
        }
        let _ = self.output_queue.push_back(self.previous_values.clone());
        if self.output_queue.len() > self.output_delay {
            if let Some(frame) = self.output_queue.pop_front() {
                if !self.pause {
                    sink.write(&frame);
                }
            }
        }
    }

    fn remember_frame(&mut self, now_us: i64, led_values: &[Rgb]) {
        if self.frame_queue.is_full() {
            self.frame_queue.pop_front();
        }
        let mut colors = Vec::new();
        let _ = colors.extend_from_slice(led_values);
        let _ = self.frame_queue.push_back(RememberedFrame {
            time_us: now_us,
            colors,
        });
    }

    /// Remembered-frame count, for window-pruning checks.
    pub fn remembered_frames(&self) -> usize {
        self.frame_queue.len()
    }

    /// Oldest remembered frame start time in microseconds.
    pub fn oldest_remembered_us(&self) -> Option<i64> {
        self.frame_queue.front().map(|f| f.time_us)
    }

    #[cfg(feature = "esp32-log")]
    fn log_stats(&mut self, now_us: i64) {
        if now_us - self.stats_time_us < STATS_INTERVAL_US {
            return;
        }
        self.stats_time_us = now_us;
        println!(
            "[smoothing] rendered={} interpolated={}",
            self.rendered_counter, self.interpolation_counter
        );
    }
}

/// Move one 8-bit component towards its target by `ceil(k * |diff|)`,
/// never overshooting.
fn step_toward(prev: u8, target: u8, k: f32) -> u8 {
    let diff = i32::from(target) - i32::from(prev);
    if diff == 0 {
        return prev;
    }
    let step = ceilf(k * diff.unsigned_abs() as f32) as i32;
    if diff > 0 {
        (i32::from(prev) + step.min(diff)) as u8
    } else {
        (i32::from(prev) - step.min(-diff)) as u8
    }
}

/// Weight of one frame within the settling window.
///
/// The power-law integral `((fe-ws)/w)^d - ((fs-ws)/w)^d` reduces to
/// the plain visible-time fraction at `d == 1`, which is kept as an
/// exact fast path.
fn frame_weight(
    decay: f32,
    inv_window: f32,
    frame_start: i64,
    frame_end: i64,
    window_start: i64,
) -> f32 {
    if (decay - 1.0).abs() < f32::EPSILON {
        return (frame_end - frame_start) as f32 * inv_window;
    }
    let lo = ((frame_start - window_start) as f32 * inv_window).max(0.0);
    let hi = ((frame_end - window_start) as f32 * inv_window).min(1.0);
    powf(hi, decay) - powf(lo, decay)
}

/// Round half away from zero, clamp to the 8-bit range.
fn quantize(value: f32) -> u8 {
    roundf(value).clamp(0.0, 255.0) as u8
}

/// Quantize with the carried residual and update it.
fn quantize_dithered(value: f32, residual: &mut f32) -> u8 {
    let adjusted = value + *residual;
    let quantized = roundf(adjusted).clamp(0.0, 255.0);
    *residual = adjusted - quantized;
    quantized as u8
}
