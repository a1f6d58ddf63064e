//! Priority arbitration between competing producers.
//!
//! Every producer owns one priority channel; lower numbers take
//! precedence. The muxer tracks registration, payloads and expiry per
//! channel and resolves the single visible priority. It never reacts to
//! wall-clock time on its own: callers pass `now` into every mutation
//! and into [`PriorityMuxer::update`], which the engine runs once per
//! tick (expiry is polled, not timer-scheduled).

use embassy_time::Instant;
use heapless::{FnvIndexMap, String, Vec};

use crate::color::{BLACK, Rgb};
use crate::component::Component;
use crate::image::ImageFrame;

/// Maximum number of simultaneously registered priority channels.
pub const MAX_PRIORITIES: usize = 16;

/// Priority reserved for momentary foreground output.
pub const FOREGROUND_PRIORITY: i32 = 1;
/// Priority reserved for the background effect.
pub const BACKGROUND_PRIORITY: i32 = 254;
/// Sentinel priority reported when no channel is active; renders black.
pub const LOWEST_PRIORITY: i32 = 255;

/// Timeout value for a channel that never expires.
pub const TIMEOUT_ENDLESS: i64 = -1;
/// Timeout value for a registered channel that holds no data yet.
pub const TIMEOUT_INACTIVE: i64 = -100;

/// Capacity of origin/owner diagnostic strings.
pub type OriginString = String<64>;

/// Build a (possibly truncated) diagnostic string.
pub fn origin_from(s: &str) -> OriginString {
    let mut out = OriginString::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Failures surfaced to producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxerError {
    /// Data was written to a priority that was never registered; the
    /// producer must call `register_input` first and retry.
    RegistrationRequired,
    /// Lookup of a priority that is not known to the muxer.
    InvalidPriority,
    /// Refused to clear a protected (system/background) priority
    /// without force.
    RejectedClear,
}

/// One priority channel.
#[derive(Debug, Clone)]
pub struct InputInfo<const MAX_LEDS: usize, const MAX_PIXELS: usize> {
    /// The priority of this channel; lower wins.
    pub priority: i32,
    /// Absolute expiry in milliseconds; [`TIMEOUT_ENDLESS`] never
    /// expires, [`TIMEOUT_INACTIVE`] marks registered-but-idle.
    pub timeout_time_ms: i64,
    /// Per-LED colors (may be shorter than the hardware count; the
    /// engine tiles).
    pub led_colors: Vec<Rgb, MAX_LEDS>,
    /// Raw image payload; wins over `led_colors` while it holds more
    /// than one pixel.
    pub image: Option<ImageFrame<MAX_PIXELS>>,
    /// Kind of producer that owns the channel.
    pub component: Component,
    /// Who set the channel (for example `Yeelight@10.0.0.4`).
    pub origin: OriginString,
    /// Specific owner description, may be empty.
    pub owner: OriginString,
    /// Index of the smoothing configuration active while this channel
    /// is visible.
    pub smooth_cfg: usize,
}

impl<const MAX_LEDS: usize, const MAX_PIXELS: usize> InputInfo<MAX_LEDS, MAX_PIXELS> {
    /// Whether the channel currently takes part in arbitration.
    pub const fn is_active(&self) -> bool {
        self.timeout_time_ms != TIMEOUT_INACTIVE
    }

    /// Whether the image payload takes precedence over `led_colors`.
    pub fn has_image(&self) -> bool {
        self.image.as_ref().is_some_and(|img| img.len() > 1)
    }
}

/// Outcome of one [`PriorityMuxer::update`] pass.
///
/// Both fields report an edge exactly once per actual change, so the
/// engine can re-trigger smoothing and listeners without debouncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MuxerUpdate {
    /// The set of active priorities changed (register/expire/clear).
    pub priorities_changed: bool,
    /// The visible priority changed to the contained value.
    pub visible_changed: Option<i32>,
}

/// The priority multiplexer.
pub struct PriorityMuxer<const MAX_LEDS: usize, const MAX_PIXELS: usize> {
    inputs: FnvIndexMap<i32, InputInfo<MAX_LEDS, MAX_PIXELS>, MAX_PRIORITIES>,
    lowest_info: InputInfo<MAX_LEDS, MAX_PIXELS>,
    current_priority: i32,
    previous_priority: i32,
    manual_priority: i32,
    source_auto_select: bool,
    prev_active: Vec<i32, MAX_PRIORITIES>,
}

impl<const MAX_LEDS: usize, const MAX_PIXELS: usize> PriorityMuxer<MAX_LEDS, MAX_PIXELS> {
    /// Create a muxer for `led_count` LEDs.
    ///
    /// The LED count sizes the black sentinel payload used when no
    /// channel is active.
    pub fn new(led_count: usize) -> Self {
        assert!(led_count > 0 && led_count <= MAX_LEDS);
        let mut black = Vec::new();
        for _ in 0..led_count {
            let _ = black.push(BLACK);
        }
        Self {
            inputs: FnvIndexMap::new(),
            lowest_info: InputInfo {
                priority: LOWEST_PRIORITY,
                timeout_time_ms: TIMEOUT_ENDLESS,
                led_colors: black,
                image: None,
                component: Component::Background,
                origin: origin_from("System"),
                owner: OriginString::new(),
                smooth_cfg: 0,
            },
            current_priority: LOWEST_PRIORITY,
            previous_priority: LOWEST_PRIORITY,
            manual_priority: LOWEST_PRIORITY,
            source_auto_select: true,
            prev_active: Vec::new(),
        }
    }

    /// Register a priority channel or refresh its metadata.
    ///
    /// A new channel starts inactive; it joins arbitration with the
    /// first `set_input`/`set_input_image`. Re-registering an existing
    /// priority only updates the metadata and never touches an
    /// in-flight payload or its expiry.
    pub fn register_input(
        &mut self,
        priority: i32,
        component: Component,
        origin: &str,
        owner: &str,
        smooth_cfg: usize,
    ) {
        if let Some(info) = self.inputs.get_mut(&priority) {
            info.component = component;
            info.origin = origin_from(origin);
            info.owner = origin_from(owner);
            info.smooth_cfg = smooth_cfg;
            return;
        }
        let info = InputInfo {
            priority,
            timeout_time_ms: TIMEOUT_INACTIVE,
            led_colors: Vec::new(),
            image: None,
            component,
            origin: origin_from(origin),
            owner: origin_from(owner),
            smooth_cfg,
        };
        let _ = self.inputs.insert(priority, info);
    }

    /// Store a color payload for a registered priority.
    ///
    /// `timeout_ms` is relative; [`TIMEOUT_ENDLESS`] keeps the channel
    /// active until cleared.
    pub fn set_input(
        &mut self,
        priority: i32,
        led_colors: &[Rgb],
        timeout_ms: i64,
        now: Instant,
    ) -> Result<(), MuxerError> {
        assert!(!led_colors.is_empty(), "empty color payload");
        let timeout_time = Self::absolute_timeout(timeout_ms, now);
        let info = self
            .inputs
            .get_mut(&priority)
            .ok_or(MuxerError::RegistrationRequired)?;
        info.led_colors.clear();
        let take = led_colors.len().min(MAX_LEDS);
        let _ = info.led_colors.extend_from_slice(&led_colors[..take]);
        info.image = None;
        info.timeout_time_ms = timeout_time;
        Ok(())
    }

    /// Store an image payload for a registered priority.
    pub fn set_input_image(
        &mut self,
        priority: i32,
        image: ImageFrame<MAX_PIXELS>,
        timeout_ms: i64,
        now: Instant,
    ) -> Result<(), MuxerError> {
        assert!(!image.is_empty(), "empty image payload");
        let timeout_time = Self::absolute_timeout(timeout_ms, now);
        let info = self
            .inputs
            .get_mut(&priority)
            .ok_or(MuxerError::RegistrationRequired)?;
        info.image = Some(image);
        info.timeout_time_ms = timeout_time;
        Ok(())
    }

    /// Take a channel out of arbitration but keep its registration.
    pub fn set_input_inactive(&mut self, priority: i32) -> bool {
        let Some(info) = self.inputs.get_mut(&priority) else {
            return false;
        };
        info.timeout_time_ms = TIMEOUT_INACTIVE;
        info.led_colors.clear();
        info.image = None;
        true
    }

    /// Remove one priority channel.
    ///
    /// Protected (system/background) priorities are refused; returns
    /// `Ok(false)` when the priority is unknown.
    pub fn clear_input(&mut self, priority: i32) -> Result<bool, MuxerError> {
        if Self::is_protected(priority) {
            return Err(MuxerError::RejectedClear);
        }
        Ok(self.inputs.remove(&priority).is_some())
    }

    /// Remove all priority channels; `force` also removes protected
    /// ones.
    pub fn clear_all(&mut self, force: bool) {
        if force {
            self.inputs.clear();
            return;
        }
        let mut doomed: Vec<i32, MAX_PRIORITIES> = Vec::new();
        for (&priority, _) in &self.inputs {
            if !Self::is_protected(priority) {
                let _ = doomed.push(priority);
            }
        }
        for priority in doomed {
            self.inputs.remove(&priority);
        }
    }

    /// Pin the visible priority manually; disables auto-selection.
    ///
    /// Fails when the priority is not registered.
    pub fn set_priority(&mut self, priority: i32) -> bool {
        if !self.inputs.contains_key(&priority) {
            return false;
        }
        self.manual_priority = priority;
        self.source_auto_select = false;
        true
    }

    /// Enable or disable lowest-wins auto-selection.
    pub fn set_source_auto_select(&mut self, enable: bool) {
        self.source_auto_select = enable;
        if enable {
            self.manual_priority = LOWEST_PRIORITY;
        }
    }

    pub const fn is_source_auto_select(&self) -> bool {
        self.source_auto_select
    }

    /// The currently visible priority as of the last `update`.
    pub const fn current_priority(&self) -> i32 {
        self.current_priority
    }

    /// The priority that was visible before the current one.
    pub const fn previous_priority(&self) -> i32 {
        self.previous_priority
    }

    /// Whether a priority is registered (active or not).
    pub fn has_priority(&self, priority: i32) -> bool {
        self.inputs.contains_key(&priority)
    }

    /// Sorted list of active (data-carrying, non-expired) priorities.
    pub fn priorities(&self) -> Vec<i32, MAX_PRIORITIES> {
        let mut out: Vec<i32, MAX_PRIORITIES> = Vec::new();
        for (&priority, info) in &self.inputs {
            if info.is_active() {
                let _ = out.push(priority);
            }
        }
        out.sort_unstable();
        out
    }

    /// Channel snapshot for one priority.
    pub fn input_info(
        &self,
        priority: i32,
    ) -> Result<&InputInfo<MAX_LEDS, MAX_PIXELS>, MuxerError> {
        if priority == LOWEST_PRIORITY {
            return Ok(&self.lowest_info);
        }
        self.inputs.get(&priority).ok_or(MuxerError::InvalidPriority)
    }

    /// Channel snapshot of the visible priority; falls back to the
    /// all-black sentinel.
    pub fn current_info(&self) -> &InputInfo<MAX_LEDS, MAX_PIXELS> {
        self.inputs
            .get(&self.current_priority)
            .unwrap_or(&self.lowest_info)
    }

    /// Prune expired channels and re-resolve the visible priority.
    ///
    /// Precedence is total: a valid manual pin beats the lowest active
    /// priority, which beats the [`LOWEST_PRIORITY`] sentinel. A pinned
    /// channel that expires or is cleared re-enables auto-selection.
    pub fn update(&mut self, now: Instant) -> MuxerUpdate {
        let now_ms = now.as_millis() as i64;

        // Expiry is strict: a channel with timeout T stays active at
        // exactly T and is removed afterwards.
        let mut expired: Vec<i32, MAX_PRIORITIES> = Vec::new();
        for (&priority, info) in &self.inputs {
            if info.timeout_time_ms >= 0 && now_ms > info.timeout_time_ms {
                let _ = expired.push(priority);
            }
        }
        for priority in &expired {
            self.inputs.remove(priority);
        }

        if !self.source_auto_select
            && !self
                .inputs
                .get(&self.manual_priority)
                .is_some_and(InputInfo::is_active)
        {
            // The pinned channel is gone; fall back to lowest-wins.
            self.source_auto_select = true;
            self.manual_priority = LOWEST_PRIORITY;
        }

        let active = self.priorities();
        let visible = if self.source_auto_select {
            active.first().copied().unwrap_or(LOWEST_PRIORITY)
        } else {
            self.manual_priority
        };

        let mut update = MuxerUpdate {
            priorities_changed: active != self.prev_active,
            visible_changed: None,
        };
        if visible != self.current_priority {
            self.previous_priority = self.current_priority;
            self.current_priority = visible;
            update.visible_changed = Some(visible);
        }
        self.prev_active = active;
        update
    }

    const fn is_protected(priority: i32) -> bool {
        priority >= BACKGROUND_PRIORITY
    }

    fn absolute_timeout(timeout_ms: i64, now: Instant) -> i64 {
        if timeout_ms >= 0 {
            now.as_millis() as i64 + timeout_ms
        } else {
            TIMEOUT_ENDLESS
        }
    }
}
