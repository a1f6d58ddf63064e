//! Producer-facing commands.
//!
//! Foreign-thread producers drive the engine exclusively through these
//! messages; the engine drains them in arrival order at the start of
//! every tick, so all muxer and smoothing mutation stays on one thread.

use heapless::Vec;

use crate::channel::{Channel, Receiver, Sender};
use crate::color::Rgb;
use crate::component::Component;
use crate::image::ImageFrame;
use crate::muxer::OriginString;

/// A request to change the pipeline state.
#[derive(Debug, Clone)]
pub enum Command<const MAX_LEDS: usize, const MAX_PIXELS: usize> {
    /// Register (or refresh) a priority channel.
    Register {
        priority: i32,
        component: Component,
        origin: OriginString,
        owner: OriginString,
        smooth_cfg: usize,
    },
    /// Write a color payload; tiled to the hardware LED count.
    SetColor {
        priority: i32,
        colors: Vec<Rgb, MAX_LEDS>,
        timeout_ms: i64,
        /// Clear a running effect on the same priority first.
        clear_effects: bool,
    },
    /// Write an image payload.
    SetImage {
        priority: i32,
        image: ImageFrame<MAX_PIXELS>,
        timeout_ms: i64,
    },
    /// Take a channel out of arbitration, keeping its registration.
    SetInactive { priority: i32 },
    /// Remove one priority channel.
    Clear { priority: i32 },
    /// Remove all channels; `force` also removes protected ones.
    ClearAll { force: bool },
    /// Enable or disable lowest-wins auto-selection.
    SetAutoSelect(bool),
    /// Pin the visible priority manually.
    SetVisiblePriority(i32),
    /// Enable or disable the smoothing engine.
    SetSmoothingEnable(bool),
    /// Suppress or resume smoothed device emission.
    SetSmoothingPause(bool),
}

/// Type alias for a command sender handle.
pub type CommandSender<'a, const MAX_LEDS: usize, const MAX_PIXELS: usize, const SIZE: usize> =
    Sender<'a, Command<MAX_LEDS, MAX_PIXELS>, SIZE>;

/// Type alias for the engine-side command receiver.
pub type CommandReceiver<'a, const MAX_LEDS: usize, const MAX_PIXELS: usize, const SIZE: usize> =
    Receiver<'a, Command<MAX_LEDS, MAX_PIXELS>, SIZE>;

/// Type alias for the command channel.
pub type CommandChannel<const MAX_LEDS: usize, const MAX_PIXELS: usize, const SIZE: usize> =
    Channel<Command<MAX_LEDS, MAX_PIXELS>, SIZE>;
