#![no_std]

pub mod channel;
pub mod color;
pub mod command;
pub mod component;
pub mod engine;
pub mod image;
pub mod muxer;
pub mod scheduler;
pub mod smoothing;

pub use channel::{Channel, Receiver, Sender, TryReceiveError, TrySendError};
pub use command::{Command, CommandChannel, CommandReceiver, CommandSender};
pub use component::Component;
pub use engine::{DEFAULT_UPDATE_INTERVAL, Engine, EngineConfig, FrameListener, NullListener};
pub use image::{ImageFrame, ImageReducer, MeanColorReducer};
pub use muxer::{
    BACKGROUND_PRIORITY, FOREGROUND_PRIORITY, InputInfo, LOWEST_PRIORITY, MuxerError, MuxerUpdate,
    PriorityMuxer, TIMEOUT_ENDLESS, TIMEOUT_INACTIVE,
};
pub use scheduler::{TickResult, UpdateScheduler};
pub use smoothing::{
    CFG_PAUSE, CFG_SYSTEM, Smoothing, SmoothingCfg, SmoothingError, SmoothingType,
};

pub use color::{BLACK, ColorOrder, Rgb};
pub use embassy_time::{Duration, Instant};

/// Abstract LED driver trait
///
/// Implement this trait to support different hardware platforms.
/// The update engine is generic over this trait.
pub trait OutputDriver {
    /// Write colors to the LED strip
    fn write(&mut self, colors: &[Rgb]);
}
