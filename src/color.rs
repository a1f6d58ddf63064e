//! LED color primitives.
//!
//! The crate works on plain 8-bit RGB tuples. Device-specific channel
//! ordering is handled here as a final rewrite step before a frame is
//! handed to the output driver.

use heapless::Vec;
use smart_leds::RGB8;

pub type Rgb = RGB8;

/// All channels off.
pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

/// Physical wiring order of the LED color channels.
///
/// Values are stored RGB internally; the order is applied once per frame
/// right before the device write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorOrder {
    #[default]
    Rgb,
    Bgr,
    Rbg,
    Grb,
    Gbr,
    Brg,
}

impl ColorOrder {
    /// Parse a wiring order from its lowercase config name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "rgb" => Self::Rgb,
            "bgr" => Self::Bgr,
            "rbg" => Self::Rbg,
            "grb" => Self::Grb,
            "gbr" => Self::Gbr,
            "brg" => Self::Brg,
            _ => return None,
        })
    }

    /// Name of the wiring order.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rgb => "rgb",
            Self::Bgr => "bgr",
            Self::Rbg => "rbg",
            Self::Grb => "grb",
            Self::Gbr => "gbr",
            Self::Brg => "brg",
        }
    }

    /// Reorder one color from logical RGB into this wiring order.
    pub const fn apply(self, c: Rgb) -> Rgb {
        match self {
            Self::Rgb => c,
            Self::Bgr => Rgb { r: c.b, g: c.g, b: c.r },
            Self::Rbg => Rgb { r: c.r, g: c.b, b: c.g },
            Self::Grb => Rgb { r: c.g, g: c.r, b: c.b },
            Self::Gbr => Rgb { r: c.g, g: c.b, b: c.r },
            Self::Brg => Rgb { r: c.b, g: c.r, b: c.g },
        }
    }

    /// Reorder a whole frame in place.
    pub fn apply_all(self, frame: &mut [Rgb]) {
        if matches!(self, Self::Rgb) {
            return;
        }
        for led in frame {
            *led = self.apply(*led);
        }
    }
}

/// Fill `out` with `count` colors by cyclically tiling `colors`.
///
/// A single input color fills the whole buffer; a longer input is
/// truncated. An empty input is a programming error.
///
/// # Panics
///
/// Panics if `colors` is empty or `count` exceeds the buffer capacity.
pub fn fill_tiled<const N: usize>(count: usize, colors: &[Rgb], out: &mut Vec<Rgb, N>) {
    assert!(!colors.is_empty(), "cannot tile an empty color list");
    assert!(count <= N, "led count exceeds buffer capacity");
    out.clear();
    for i in 0..count {
        // Capacity checked above.
        let _ = out.push(colors[i % colors.len()]);
    }
}
