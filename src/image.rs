//! Image payloads and image-to-LED color reduction.
//!
//! Grabbers and network clients can feed whole frames instead of
//! per-LED colors. The engine reduces such a frame to one color per LED
//! through the [`ImageReducer`] seam; [`MeanColorReducer`] is the
//! built-in reduction, averaging the pixels of one vertical strip per
//! LED.

use heapless::Vec;

use crate::color::{BLACK, Rgb};

/// A bounded row-major RGB image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame<const MAX_PIXELS: usize> {
    width: usize,
    height: usize,
    pixels: Vec<Rgb, MAX_PIXELS>,
}

impl<const MAX_PIXELS: usize> ImageFrame<MAX_PIXELS> {
    /// Build an image from row-major pixel data.
    ///
    /// Returns `None` when the dimensions do not match the pixel count
    /// or exceed the capacity.
    pub fn new(width: usize, height: usize, pixels: &[Rgb]) -> Option<Self> {
        if width * height != pixels.len() || pixels.len() > MAX_PIXELS {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels: Vec::from_slice(pixels).ok()?,
        })
    }

    /// A single-pixel image, equivalent to a plain color.
    pub fn solid(color: Rgb) -> Self {
        let mut pixels = Vec::new();
        let _ = pixels.push(color);
        Self { width: 1, height: 1, pixels }
    }

    pub const fn width(&self) -> usize {
        self.width
    }

    pub const fn height(&self) -> usize {
        self.height
    }

    /// Total pixel count.
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Row-major pixel data.
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    /// Pixel at `(x, y)`; `None` outside the image.
    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[y * self.width + x])
    }
}

/// Reduction of an image frame to one color per LED.
///
/// This is the seam towards the color-extraction subsystem; anything
/// from a plain mean to k-means clustering can sit behind it.
pub trait ImageReducer<const MAX_PIXELS: usize> {
    /// Reduce `image` to `led_count` colors appended into `out`.
    ///
    /// `out` is cleared first; implementations must produce exactly
    /// `led_count` colors.
    fn reduce<const MAX_LEDS: usize>(
        &mut self,
        image: &ImageFrame<MAX_PIXELS>,
        led_count: usize,
        out: &mut Vec<Rgb, MAX_LEDS>,
    );
}

/// Mean-color reduction over one vertical strip of the image per LED.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanColorReducer;

impl<const MAX_PIXELS: usize> ImageReducer<MAX_PIXELS> for MeanColorReducer {
    fn reduce<const MAX_LEDS: usize>(
        &mut self,
        image: &ImageFrame<MAX_PIXELS>,
        led_count: usize,
        out: &mut Vec<Rgb, MAX_LEDS>,
    ) {
        assert!(led_count <= MAX_LEDS, "led count exceeds buffer capacity");
        out.clear();
        if image.is_empty() || led_count == 0 {
            for _ in 0..led_count {
                let _ = out.push(BLACK);
            }
            return;
        }

        let width = image.width();
        let height = image.height();
        for led in 0..led_count {
            // Equal-width strips; the last strip absorbs the remainder.
            let x0 = led * width / led_count;
            let mut x1 = (led + 1) * width / led_count;
            if x1 <= x0 {
                x1 = (x0 + 1).min(width);
            }

            let mut sum = [0u32; 3];
            let mut count = 0u32;
            for y in 0..height {
                for x in x0..x1 {
                    let p = image.pixels()[y * width + x];
                    sum[0] += u32::from(p.r);
                    sum[1] += u32::from(p.g);
                    sum[2] += u32::from(p.b);
                    count += 1;
                }
            }

            let color = if count == 0 {
                BLACK
            } else {
                Rgb {
                    r: (sum[0] / count) as u8,
                    g: (sum[1] / count) as u8,
                    b: (sum[2] / count) as u8,
                }
            };
            let _ = out.push(color);
        }
    }
}
