// THEORY:
// The `cell` module represents one rectangle of the grid partition and the
// compact numeric fingerprint derived from it. A cell is never stored on its
// own; it exists as a `CellBounds` over a borrowed `Frame` for the duration of
// one analysis call, and what survives is its `CellData` record.
//
// Key architectural principles:
// 1.  **Single Pass**: All statistics come out of one walk over the cell's
//     pixels. Channel sums, per-pixel intensity sums and their squares are
//     accumulated in integers, so the results are exact and identical no
//     matter how many times, or on which thread, a cell is analyzed.
// 2.  **Stored Order Inside, RGB Outside**: The loop works on stored triples.
//     The frame's `ChannelOrder` is applied only when a record is assembled.
// 3.  **Deterministic Dominant Color**: Distinct colors are enumerated in
//     ascending order of their stored bytes; the first color reaching the
//     maximal count wins.

use crate::core_modules::frame::Frame;
use crate::core_modules::pixel::{CHANNEL_MAX, CHANNELS, Rgb, normalize};
use serde::Serialize;

/// The pixel rectangle covered by one grid cell. Ranges are half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellBounds {
    pub row: usize,
    pub col: usize,
    pub y_start: usize,
    pub y_end: usize,
    pub x_start: usize,
    pub x_end: usize,
}

impl CellBounds {
    pub fn height(&self) -> usize {
        self.y_end - self.y_start
    }

    pub fn width(&self) -> usize {
        self.x_end - self.x_start
    }

    pub fn area(&self) -> usize {
        self.height() * self.width()
    }

    pub fn contains(&self, y: usize, x: usize) -> bool {
        (self.y_start..self.y_end).contains(&y) && (self.x_start..self.x_end).contains(&x)
    }
}

/// The statistics record produced for one cell of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellData {
    pub row: usize,
    pub col: usize,
    pub avg_red: f32,
    pub avg_green: f32,
    pub avg_blue: f32,
    pub brightness: f32,
    pub contrast: f32,
    /// Most frequent exact color, as normalized (red, green, blue).
    pub dominant_color: (f32, f32, f32),
}

impl CellData {
    pub fn average_color(&self) -> Rgb<f32> {
        Rgb {
            red: self.avg_red,
            green: self.avg_green,
            blue: self.avg_blue,
        }
    }

    pub fn dominant(&self) -> Rgb<f32> {
        let (red, green, blue) = self.dominant_color;
        Rgb { red, green, blue }
    }
}

/// Raw integer accumulators for one cell.
#[derive(Debug, Default)]
struct Accumulator {
    pixels: u64,
    channel_sums: [u64; CHANNELS],
    intensity_sum: u64,
    intensity_sq_sum: u128,
    colors: Vec<u32>,
}

impl Accumulator {
    fn with_capacity(pixels: usize) -> Self {
        Self {
            colors: Vec::with_capacity(pixels),
            ..Self::default()
        }
    }

    #[inline]
    fn push(&mut self, px: &[u8]) {
        let (c0, c1, c2) = (px[0] as u64, px[1] as u64, px[2] as u64);
        self.channel_sums[0] += c0;
        self.channel_sums[1] += c1;
        self.channel_sums[2] += c2;
        // Three times the per-pixel intensity, kept integral.
        let s = c0 + c1 + c2;
        self.intensity_sum += s;
        self.intensity_sq_sum += (s * s) as u128;
        self.colors.push(pack(px));
        self.pixels += 1;
    }

    /// Mean of each stored channel, still in stored order, in 0..=255.
    fn channel_means(&self) -> [f64; CHANNELS] {
        let n = self.pixels as f64;
        self.channel_sums.map(|sum| sum as f64 / n)
    }

    fn brightness(&self) -> f32 {
        let mean = self.intensity_sum as f64 / (CHANNELS as f64 * self.pixels as f64);
        normalize(mean)
    }

    /// Population standard deviation of per-pixel intensity, normalized.
    fn contrast(&self) -> f32 {
        let n = self.pixels as u128;
        let sum = self.intensity_sum as u128;
        // n * sum(s^2) >= sum(s)^2 by Cauchy-Schwarz, so this never underflows.
        let spread = n * self.intensity_sq_sum - sum * sum;
        let variance = spread as f64 / (9.0 * (n * n) as f64);
        (variance.sqrt() / CHANNEL_MAX).clamp(0.0, 1.0) as f32
    }

    /// Stored triple of the most frequent color; ties go to the smallest.
    fn dominant_stored(&mut self) -> [u8; 3] {
        self.colors.sort_unstable();
        let mut best = (self.colors[0], 0usize);
        for run in self.colors.chunk_by(|a, b| a == b) {
            if run.len() > best.1 {
                best = (run[0], run.len());
            }
        }
        unpack(best.0)
    }
}

#[inline]
fn pack(px: &[u8]) -> u32 {
    ((px[0] as u32) << 16) | ((px[1] as u32) << 8) | px[2] as u32
}

#[inline]
fn unpack(key: u32) -> [u8; 3] {
    [(key >> 16) as u8, (key >> 8) as u8, key as u8]
}

/// Computes the statistics record for the cell `bounds` of `frame`.
///
/// `bounds` must be non-empty and lie inside the frame; the grid analyzer
/// guarantees both before calling in.
pub fn analyze_cell(frame: &Frame<'_>, bounds: &CellBounds) -> CellData {
    let mut acc = Accumulator::with_capacity(bounds.area());
    for y in bounds.y_start..bounds.y_end {
        for px in frame
            .row_span(y, bounds.x_start, bounds.x_end)
            .chunks_exact(CHANNELS)
        {
            acc.push(px);
        }
    }

    let order = frame.order();
    let means = order.to_rgb(acc.channel_means());
    let dominant = order.to_rgb(acc.dominant_stored()).normalized();

    CellData {
        row: bounds.row,
        col: bounds.col,
        avg_red: normalize(means.red),
        avg_green: normalize(means.green),
        avg_blue: normalize(means.blue),
        brightness: acc.brightness(),
        contrast: acc.contrast(),
        dominant_color: (dominant.red, dominant.green, dominant.blue),
    }
}
