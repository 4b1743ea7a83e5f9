//! Video frames and crop regions
//!
//! Frames are 8-bit luma planes. Decoding lives outside this workspace;
//! sources hand over already-decoded gray frames.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Rectangular crop region `[x_start, x_end) x [y_start, y_end)`
///
/// Any missing bound falls back to the frame edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    #[serde(default)]
    pub x_start: Option<u32>,
    #[serde(default)]
    pub x_end: Option<u32>,
    #[serde(default)]
    pub y_start: Option<u32>,
    #[serde(default)]
    pub y_end: Option<u32>,
}

impl CropRegion {
    /// Crop with all four bounds set
    pub fn new(x_start: u32, x_end: u32, y_start: u32, y_end: u32) -> Self {
        Self {
            x_start: Some(x_start),
            x_end: Some(x_end),
            y_start: Some(y_start),
            y_end: Some(y_end),
        }
    }

    /// Crop covering the whole frame
    pub fn full() -> Self {
        Self::default()
    }

    /// Resolve against a frame size, clamping to its edges
    ///
    /// Returns `(x0, x1, y0, y1)`, or `None` when the clamped region is empty.
    pub fn resolve(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x_start.unwrap_or(0).min(width);
        let x1 = self.x_end.unwrap_or(width).min(width);
        let y0 = self.y_start.unwrap_or(0).min(height);
        let y1 = self.y_end.unwrap_or(height).min(height);
        if x0 >= x1 || y0 >= y1 {
            None
        } else {
            Some((x0, x1, y0, y1))
        }
    }

    /// Whether explicit bounds are ordered (start < end)
    pub fn is_ordered(&self) -> bool {
        let x_ok = match (self.x_start, self.x_end) {
            (Some(s), Some(e)) => s < e,
            _ => true,
        };
        let y_ok = match (self.y_start, self.y_end) {
            (Some(s), Some(e)) => s < e,
            _ => true,
        };
        x_ok && y_ok
    }
}

/// Decoded gray frame
#[derive(Debug, Clone)]
pub struct GrayFrame {
    pub width: u32,
    pub height: u32,
    /// Row-major luma, `width * height` bytes (zero-copy)
    pub data: Bytes,
}

impl GrayFrame {
    /// Mean luma inside `crop`; `None` when the crop misses the frame
    pub fn mean_brightness(&self, crop: &CropRegion) -> Option<f64> {
        let (x0, x1, y0, y1) = crop.resolve(self.width, self.height)?;
        let stride = self.width as usize;
        let mut total: u64 = 0;
        for y in y0 as usize..y1 as usize {
            let row = &self.data[y * stride + x0 as usize..y * stride + x1 as usize];
            total += row.iter().map(|&v| v as u64).sum::<u64>();
        }
        let count = (x1 - x0) as u64 * (y1 - y0) as u64;
        Some(total as f64 / count as f64)
    }
}
