use serde::{Deserialize, Serialize};

/// Maps boundary-centered physical coordinates onto a raster whose origin is
/// the top-left corner of the boundary's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleHelper {
    /// Pixels per physical unit.
    pub rate: f64,
    pub half_width: f64,
    pub half_height: f64,
}

impl ScaleHelper {
    pub fn new(rate: f64, half_width: f64, half_height: f64) -> Self {
        ScaleHelper { rate, half_width, half_height }
    }

    /// Scale for a raster `height` pixels tall that fits the ellipse `half_width x half_height`.
    pub fn for_boundary(height: u32, half_width: f64, half_height: f64) -> Self {
        Self::new(height as f64 / half_height, half_width, half_height)
    }

    pub fn scale(&self, x: f64) -> i64 {
        (self.rate * x).round() as i64
    }

    pub fn scale_keep_float(&self, x: f64) -> f64 {
        self.rate * x
    }

    pub fn scale_position(&self, x: f64, y: f64) -> (i64, i64) {
        (
            (self.rate * (x + self.half_width)).round() as i64,
            (self.rate * (y + self.half_height)).round() as i64,
        )
    }

    /// Inverse of [`Self::scale_position`], up to rounding.
    pub fn unscale_position(&self, px: i64, py: i64) -> (f64, f64) {
        (px as f64 / self.rate - self.half_width, py as f64 / self.rate - self.half_height)
    }

    /// Raster center: the image of the boundary center.
    pub fn center(&self) -> (i64, i64) {
        (self.scale(self.half_width), self.scale(self.half_height))
    }

    /// Full raster size `(width, height)` covering the boundary's bounding box.
    pub fn raster_size(&self) -> (u32, u32) {
        (
            (2.0 * self.half_width * self.rate).round() as u32,
            (2.0 * self.half_height * self.rate).round() as u32,
        )
    }
}
