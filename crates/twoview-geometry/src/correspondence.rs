use glam::DVec2;
use serde::{Deserialize, Serialize};

/// A matched pixel pair: `(x0, y0)` in the primary view, `(x1, y1)` in the secondary view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    /// x coordinate in the primary view.
    pub x0: f64,
    /// y coordinate in the primary view.
    pub y0: f64,
    /// x coordinate in the secondary view.
    pub x1: f64,
    /// y coordinate in the secondary view.
    pub y1: f64,
}

impl Correspondence {
    /// Creates a correspondence from its four pixel coordinates.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Creates a correspondence from the two observed pixels.
    pub fn from_pixels(p0: DVec2, p1: DVec2) -> Self {
        Self::new(p0.x, p0.y, p1.x, p1.y)
    }

    /// Pixel in the primary view.
    pub fn primary(&self) -> DVec2 {
        DVec2::new(self.x0, self.y0)
    }

    /// Pixel in the secondary view.
    pub fn secondary(&self) -> DVec2 {
        DVec2::new(self.x1, self.y1)
    }

    /// Image-space motion from the primary to the secondary pixel.
    pub fn displacement(&self) -> DVec2 {
        self.secondary() - self.primary()
    }

    /// Magnitude of the displacement in pixels.
    pub fn disparity(&self) -> f64 {
        self.displacement().length()
    }
}
