//! Frame data structures for captured camera content

use image::RgbImage;
use std::time::Instant;

/// A captured frame from the camera
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw RGB pixel data
    pub image: RgbImage,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl Frame {
    /// Create a new captured frame
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            timestamp: Instant::now(),
        }
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
