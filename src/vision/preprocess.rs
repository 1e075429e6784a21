//! Image preprocessing for serial-number OCR
//!
//! Turns a raw camera frame into a straightened black-and-white image:
//! grayscale, skew correction, fixed-threshold binarization and the
//! operator-selected rotation, in that order.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::edges::canny;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::hough::{detect_lines, LineDetectionOptions};
use tracing::debug;

use crate::capture::Frame;
use crate::config::PreprocessSettings;
use crate::shared::{OperatorControls, Rotation};

/// Longest side of the thumbnail used for skew estimation
const SKEW_SAMPLE_SIZE: u32 = 512;
/// Canny hysteresis thresholds for the skew edge map
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 100.0;
/// Lines whose normal is further than this from vertical are ignored
const MAX_SKEW_DEGREES: i32 = 45;

/// Single-channel image ready for text extraction
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    /// Binarized image (0 or 255)
    pub image: GrayImage,
    /// Skew that was corrected, in degrees clockwise
    pub skew_degrees: f32,
}

/// Converts frames into OCR-ready images
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    /// Estimate and correct skew before binarization
    deskew: bool,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self { deskew: true }
    }
}

impl ImagePreprocessor {
    /// Create a preprocessor from configuration
    pub fn from_settings(settings: &PreprocessSettings) -> Self {
        Self {
            deskew: settings.deskew,
        }
    }

    /// Run the full preprocessing chain on a frame
    pub fn process(&self, frame: &Frame, controls: &OperatorControls) -> PreprocessedImage {
        let gray = to_grayscale(&frame.image);

        let (straight, skew_degrees) = if self.deskew {
            let angle = estimate_skew(&gray);
            (deskew(&gray, angle), angle)
        } else {
            (gray, 0.0)
        };

        let binary = binarize(&straight, controls.threshold);
        let image = apply_rotation(&binary, controls.rotation);

        debug!(
            "Preprocessed frame: skew={:.1}°, threshold={}, rotation={}",
            skew_degrees, controls.threshold, controls.rotation
        );

        PreprocessedImage { image, skew_degrees }
    }
}

/// Convert an RGB frame to luma
pub fn to_grayscale(image: &RgbImage) -> GrayImage {
    imageops::grayscale(image)
}

/// Estimate the dominant text skew in degrees.
///
/// Positive values mean lines descend to the right (clockwise skew). Returns
/// 0.0 when no dominant orientation is found.
pub fn estimate_skew(gray: &GrayImage) -> f32 {
    let (width, height) = gray.dimensions();
    if width < 8 || height < 8 {
        return 0.0;
    }

    // Skew is scale invariant, so work on a thumbnail
    let longest = width.max(height);
    let sample = if longest > SKEW_SAMPLE_SIZE {
        let scale = SKEW_SAMPLE_SIZE as f32 / longest as f32;
        let w = ((width as f32 * scale) as u32).max(1);
        let h = ((height as f32 * scale) as u32).max(1);
        imageops::resize(gray, w, h, FilterType::Triangle)
    } else {
        gray.clone()
    };

    let edges = canny(&sample, CANNY_LOW, CANNY_HIGH);
    let options = LineDetectionOptions {
        vote_threshold: (sample.width() / 4).max(20),
        suppression_radius: 8,
    };

    // A horizontal line has its normal at 90 degrees
    let mut skews: Vec<i32> = detect_lines(&edges, options)
        .into_iter()
        .map(|line| line.angle_in_degrees as i32 - 90)
        .filter(|skew| skew.abs() <= MAX_SKEW_DEGREES)
        .collect();

    if skews.is_empty() {
        return 0.0;
    }

    skews.sort_unstable();
    let mid = skews.len() / 2;
    let median = if skews.len() % 2 == 0 {
        (skews[mid - 1] + skews[mid]) as f32 / 2.0
    } else {
        skews[mid] as f32
    };

    debug!("Skew estimate {:.1}° from {} lines", median, skews.len());
    median
}

/// Rotate the image to undo `skew_degrees`, keeping the canvas size
pub fn deskew(gray: &GrayImage, skew_degrees: f32) -> GrayImage {
    if skew_degrees.abs() < f32::EPSILON {
        return gray.clone();
    }
    rotate_about_center(
        gray,
        -skew_degrees.to_radians(),
        Interpolation::Bilinear,
        Luma([255u8]),
    )
}

/// Binarize: pixels at or above `threshold` become white, the rest black
pub fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    let mut output = gray.clone();
    for pixel in output.pixels_mut() {
        pixel.0[0] = if pixel.0[0] >= threshold { 255 } else { 0 };
    }
    output
}

/// Apply the operator's fixed rotation
pub fn apply_rotation(image: &GrayImage, rotation: Rotation) -> GrayImage {
    match rotation {
        Rotation::None => image.clone(),
        Rotation::Cw90 => imageops::rotate90(image),
        Rotation::Cw180 => imageops::rotate180(image),
        Rotation::Cw270 => imageops::rotate270(image),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// White canvas with a thick dark horizontal bar
    fn bar_image() -> GrayImage {
        GrayImage::from_fn(200, 200, |x, y| {
            if (20..180).contains(&x) && (90..110).contains(&y) {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }

    #[test]
    fn test_grayscale_keeps_dimensions() {
        let rgb = RgbImage::from_pixel(6, 4, Rgb([255, 0, 0]));
        let gray = to_grayscale(&rgb);
        assert_eq!(gray.dimensions(), (6, 4));
        assert!(gray.get_pixel(0, 0).0[0] > 0);
    }

    #[test]
    fn test_binarize_boundary_is_inclusive() {
        let gray = GrayImage::from_raw(4, 1, vec![0, 179, 180, 250]).unwrap();
        let binary = binarize(&gray, 180);
        assert_eq!(binary.as_raw(), &vec![0, 0, 255, 255]);
    }

    #[test]
    fn test_binarize_extremes() {
        let gray = GrayImage::from_raw(3, 1, vec![0, 128, 255]).unwrap();
        assert_eq!(binarize(&gray, 0).as_raw(), &vec![255, 255, 255]);
        assert_eq!(binarize(&gray, 255).as_raw(), &vec![0, 0, 255]);
    }

    #[test]
    fn test_blank_image_has_no_skew() {
        let blank = GrayImage::from_pixel(100, 60, Luma([255]));
        assert_eq!(estimate_skew(&blank), 0.0);
    }

    #[test]
    fn test_tiny_image_has_no_skew() {
        let tiny = GrayImage::from_pixel(3, 3, Luma([0]));
        assert_eq!(estimate_skew(&tiny), 0.0);
    }

    #[test]
    fn test_horizontal_bar_is_straight() {
        let angle = estimate_skew(&bar_image());
        assert!(angle.abs() <= 1.0, "expected ~0°, got {angle}");
    }

    #[test]
    fn test_rotated_bar_is_detected_and_corrected() {
        let tilted = rotate_about_center(
            &bar_image(),
            5f32.to_radians(),
            Interpolation::Bilinear,
            Luma([255u8]),
        );

        let angle = estimate_skew(&tilted);
        assert!((angle - 5.0).abs() <= 1.5, "expected ~5°, got {angle}");

        let straightened = deskew(&tilted, angle);
        assert_eq!(straightened.dimensions(), tilted.dimensions());
        let residual = estimate_skew(&straightened);
        assert!(residual.abs() <= 1.5, "expected ~0° after deskew, got {residual}");
    }

    #[test]
    fn test_rotation_dimensions() {
        let image = GrayImage::from_pixel(6, 4, Luma([0]));
        assert_eq!(apply_rotation(&image, Rotation::None).dimensions(), (6, 4));
        assert_eq!(apply_rotation(&image, Rotation::Cw90).dimensions(), (4, 6));
        assert_eq!(apply_rotation(&image, Rotation::Cw180).dimensions(), (6, 4));
        assert_eq!(apply_rotation(&image, Rotation::Cw270).dimensions(), (4, 6));
    }

    #[test]
    fn test_rotation_moves_pixels() {
        let mut image = GrayImage::from_pixel(3, 2, Luma([0]));
        image.put_pixel(0, 0, Luma([255]));

        let cw90 = apply_rotation(&image, Rotation::Cw90);
        assert_eq!(cw90.get_pixel(1, 0).0[0], 255);

        let cw180 = apply_rotation(&image, Rotation::Cw180);
        assert_eq!(cw180.get_pixel(2, 1).0[0], 255);
    }

    #[test]
    fn test_process_applies_threshold_and_rotation() {
        let frame = Frame::new(RgbImage::from_fn(8, 4, |x, _| {
            if x < 4 {
                Rgb([20, 20, 20])
            } else {
                Rgb([240, 240, 240])
            }
        }));
        let mut controls = OperatorControls::default();
        controls.set_threshold(128);
        controls.rotation = Rotation::Cw90;

        let preprocessor = ImagePreprocessor { deskew: false };
        let result = preprocessor.process(&frame, &controls);

        assert_eq!(result.image.dimensions(), (4, 8));
        assert!(result.image.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(result.skew_degrees, 0.0);
    }
}
