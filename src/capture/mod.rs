//! Frame Capture Layer
//!
//! The camera is a collaborator of the pipeline: anything that can hand over
//! one frame per tick implements [`FrameSource`]. The bundled source replays
//! still images from disk, which is how recorded sessions and tests feed the
//! scanner.

pub mod frame;

use image::imageops::FilterType;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::CaptureSettings;
use crate::error::{Result, ScanError};

pub use frame::Frame;

/// File extensions picked up when replaying a directory
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

/// Source of camera frames, polled once per tick
pub trait FrameSource {
    /// Grab the next frame
    fn grab(&mut self) -> Result<Frame>;
}

/// Replays a single image or a directory of images as a looping feed
pub struct ImageSequenceSource {
    /// Image files in playback order
    paths: Vec<PathBuf>,
    /// Index of the next file to load
    cursor: usize,
    /// Output size, `None` to keep each file's own size
    size: Option<(u32, u32)>,
}

impl ImageSequenceSource {
    /// Open a file or directory as a frame source.
    ///
    /// Fails when the path holds no readable images, since a scanner without
    /// input cannot do anything useful.
    pub fn open(path: &Path, width: u32, height: u32) -> Result<Self> {
        let paths = if path.is_dir() {
            let mut paths: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && has_image_extension(p))
                .collect();
            paths.sort();
            paths
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(ScanError::Capture(format!(
                "frame source {} does not exist",
                path.display()
            )));
        };

        if paths.is_empty() {
            return Err(ScanError::Capture(format!(
                "no images found in {}",
                path.display()
            )));
        }

        let size = (width > 0 && height > 0).then_some((width, height));
        info!("Opened frame source {:?} ({} images)", path, paths.len());

        Ok(Self {
            paths,
            cursor: 0,
            size,
        })
    }

    /// Open the source named in the capture settings
    pub fn from_settings(settings: &CaptureSettings) -> Result<Self> {
        let source = settings
            .source
            .as_deref()
            .ok_or_else(|| ScanError::Config("capture.source is not set".to_string()))?;
        Self::open(source, settings.width, settings.height)
    }

    /// Number of images in the sequence
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the sequence is empty (never true for an opened source)
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn grab(&mut self) -> Result<Frame> {
        let path = &self.paths[self.cursor];
        self.cursor = (self.cursor + 1) % self.paths.len();

        let mut image = image::open(path)
            .map_err(|e| ScanError::Capture(format!("failed to read {}: {}", path.display(), e)))?
            .to_rgb8();

        if let Some((width, height)) = self.size {
            if image.dimensions() != (width, height) {
                image = image::imageops::resize(&image, width, height, FilterType::Triangle);
            }
        }

        debug!("Grabbed frame {:?} {:?}", path, image.dimensions());
        Ok(Frame::new(image))
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_image(dir: &Path, name: &str, width: u32, height: u32, value: u8) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(width, height, Rgb([value, value, value]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_single_file_source_loops() {
        let dir = TempDir::new().unwrap();
        let path = write_image(dir.path(), "frame.png", 4, 3, 10);

        let mut source = ImageSequenceSource::open(&path, 0, 0).unwrap();
        assert_eq!(source.len(), 1);
        for _ in 0..3 {
            let frame = source.grab().unwrap();
            assert_eq!(frame.dimensions(), (4, 3));
        }
    }

    #[test]
    fn test_directory_source_sorted_and_resized() {
        let dir = TempDir::new().unwrap();
        write_image(dir.path(), "b.png", 4, 4, 200);
        write_image(dir.path(), "a.png", 4, 4, 10);
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), 8, 6).unwrap();
        assert_eq!(source.len(), 2);

        let first = source.grab().unwrap();
        assert_eq!(first.dimensions(), (8, 6));
        assert_eq!(first.image.get_pixel(0, 0).0[0], 10);

        let second = source.grab().unwrap();
        assert_eq!(second.image.get_pixel(0, 0).0[0], 200);

        let wrapped = source.grab().unwrap();
        assert_eq!(wrapped.image.get_pixel(0, 0).0[0], 10);
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(ImageSequenceSource::open(dir.path(), 0, 0).is_err());
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let result = ImageSequenceSource::open(Path::new("/nonexistent/frames"), 0, 0);
        assert!(matches!(result, Err(ScanError::Capture(_))));
    }

    #[test]
    fn test_from_settings_requires_source() {
        let settings = CaptureSettings::default();
        assert!(matches!(
            ImageSequenceSource::from_settings(&settings),
            Err(ScanError::Config(_))
        ));
    }
}
