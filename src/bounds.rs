//! Content Bounds Detection module
//!
//! Locates the rectangle holding page content in a scanned image by
//! thresholding the mean luminance of every row and every column.
//!
//! # Example
//!
//! ```rust,no_run
//! use pagecrop::{BoundsOptions, ContentBoundsDetector};
//!
//! let options = BoundsOptions::builder().threshold(240).padding(16).build();
//! let rect = ContentBoundsDetector::detect_path("page_001.png".as_ref(), &options).unwrap();
//! println!("Detected bounds: {}", rect);
//! ```

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Default luminance cutoff separating background from content
pub const DEFAULT_THRESHOLD: u8 = 250;

/// Default margin in pixels kept around detected content
pub const DEFAULT_PADDING: u32 = 10;

/// Bounds detection error types
#[derive(Debug, Error)]
pub enum BoundsError {
    #[error("Image not found: {0}")]
    ImageNotFound(PathBuf),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("No content detected in image")]
    NoContentDetected,

    #[error("Invalid rectangle {0}: left must be less than right and top less than bottom")]
    InvalidRectangle(CropRect),
}

pub type Result<T> = std::result::Result<T, BoundsError>;

/// Bounds detection options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundsOptions {
    /// Rows and columns whose mean luminance is below this value are content (0-255)
    pub threshold: u8,
    /// Extra margin in pixels kept around the detected content
    pub padding: u32,
}

impl Default for BoundsOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            padding: DEFAULT_PADDING,
        }
    }
}

impl BoundsOptions {
    /// Create a new options builder
    pub fn builder() -> BoundsOptionsBuilder {
        BoundsOptionsBuilder::default()
    }

    /// Treat anything that is not pure white as content
    pub fn strict() -> Self {
        Self {
            threshold: 254,
            ..Default::default()
        }
    }
}

/// Builder for BoundsOptions
#[derive(Debug, Default)]
pub struct BoundsOptionsBuilder {
    options: BoundsOptions,
}

impl BoundsOptionsBuilder {
    /// Set luminance threshold (0-255)
    pub fn threshold(mut self, threshold: u8) -> Self {
        self.options.threshold = threshold;
        self
    }

    /// Set padding in pixels
    pub fn padding(mut self, padding: u32) -> Self {
        self.options.padding = padding;
        self
    }

    /// Build the options
    pub fn build(self) -> BoundsOptions {
        self.options
    }
}

/// Crop rectangle in pixel space.
///
/// `right` and `bottom` are exclusive, so the rectangle covers
/// `left..right` by `top..bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRect {
    /// Create a rectangle, rejecting empty or inverted ones
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Result<Self> {
        let rect = Self {
            left,
            top,
            right,
            bottom,
        };
        if rect.is_valid() {
            Ok(rect)
        } else {
            Err(BoundsError::InvalidRectangle(rect))
        }
    }

    /// Build from `[left, top, right, bottom]`
    pub fn from_slice(values: &[u32]) -> Option<Result<Self>> {
        match values {
            [left, top, right, bottom] => Some(Self::new(*left, *top, *right, *bottom)),
            _ => None,
        }
    }

    /// Whether `left < right` and `top < bottom`
    pub fn is_valid(&self) -> bool {
        self.left < self.right && self.top < self.bottom
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Clamp to an image of the given size.
    ///
    /// Returns `None` when nothing of the rectangle is left inside the image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<CropRect> {
        let clamped = CropRect {
            left: self.left.min(width),
            top: self.top.min(height),
            right: self.right.min(width),
            bottom: self.bottom.min(height),
        };
        clamped.is_valid().then_some(clamped)
    }

    /// Whether `other` lies entirely inside this rectangle
    pub fn contains(&self, other: &CropRect) -> bool {
        self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }

    /// Crop `image`, clamping the rectangle to its dimensions first
    pub fn crop(&self, image: &DynamicImage) -> Option<DynamicImage> {
        let rect = self.clamp_to(image.width(), image.height())?;
        Some(image.crop_imm(rect.left, rect.top, rect.width(), rect.height()))
    }
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Per-row and per-column mean luminance of an image
#[derive(Debug, Clone)]
struct LuminanceProfile {
    rows: Vec<f64>,
    cols: Vec<f64>,
    uniform: bool,
}

impl LuminanceProfile {
    /// Luminance of a pixel is the plain mean of its color channels.
    /// Alpha is ignored.
    fn compute(image: &DynamicImage) -> Self {
        let (width, height) = image.dimensions();
        let mut row_sums = vec![0u64; height as usize];
        let mut col_sums = vec![0u64; width as usize];
        let mut min_sample = u64::MAX;
        let mut max_sample = 0u64;

        let channels: u64 = if image.color().has_color() {
            let rgb = image.to_rgb8();
            for (x, y, pixel) in rgb.enumerate_pixels() {
                let [r, g, b] = pixel.0;
                let sum = u64::from(r) + u64::from(g) + u64::from(b);
                row_sums[y as usize] += sum;
                col_sums[x as usize] += sum;
                min_sample = min_sample.min(sum);
                max_sample = max_sample.max(sum);
            }
            3
        } else {
            let gray = image.to_luma8();
            for (x, y, pixel) in gray.enumerate_pixels() {
                let value = u64::from(pixel.0[0]);
                row_sums[y as usize] += value;
                col_sums[x as usize] += value;
                min_sample = min_sample.min(value);
                max_sample = max_sample.max(value);
            }
            1
        };

        let row_divisor = (u64::from(width) * channels) as f64;
        let col_divisor = (u64::from(height) * channels) as f64;

        Self {
            rows: row_sums.iter().map(|&s| s as f64 / row_divisor).collect(),
            cols: col_sums.iter().map(|&s| s as f64 / col_divisor).collect(),
            uniform: min_sample == max_sample,
        }
    }
}

/// First and last index whose mean is strictly below `threshold`
fn content_span(means: &[f64], threshold: f64) -> Option<(u32, u32)> {
    let first = means.iter().position(|&m| m < threshold)?;
    let last = means.iter().rposition(|&m| m < threshold)?;
    Some((first as u32, last as u32))
}

/// Default content bounds detector
pub struct ContentBoundsDetector;

impl ContentBoundsDetector {
    /// Load an image and detect its content bounds
    pub fn detect_path(image_path: &Path, options: &BoundsOptions) -> Result<CropRect> {
        if !image_path.exists() {
            return Err(BoundsError::ImageNotFound(image_path.to_path_buf()));
        }

        let img = image::open(image_path).map_err(|e| BoundsError::InvalidImage(e.to_string()))?;

        Self::detect(&img, options)
    }

    /// Detect the padded, clamped content rectangle of an image
    pub fn detect(image: &DynamicImage, options: &BoundsOptions) -> Result<CropRect> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(BoundsError::NoContentDetected);
        }

        let profile = LuminanceProfile::compute(image);

        // A single intensity everywhere has no background/content boundary,
        // whichever side of the threshold it falls on.
        if profile.uniform {
            return Err(BoundsError::NoContentDetected);
        }

        let threshold = f64::from(options.threshold);
        let (Some((top, last_row)), Some((left, last_col))) = (
            content_span(&profile.rows, threshold),
            content_span(&profile.cols, threshold),
        ) else {
            return Err(BoundsError::NoContentDetected);
        };

        let padding = options.padding;
        let rect = CropRect {
            left: left.saturating_sub(padding),
            top: top.saturating_sub(padding),
            right: (last_col + 1).saturating_add(padding).min(width),
            bottom: (last_row + 1).saturating_add(padding).min(height),
        };

        debug!(
            width,
            height,
            threshold = options.threshold,
            padding,
            %rect,
            "Detected content bounds"
        );

        Ok(rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::tempdir;

    fn page_with_block(width: u32, height: u32, block: CropRect, ink: u8) -> DynamicImage {
        let mut img = GrayImage::from_pixel(width, height, Luma([255]));
        for y in block.top..block.bottom {
            for x in block.left..block.right {
                img.put_pixel(x, y, Luma([ink]));
            }
        }
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn test_default_options() {
        let opts = BoundsOptions::default();

        assert_eq!(opts.threshold, 250);
        assert_eq!(opts.padding, 10);
    }

    #[test]
    fn test_builder_pattern() {
        let options = BoundsOptions::builder().threshold(200).padding(4).build();

        assert_eq!(options.threshold, 200);
        assert_eq!(options.padding, 4);
    }

    #[test]
    fn test_strict_preset() {
        let options = BoundsOptions::strict();
        assert_eq!(options.threshold, 254);
        assert_eq!(options.padding, DEFAULT_PADDING);
    }

    #[test]
    fn test_detect_scanned_page_example() {
        let block = CropRect::new(100, 200, 900, 1300).unwrap();
        let img = page_with_block(1000, 1500, block, 0);

        let rect = ContentBoundsDetector::detect(&img, &BoundsOptions::default()).unwrap();

        assert_eq!(rect, CropRect::new(90, 190, 910, 1310).unwrap());
        assert!(rect.contains(&block));
    }

    #[test]
    fn test_padding_is_clamped_at_image_edges() {
        let block = CropRect::new(3, 0, 60, 38).unwrap();
        let img = page_with_block(60, 40, block, 20);

        let rect = ContentBoundsDetector::detect(&img, &BoundsOptions::default()).unwrap();

        assert_eq!(rect, CropRect::new(0, 0, 60, 40).unwrap());
    }

    #[test]
    fn test_zero_padding_is_tight() {
        let block = CropRect::new(10, 12, 30, 25).unwrap();
        let img = page_with_block(50, 50, block, 0);
        let options = BoundsOptions::builder().padding(0).build();

        let rect = ContentBoundsDetector::detect(&img, &options).unwrap();

        assert_eq!(rect, block);
    }

    #[test]
    fn test_detected_rect_contains_content_for_various_blocks() {
        let blocks = [
            CropRect::new(0, 0, 5, 5).unwrap(),
            CropRect::new(7, 3, 12, 9).unwrap(),
            CropRect::new(20, 30, 64, 48).unwrap(),
            CropRect::new(1, 47, 63, 48).unwrap(),
        ];
        let options = BoundsOptions::builder().padding(3).build();

        for block in blocks {
            let img = page_with_block(64, 48, block, 0);
            let rect = ContentBoundsDetector::detect(&img, &options).unwrap();

            assert!(rect.contains(&block), "{} should contain {}", rect, block);
            assert_eq!(rect.left, block.left.saturating_sub(3));
            assert_eq!(rect.top, block.top.saturating_sub(3));
            assert_eq!(rect.right, (block.right + 3).min(64));
            assert_eq!(rect.bottom, (block.bottom + 3).min(48));
        }
    }

    #[test]
    fn test_uniform_images_have_no_content() {
        for value in [0u8, 128, 249, 250, 255] {
            let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 32, Luma([value])));
            let result = ContentBoundsDetector::detect(&img, &BoundsOptions::default());
            assert!(
                matches!(result, Err(BoundsError::NoContentDetected)),
                "uniform value {} should not yield bounds",
                value
            );
        }

        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 8, Rgb([30, 60, 90])));
        assert!(matches!(
            ContentBoundsDetector::detect(&rgb, &BoundsOptions::default()),
            Err(BoundsError::NoContentDetected)
        ));
    }

    #[test]
    fn test_faint_content_above_threshold_is_background() {
        let block = CropRect::new(4, 4, 12, 12).unwrap();
        let img = page_with_block(16, 16, block, 252);

        let result = ContentBoundsDetector::detect(&img, &BoundsOptions::default());

        assert!(matches!(result, Err(BoundsError::NoContentDetected)));
    }

    #[test]
    fn test_threshold_is_strict() {
        // Rows 0..2 are gray 250; their mean equals the threshold exactly
        let mut img = GrayImage::from_pixel(8, 8, Luma([255]));
        for y in 0..2 {
            for x in 0..8 {
                img.put_pixel(x, y, Luma([250]));
            }
        }
        img.put_pixel(3, 5, Luma([0]));
        let img = DynamicImage::ImageLuma8(img);
        let options = BoundsOptions::builder().padding(0).build();

        let rect = ContentBoundsDetector::detect(&img, &options).unwrap();

        assert_eq!(rect.top, 5);
        assert_eq!(rect.bottom, 6);
    }

    #[test]
    fn test_color_channels_are_averaged() {
        // (255, 255, 205) averages to ~238
        let mut img = RgbImage::from_pixel(20, 20, Rgb([255, 255, 255]));
        for y in 5..15 {
            for x in 0..20 {
                img.put_pixel(x, y, Rgb([255, 255, 205]));
            }
        }
        let img = DynamicImage::ImageRgb8(img);
        let options = BoundsOptions::builder().padding(0).build();

        let rect = ContentBoundsDetector::detect(&img, &options).unwrap();

        assert_eq!(rect, CropRect::new(0, 5, 20, 15).unwrap());
    }

    #[test]
    fn test_alpha_channel_is_ignored() {
        let mut img = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 0]));
        img.put_pixel(4, 6, Rgba([0, 0, 0, 255]));
        let img = DynamicImage::ImageRgba8(img);
        let options = BoundsOptions::builder().padding(1).build();

        let rect = ContentBoundsDetector::detect(&img, &options).unwrap();

        assert_eq!(rect, CropRect::new(3, 5, 6, 8).unwrap());
    }

    #[test]
    fn test_image_not_found() {
        let result = ContentBoundsDetector::detect_path(
            Path::new("/nonexistent/image.png"),
            &BoundsOptions::default(),
        );

        assert!(matches!(result, Err(BoundsError::ImageNotFound(_))));
    }

    #[test]
    fn test_corrupt_image_is_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let result = ContentBoundsDetector::detect_path(&path, &BoundsOptions::default());

        assert!(matches!(result, Err(BoundsError::InvalidImage(_))));
    }

    #[test]
    fn test_detect_path_reads_saved_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("page.png");
        let block = CropRect::new(30, 40, 70, 90).unwrap();
        page_with_block(100, 120, block, 10).save(&path).unwrap();

        let rect = ContentBoundsDetector::detect_path(&path, &BoundsOptions::default()).unwrap();

        assert_eq!(rect, CropRect::new(20, 30, 80, 100).unwrap());
    }

    #[test]
    fn test_rect_validation() {
        assert!(CropRect::new(0, 0, 1, 1).is_ok());
        assert!(matches!(
            CropRect::new(10, 0, 10, 5),
            Err(BoundsError::InvalidRectangle(_))
        ));
        assert!(matches!(
            CropRect::new(0, 9, 5, 3),
            Err(BoundsError::InvalidRectangle(_))
        ));
    }

    #[test]
    fn test_rect_from_slice() {
        let rect = CropRect::from_slice(&[1, 2, 3, 4]).unwrap().unwrap();
        assert_eq!(rect, CropRect::new(1, 2, 3, 4).unwrap());

        assert!(CropRect::from_slice(&[1, 2, 3]).is_none());
        assert!(CropRect::from_slice(&[5, 2, 3, 4]).unwrap().is_err());
    }

    #[test]
    fn test_rect_clamp_to() {
        let rect = CropRect::new(10, 20, 5000, 6000).unwrap();

        assert_eq!(
            rect.clamp_to(800, 600),
            Some(CropRect::new(10, 20, 800, 600).unwrap())
        );
        assert_eq!(rect.clamp_to(10, 600), None);
        assert_eq!(rect.clamp_to(800, 20), None);
    }

    #[test]
    fn test_rect_crop_clamps_oversized_rect() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 30, Luma([128])));
        let rect = CropRect::new(5, 5, 400, 300).unwrap();

        let cropped = rect.crop(&img).unwrap();

        assert_eq!(cropped.dimensions(), (35, 25));
        assert!(CropRect::new(50, 50, 60, 60).unwrap().crop(&img).is_none());
    }

    #[test]
    fn test_rect_display_and_size() {
        let rect = CropRect::new(90, 190, 910, 1310).unwrap();
        assert_eq!(rect.to_string(), "(90, 190, 910, 1310)");
        assert_eq!(rect.width(), 820);
        assert_eq!(rect.height(), 1120);
    }

    #[test]
    fn test_error_types() {
        let _err1 = BoundsError::ImageNotFound(PathBuf::from("/test/path"));
        let _err2 = BoundsError::InvalidImage("Invalid format".to_string());
        let err3 = BoundsError::NoContentDetected;
        assert_eq!(err3.to_string(), "No content detected in image");
    }
}
