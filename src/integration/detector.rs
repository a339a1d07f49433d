//! Trait for object detection inference backends.

use crate::tracker::BoundingBox;

/// Trait for object detection inference backends.
///
/// Implement this trait to connect any detection model to the tracker.
/// Boxes are expected to be confidence-filtered already; the tracker treats
/// every returned box as a candidate subject.
///
/// # Example
///
/// ```
/// use reframe_rs::{BoundingBox, DetectionSource};
///
/// struct FixedDetector;
///
/// impl DetectionSource for FixedDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, _input: &[u8], width: u32, height: u32) -> Result<Vec<BoundingBox>, Self::Error> {
///         let (w, h) = (width as f32, height as f32);
///         Ok(vec![BoundingBox::new(w / 4.0, h / 4.0, w / 2.0, h / 2.0, 0.9)])
///     }
/// }
///
/// assert_eq!(FixedDetector.detect(&[], 640, 480).unwrap().len(), 1);
/// ```
pub trait DetectionSource {
    /// Error type for detection failures.
    type Error: std::error::Error + 'static;

    /// Run inference on raw image data and return boxes in source pixels.
    ///
    /// # Arguments
    /// * `input` - Raw image bytes (format depends on implementation)
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    fn detect(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, Self::Error>;
}
