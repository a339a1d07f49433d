//! Detector-facing data contract: per-frame boxes.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tracker::rect::Rect;

/// One detected subject in one frame, in TLWH pixel coordinates.
///
/// Produced by the external detector; the tracker only fills in `track_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Detection confidence in `[0, 1]`
    pub confidence: f32,
    pub class_label: String,
    pub class_id: u32,
    /// Id of the track this box was associated with, if any
    #[serde(default)]
    pub track_id: Option<u64>,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence,
            class_label: String::new(),
            class_id: 0,
            track_id: None,
        }
    }

    /// Build a box from a rectangle, keeping label metadata empty.
    pub fn from_rect(rect: Rect, confidence: f32) -> Self {
        Self::new(rect.x, rect.y, rect.width, rect.height, confidence)
    }

    pub fn with_label(mut self, class_label: impl Into<String>, class_id: u32) -> Self {
        self.class_label = class_label.into();
        self.class_id = class_id;
        self
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Check the detector contract.
    ///
    /// Malformed boxes are rejected rather than clamped, since clamping would
    /// silently distort IoU.
    pub fn validate(&self) -> Result<()> {
        if ![self.x, self.y, self.width, self.height, self.confidence]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(Error::invalid_input(format!(
                "box has non-finite values: {self:?}"
            )));
        }
        if self.width < 0.0 || self.height < 0.0 {
            return Err(Error::invalid_input(format!(
                "box has negative size {}x{}",
                self.width, self.height
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::invalid_input(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// All boxes reported by the detector for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub frame_number: u64,
    pub timestamp_seconds: f64,
    pub boxes: Vec<BoundingBox>,
}

impl Detection {
    pub fn new(frame_number: u64, timestamp_seconds: f64, boxes: Vec<BoundingBox>) -> Self {
        Self {
            frame_number,
            timestamp_seconds,
            boxes,
        }
    }

    /// A frame in which the detector found nothing.
    pub fn empty(frame_number: u64, timestamp_seconds: f64) -> Self {
        Self::new(frame_number, timestamp_seconds, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_well_formed_box() {
        let b = BoundingBox::new(0.0, 0.0, 100.0, 100.0, 0.9).with_label("head", 1);
        assert!(b.validate().is_ok());
        assert!(BoundingBox::new(5.0, 5.0, 0.0, 0.0, 0.0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_boxes() {
        let negative = BoundingBox::new(0.0, 0.0, -1.0, 10.0, 0.5);
        assert!(matches!(negative.validate(), Err(Error::InvalidInput(_))));

        let confident = BoundingBox::new(0.0, 0.0, 1.0, 10.0, 1.5);
        assert!(matches!(confident.validate(), Err(Error::InvalidInput(_))));

        let nan = BoundingBox::new(f32::NAN, 0.0, 1.0, 10.0, 0.5);
        assert!(matches!(nan.validate(), Err(Error::InvalidInput(_))));
    }
}
