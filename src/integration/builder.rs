//! Builder for creating `BoundingBox` values from various detector encodings.

use crate::tracker::BoundingBox;

/// Builder for creating [`BoundingBox`] values from various input formats.
#[derive(Debug, Clone, Default)]
pub struct BoxBuilder {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
    class_label: String,
    class_id: u32,
}

impl BoxBuilder {
    /// Create a new box builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.x1 = x1;
        self.y1 = y1;
        self.x2 = x2;
        self.y2 = y2;
        self
    }

    /// Set bounding box in XYWH format (center_x, center_y, width, height).
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.x1 = cx - w / 2.0;
        self.y1 = cy - h / 2.0;
        self.x2 = cx + w / 2.0;
        self.y2 = cy + h / 2.0;
        self
    }

    /// Set bounding box in TLWH format (left, top, width, height).
    pub fn tlwh(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.x1 = x;
        self.y1 = y;
        self.x2 = x + w;
        self.y2 = y + h;
        self
    }

    /// Set bounding box from normalized TLBR coordinates in `[0, 1]`.
    pub fn normalized_tlbr(self, x1: f32, y1: f32, x2: f32, y2: f32, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        self.tlbr(x1 * w, y1 * h, x2 * w, y2 * h)
    }

    /// Set the confidence score.
    pub fn score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    /// Set the class the detector assigned.
    pub fn label(mut self, class_label: impl Into<String>, class_id: u32) -> Self {
        self.class_label = class_label.into();
        self.class_id = class_id;
        self
    }

    /// Build the final `BoundingBox`.
    ///
    /// Corners given in the wrong order produce a negative size, which the
    /// tracker rejects.
    pub fn build(self) -> BoundingBox {
        BoundingBox::new(
            self.x1,
            self.y1,
            self.x2 - self.x1,
            self.y2 - self.y1,
            self.score,
        )
        .with_label(self.class_label, self.class_id)
    }
}
