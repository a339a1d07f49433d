use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle with the box encodings used across the crate.
///
/// - TLWH: Top-Left X, Top-Left Y, Width, Height
/// - TLBR: Top-Left X, Top-Left Y, Bottom-Right X, Bottom-Right Y
/// - XYAH: Center X, Center Y, Aspect Ratio (w/h), Height
///
/// The Kalman filter works in XYAH, detections and trajectories in TLWH.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Top-left x coordinate
    pub x: f32,
    /// Top-left y coordinate
    pub y: f32,
    /// Width of the bounding box
    pub width: f32,
    /// Height of the bounding box
    pub height: f32,
}

impl Rect {
    /// Create a new Rect from top-left coordinates and dimensions (TLWH format).
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a Rect from TLBR format (top-left x, top-left y, bottom-right x, bottom-right y).
    #[inline]
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    /// Create a Rect from XYAH format (center x, center y, aspect ratio, height).
    #[inline]
    pub fn from_xyah(cx: f32, cy: f32, aspect_ratio: f32, height: f32) -> Self {
        let width = aspect_ratio * height;
        Self {
            x: cx - width / 2.0,
            y: cy - height / 2.0,
            width,
            height,
        }
    }

    /// Create a Rect of the given size centred on `(cx, cy)`.
    #[inline]
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    /// Convert to TLBR format: (x1, y1, x2, y2).
    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    /// Convert to TLWH format: (x, y, width, height).
    #[inline]
    pub fn to_tlwh(&self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    /// Convert to XYAH format: (center_x, center_y, aspect_ratio, height).
    ///
    /// A zero-height box reports an aspect ratio of 0.
    #[inline]
    pub fn to_xyah(&self) -> [f32; 4] {
        let (cx, cy) = self.center();
        let aspect_ratio = if self.height > 0.0 {
            self.width / self.height
        } else {
            0.0
        };
        [cx, cy, aspect_ratio, self.height]
    }

    /// XYAH measurement widened to `f64` for the Kalman filter.
    #[inline]
    pub fn to_xyah_f64(&self) -> [f64; 4] {
        self.to_xyah().map(f64::from)
    }

    /// Get the center point of the bounding box.
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Get the area of the bounding box.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Grow the rectangle by `fraction` of its own size on every side.
    pub fn pad(&self, fraction: f32) -> Self {
        let (cx, cy) = self.center();
        let scale = 1.0 + 2.0 * fraction;
        Self::from_center(cx, cy, self.width * scale, self.height * scale)
    }

    /// Smallest rectangle containing every rectangle in `rects`.
    pub fn union(rects: &[Rect]) -> Option<Rect> {
        let first = rects.first()?;
        let (mut x1, mut y1, mut x2, mut y2) = (first.x, first.y, first.right(), first.bottom());
        for r in &rects[1..] {
            x1 = x1.min(r.x);
            y1 = y1.min(r.y);
            x2 = x2.max(r.right());
            y2 = y2.max(r.bottom());
        }
        Some(Rect::from_tlbr(x1, y1, x2, y2))
    }

    /// Whether `other` lies inside this rectangle, allowing `tolerance` pixels of slack.
    pub fn contains(&self, other: &Rect, tolerance: f32) -> bool {
        other.x >= self.x - tolerance
            && other.y >= self.y - tolerance
            && other.right() <= self.right() + tolerance
            && other.bottom() <= self.bottom() + tolerance
    }

    /// Calculate Intersection over Union (IoU) with another bounding box.
    pub fn iou(&self, other: &Rect) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        let inter_width = (x2 - x1).max(0.0);
        let inter_height = (y2 - y1).max(0.0);
        let inter_area = inter_width * inter_height;

        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 {
            (inter_area / union_area).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Calculate IoU matrix between two sets of bounding boxes.
///
/// Returns a matrix of shape (M, N) where M is the length of `boxes_a`
/// and N is the length of `boxes_b`.
pub fn iou_batch(boxes_a: &[Rect], boxes_b: &[Rect]) -> Array2<f32> {
    let mut ious = Array2::zeros((boxes_a.len(), boxes_b.len()));
    for (i, a) in boxes_a.iter().enumerate() {
        for (j, b) in boxes_b.iter().enumerate() {
            ious[[i, j]] = a.iou(b);
        }
    }
    ious
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_conversions() {
        let rect = Rect::new(10.0, 20.0, 30.0, 40.0);

        assert_eq!(rect.to_tlwh(), [10.0, 20.0, 30.0, 40.0]);
        assert_eq!(rect.to_tlbr(), [10.0, 20.0, 40.0, 60.0]);

        let xyah = rect.to_xyah();
        assert_eq!(xyah[0], 25.0);
        assert_eq!(xyah[1], 40.0);
        assert!((xyah[2] - 0.75).abs() < 1e-6);
        assert_eq!(xyah[3], 40.0);
    }

    #[test]
    fn test_xyah_round_trip() {
        let boxes = [
            Rect::new(10.0, 20.0, 30.0, 40.0),
            Rect::new(-5.5, 3.25, 0.0, 12.0),
            Rect::new(1000.0, 500.0, 640.0, 1.0),
            Rect::new(0.1, 0.2, 0.3, 0.4),
        ];
        for rect in boxes {
            let [cx, cy, a, h] = rect.to_xyah();
            let back = Rect::from_xyah(cx, cy, a, h);
            for (got, want) in back.to_tlwh().iter().zip(rect.to_tlwh()) {
                assert!((got - want).abs() < 1e-3, "{rect:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn test_from_tlbr() {
        let rect = Rect::from_tlbr(10.0, 20.0, 40.0, 60.0);
        assert_eq!(rect.to_tlwh(), [10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_zero_height_aspect() {
        let rect = Rect::new(0.0, 0.0, 10.0, 0.0);
        assert_eq!(rect.to_xyah()[2], 0.0);
    }

    #[test]
    fn test_iou() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);

        // 5x5 overlap over a 175 union
        let iou = a.iou(&b);
        assert!((iou - 25.0 / 175.0).abs() < 1e-6);
        assert_eq!(a.iou(&b), b.iou(&a));
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 20.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);

        // touching edges share no area
        let c = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert_eq!(a.iou(&c), 0.0);
    }

    #[test]
    fn test_iou_same_box() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);

        let empty = Rect::new(3.0, 3.0, 0.0, 0.0);
        assert_eq!(empty.iou(&empty), 0.0);
    }

    #[test]
    fn test_iou_range() {
        let boxes = [
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(2.0, 3.0, 7.0, 1.0),
            Rect::new(-4.0, -4.0, 30.0, 30.0),
            Rect::new(9.0, 9.0, 1.0, 1.0),
        ];
        let ious = iou_batch(&boxes, &boxes);
        for i in 0..boxes.len() {
            for j in 0..boxes.len() {
                let v = ious[[i, j]];
                assert!((0.0..=1.0).contains(&v));
                assert!((v - ious[[j, i]]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_pad_and_union() {
        let padded = Rect::new(10.0, 10.0, 10.0, 20.0).pad(0.5);
        assert_eq!(padded, Rect::new(5.0, 0.0, 20.0, 40.0));

        let union = Rect::union(&[Rect::new(0.0, 0.0, 5.0, 5.0), Rect::new(10.0, 2.0, 5.0, 10.0)]);
        assert_eq!(union, Some(Rect::new(0.0, 0.0, 15.0, 12.0)));
        assert_eq!(Rect::union(&[]), None);
    }
}
