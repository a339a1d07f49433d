//! Per-frame target resolution with hold-last and fallback across gaps.

use crate::reframe::config::{ManualTarget, ReframingConfig, TargetSelection, TrackingMode};
use crate::tracker::{BoundingBox, Rect, TrackedObject};

/// What the camera frames in one output frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetFix {
    /// Target visible in this frame
    Target(Rect),
    /// Last known target, held across a gap
    Held(Rect),
    /// No target within the hold window
    Fallback,
}

/// Walks output frames in order and decides what to frame in each.
pub struct TargetResolver<'a> {
    config: &'a ReframingConfig,
    frame_width: f32,
    frame_height: f32,
    /// Trajectories in id order
    objects: Vec<&'a TrackedObject>,
    last_seen: Option<(u64, Rect)>,
}

impl<'a> TargetResolver<'a> {
    pub fn new(
        config: &'a ReframingConfig,
        frame_width: f32,
        frame_height: f32,
        objects: impl IntoIterator<Item = &'a TrackedObject>,
    ) -> Self {
        let mut objects: Vec<&TrackedObject> = objects.into_iter().collect();
        objects.sort_by_key(|o| o.id);
        Self {
            config,
            frame_width,
            frame_height,
            objects,
            last_seen: None,
        }
    }

    /// Resolve the target of `frame`. Frames must be visited in increasing order.
    pub fn resolve(&mut self, frame: u64) -> TargetFix {
        if let Some(rect) = self.candidate(frame) {
            self.last_seen = Some((frame, rect));
            return TargetFix::Target(rect);
        }
        match self.last_seen {
            Some((seen, rect)) if frame - seen <= u64::from(self.config.max_hold_frames) => {
                TargetFix::Held(rect)
            }
            _ => TargetFix::Fallback,
        }
    }

    fn candidate(&self, frame: u64) -> Option<Rect> {
        match self.config.manual_target {
            Some(ManualTarget::Region { rect }) => return Some(rect),
            Some(ManualTarget::Track { id }) => {
                return self
                    .objects
                    .iter()
                    .find(|o| o.id == id)
                    .and_then(|o| o.position(frame))
                    .map(BoundingBox::rect);
            }
            None => {}
        }

        let boxes: Vec<&BoundingBox> = self
            .objects
            .iter()
            .filter_map(|o| o.position(frame))
            .collect();

        match self.config.tracking_mode {
            TrackingMode::Multi => return union(&boxes),
            TrackingMode::Auto if boxes.len() > 1 && self.close_together(&boxes) => {
                return union(&boxes);
            }
            _ => {}
        }

        if let Some(selected) = self.objects.iter().find(|o| o.selected) {
            return selected.position(frame).map(BoundingBox::rect);
        }

        self.select_candidate(&boxes).map(BoundingBox::rect)
    }

    /// Apply the selection strategy to the boxes of one frame.
    ///
    /// `boxes` are in track id order; ties go to the earliest.
    pub fn select_candidate<'b>(&self, boxes: &[&'b BoundingBox]) -> Option<&'b BoundingBox> {
        let (fcx, fcy) = (self.frame_width / 2.0, self.frame_height / 2.0);
        let key = |b: &BoundingBox| -> Option<f32> {
            match self.config.target_selection {
                TargetSelection::Largest => Some(b.area()),
                TargetSelection::MostConfident => Some(b.confidence),
                TargetSelection::Centered => {
                    let (cx, cy) = b.rect().center();
                    Some(-((cx - fcx).powi(2) + (cy - fcy).powi(2)).sqrt())
                }
                TargetSelection::Manual => None,
            }
        };

        let mut best: Option<(&BoundingBox, f32)> = None;
        for &b in boxes {
            let Some(score) = key(b) else {
                return None;
            };
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((b, score));
            }
        }
        best.map(|(b, _)| b)
    }

    fn close_together(&self, boxes: &[&BoundingBox]) -> bool {
        let limit = self.config.multi_subject_separation * self.frame_width;
        let centers: Vec<(f32, f32)> = boxes.iter().map(|b| b.rect().center()).collect();
        for (i, a) in centers.iter().enumerate() {
            for b in &centers[i + 1..] {
                let distance = ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
                if distance > limit {
                    return false;
                }
            }
        }
        true
    }
}

fn union(boxes: &[&BoundingBox]) -> Option<Rect> {
    let rects: Vec<Rect> = boxes.iter().map(|b| b.rect()).collect();
    Rect::union(&rects)
}
