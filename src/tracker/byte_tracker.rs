//! Track lifecycle orchestration: predict, associate, update, spawn, age.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::tracker::detection::{BoundingBox, Detection};
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, AssignmentResult, AssignmentStrategy};
use crate::tracker::rect::{Rect, iou_batch};
use crate::tracker::track::{Track, TrackIdGenerator};
use crate::tracker::track_state::TrackState;
use crate::tracker::tracked_object::TrackedObject;

/// Configuration for the [`ByteTracker`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Matches with a cost at or above this are rejected (0.7 cost = 0.3 IoU)
    pub match_thresh: f32,
    /// Frames a track may stay unmatched before it is removed
    pub max_frames_lost: u32,
    /// Use `1 - IoU * confidence` instead of `1 - IoU`
    pub fuse_score: bool,
    pub assignment: AssignmentStrategy,
    /// When set, boxes below this confidence only join a second association
    /// against still-unmatched tracked tracks and never start a track
    pub high_score_thresh: Option<f32>,
    /// Cost threshold of the second association
    pub low_score_match_thresh: f32,
    /// When set, a tracked and a lost track overlapping above this IoU keep
    /// only the longer-lived one
    pub duplicate_iou: Option<f32>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            match_thresh: 0.7,
            max_frames_lost: 30,
            fuse_score: false,
            assignment: AssignmentStrategy::Optimal,
            high_score_thresh: None,
            low_score_match_thresh: 0.5,
            duplicate_iou: None,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        check_unit("match_thresh", self.match_thresh, false)?;
        check_unit("low_score_match_thresh", self.low_score_match_thresh, false)?;
        if let Some(t) = self.high_score_thresh {
            check_unit("high_score_thresh", t, true)?;
        }
        if let Some(t) = self.duplicate_iou {
            check_unit("duplicate_iou", t, false)?;
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f32, allow_zero: bool) -> Result<()> {
    let low_ok = if allow_zero { value >= 0.0 } else { value > 0.0 };
    if value.is_finite() && low_ok && value <= 1.0 {
        Ok(())
    } else {
        Err(Error::invalid_config(format!("{name} must lie in (0, 1], got {value}")))
    }
}

/// Result of processing one frame.
#[derive(Debug, Clone)]
pub struct FrameUpdate {
    pub frame_number: u64,
    /// Input boxes with `track_id` filled in for every matched or spawned box
    pub boxes: Vec<BoundingBox>,
    /// Tracks matched in this frame
    pub tracks: Vec<Track>,
    /// Ids of tracks removed in this frame
    pub removed: Vec<u64>,
}

/// Working copy of the session state for one frame.
///
/// Nothing is written back to the tracker until the frame completes, so a
/// failing frame leaves every track untouched.
struct FrameState {
    frame_id: u64,
    pool: Vec<Track>,
    /// Detection index matched to each pool entry
    assigned: Vec<Option<usize>>,
    boxes: Vec<BoundingBox>,
    ids: TrackIdGenerator,
}

/// Multi-subject tracker owning one tracking session.
pub struct ByteTracker {
    /// Tracked and lost tracks, in id order
    tracks: Vec<Track>,
    objects: BTreeMap<u64, TrackedObject>,
    frame_id: Option<u64>,
    frames_processed: u64,
    config: TrackerConfig,
    kalman_filter: KalmanFilter,
    ids: TrackIdGenerator,
}

impl ByteTracker {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            tracks: Vec::new(),
            objects: BTreeMap::new(),
            frame_id: None,
            frames_processed: 0,
            config,
            kalman_filter: KalmanFilter::default(),
            ids: TrackIdGenerator::new(),
        })
    }

    pub fn with_default_config() -> Self {
        Self {
            tracks: Vec::new(),
            objects: BTreeMap::new(),
            frame_id: None,
            frames_processed: 0,
            config: TrackerConfig::default(),
            kalman_filter: KalmanFilter::default(),
            ids: TrackIdGenerator::new(),
        }
    }

    /// Process the detections of the next frame.
    ///
    /// Frames must arrive in strictly increasing order. A rejected frame
    /// (malformed box, out-of-order number, solver failure) leaves the session
    /// as it was, so the caller can skip it and continue.
    pub fn update(&mut self, detection: &Detection) -> Result<FrameUpdate> {
        let frame_id = detection.frame_number;
        if let Some(last) = self.frame_id {
            if frame_id <= last {
                return Err(Error::FrameOrder {
                    last,
                    got: frame_id,
                });
            }
        }
        for bbox in &detection.boxes {
            bbox.validate()?;
        }

        let mut state = FrameState {
            frame_id,
            pool: self.tracks.clone(),
            assigned: vec![None; self.tracks.len()],
            boxes: detection
                .boxes
                .iter()
                .cloned()
                .map(|mut b| {
                    b.track_id = None;
                    b
                })
                .collect(),
            ids: self.ids.clone(),
        };

        // Step 1: Predict every tracked or lost track
        Track::multi_predict(&mut state.pool, &self.kalman_filter);

        // Step 2: First association, optionally restricted to high score boxes
        let (high, low): (Vec<usize>, Vec<usize>) = match self.config.high_score_thresh {
            Some(t) => (0..state.boxes.len()).partition(|&j| state.boxes[j].confidence >= t),
            None => ((0..state.boxes.len()).collect(), Vec::new()),
        };
        let pool_idx: Vec<usize> = (0..state.pool.len()).collect();
        let unmatched_dets = self.associate(
            &mut state,
            &pool_idx,
            &high,
            self.config.match_thresh,
            self.config.fuse_score,
        )?;

        // Step 3: Second association of low score boxes with tracks still marked tracked
        if !low.is_empty() {
            let remaining: Vec<usize> = (0..state.pool.len())
                .filter(|&i| state.assigned[i].is_none() && state.pool[i].state == TrackState::Tracked)
                .collect();
            self.associate(
                &mut state,
                &remaining,
                &low,
                self.config.low_score_match_thresh,
                false,
            )?;
        }

        // Step 4: Age unmatched tracks
        let max_lost = u64::from(self.config.max_frames_lost);
        let mut removed = Vec::new();
        let mut lost = 0usize;
        for (track, assigned) in state.pool.iter_mut().zip(&state.assigned) {
            if assigned.is_some() {
                continue;
            }
            if track.state == TrackState::Tracked {
                track.mark_lost();
            }
            if track.frames_since_update(frame_id) > max_lost {
                track.mark_removed();
                removed.push(track.track_id);
            } else {
                lost += 1;
            }
        }

        // Step 5: Start a track for every unmatched box, usable immediately
        let matched = state.assigned.iter().filter(|a| a.is_some()).count();
        let spawned = unmatched_dets.len();
        for j in unmatched_dets {
            let mut track = Track::new(&state.boxes[j]);
            track.activate(&self.kalman_filter, frame_id, &mut state.ids);
            state.boxes[j].track_id = Some(track.track_id);
            state.pool.push(track);
            state.assigned.push(Some(j));
        }

        if let Some(iou) = self.config.duplicate_iou {
            let suppressed = suppress_duplicates(&mut state.pool, iou);
            for (track, assigned) in state.pool.iter().zip(&state.assigned) {
                if let (Some(j), TrackState::Removed) = (assigned, track.state) {
                    state.boxes[*j].track_id = None;
                }
            }
            removed.extend(suppressed);
        }

        // Step 6: Commit
        self.record_positions(&state);
        self.tracks = state
            .pool
            .into_iter()
            .filter(|t| t.state != TrackState::Removed)
            .collect();
        self.ids = state.ids;
        self.frame_id = Some(frame_id);
        self.frames_processed += 1;

        let tracks: Vec<Track> = self
            .tracks
            .iter()
            .filter(|t| t.state == TrackState::Tracked && t.frame_id == frame_id)
            .cloned()
            .collect();

        debug!(
            frame = frame_id,
            detections = state.boxes.len(),
            matched,
            spawned,
            lost,
            removed = removed.len(),
            "Processed frame"
        );

        Ok(FrameUpdate {
            frame_number: frame_id,
            boxes: state.boxes,
            tracks,
            removed,
        })
    }

    /// Match `track_idx` pool entries against `det_idx` boxes and apply the
    /// matches. Returns the detection indices left unmatched.
    fn associate(
        &self,
        state: &mut FrameState,
        track_idx: &[usize],
        det_idx: &[usize],
        thresh: f32,
        fuse: bool,
    ) -> Result<Vec<usize>> {
        let track_rects: Vec<Rect> = track_idx.iter().map(|&i| state.pool[i].tlwh()).collect();
        let det_rects: Vec<Rect> = det_idx.iter().map(|&j| state.boxes[j].rect()).collect();
        let mut dists = matching::iou_distance(&track_rects, &det_rects);
        if fuse {
            let scores: Vec<f32> = det_idx.iter().map(|&j| state.boxes[j].confidence).collect();
            matching::fuse_score(&mut dists, &scores);
        }

        let AssignmentResult {
            matches,
            unmatched_detections,
            ..
        } = matching::linear_assignment(&dists, thresh, self.config.assignment)?;

        for (it, id) in matches {
            let (i, j) = (track_idx[it], det_idx[id]);
            let track = &mut state.pool[i];
            let det = &state.boxes[j];
            if track.state == TrackState::Tracked {
                track.update(det, &self.kalman_filter, state.frame_id)?;
            } else {
                track.re_activate(det, &self.kalman_filter, state.frame_id, &mut state.ids, false)?;
            }
            state.boxes[j].track_id = Some(track.track_id);
            state.assigned[i] = Some(j);
        }

        Ok(unmatched_detections.into_iter().map(|j| det_idx[j]).collect())
    }

    fn record_positions(&mut self, state: &FrameState) {
        for (track, assigned) in state.pool.iter().zip(&state.assigned) {
            if track.state == TrackState::Removed {
                // Tracks suppressed in the frame they were born leave no trajectory
                if let Some(object) = self.objects.get_mut(&track.track_id) {
                    object.state = TrackState::Removed;
                }
                continue;
            }
            let object = self
                .objects
                .entry(track.track_id)
                .or_insert_with(|| TrackedObject::new(track.track_id, track.class_label.clone()));
            object.state = track.state;
            match assigned {
                Some(j) => object.record(state.frame_id, state.boxes[*j].clone(), true),
                None => object.record(state.frame_id, track.to_bounding_box(), false),
            }
        }
    }

    /// Live trajectories: tracked and recently lost.
    pub fn tracked_objects(&self) -> Vec<&TrackedObject> {
        self.objects.values().filter(|o| o.is_live()).collect()
    }

    /// Every trajectory of the session, including removed ones, in id order.
    pub fn trajectories(&self) -> impl Iterator<Item = &TrackedObject> + '_ {
        self.objects.values()
    }

    pub fn trajectory(&self, id: u64) -> Option<&TrackedObject> {
        self.objects.get(&id)
    }

    /// Tracked and lost tracks, in id order.
    pub fn active_tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Make `id` the only selected trajectory.
    ///
    /// An unknown or removed id is a no-op that keeps the current selection
    /// and returns `false`.
    pub fn select_track(&mut self, id: u64) -> bool {
        if !self.objects.get(&id).is_some_and(|o| o.is_live()) {
            return false;
        }
        for object in self.objects.values_mut() {
            object.selected = object.id == id;
        }
        true
    }

    pub fn clear_selection(&mut self) {
        for object in self.objects.values_mut() {
            object.selected = false;
        }
    }

    pub fn selected(&self) -> Option<&TrackedObject> {
        self.objects.values().find(|o| o.selected)
    }

    /// Drop every track and trajectory and restart ids at 1.
    pub fn reset(&mut self) {
        info!(
            tracks = self.tracks.len(),
            trajectories = self.objects.len(),
            frames = self.frames_processed,
            "Resetting tracking session"
        );
        self.tracks.clear();
        self.objects.clear();
        self.frame_id = None;
        self.frames_processed = 0;
        self.ids.reset();
    }

    /// Change the association threshold; applies from the next frame.
    pub fn set_match_threshold(&mut self, thresh: f32) -> Result<()> {
        check_unit("match_thresh", thresh, false)?;
        self.config.match_thresh = thresh;
        Ok(())
    }

    pub fn set_config(&mut self, config: TrackerConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Last processed frame number.
    pub fn frame_id(&self) -> Option<u64> {
        self.frame_id
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }
}

/// Remove the younger of every tracked/lost pair overlapping above `iou`.
fn suppress_duplicates(pool: &mut [Track], iou: f32) -> Vec<u64> {
    let tracked: Vec<usize> = (0..pool.len())
        .filter(|&i| pool[i].state == TrackState::Tracked)
        .collect();
    let lost: Vec<usize> = (0..pool.len())
        .filter(|&i| pool[i].state == TrackState::Lost)
        .collect();
    if tracked.is_empty() || lost.is_empty() {
        return Vec::new();
    }

    let a_rects: Vec<Rect> = tracked.iter().map(|&i| pool[i].tlwh()).collect();
    let b_rects: Vec<Rect> = lost.iter().map(|&i| pool[i].tlwh()).collect();
    let ious = iou_batch(&a_rects, &b_rects);

    let mut duplicate = vec![false; pool.len()];
    for (ai, &i) in tracked.iter().enumerate() {
        for (bi, &j) in lost.iter().enumerate() {
            if ious[[ai, bi]] > iou {
                let time_a = pool[i].frame_id - pool[i].start_frame;
                let time_b = pool[j].frame_id - pool[j].start_frame;
                if time_a > time_b {
                    duplicate[j] = true;
                } else {
                    duplicate[i] = true;
                }
            }
        }
    }

    let mut removed = Vec::new();
    for (track, dup) in pool.iter_mut().zip(duplicate) {
        if dup {
            track.mark_removed();
            removed.push(track.track_id);
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(n: u64, boxes: Vec<BoundingBox>) -> Detection {
        Detection::new(n, n as f64 / 30.0, boxes)
    }

    #[test]
    fn test_config_validation() {
        assert!(TrackerConfig::default().validate().is_ok());
        let bad = TrackerConfig {
            match_thresh: 0.0,
            ..Default::default()
        };
        assert!(matches!(ByteTracker::new(bad), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejected_frame_leaves_state_untouched() {
        let mut tracker = ByteTracker::with_default_config();
        tracker
            .update(&frame(0, vec![BoundingBox::new(0.0, 0.0, 50.0, 50.0, 0.9)]))
            .unwrap();
        let before = tracker.active_tracks()[0].mean.clone();

        let bad = frame(1, vec![
            BoundingBox::new(0.0, 0.0, 50.0, 50.0, 0.9),
            BoundingBox::new(0.0, 0.0, -1.0, 50.0, 0.9),
        ]);
        assert!(matches!(tracker.update(&bad), Err(Error::InvalidInput(_))));
        assert_eq!(tracker.active_tracks()[0].mean, before);
        assert_eq!(tracker.frame_id(), Some(0));

        // The session continues with the next good frame.
        let next = tracker
            .update(&frame(1, vec![BoundingBox::new(2.0, 0.0, 50.0, 50.0, 0.9)]))
            .unwrap();
        assert_eq!(next.boxes[0].track_id, Some(1));
    }

    #[test]
    fn test_out_of_order_frame_rejected() {
        let mut tracker = ByteTracker::with_default_config();
        tracker.update(&frame(3, vec![])).unwrap();
        assert_eq!(
            tracker.update(&frame(3, vec![])).unwrap_err(),
            Error::FrameOrder { last: 3, got: 3 }
        );
    }

    #[test]
    fn test_low_score_boxes_only_extend_tracks() {
        let config = TrackerConfig {
            high_score_thresh: Some(0.5),
            ..Default::default()
        };
        let mut tracker = ByteTracker::new(config).unwrap();

        let first = tracker
            .update(&frame(0, vec![BoundingBox::new(100.0, 100.0, 100.0, 100.0, 0.9)]))
            .unwrap();
        let id = first.boxes[0].track_id.unwrap();

        let second = tracker
            .update(&frame(1, vec![
                BoundingBox::new(104.0, 102.0, 100.0, 100.0, 0.2),
                BoundingBox::new(600.0, 600.0, 50.0, 50.0, 0.2),
            ]))
            .unwrap();
        assert_eq!(second.boxes[0].track_id, Some(id));
        assert_eq!(second.boxes[1].track_id, None);
        assert_eq!(tracker.active_tracks().len(), 1);
    }

    #[test]
    fn test_duplicate_suppression_keeps_older_track() {
        let config = TrackerConfig {
            duplicate_iou: Some(0.85),
            ..Default::default()
        };
        let mut tracker = ByteTracker::new(config).unwrap();
        let a = BoundingBox::new(0.0, 0.0, 100.0, 100.0, 0.9);
        let shifted = BoundingBox::new(2.0, 2.0, 100.0, 100.0, 0.9);
        for n in 0..3 {
            tracker.update(&frame(n, vec![a.clone()])).unwrap();
        }

        // A second, heavily overlapping box starts track 2 next to track 1.
        tracker.update(&frame(3, vec![a.clone(), shifted])).unwrap();
        assert_eq!(tracker.active_tracks().len(), 2);

        // Track 2 goes lost on top of the older track 1 and is dropped.
        let update = tracker.update(&frame(4, vec![a])).unwrap();
        assert_eq!(update.removed, vec![2]);
        let ids: Vec<u64> = tracker.active_tracks().iter().map(|t| t.track_id).collect();
        assert_eq!(ids, vec![1]);
        assert_eq!(tracker.trajectory(2).map(|o| o.state), Some(TrackState::Removed));
    }

    #[test]
    fn test_suppressed_newborn_track_leaves_box_unannotated() {
        let config = TrackerConfig {
            duplicate_iou: Some(0.15),
            ..Default::default()
        };
        let mut tracker = ByteTracker::new(config).unwrap();
        for n in 0..4 {
            tracker
                .update(&frame(n, vec![BoundingBox::new(0.0, 0.0, 100.0, 100.0, 0.9)]))
                .unwrap();
        }

        // IoU 0.25: too weak to match track 1, strong enough to count as its duplicate
        let update = tracker
            .update(&frame(4, vec![BoundingBox::new(60.0, 0.0, 100.0, 100.0, 0.9)]))
            .unwrap();
        assert_eq!(update.removed, vec![2]);
        assert_eq!(update.boxes[0].track_id, None);
        assert!(update.tracks.is_empty());
        assert!(tracker.trajectory(2).is_none());
        assert_eq!(tracker.trajectory(1).map(|o| o.state), Some(TrackState::Lost));
    }

    #[test]
    fn test_selection_is_exclusive() {
        let mut tracker = ByteTracker::with_default_config();
        tracker
            .update(&frame(0, vec![
                BoundingBox::new(0.0, 0.0, 50.0, 50.0, 0.9),
                BoundingBox::new(300.0, 0.0, 50.0, 50.0, 0.9),
            ]))
            .unwrap();

        assert!(tracker.select_track(1));
        assert!(tracker.select_track(2));
        let selected: Vec<u64> = tracker
            .trajectories()
            .filter(|o| o.selected)
            .map(|o| o.id)
            .collect();
        assert_eq!(selected, vec![2]);

        assert!(!tracker.select_track(99));
        assert_eq!(tracker.selected().map(|o| o.id), Some(2));

        tracker.clear_selection();
        assert!(tracker.selected().is_none());
    }

    #[test]
    fn test_removed_trajectory_not_selectable() {
        let config = TrackerConfig {
            max_frames_lost: 1,
            ..Default::default()
        };
        let mut tracker = ByteTracker::new(config).unwrap();
        tracker
            .update(&frame(0, vec![BoundingBox::new(0.0, 0.0, 50.0, 50.0, 0.9)]))
            .unwrap();
        tracker.update(&frame(1, vec![])).unwrap();
        assert!(tracker.select_track(1));
        tracker.clear_selection();

        tracker.update(&frame(2, vec![])).unwrap();
        assert_eq!(tracker.trajectory(1).map(|o| o.state), Some(TrackState::Removed));
        assert!(!tracker.select_track(1));
        assert!(tracker.selected().is_none());
    }

    #[test]
    fn test_match_threshold_adjustable() {
        let mut tracker = ByteTracker::with_default_config();
        assert!(tracker.set_match_threshold(1.5).is_err());
        tracker.set_match_threshold(0.2).unwrap();

        tracker
            .update(&frame(0, vec![BoundingBox::new(0.0, 0.0, 100.0, 100.0, 0.9)]))
            .unwrap();
        // IoU ~0.67 gives a cost of ~0.33, above the tightened 0.2 threshold.
        let update = tracker
            .update(&frame(1, vec![BoundingBox::new(20.0, 0.0, 100.0, 100.0, 0.9)]))
            .unwrap();
        assert_eq!(update.boxes[0].track_id, Some(2));
    }
}
