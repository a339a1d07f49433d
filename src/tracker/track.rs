//! Single-subject track for multi-object tracking.

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};
use crate::tracker::detection::BoundingBox;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

/// Issues track ids for one tracking session.
///
/// Ids start at 1, strictly increase and are never reused until [`reset`](Self::reset).
#[derive(Debug, Clone, Default)]
pub struct TrackIdGenerator {
    last: u64,
}

impl TrackIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    /// Most recently issued id, 0 if none.
    pub fn last_id(&self) -> u64 {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = 0;
    }
}

/// Single subject track.
#[derive(Debug, Clone)]
pub struct Track {
    /// Unique track identifier, 0 until activated
    pub track_id: u64,
    /// Current track state
    pub state: TrackState,
    /// Whether the track has been activated (confirmed)
    pub is_activated: bool,
    /// Confidence of the last matched detection
    pub score: f32,
    /// Frame of the last matched detection
    pub frame_id: u64,
    /// Frame the track was activated in
    pub start_frame: u64,
    /// Consecutive matched updates since (re)activation
    pub tracklet_len: u32,
    /// Kalman filter state mean (8-dim)
    pub mean: Option<Array1<f64>>,
    /// Kalman filter state covariance (8x8)
    pub covariance: Option<Array2<f64>>,
    /// Raw detection box the track was created from (TLWH format)
    pub tlwh: Rect,
    pub class_label: String,
    pub class_id: u32,
}

impl Track {
    /// Create a new, unactivated track from a detection.
    pub fn new(detection: &BoundingBox) -> Self {
        Self {
            track_id: 0,
            state: TrackState::New,
            is_activated: false,
            score: detection.confidence,
            frame_id: 0,
            start_frame: 0,
            tracklet_len: 0,
            mean: None,
            covariance: None,
            tlwh: detection.rect(),
            class_label: detection.class_label.clone(),
            class_id: detection.class_id,
        }
    }

    /// Current box estimate in TLWH format.
    ///
    /// Falls back to the raw detection box before activation.
    pub fn tlwh(&self) -> Rect {
        match &self.mean {
            Some(mean) => Rect::from_xyah(
                mean[0] as f32,
                mean[1] as f32,
                mean[2] as f32,
                mean[3] as f32,
            ),
            None => self.tlwh,
        }
    }

    /// Current box estimate as `(x1, y1, x2, y2)`.
    pub fn tlbr(&self) -> [f32; 4] {
        self.tlwh().to_tlbr()
    }

    pub fn end_frame(&self) -> u64 {
        self.frame_id
    }

    /// Frames elapsed since the last matched detection.
    pub fn frames_since_update(&self, frame_id: u64) -> u64 {
        frame_id.saturating_sub(self.frame_id)
    }

    /// Consumer-facing box for the current estimate, tagged with this track.
    pub fn to_bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox::from_rect(self.tlwh(), self.score.clamp(0.0, 1.0))
            .with_label(self.class_label.clone(), self.class_id);
        bbox.track_id = Some(self.track_id);
        bbox
    }

    /// Start a new tracklet: take an id and initialise the motion model.
    pub fn activate(&mut self, kalman_filter: &KalmanFilter, frame_id: u64, ids: &mut TrackIdGenerator) {
        self.track_id = ids.next_id();

        let (mean, covariance) = kalman_filter.initiate(self.tlwh.to_xyah_f64());

        self.mean = Some(mean);
        self.covariance = Some(covariance);
        self.tracklet_len = 0;
        self.state = TrackState::Tracked;
        // Tracks are usable the frame they appear; no confirmation delay.
        self.is_activated = true;
        self.frame_id = frame_id;
        self.start_frame = frame_id;
    }

    /// Re-establish a lost track from a fresh detection.
    pub fn re_activate(
        &mut self,
        detection: &BoundingBox,
        kalman_filter: &KalmanFilter,
        frame_id: u64,
        ids: &mut TrackIdGenerator,
        new_id: bool,
    ) -> Result<()> {
        self.correct(detection, kalman_filter)?;

        self.tlwh = detection.rect();
        self.tracklet_len = 0;
        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.frame_id = frame_id;
        self.score = detection.confidence;

        if new_id {
            self.track_id = ids.next_id();
        }
        Ok(())
    }

    /// Standard matched-frame correction.
    pub fn update(
        &mut self,
        detection: &BoundingBox,
        kalman_filter: &KalmanFilter,
        frame_id: u64,
    ) -> Result<()> {
        self.correct(detection, kalman_filter)?;

        self.tlwh = detection.rect();
        self.frame_id = frame_id;
        self.tracklet_len += 1;
        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.score = detection.confidence;
        Ok(())
    }

    fn correct(&mut self, detection: &BoundingBox, kalman_filter: &KalmanFilter) -> Result<()> {
        let (Some(mean), Some(cov)) = (&self.mean, &self.covariance) else {
            return Err(Error::NotInitialized("track motion state"));
        };
        let (new_mean, new_cov) = kalman_filter.update(mean, cov, detection.rect().to_xyah_f64())?;
        self.mean = Some(new_mean);
        self.covariance = Some(new_cov);
        Ok(())
    }

    /// Advance the motion state one frame.
    ///
    /// Unconfirmed tracks do not coast in height.
    pub fn predict(&mut self, kalman_filter: &KalmanFilter) {
        if let (Some(mean), Some(cov)) = (&self.mean, &self.covariance) {
            let mut mean_to_predict = mean.clone();
            if self.state != TrackState::Tracked {
                mean_to_predict[7] = 0.0;
            }
            let (new_mean, new_cov) = kalman_filter.predict(&mean_to_predict, cov);
            self.mean = Some(new_mean);
            self.covariance = Some(new_cov);
        }
    }

    pub fn mark_lost(&mut self) {
        self.state = TrackState::Lost;
    }

    pub fn mark_removed(&mut self) {
        self.state = TrackState::Removed;
    }

    pub fn multi_predict(tracks: &mut [Track], kalman_filter: &KalmanFilter) {
        for track in tracks.iter_mut() {
            track.predict(kalman_filter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox::new(x, y, w, h, 0.9).with_label("person", 0)
    }

    #[test]
    fn test_id_generator_is_monotonic() {
        let mut ids = TrackIdGenerator::new();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.last_id(), 2);
        ids.reset();
        assert_eq!(ids.next_id(), 1);
    }

    #[test]
    fn test_activate() {
        let kf = KalmanFilter::new();
        let mut ids = TrackIdGenerator::new();
        let mut track = Track::new(&det(10.0, 20.0, 30.0, 40.0));
        assert_eq!(track.state, TrackState::New);

        track.activate(&kf, 7, &mut ids);
        assert_eq!(track.track_id, 1);
        assert_eq!(track.state, TrackState::Tracked);
        assert!(track.is_activated);
        assert_eq!(track.start_frame, 7);
        assert_eq!(track.frame_id, 7);

        let tlwh = track.tlwh().to_tlwh();
        for (got, want) in tlwh.iter().zip([10.0, 20.0, 30.0, 40.0]) {
            assert!((got - want).abs() < 1e-3);
        }
        assert_eq!(track.tlbr()[2], track.tlwh().right());
    }

    #[test]
    fn test_update_before_activation_fails() {
        let kf = KalmanFilter::new();
        let mut track = Track::new(&det(0.0, 0.0, 10.0, 10.0));
        let result = track.update(&det(1.0, 1.0, 10.0, 10.0), &kf, 1);
        assert_eq!(result, Err(Error::NotInitialized("track motion state")));
    }

    #[test]
    fn test_update_increments_tracklet() {
        let kf = KalmanFilter::new();
        let mut ids = TrackIdGenerator::new();
        let mut track = Track::new(&det(0.0, 0.0, 10.0, 10.0));
        track.activate(&kf, 0, &mut ids);
        track.predict(&kf);
        track.update(&det(1.0, 1.0, 10.0, 10.0), &kf, 1).unwrap();
        track.predict(&kf);
        track.update(&det(2.0, 2.0, 10.0, 10.0), &kf, 2).unwrap();
        assert_eq!(track.tracklet_len, 2);
        assert_eq!(track.frame_id, 2);
        assert_eq!(track.frames_since_update(5), 3);
    }

    #[test]
    fn test_lost_track_does_not_coast_in_height() {
        let kf = KalmanFilter::new();
        let mut ids = TrackIdGenerator::new();
        let mut track = Track::new(&det(0.0, 0.0, 10.0, 10.0));
        track.activate(&kf, 0, &mut ids);
        if let Some(mean) = track.mean.as_mut() {
            mean[7] = 5.0;
        }
        track.mark_lost();
        track.predict(&kf);
        let mean = track.mean.as_ref().unwrap();
        assert!((mean[3] - 10.0).abs() < 1e-9);
        assert_eq!(mean[7], 0.0);
    }

    #[test]
    fn test_re_activate_keeps_or_replaces_id() {
        let kf = KalmanFilter::new();
        let mut ids = TrackIdGenerator::new();
        let mut track = Track::new(&det(0.0, 0.0, 10.0, 10.0));
        track.activate(&kf, 0, &mut ids);
        track.mark_lost();

        track.re_activate(&det(1.0, 0.0, 10.0, 10.0), &kf, 3, &mut ids, false).unwrap();
        assert_eq!(track.track_id, 1);
        assert_eq!(track.state, TrackState::Tracked);
        assert_eq!(track.frame_id, 3);

        track.mark_lost();
        track.re_activate(&det(2.0, 0.0, 10.0, 10.0), &kf, 4, &mut ids, true).unwrap();
        assert_eq!(track.track_id, 2);
    }
}
