//! Consumer-facing trajectory of one track.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tracker::detection::BoundingBox;
use crate::tracker::track_state::TrackState;

/// Per-frame trajectory of a single subject.
///
/// `positions` holds one box per frame the track was observed or, while lost,
/// predicted by the motion model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    pub id: u64,
    pub first_frame: u64,
    pub last_frame: u64,
    pub positions: BTreeMap<u64, BoundingBox>,
    pub label: String,
    pub selected: bool,
    /// Lifecycle state of the owning track
    pub state: TrackState,
    /// Frames with a real detection, as opposed to a prediction
    pub observed_frames: u64,
}

impl TrackedObject {
    pub(crate) fn new(id: u64, label: String) -> Self {
        Self {
            id,
            first_frame: 0,
            last_frame: 0,
            positions: BTreeMap::new(),
            label,
            selected: false,
            state: TrackState::Tracked,
            observed_frames: 0,
        }
    }

    pub(crate) fn record(&mut self, frame: u64, bbox: BoundingBox, observed: bool) {
        if self.positions.is_empty() {
            self.first_frame = frame;
        }
        self.last_frame = frame;
        self.positions.insert(frame, bbox);
        if observed {
            self.observed_frames += 1;
        }
    }

    /// Box at `frame`, if the track was observed or predicted there.
    pub fn position(&self, frame: u64) -> Option<&BoundingBox> {
        self.positions.get(&frame)
    }

    /// Most recent box at or before `frame`, with its frame number.
    pub fn last_position_before(&self, frame: u64) -> Option<(u64, &BoundingBox)> {
        self.positions
            .range(..=frame)
            .next_back()
            .map(|(f, b)| (*f, b))
    }

    pub fn is_live(&self) -> bool {
        self.state.is_live()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tracks_frame_range() {
        let mut object = TrackedObject::new(3, "head".to_string());
        object.record(4, BoundingBox::new(0.0, 0.0, 10.0, 10.0, 0.9), true);
        object.record(5, BoundingBox::new(1.0, 0.0, 10.0, 10.0, 0.9), false);
        object.record(9, BoundingBox::new(2.0, 0.0, 10.0, 10.0, 0.9), true);

        assert_eq!(object.first_frame, 4);
        assert_eq!(object.last_frame, 9);
        assert_eq!(object.len(), 3);
        assert_eq!(object.observed_frames, 2);
        assert!(object.position(6).is_none());
        assert_eq!(object.last_position_before(7).map(|(f, _)| f), Some(5));
        assert!(object.last_position_before(3).is_none());
    }
}
