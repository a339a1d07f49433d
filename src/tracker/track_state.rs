use serde::{Deserialize, Serialize};

/// Track state enumeration for object tracking lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackState {
    /// Created from an unmatched detection, not yet activated
    #[default]
    New,
    /// Matched in the most recent frame
    Tracked,
    /// Unmatched, kept for rematching within the lost-age window
    Lost,
    /// Terminal; dropped from the active set
    Removed,
}

impl TrackState {
    /// Whether the track still takes part in association.
    pub fn is_live(&self) -> bool {
        matches!(self, TrackState::Tracked | TrackState::Lost)
    }
}
