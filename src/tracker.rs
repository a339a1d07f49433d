mod byte_tracker;
mod detection;
mod kalman_filter;
mod matching;
mod rect;
mod track;
mod track_state;
mod tracked_object;

pub use byte_tracker::{ByteTracker, FrameUpdate, TrackerConfig};
pub use detection::{BoundingBox, Detection};
pub use kalman_filter::{KalmanFilter, MIN_HEIGHT};
pub use matching::{AssignmentResult, AssignmentStrategy, fuse_score, iou_distance, linear_assignment};
pub use rect::{Rect, iou_batch};
pub use track::{Track, TrackIdGenerator};
pub use track_state::TrackState;
pub use tracked_object::TrackedObject;
