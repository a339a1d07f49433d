//! Subject tracking and virtual-camera reframing for video.
//!
//! The [`tracker`] module links per-frame detections into identity-preserving
//! trajectories (Kalman prediction, IoU association, track lifecycle). The
//! [`reframe`] module turns those trajectories into one smoothed, bounded
//! [`FrameTransform`] per output frame. [`integration`] connects any detector
//! to the tracker.
//!
//! ```
//! use reframe_rs::{BoundingBox, ByteTracker, Detection, ReframingConfig, ReframingEngine};
//!
//! let mut tracker = ByteTracker::with_default_config();
//! for frame in 0..3 {
//!     let boxes = vec![BoundingBox::new(900.0, 500.0, 100.0, 100.0, 0.9)];
//!     tracker.update(&Detection::new(frame, frame as f64 / 30.0, boxes)).unwrap();
//! }
//!
//! let mut engine = ReframingEngine::new(ReframingConfig::default(), 1920, 1080).unwrap();
//! engine.run(tracker.trajectories(), 3).unwrap();
//! assert!(engine.get_frame_transform(2).is_some());
//! ```

mod error;
pub mod integration;
pub mod progress;
pub mod reframe;
pub mod tracker;

pub use error::{Error, Result};
pub use integration::{BoxBuilder, DetectionSource, PipelineError, RunReport, TrackerPipeline};
pub use progress::{CancellationToken, Progress};
pub use reframe::{FrameTransform, ReframingConfig, ReframingEngine};
pub use tracker::{
    BoundingBox, ByteTracker, Detection, FrameUpdate, Rect, TrackState, TrackedObject,
    TrackerConfig,
};
