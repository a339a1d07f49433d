//! Glue between object detection backends and the tracker.
//!
//! Any detector that implements [`DetectionSource`] can be driven frame by
//! frame through a [`TrackerPipeline`].

mod builder;
mod detector;
mod pipeline;

pub use builder::BoxBuilder;
pub use detector::DetectionSource;
pub use pipeline::{FrameInput, PipelineError, RunReport, TrackerPipeline};
