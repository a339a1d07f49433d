//! Virtual-camera reframing driven by tracked trajectories.
//!
//! Per output frame the engine resolves a target, frames it with the output
//! aspect ratio, smooths the camera over time and clamps the crop so it never
//! leaves the source frame.

mod camera;
mod config;
mod engine;
mod smoother;
mod target;

pub use camera::{CropGeometry, FrameTransform};
pub use config::{FallbackFraming, ManualTarget, ReframingConfig, TargetSelection, TrackingMode};
pub use engine::ReframingEngine;
pub use smoother::CameraSmoother;
pub use target::{TargetFix, TargetResolver};
