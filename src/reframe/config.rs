//! Configuration for the reframing engine.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tracker::Rect;

/// How many subjects the virtual camera frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackingMode {
    /// Follow one target
    #[default]
    Single,
    /// Frame every visible subject
    Multi,
    /// Frame every subject while they stay close together, else follow one
    Auto,
}

/// Rule for picking the target when nothing is selected explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetSelection {
    /// Largest box area, decided independently per frame
    #[default]
    Largest,
    /// Closest to the frame centre
    Centered,
    /// Highest detection confidence
    MostConfident,
    /// Only the selected trajectory or the configured manual target
    Manual,
}

/// Explicit target that overrides every automatic choice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManualTarget {
    /// Follow one trajectory and ignore all others
    Track { id: u64 },
    /// Frame a fixed source region
    Region { rect: Rect },
}

/// Framing used once the target has been missing longer than the hold window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackFraming {
    /// Widest crop centred on the frame
    #[default]
    Center,
    /// Widest crop pushed towards the top of the frame
    UpperCenter,
}

/// Configuration for the reframing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReframingConfig {
    /// Output width divided by output height (9:16 = 0.5625)
    pub output_aspect_ratio: f32,
    pub tracking_mode: TrackingMode,
    /// 0 passes raw camera values through, 1 damps them the most
    pub smoothness: f32,
    /// Extra room around the target, as a fraction of its size per side
    pub padding_fraction: f32,
    pub target_selection: TargetSelection,
    pub manual_target: Option<ManualTarget>,
    /// Offset added to the camera centre, in source pixels
    pub manual_offset: [f32; 2],
    /// Frames to hold the last target position across a gap
    pub max_hold_frames: u32,
    /// Upper bound on zoom relative to the widest crop
    pub max_zoom: f32,
    /// `Auto` mode frames all subjects while their centres stay within this
    /// fraction of the frame width of each other
    pub multi_subject_separation: f32,
    pub fallback: FallbackFraming,
}

impl Default for ReframingConfig {
    fn default() -> Self {
        Self {
            output_aspect_ratio: 9.0 / 16.0,
            tracking_mode: TrackingMode::Single,
            smoothness: 0.5,
            padding_fraction: 0.2,
            target_selection: TargetSelection::Largest,
            manual_target: None,
            manual_offset: [0.0, 0.0],
            max_hold_frames: 15,
            max_zoom: 4.0,
            multi_subject_separation: 0.35,
            fallback: FallbackFraming::Center,
        }
    }
}

impl ReframingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.output_aspect_ratio.is_finite() && self.output_aspect_ratio > 0.0) {
            return Err(Error::invalid_config(format!(
                "output_aspect_ratio must be positive, got {}",
                self.output_aspect_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothness) {
            return Err(Error::invalid_config(format!(
                "smoothness must lie in [0, 1], got {}",
                self.smoothness
            )));
        }
        if !(self.padding_fraction.is_finite() && self.padding_fraction >= 0.0) {
            return Err(Error::invalid_config(format!(
                "padding_fraction must be non-negative, got {}",
                self.padding_fraction
            )));
        }
        if !(self.max_zoom.is_finite() && self.max_zoom >= 1.0) {
            return Err(Error::invalid_config(format!(
                "max_zoom must be at least 1, got {}",
                self.max_zoom
            )));
        }
        if !(self.multi_subject_separation.is_finite() && self.multi_subject_separation >= 0.0) {
            return Err(Error::invalid_config(format!(
                "multi_subject_separation must be non-negative, got {}",
                self.multi_subject_separation
            )));
        }
        if self.manual_offset.iter().any(|v| !v.is_finite()) {
            return Err(Error::invalid_config("manual_offset must be finite"));
        }
        if let Some(ManualTarget::Region { rect }) = &self.manual_target {
            if rect.width <= 0.0 || rect.height <= 0.0 {
                return Err(Error::invalid_config(format!(
                    "manual target region must have a positive size, got {rect:?}"
                )));
            }
        }
        Ok(())
    }
}
