//! Turns trajectories into one bounded, smoothed camera transform per frame.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::progress::{CancellationToken, Progress};
use crate::reframe::camera::{CropGeometry, FrameTransform};
use crate::reframe::config::ReframingConfig;
use crate::reframe::smoother::CameraSmoother;
use crate::reframe::target::{TargetFix, TargetResolver};
use crate::tracker::{Rect, TrackedObject};

#[derive(Debug, Default)]
struct RunStats {
    targets: u64,
    held: u64,
    fallbacks: u64,
    overrides: u64,
}

/// Reframing engine for one source video.
///
/// Output frame `i` corresponds to source frame `i`. Transforms are cached for
/// random access and bulk export; manual overrides survive [`recompute`]
/// but not an explicit [`run`].
///
/// [`recompute`]: ReframingEngine::recompute
/// [`run`]: ReframingEngine::run
pub struct ReframingEngine {
    config: ReframingConfig,
    geometry: CropGeometry,
    transforms: BTreeMap<u64, FrameTransform>,
    overrides: BTreeSet<u64>,
    frame_count: Option<u64>,
}

impl ReframingEngine {
    pub fn new(config: ReframingConfig, frame_width: u32, frame_height: u32) -> Result<Self> {
        config.validate()?;
        let geometry = CropGeometry::new(frame_width, frame_height, config.output_aspect_ratio)?;
        Ok(Self {
            config,
            geometry,
            transforms: BTreeMap::new(),
            overrides: BTreeSet::new(),
            frame_count: None,
        })
    }

    pub fn config(&self) -> &ReframingConfig {
        &self.config
    }

    /// Replace the configuration; computed transforms stay until the next run.
    ///
    /// When the crop geometry changes, every automatic transform is dropped
    /// and the overrides are re-clamped to the new crop size.
    pub fn set_config(&mut self, config: ReframingConfig) -> Result<()> {
        config.validate()?;
        let geometry = CropGeometry::new(
            self.geometry.frame_width as u32,
            self.geometry.frame_height as u32,
            config.output_aspect_ratio,
        )?;
        if geometry != self.geometry {
            self.transforms.retain(|frame, _| self.overrides.contains(frame));
            for transform in self.transforms.values_mut() {
                *transform = geometry.clamp(*transform);
            }
            debug!(overrides = self.overrides.len(), "Crop geometry changed");
        }
        self.geometry = geometry;
        self.config = config;
        Ok(())
    }

    pub fn geometry(&self) -> &CropGeometry {
        &self.geometry
    }

    /// Compute every transform from scratch, discarding manual overrides.
    pub fn run<'a>(
        &mut self,
        objects: impl IntoIterator<Item = &'a TrackedObject>,
        frame_count: u64,
    ) -> Result<()> {
        self.run_with(objects, frame_count, &CancellationToken::new(), &mut |_| {})
    }

    /// [`run`](Self::run) with cancellation and progress reporting.
    ///
    /// On cancellation the transforms computed so far stay cached and
    /// `Error::Cancelled` is returned.
    pub fn run_with<'a>(
        &mut self,
        objects: impl IntoIterator<Item = &'a TrackedObject>,
        frame_count: u64,
        cancel: &CancellationToken,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<()> {
        self.transforms.clear();
        self.overrides.clear();
        self.compute(objects, frame_count, cancel, progress)
    }

    /// Recompute automatic transforms, keeping manual overrides in place.
    pub fn recompute<'a>(
        &mut self,
        objects: impl IntoIterator<Item = &'a TrackedObject>,
        frame_count: u64,
    ) -> Result<()> {
        self.overrides.retain(|&frame| frame < frame_count);
        self.transforms
            .retain(|frame, _| self.overrides.contains(frame));
        self.compute(objects, frame_count, &CancellationToken::new(), &mut |_| {})
    }

    fn compute<'a>(
        &mut self,
        objects: impl IntoIterator<Item = &'a TrackedObject>,
        frame_count: u64,
        cancel: &CancellationToken,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<()> {
        self.frame_count = Some(frame_count);
        let geometry = self.geometry;
        let config = &self.config;
        let objects: Vec<&TrackedObject> = objects.into_iter().collect();
        let mut resolver =
            TargetResolver::new(config, geometry.frame_width, geometry.frame_height, objects);
        let mut smoother = CameraSmoother::new(config.smoothness);
        let mut stats = RunStats::default();

        for frame in 0..frame_count {
            if cancel.is_cancelled() {
                info!(frame, total = frame_count, "Reframing cancelled");
                return Err(Error::Cancelled);
            }

            let fix = resolver.resolve(frame);

            if self.overrides.contains(&frame) {
                if let Some(manual) = self.transforms.get_mut(&frame) {
                    *manual = geometry.clamp(*manual);
                    smoother.seed(*manual);
                }
                stats.overrides += 1;
                progress(Progress::new(frame + 1, frame_count));
                continue;
            }

            let raw = match fix {
                TargetFix::Target(rect) => {
                    stats.targets += 1;
                    geometry.camera_for(&rect, config.padding_fraction, config.manual_offset, config.max_zoom)
                }
                TargetFix::Held(rect) => {
                    stats.held += 1;
                    geometry.camera_for(&rect, config.padding_fraction, config.manual_offset, config.max_zoom)
                }
                TargetFix::Fallback => {
                    stats.fallbacks += 1;
                    geometry.fallback(config.fallback)
                }
            };

            let transform = geometry.clamp(smoother.next(raw));
            self.transforms.insert(frame, transform);
            progress(Progress::new(frame + 1, frame_count));
        }

        debug!(
            targets = stats.targets,
            held = stats.held,
            fallbacks = stats.fallbacks,
            overrides = stats.overrides,
            "Camera path statistics"
        );
        info!(frames = frame_count, "Reframing complete");
        Ok(())
    }

    /// Cached transform of `frame_index`, or `None` outside the computed range.
    pub fn get_frame_transform(&self, frame_index: u64) -> Option<FrameTransform> {
        self.transforms.get(&frame_index).copied()
    }

    /// Source rectangle sampled for `frame_index`.
    pub fn crop_rect(&self, frame_index: u64) -> Option<Rect> {
        self.get_frame_transform(frame_index)
            .map(|t| self.geometry.crop_rect(&t))
    }

    /// Manually correct one frame.
    ///
    /// The transform is clamped to the source bounds and kept across
    /// [`recompute`](Self::recompute). Returns the stored transform.
    pub fn update_transform(&mut self, frame_index: u64, transform: FrameTransform) -> Result<FrameTransform> {
        let Some(frame_count) = self.frame_count else {
            return Err(Error::NotInitialized("reframing engine"));
        };
        if frame_index >= frame_count {
            return Err(Error::OutOfBounds {
                index: frame_index,
                len: frame_count,
            });
        }
        transform.validate()?;

        let clamped = self.geometry.clamp(transform);
        self.transforms.insert(frame_index, clamped);
        self.overrides.insert(frame_index);
        debug!(frame = frame_index, "Manual transform override");
        Ok(clamped)
    }

    pub fn is_overridden(&self, frame_index: u64) -> bool {
        self.overrides.contains(&frame_index)
    }

    /// All cached transforms keyed by output frame index.
    pub fn transforms(&self) -> &BTreeMap<u64, FrameTransform> {
        &self.transforms
    }

    /// Number of output frames of the last run, if any.
    pub fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }
}
