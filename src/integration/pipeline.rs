//! TrackerPipeline for combining detection with tracking.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::error::{self, Error};
use crate::progress::{CancellationToken, Progress};
use crate::tracker::{ByteTracker, Detection, FrameUpdate, TrackerConfig};

use super::DetectionSource;

/// Errors produced while running a frame through detector and tracker.
#[derive(Debug, Error)]
pub enum PipelineError<E> {
    #[error("Detector failed: {0}")]
    Detector(#[source] E),

    #[error(transparent)]
    Tracking(#[from] Error),
}

/// One decoded video frame handed to the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub frame_number: u64,
    pub timestamp_seconds: f64,
    /// Raw image bytes, in whatever layout the detector expects
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
}

/// Outcome of [`TrackerPipeline::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Frames that went through detection and tracking
    pub processed: u64,
    /// Frame numbers dropped because the detector or tracker rejected them
    pub skipped: Vec<u64>,
    /// Whether the run stopped early on cancellation
    pub cancelled: bool,
}

/// A combined tracker that bundles detection inference with the tracker.
///
/// This struct provides a convenient way to run end-to-end tracking
/// by combining any `DetectionSource` with the `ByteTracker`.
pub struct TrackerPipeline<D: DetectionSource> {
    detector: D,
    tracker: ByteTracker,
}

impl<D: DetectionSource> TrackerPipeline<D> {
    /// Create a new tracking pipeline with the given detector and tracker config.
    pub fn new(detector: D, config: TrackerConfig) -> error::Result<Self> {
        Ok(Self {
            detector,
            tracker: ByteTracker::new(config)?,
        })
    }

    /// Create a new tracking pipeline with default tracker configuration.
    pub fn with_default_config(detector: D) -> Self {
        Self {
            detector,
            tracker: ByteTracker::with_default_config(),
        }
    }

    /// Run detection on one frame and feed the boxes to the tracker.
    ///
    /// # Returns
    /// The tracker's view of the frame, or the first detector or tracking
    /// error. On error the tracking session is unchanged.
    pub fn process_frame(
        &mut self,
        frame_number: u64,
        timestamp_seconds: f64,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<FrameUpdate, PipelineError<D::Error>> {
        let boxes = self
            .detector
            .detect(input, width, height)
            .map_err(PipelineError::Detector)?;
        let detection = Detection::new(frame_number, timestamp_seconds, boxes);
        Ok(self.tracker.update(&detection)?)
    }

    /// Drive a whole frame stream through the pipeline.
    ///
    /// A frame that fails is logged and skipped; processing continues with
    /// the next one. `total` is only used for progress reporting and may be 0
    /// when unknown.
    pub fn run<'a>(
        &mut self,
        frames: impl IntoIterator<Item = FrameInput<'a>>,
        total: u64,
        cancel: &CancellationToken,
        progress: &mut dyn FnMut(Progress),
    ) -> RunReport {
        let mut report = RunReport::default();

        for frame in frames {
            if cancel.is_cancelled() {
                info!(
                    processed = report.processed,
                    frame = frame.frame_number,
                    "Tracking cancelled"
                );
                report.cancelled = true;
                break;
            }

            match self.process_frame(
                frame.frame_number,
                frame.timestamp_seconds,
                frame.data,
                frame.width,
                frame.height,
            ) {
                Ok(_) => report.processed += 1,
                Err(e) => {
                    warn!(frame = frame.frame_number, error = %e, "Skipping frame");
                    report.skipped.push(frame.frame_number);
                }
            }

            let done = report.processed + report.skipped.len() as u64;
            progress(Progress::new(done, total.max(done)));
        }

        if !report.cancelled {
            info!(
                processed = report.processed,
                skipped = report.skipped.len(),
                "Tracking run complete"
            );
        }
        report
    }

    /// Get a reference to the underlying detector.
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Get a mutable reference to the underlying detector.
    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    /// Get a reference to the underlying tracker.
    pub fn tracker(&self) -> &ByteTracker {
        &self.tracker
    }

    /// Get a mutable reference to the underlying tracker.
    pub fn tracker_mut(&mut self) -> &mut ByteTracker {
        &mut self.tracker
    }

    /// Split the pipeline back into detector and tracker.
    pub fn into_parts(self) -> (D, ByteTracker) {
        (self.detector, self.tracker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::BoundingBox;
    use std::collections::VecDeque;

    #[derive(Debug, Error)]
    #[error("mock detector failure")]
    struct MockError;

    /// Replays scripted outputs, one per call.
    struct MockDetector {
        outputs: VecDeque<Result<Vec<BoundingBox>, MockError>>,
    }

    impl MockDetector {
        fn new(outputs: Vec<Result<Vec<BoundingBox>, MockError>>) -> Self {
            Self {
                outputs: outputs.into(),
            }
        }
    }

    impl DetectionSource for MockDetector {
        type Error = MockError;

        fn detect(
            &mut self,
            _input: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<Vec<BoundingBox>, Self::Error> {
            self.outputs.pop_front().unwrap_or(Ok(Vec::new()))
        }
    }

    fn subject() -> BoundingBox {
        BoundingBox::new(10.0, 20.0, 40.0, 60.0, 0.9)
    }

    fn frames(count: u64) -> Vec<FrameInput<'static>> {
        (0..count)
            .map(|n| FrameInput {
                frame_number: n,
                timestamp_seconds: n as f64 / 30.0,
                data: &[],
                width: 640,
                height: 480,
            })
            .collect()
    }

    #[test]
    fn test_tracker_pipeline() {
        let detector = MockDetector::new(vec![Ok(vec![subject()])]);
        let mut pipeline = TrackerPipeline::with_default_config(detector);

        let update = pipeline.process_frame(0, 0.0, &[], 640, 480).unwrap();
        assert_eq!(update.tracks.len(), 1);
        assert_eq!(update.boxes[0].track_id, Some(1));
    }

    #[test]
    fn test_detector_error_is_wrapped() {
        let detector = MockDetector::new(vec![Err(MockError)]);
        let mut pipeline = TrackerPipeline::with_default_config(detector);
        let err = pipeline.process_frame(0, 0.0, &[], 640, 480).unwrap_err();
        assert!(matches!(err, PipelineError::Detector(MockError)));
        assert_eq!(pipeline.tracker().frame_id(), None);
    }

    #[test]
    fn test_run_skips_failing_frames() {
        let bad = BoundingBox::new(0.0, 0.0, 10.0, 10.0, 2.0);
        let detector = MockDetector::new(vec![
            Ok(vec![subject()]),
            Err(MockError),
            Ok(vec![bad]),
            Ok(vec![subject()]),
        ]);
        let mut pipeline = TrackerPipeline::with_default_config(detector);

        let mut seen = Vec::new();
        let report = pipeline.run(frames(4), 4, &CancellationToken::new(), &mut |p| seen.push(p));

        assert_eq!(report.processed, 2);
        assert_eq!(report.skipped, vec![1, 2]);
        assert!(!report.cancelled);
        assert_eq!(seen.len(), 4);
        assert!(seen.last().is_some_and(|p| p.is_complete()));

        let object = pipeline.tracker().trajectory(1).unwrap();
        assert_eq!((object.first_frame, object.last_frame), (0, 3));
    }

    #[test]
    fn test_run_stops_on_cancel() {
        let detector = MockDetector::new(Vec::new());
        let mut pipeline = TrackerPipeline::with_default_config(detector);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        let report = pipeline.run(frames(10), 10, &cancel, &mut |p| {
            if p.processed == 3 {
                trigger.cancel();
            }
        });

        assert!(report.cancelled);
        assert_eq!(report.processed, 3);
        assert_eq!(pipeline.tracker().frame_id(), Some(2));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TrackerConfig {
            match_thresh: 0.0,
            ..Default::default()
        };
        assert!(TrackerPipeline::new(MockDetector::new(Vec::new()), config).is_err());
    }
}
