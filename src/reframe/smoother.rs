//! Temporal smoothing of raw camera parameters.

use crate::reframe::camera::FrameTransform;

/// Weight of the previous value at `smoothness = 1`. Kept below 1 so the
/// camera still converges on the target.
const MAX_DAMPING: f32 = 0.95;

/// Exponential moving average over `(x, y, scale)`.
///
/// `alpha = 1 - MAX_DAMPING * smoothness`: a smoothness of 0 passes raw values
/// through, 1 applies the strongest low-pass filtering.
#[derive(Debug, Clone)]
pub struct CameraSmoother {
    alpha: f32,
    state: Option<FrameTransform>,
}

impl CameraSmoother {
    pub fn new(smoothness: f32) -> Self {
        let smoothness = smoothness.clamp(0.0, 1.0);
        Self {
            alpha: 1.0 - MAX_DAMPING * smoothness,
            state: None,
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Feed the next raw camera and return the smoothed one.
    pub fn next(&mut self, raw: FrameTransform) -> FrameTransform {
        let smoothed = match self.state {
            None => raw,
            Some(prev) => FrameTransform {
                x: ema(prev.x, raw.x, self.alpha),
                y: ema(prev.y, raw.y, self.alpha),
                scale: ema(prev.scale, raw.scale, self.alpha),
                rotation: raw.rotation,
            },
        };
        self.state = Some(smoothed);
        smoothed
    }

    /// Continue from `transform` as if it had been produced by the smoother.
    pub fn seed(&mut self, transform: FrameTransform) {
        self.state = Some(transform);
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}

#[inline]
fn ema(prev: f32, value: f32, alpha: f32) -> f32 {
    alpha * value + (1.0 - alpha) * prev
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_smoothness_passes_through() {
        let mut smoother = CameraSmoother::new(0.0);
        smoother.next(FrameTransform::new(0.0, 0.0, 1.0));
        let out = smoother.next(FrameTransform::new(100.0, 50.0, 2.0));
        assert_eq!(out, FrameTransform::new(100.0, 50.0, 2.0));
    }

    #[test]
    fn test_higher_smoothness_lags_more() {
        let step = |smoothness: f32| {
            let mut smoother = CameraSmoother::new(smoothness);
            smoother.next(FrameTransform::new(0.0, 0.0, 1.0));
            smoother.next(FrameTransform::new(100.0, 0.0, 1.0)).x
        };
        let light = step(0.2);
        let heavy = step(1.0);
        assert!(light > heavy);
        assert!((heavy - 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_converges_on_constant_target() {
        let mut smoother = CameraSmoother::new(1.0);
        smoother.next(FrameTransform::new(0.0, 0.0, 1.0));
        let mut last = FrameTransform::new(0.0, 0.0, 1.0);
        for _ in 0..400 {
            last = smoother.next(FrameTransform::new(100.0, 100.0, 2.0));
        }
        assert!((last.x - 100.0).abs() < 1e-2);
        assert!((last.scale - 2.0).abs() < 1e-3);
    }
}
