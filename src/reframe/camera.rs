//! Virtual camera geometry: crop sizing, fallback framing and bounds clamping.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::reframe::config::FallbackFraming;
use crate::tracker::Rect;

/// Crop placed on the source frame for one output frame.
///
/// `x`/`y` are the crop centre in source pixels. `scale` is the zoom relative
/// to the widest crop with the output aspect ratio that fits the source, so
/// `scale = 1` is that widest crop and larger values zoom in. `rotation` is in
/// degrees and left to the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameTransform {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    pub rotation: f32,
}

impl FrameTransform {
    pub fn new(x: f32, y: f32, scale: f32) -> Self {
        Self {
            x,
            y,
            scale,
            rotation: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if ![self.x, self.y, self.scale, self.rotation]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(Error::invalid_input(format!(
                "transform has non-finite values: {self:?}"
            )));
        }
        if self.scale <= 0.0 {
            return Err(Error::invalid_input(format!(
                "transform scale must be positive, got {}",
                self.scale
            )));
        }
        Ok(())
    }
}

/// Source frame size together with the widest output-aspect crop it allows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropGeometry {
    pub frame_width: f32,
    pub frame_height: f32,
    pub base_width: f32,
    pub base_height: f32,
}

impl CropGeometry {
    pub fn new(frame_width: u32, frame_height: u32, output_aspect_ratio: f32) -> Result<Self> {
        if frame_width == 0 || frame_height == 0 {
            return Err(Error::invalid_config(format!(
                "source frame must have a positive size, got {frame_width}x{frame_height}"
            )));
        }
        if !(output_aspect_ratio.is_finite() && output_aspect_ratio > 0.0) {
            return Err(Error::invalid_config(format!(
                "output_aspect_ratio must be positive, got {output_aspect_ratio}"
            )));
        }

        let fw = frame_width as f32;
        let fh = frame_height as f32;
        let (base_width, base_height) = if fw / fh > output_aspect_ratio {
            // Source is wider than the output: full height, cropped width
            ((fh * output_aspect_ratio).min(fw), fh)
        } else {
            (fw, (fw / output_aspect_ratio).min(fh))
        };

        Ok(Self {
            frame_width: fw,
            frame_height: fh,
            base_width,
            base_height,
        })
    }

    pub fn output_aspect_ratio(&self) -> f32 {
        self.base_width / self.base_height
    }

    pub fn frame_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.frame_width, self.frame_height)
    }

    /// Crop size at `scale`.
    pub fn crop_size(&self, scale: f32) -> (f32, f32) {
        (self.base_width / scale, self.base_height / scale)
    }

    /// Source rectangle sampled by `transform`, ignoring rotation.
    pub fn crop_rect(&self, transform: &FrameTransform) -> Rect {
        let (w, h) = self.crop_size(transform.scale);
        Rect::from_center(transform.x, transform.y, w, h)
    }

    /// Unsmoothed camera framing `target`.
    ///
    /// The target is padded by `padding` per side, then the shorter dimension
    /// is expanded until the crop has the output aspect ratio exactly.
    pub fn camera_for(&self, target: &Rect, padding: f32, offset: [f32; 2], max_zoom: f32) -> FrameTransform {
        let padded = target.pad(padding);
        let aspect = self.output_aspect_ratio();

        let crop_height = if padded.height * aspect < padded.width {
            padded.width / aspect
        } else {
            padded.height
        };
        let scale = if crop_height > 0.0 {
            (self.base_height / crop_height).min(max_zoom)
        } else {
            max_zoom
        };

        let (cx, cy) = padded.center();
        FrameTransform::new(cx + offset[0], cy + offset[1], scale)
    }

    /// Framing used when no target is known.
    pub fn fallback(&self, framing: FallbackFraming) -> FrameTransform {
        let cx = self.frame_width / 2.0;
        match framing {
            FallbackFraming::Center => FrameTransform::new(cx, self.frame_height / 2.0, 1.0),
            FallbackFraming::UpperCenter => FrameTransform::new(cx, self.base_height / 2.0, 1.0),
        }
    }

    /// Keep the crop inside the source frame.
    ///
    /// The centre moves first; the scale only changes when the crop is larger
    /// than the widest crop that fits (`scale < 1`).
    pub fn clamp(&self, transform: FrameTransform) -> FrameTransform {
        let scale = if transform.scale.is_finite() && transform.scale >= 1.0 {
            transform.scale
        } else {
            1.0
        };
        let (w, h) = self.crop_size(scale);
        FrameTransform {
            x: clamp_axis(transform.x, w, self.frame_width),
            y: clamp_axis(transform.y, h, self.frame_height),
            scale,
            rotation: if transform.rotation.is_finite() {
                transform.rotation
            } else {
                0.0
            },
        }
    }
}

fn clamp_axis(center: f32, extent: f32, limit: f32) -> f32 {
    let half = extent / 2.0;
    if !center.is_finite() || extent >= limit {
        return limit / 2.0;
    }
    center.clamp(half, limit - half)
}
