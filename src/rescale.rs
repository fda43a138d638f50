use kornia_image::ImageSize;
use serde::Serialize;

use crate::{
    bounding_box::{PixelBox, ScoredBox},
    decode::Candidate,
    error::DetectError,
};

/// Ratio of the original image size to the model input size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleFactors {
    /// Horizontal factor, `image width / input width`.
    pub x_factor: f32,
    /// Vertical factor, `image height / input height`.
    pub y_factor: f32,
}

impl ScaleFactors {
    /// Derive the factors that invert a resize from `image_size` to `input_size`.
    pub fn new(image_size: ImageSize, input_size: ImageSize) -> Result<Self, DetectError> {
        if input_size.width == 0 || input_size.height == 0 {
            return Err(DetectError::InvalidConfig(format!(
                "Invalid model input size: {}x{}",
                input_size.width, input_size.height
            )));
        }
        Ok(Self {
            x_factor: image_size.width as f32 / input_size.width as f32,
            y_factor: image_size.height as f32 / input_size.height as f32,
        })
    }

    /// Factors for an image that already has the model input size.
    pub fn identity() -> Self {
        Self {
            x_factor: 1.0,
            y_factor: 1.0,
        }
    }
}

/// Map a candidate from model input space to original image pixels.
///
/// Coordinates are truncated towards zero. Candidates whose width or height is
/// not positive after truncation are dropped.
pub fn rescale(candidate: &Candidate, factors: ScaleFactors) -> Option<ScoredBox> {
    let bbox = PixelBox {
        left: ((candidate.cx - candidate.w / 2.0) * factors.x_factor) as i32,
        top: ((candidate.cy - candidate.h / 2.0) * factors.y_factor) as i32,
        width: (candidate.w * factors.x_factor) as i32,
        height: (candidate.h * factors.y_factor) as i32,
    };

    if bbox.width <= 0 || bbox.height <= 0 {
        tracing::trace!("dropping degenerate box {:?} of row {}", bbox, candidate.index);
        return None;
    }

    Some(ScoredBox {
        bbox,
        score: candidate.confidence,
        class_id: candidate.class_id,
    })
}

/// Clip a box to the image bounds, dropping it if nothing remains inside.
pub fn clip_to_image(scored: ScoredBox, image_size: ImageSize) -> Option<ScoredBox> {
    let max_x = image_size.width as i32;
    let max_y = image_size.height as i32;
    let left = scored.bbox.left.clamp(0, max_x);
    let top = scored.bbox.top.clamp(0, max_y);
    let right = scored.bbox.right().clamp(0, max_x);
    let bottom = scored.bbox.bottom().clamp(0, max_y);

    if right <= left || bottom <= top {
        tracing::trace!("dropping box {:?} outside of the image", scored.bbox);
        return None;
    }

    Some(ScoredBox {
        bbox: PixelBox {
            left,
            top,
            width: right - left,
            height: bottom - top,
        },
        ..scored
    })
}
