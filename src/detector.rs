use candle_core::{Device, Tensor};
use candle_nn::Module;
use kornia_image::{Image, ImageSize};
use rayon::prelude::*;
use serde::Deserialize;

use super::{
    bounding_box::{NmsMode, ScoredBox, non_maximum_suppression},
    decode::decode_rows,
    detections::Detections,
    error::DetectError,
    labels::LabelTable,
    layout::ModelSpec,
    preprocess::preprocess_image,
    rescale::{ScaleFactors, clip_to_image, rescale},
    reshape::reshape_output,
};

/// Detector configuration struct.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum effective confidence of a detection
    pub confidence_threshold: f32,
    /// IoU at or above which overlapping boxes are suppressed
    pub iou_threshold: f32,
    /// Whether suppression is per class or across all classes
    pub nms_mode: NmsMode,
    /// Whether boxes are clipped to the image bounds
    pub clip_boxes: bool,
}

/// Default configuration for the detector.
impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            nms_mode: NmsMode::ClassAware,
            clip_boxes: false,
        }
    }
}

impl DetectorConfig {
    /// Check that both thresholds lie in `[0, 1]`.
    pub fn validate(&self) -> Result<(), DetectError> {
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("iou_threshold", self.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DetectError::InvalidConfig(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Decode a raw model output into the detections of one image.
///
/// Runs reshaping, decoding, rescaling and suppression. Every call derives its
/// own scale factors from `image_size`, so calls for different images are
/// independent.
///
/// # Arguments
///
/// * `raw` - The tensor returned by the forward pass.
/// * `spec` - The shape information of the model.
/// * `image_size` - Size of the original image.
/// * `config` - Thresholds and suppression options.
pub fn decode_detections(
    raw: &Tensor,
    spec: &ModelSpec,
    image_size: ImageSize,
    config: &DetectorConfig,
) -> Result<Detections, DetectError> {
    config.validate()?;
    let factors = ScaleFactors::new(image_size, spec.input_size)?;
    decode_with_factors(raw, spec, image_size, factors, config)
}

/// Decode the raw outputs of several independent images in parallel.
///
/// The result keeps the order of `outputs`.
pub fn decode_batch(
    outputs: &[(Tensor, ImageSize)],
    spec: &ModelSpec,
    config: &DetectorConfig,
) -> Result<Vec<Detections>, DetectError> {
    config.validate()?;
    outputs
        .par_iter()
        .map(|(raw, image_size)| decode_detections(raw, spec, *image_size, config))
        .collect()
}

fn decode_with_factors(
    raw: &Tensor,
    spec: &ModelSpec,
    image_size: ImageSize,
    factors: ScaleFactors,
    config: &DetectorConfig,
) -> Result<Detections, DetectError> {
    let rows = reshape_output(raw, spec)?;
    let candidates = decode_rows(&rows, spec.layout, config.confidence_threshold);

    let bboxes: Vec<ScoredBox> = candidates
        .iter()
        .filter_map(|candidate| rescale(candidate, factors))
        .filter_map(|scored| {
            if config.clip_boxes {
                clip_to_image(scored, image_size)
            } else {
                Some(scored)
            }
        })
        .collect();

    // non-maximum suppression
    let picked = non_maximum_suppression(&bboxes, config.iou_threshold, config.nms_mode);

    tracing::debug!(
        "decoded {} rows: {} candidates, {} boxes, {} detections",
        rows.rows(),
        candidates.len(),
        bboxes.len(),
        picked.len()
    );

    Ok(Detections::new(picked))
}

/// Detector high level interface.
///
/// Wraps any candle module producing a detection output together with the shape
/// information needed to decode it.
pub struct Detector<M> {
    config: DetectorConfig,
    device: Device,
    model: M,
    spec: ModelSpec,
    labels: LabelTable,
}

impl<M: Module> Detector<M> {
    /// Create a new detector
    pub fn new(
        model: M,
        spec: ModelSpec,
        config: DetectorConfig,
        device: Device,
    ) -> Result<Self, DetectError> {
        config.validate()?;
        spec.validate()?;
        tracing::info!(
            "detector ready: input {}x{}, output {}, {:?}, {} classes",
            spec.input_size.width,
            spec.input_size.height,
            spec.output_shape,
            spec.layout,
            spec.num_classes
        );
        Ok(Self {
            config,
            device,
            model,
            spec,
            labels: LabelTable::default(),
        })
    }

    /// Attach the class names used to label detections.
    pub fn with_labels(mut self, labels: LabelTable) -> Self {
        self.labels = labels;
        self
    }

    /// The class names of the detector.
    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// The detector configuration.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// The shape information of the wrapped model.
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// Perform inference on an rgb8 image
    pub fn inference(&self, image: &Image<u8, 3>) -> Result<Detections, DetectError> {
        // preprocess the image
        let (image_t, factors) = preprocess_image(image, self.spec.input_size, &self.device)?;

        // forward the image
        let pred = self.model.forward(&image_t)?;

        // postprocess the predictions
        decode_with_factors(&pred, &self.spec, image.size(), factors, &self.config)
    }

    /// Decode a raw output of the wrapped model for an image of `image_size`.
    pub fn postprocess(&self, raw: &Tensor, image_size: ImageSize) -> Result<Detections, DetectError> {
        decode_detections(raw, &self.spec, image_size, &self.config)
    }
}
