#![deny(missing_docs)]

//! YOLO detection output decoding in Rust
//!
//! This crate turns the raw output tensor of a YOLO style detector into a small
//! set of labeled bounding boxes in original image coordinates: the output is
//! reshaped into candidate rows, filtered by confidence, rescaled to the image
//! and reduced with non-maximum suppression.
//!
//! Both anchor based outputs (`[N, 5 + classes]`, with an objectness column) and
//! anchor free outputs (`[1, 4 + classes, N]`) are supported.
//!
//! # Examples
//!
//! ```no_run
//! use candle_core::{DType, Device, Tensor};
//! use kornia_image::ImageSize;
//! use kornia_yolo_decode::{DetectorConfig, LabelTable, ModelSpec, TensorShape, decode_detections};
//!
//! let spec = ModelSpec::new(
//!     ImageSize { width: 640, height: 640 },
//!     TensorShape::new(vec![Some(1), Some(84), None]),
//!     80,
//! )
//! .expect("Invalid model spec");
//!
//! // the output of the network forward pass
//! let raw = Tensor::zeros((1, 84, 8400), DType::F32, &Device::Cpu).expect("Failed to create tensor");
//!
//! let image_size = ImageSize { width: 1280, height: 720 };
//! let detections = decode_detections(&raw, &spec, image_size, &DetectorConfig::default())
//!     .expect("Failed to decode detections");
//!
//! let labels = LabelTable::from_yaml_file("coco.yaml").expect("Failed to load labels");
//! for (detection, text) in detections.labeled(&labels) {
//!     println!("{text}: {:?}", detection.bbox);
//! }
//! ```

/// Bounding boxes with non-maximum suppression
mod bounding_box;

/// Per row decoding of class scores and confidence
mod decode;

/// Final detection set
mod detections;

/// High level detector interface
mod detector;

/// Error type of the crate
mod error;

/// Class name lookup
mod labels;

/// Output layouts and model shape information
mod layout;

/// Image resizing into model input tensors
mod preprocess;

/// Mapping of boxes back to image coordinates
mod rescale;

/// Normalization of raw output tensors into candidate rows
mod reshape;

pub use bounding_box::{NmsMode, PixelBox, ScoredBox, iou, non_maximum_suppression};
pub use decode::{Candidate, best_class, decode_row, decode_rows};
pub use detections::Detections;
pub use detector::{Detector, DetectorConfig, decode_batch, decode_detections};
pub use error::DetectError;
pub use labels::{LabelTable, UNKNOWN_LABEL};
pub use layout::{ModelSpec, OutputLayout, TensorShape};
pub use preprocess::preprocess_image;
pub use rescale::{ScaleFactors, clip_to_image, rescale};
pub use reshape::{CandidateRows, reshape_output};
