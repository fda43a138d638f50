/// Error type for the detection decoding pipeline.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    /// The model output does not have the shape the model declared.
    #[error("Output shape mismatch: expected {expected}, got {actual:?}")]
    ShapeMismatch {
        /// Human readable description of the expected shape.
        expected: String,
        /// The dimensions actually produced by the model.
        actual: Vec<usize>,
    },

    /// Invalid detector or model configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load a label table.
    #[error("Failed to load labels: {0}")]
    LabelError(String),

    /// Internal candle error.
    #[error(transparent)]
    CandleError(#[from] candle_core::Error),

    /// Kornia image error.
    #[error(transparent)]
    KorniaImageError(#[from] kornia_image::ImageError),

    /// I/O error while reading an external file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl DetectError {
    pub(crate) fn shape_mismatch(expected: impl Into<String>, actual: &[usize]) -> Self {
        DetectError::ShapeMismatch {
            expected: expected.into(),
            actual: actual.to_vec(),
        }
    }
}
