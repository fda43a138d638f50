use kornia_image::ImageSize;
use serde::{Deserialize, Serialize};

use crate::error::DetectError;

/// Declared shape of a model tensor.
///
/// Each axis is either a fixed size or `None` for a dynamic axis, exactly as the
/// inference engine reports it in its typed metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorShape(Vec<Option<usize>>);

impl TensorShape {
    /// Create a shape from optional dimensions.
    pub fn new(dims: Vec<Option<usize>>) -> Self {
        Self(dims)
    }

    /// Create a shape where every axis has a fixed size.
    pub fn fixed(dims: &[usize]) -> Self {
        Self(dims.iter().map(|&d| Some(d)).collect())
    }

    /// Number of axes.
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// The declared dimensions.
    pub fn dims(&self) -> &[Option<usize>] {
        &self.0
    }

    /// Declared size of an axis, `None` if the axis is dynamic or out of range.
    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.0.get(axis).copied().flatten()
    }

    /// Check that concrete dimensions agree with the declared ones.
    ///
    /// Ranks must be equal and every fixed axis must match; dynamic axes accept any size.
    pub fn matches(&self, actual: &[usize]) -> bool {
        self.0.len() == actual.len()
            && self
                .0
                .iter()
                .zip(actual)
                .all(|(declared, &a)| declared.is_none_or(|d| d == a))
    }
}

impl From<&[usize]> for TensorShape {
    fn from(dims: &[usize]) -> Self {
        Self::fixed(dims)
    }
}

impl std::fmt::Display for TensorShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match dim {
                Some(d) => write!(f, "{d}")?,
                None => write!(f, "?")?,
            }
        }
        write!(f, "]")
    }
}

/// Layout of the raw detection output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    /// `[N, C]` (or `[1, N, C]`) rows of `cx, cy, w, h, objectness, class scores...`.
    AnchorBased,
    /// `[1, C, N]` columns of `cx, cy, w, h, class scores...`, no objectness.
    AnchorFree,
}

impl OutputLayout {
    /// Select the layout from the declared output rank.
    ///
    /// Rank 2 outputs are anchor based, rank 3 outputs are anchor free.
    pub fn from_rank(rank: usize) -> Result<Self, DetectError> {
        match rank {
            2 => Ok(OutputLayout::AnchorBased),
            3 => Ok(OutputLayout::AnchorFree),
            _ => Err(DetectError::InvalidConfig(format!(
                "Unsupported output rank: {rank}"
            ))),
        }
    }

    /// Whether rows carry a separate objectness column.
    pub fn has_objectness(&self) -> bool {
        matches!(self, OutputLayout::AnchorBased)
    }

    /// Column index of the first class score.
    pub fn class_offset(&self) -> usize {
        match self {
            OutputLayout::AnchorBased => 5,
            OutputLayout::AnchorFree => 4,
        }
    }

    /// Number of columns per candidate row for a given class count.
    pub fn expected_columns(&self, num_classes: usize) -> usize {
        self.class_offset() + num_classes
    }

    /// Axis of the declared output holding the per-candidate columns.
    fn column_axis(&self, rank: usize) -> Option<usize> {
        match (self, rank) {
            (OutputLayout::AnchorBased, 2) => Some(1),
            (OutputLayout::AnchorBased, 3) => Some(2),
            (OutputLayout::AnchorFree, 3) => Some(1),
            _ => None,
        }
    }
}

/// Shape information of a loaded model, threaded through every decode call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    /// Resolution the model expects as input.
    pub input_size: ImageSize,
    /// Declared shape of the detection output.
    pub output_shape: TensorShape,
    /// Layout of the detection output.
    pub layout: OutputLayout,
    /// Number of classes the model predicts.
    pub num_classes: usize,
}

impl ModelSpec {
    /// Create a model spec, selecting the layout from the declared output rank.
    pub fn new(
        input_size: ImageSize,
        output_shape: TensorShape,
        num_classes: usize,
    ) -> Result<Self, DetectError> {
        let layout = OutputLayout::from_rank(output_shape.rank())?;
        Self::with_layout(input_size, output_shape, layout, num_classes)
    }

    /// Create a model spec with an explicit layout, e.g. for anchor based models
    /// exported with a batch axis.
    pub fn with_layout(
        input_size: ImageSize,
        output_shape: TensorShape,
        layout: OutputLayout,
        num_classes: usize,
    ) -> Result<Self, DetectError> {
        let spec = Self {
            input_size,
            output_shape,
            layout,
            num_classes,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Number of columns each candidate row must have.
    pub fn expected_columns(&self) -> usize {
        self.layout.expected_columns(self.num_classes)
    }

    /// Validate the spec once, at model load time.
    pub fn validate(&self) -> Result<(), DetectError> {
        if self.num_classes == 0 {
            return Err(DetectError::InvalidConfig(
                "Model must predict at least one class".to_string(),
            ));
        }
        if self.input_size.width == 0 || self.input_size.height == 0 {
            return Err(DetectError::InvalidConfig(format!(
                "Invalid model input size: {}x{}",
                self.input_size.width, self.input_size.height
            )));
        }

        let rank = self.output_shape.rank();
        let column_axis = self.layout.column_axis(rank).ok_or_else(|| {
            DetectError::InvalidConfig(format!(
                "Output shape {} is not valid for layout {:?}",
                self.output_shape, self.layout
            ))
        })?;

        if let Some(cols) = self.output_shape.dim(column_axis) {
            if cols != self.expected_columns() {
                return Err(DetectError::InvalidConfig(format!(
                    "Output shape {} declares {cols} columns, {} classes need {}",
                    self.output_shape,
                    self.num_classes,
                    self.expected_columns()
                )));
            }
        }

        // anything other than a single batch would mix candidates of different images
        if rank == 3 && self.output_shape.dim(0).is_some_and(|b| b != 1) {
            return Err(DetectError::InvalidConfig(format!(
                "Output shape {} must have a batch of 1",
                self.output_shape
            )));
        }

        Ok(())
    }
}
