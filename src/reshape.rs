use candle_core::{DType, Tensor};

use crate::{
    error::DetectError,
    layout::{ModelSpec, OutputLayout},
};

/// Row-major `rows x cols` view of the detection output, one row per candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRows {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
}

impl CandidateRows {
    /// Wrap row-major data of `rows x cols` values.
    pub fn new(data: Vec<f32>, rows: usize, cols: usize) -> Result<Self, DetectError> {
        if cols == 0 || data.len() != rows * cols {
            return Err(DetectError::shape_mismatch(
                format!("{} values in {rows}x{cols} rows", rows * cols),
                &[data.len()],
            ));
        }
        Ok(Self { data, rows, cols })
    }

    /// Number of candidate rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of values per row.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Values of one row.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.rows()`.
    pub fn row(&self, index: usize) -> &[f32] {
        &self.data[index * self.cols..(index + 1) * self.cols]
    }

    /// Iterate over the rows in decode order.
    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.cols)
    }
}

/// Normalize the raw model output into candidate rows.
///
/// The output must agree with the shape the model declared. Anchor based outputs
/// are `[N, C]` or `[1, N, C]`; anchor free outputs are `[1, C, N]` and get their
/// batch axis squeezed and the remaining axes transposed.
///
/// # Arguments
///
/// * `raw` - The tensor returned by the forward pass.
/// * `spec` - The shape information of the model that produced it.
pub fn reshape_output(raw: &Tensor, spec: &ModelSpec) -> Result<CandidateRows, DetectError> {
    let dims = raw.dims();
    if !spec.output_shape.matches(dims) {
        return Err(DetectError::shape_mismatch(spec.output_shape.to_string(), dims));
    }

    let expected_cols = spec.expected_columns();
    let view = match (spec.layout, dims) {
        (OutputLayout::AnchorBased, [_, _]) => raw.clone(),
        (OutputLayout::AnchorBased, [1, _, _]) => raw.squeeze(0)?,
        (OutputLayout::AnchorFree, [1, _, _]) => raw.squeeze(0)?.t()?,
        _ => {
            let expected = match spec.layout {
                OutputLayout::AnchorBased => {
                    format!("[N, {expected_cols}] or [1, N, {expected_cols}]")
                }
                OutputLayout::AnchorFree => format!("[1, {expected_cols}, N]"),
            };
            return Err(DetectError::shape_mismatch(expected, dims));
        }
    };

    let (rows, cols) = view.dims2()?;
    if cols != expected_cols {
        return Err(DetectError::shape_mismatch(
            format!("{expected_cols} columns for {} classes", spec.num_classes),
            dims,
        ));
    }

    let data = view
        .to_dtype(DType::F32)?
        .contiguous()?
        .flatten_all()?
        .to_vec1::<f32>()?;

    CandidateRows::new(data, rows, cols)
}
