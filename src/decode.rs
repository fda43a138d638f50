use crate::{layout::OutputLayout, reshape::CandidateRows};

/// A candidate row that passed the confidence filter.
///
/// Box geometry is in model input pixel units, center + size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Row index in decode order.
    pub index: usize,
    /// Center x coordinate.
    pub cx: f32,
    /// Center y coordinate.
    pub cy: f32,
    /// Box width.
    pub w: f32,
    /// Box height.
    pub h: f32,
    /// Objectness score, anchor based layouts only.
    pub objectness: Option<f32>,
    /// Index of the best scoring class.
    pub class_id: u32,
    /// Score of the best scoring class.
    pub class_score: f32,
    /// Effective confidence used for filtering and suppression.
    pub confidence: f32,
}

/// Find the best scoring class.
///
/// The running maximum starts at zero and only a strictly greater score replaces
/// it, so the first of several equal maxima wins and a row whose scores are all
/// non-positive has no class at all.
pub fn best_class(scores: &[f32]) -> Option<(usize, f32)> {
    let mut best = None;
    let mut max_score = 0.0;
    for (i, &score) in scores.iter().enumerate() {
        if score > max_score {
            max_score = score;
            best = Some(i);
        }
    }
    best.map(|i| (i, max_score))
}

/// Decode a single candidate row.
///
/// Anchor based rows multiply objectness by the best class score, anchor free
/// rows use the best class score alone. Returns `None` for rows below the
/// confidence threshold.
pub fn decode_row(
    index: usize,
    row: &[f32],
    layout: OutputLayout,
    confidence_threshold: f32,
) -> Option<Candidate> {
    let offset = layout.class_offset();
    if row.len() <= offset {
        return None;
    }

    let (class_id, class_score) = best_class(&row[offset..])?;
    if class_score < confidence_threshold {
        return None;
    }

    let objectness = layout.has_objectness().then(|| row[4]);
    let confidence = match objectness {
        Some(objectness) if objectness < confidence_threshold => return None,
        Some(objectness) => objectness * class_score,
        None => class_score,
    };
    if confidence < confidence_threshold {
        return None;
    }

    Some(Candidate {
        index,
        cx: row[0],
        cy: row[1],
        w: row[2],
        h: row[3],
        objectness,
        class_id: class_id as u32,
        class_score,
        confidence,
    })
}

/// Decode every row, keeping only candidates above the confidence threshold.
///
/// # Arguments
///
/// * `rows` - The reshaped model output.
/// * `layout` - Layout of the rows.
/// * `confidence_threshold` - Minimum effective confidence of a kept candidate.
///
/// # Returns
///
/// The kept candidates in decode order.
pub fn decode_rows(
    rows: &CandidateRows,
    layout: OutputLayout,
    confidence_threshold: f32,
) -> Vec<Candidate> {
    rows.iter()
        .enumerate()
        .filter_map(|(index, row)| decode_row(index, row, layout, confidence_threshold))
        .collect()
}
