use serde::Serialize;

use crate::{bounding_box::ScoredBox, labels::LabelTable};

/// Final, ordered set of detections of one image.
///
/// Boxes are grouped by class in ascending class order and, within a class, in
/// the order they survived suppression.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Detections {
    boxes: Vec<ScoredBox>,
}

impl Detections {
    /// Wrap boxes that already went through suppression.
    pub fn new(boxes: Vec<ScoredBox>) -> Self {
        Self { boxes }
    }

    /// Number of detections.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Whether nothing was detected.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Iterate over the detections in order.
    pub fn iter(&self) -> std::slice::Iter<'_, ScoredBox> {
        self.boxes.iter()
    }

    /// The detections as a slice.
    pub fn as_slice(&self) -> &[ScoredBox] {
        &self.boxes
    }

    /// Consume the set, returning the boxes.
    pub fn into_vec(self) -> Vec<ScoredBox> {
        self.boxes
    }

    /// Pair every detection with its display text, e.g. `"person: 0.93"`.
    pub fn labeled<'a>(
        &'a self,
        labels: &'a LabelTable,
    ) -> impl Iterator<Item = (&'a ScoredBox, String)> + 'a {
        self.boxes.iter().map(move |scored| {
            let text = format!("{}: {:.2}", labels.name(scored.class_id), scored.score);
            (scored, text)
        })
    }
}

impl<'a> IntoIterator for &'a Detections {
    type Item = &'a ScoredBox;
    type IntoIter = std::slice::Iter<'a, ScoredBox>;

    fn into_iter(self) -> Self::IntoIter {
        self.boxes.iter()
    }
}

impl IntoIterator for Detections {
    type Item = ScoredBox;
    type IntoIter = std::vec::IntoIter<ScoredBox>;

    fn into_iter(self) -> Self::IntoIter {
        self.boxes.into_iter()
    }
}
