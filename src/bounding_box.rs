use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Axis aligned box in original image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PixelBox {
    /// Left edge.
    pub left: i32,
    /// Top edge.
    pub top: i32,
    /// Box width.
    pub width: i32,
    /// Box height.
    pub height: i32,
}

impl PixelBox {
    /// Right edge, exclusive.
    pub fn right(&self) -> i32 {
        self.left + self.width
    }

    /// Bottom edge, exclusive.
    pub fn bottom(&self) -> i32 {
        self.top + self.height
    }

    /// Area of the box, zero for degenerate boxes.
    pub fn area(&self) -> f32 {
        (self.width.max(0) as f32) * (self.height.max(0) as f32)
    }
}

/// Detection box with its confidence and class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredBox {
    /// Box in original image pixel coordinates.
    pub bbox: PixelBox,
    /// Confidence score of the detection.
    pub score: f32,
    /// Class index of the detection.
    pub class_id: u32,
}

/// How candidates are grouped for non-maximum suppression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NmsMode {
    /// Boxes only suppress boxes of the same class.
    #[default]
    ClassAware,
    /// Boxes suppress each other regardless of class.
    Global,
}

/// Intersection over union of two boxes.
///
/// Returns zero when the boxes do not overlap.
pub fn iou(b1: &PixelBox, b2: &PixelBox) -> f32 {
    let i_w = (b1.right().min(b2.right()) - b1.left.max(b2.left)).max(0);
    let i_h = (b1.bottom().min(b2.bottom()) - b1.top.max(b2.top)).max(0);
    let i_area = i_w as f32 * i_h as f32;
    let union = b1.area() + b2.area() - i_area;
    if union <= 0. {
        return 0.;
    }
    i_area / union
}

/// Non-maximum suppression for scored boxes.
///
/// Boxes are partitioned by class (or kept in a single partition for
/// [`NmsMode::Global`]), sorted by score and greedily selected: a box survives
/// only if its IoU with every box already selected in its partition is below the
/// threshold. Equal scores keep their input order.
///
/// # Arguments
///
/// * `bboxes` - The candidate boxes in decode order.
/// * `threshold` - The IoU threshold for suppression.
/// * `mode` - How boxes are partitioned.
///
/// # Returns
///
/// The surviving boxes, partition by partition in ascending class order, each in
/// selection order.
pub fn non_maximum_suppression(
    bboxes: &[ScoredBox],
    threshold: f32,
    mode: NmsMode,
) -> Vec<ScoredBox> {
    let mut partitions: BTreeMap<u32, Vec<ScoredBox>> = BTreeMap::new();
    for bbox in bboxes {
        let key = match mode {
            NmsMode::ClassAware => bbox.class_id,
            NmsMode::Global => 0,
        };
        partitions.entry(key).or_default().push(*bbox);
    }

    let mut picked = Vec::with_capacity(bboxes.len());
    for (_, mut bboxes_for_class) in partitions {
        suppress_partition(&mut bboxes_for_class, threshold);
        picked.extend(bboxes_for_class);
    }
    picked
}

fn suppress_partition(bboxes: &mut Vec<ScoredBox>, threshold: f32) {
    // stable, so equal scores keep decode order
    bboxes.sort_by(|b1, b2| b2.score.total_cmp(&b1.score));
    let mut current_index = 0;
    for index in 0..bboxes.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if iou(&bboxes[prev_index].bbox, &bboxes[index].bbox) >= threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            bboxes.swap(current_index, index);
            current_index += 1;
        }
    }
    bboxes.truncate(current_index);
}
