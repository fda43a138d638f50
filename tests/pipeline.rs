use candle_core::{Device, Tensor};
use kornia_image::ImageSize;
use kornia_yolo_decode::{
    DetectError, DetectorConfig, Detections, ModelSpec, NmsMode, OutputLayout, TensorShape,
    decode_detections, iou, non_maximum_suppression,
};

const INPUT_SIZE: ImageSize = ImageSize {
    width: 640,
    height: 640,
};

const NUM_CLASSES: usize = 3;

/// Candidate rows as `cx, cy, w, h, class scores...`.
fn candidate_rows() -> Vec<Vec<f32>> {
    vec![
        vec![100., 100., 80., 80., 0.90, 0.05, 0.00],
        vec![110., 105., 80., 80., 0.85, 0.10, 0.00],
        vec![300., 300., 60., 120., 0.10, 0.75, 0.20],
        vec![305., 310., 60., 120., 0.10, 0.75, 0.20],
        vec![500., 200., 40., 40., 0.00, 0.00, 0.55],
        vec![120., 120., 80., 80., 0.05, 0.00, 0.65],
        vec![400., 500., 90., 30., 0.60, 0.00, 0.00],
        vec![600., 600., 20., 20., 0.30, 0.20, 0.10],
        vec![50., 500., 0.4, 30., 0.95, 0.00, 0.00],
    ]
}

fn anchor_free_spec() -> Result<ModelSpec, DetectError> {
    ModelSpec::new(
        INPUT_SIZE,
        TensorShape::new(vec![Some(1), Some(4 + NUM_CLASSES), None]),
        NUM_CLASSES,
    )
}

fn anchor_based_spec() -> Result<ModelSpec, DetectError> {
    ModelSpec::new(
        INPUT_SIZE,
        TensorShape::new(vec![None, Some(5 + NUM_CLASSES)]),
        NUM_CLASSES,
    )
}

/// `[1, C, N]` output of an anchor free model.
fn anchor_free_output(rows: &[Vec<f32>]) -> Result<Tensor, candle_core::Error> {
    let cols = rows[0].len();
    let data: Vec<f32> = (0..cols)
        .flat_map(|c| rows.iter().map(move |row| row[c]))
        .collect();
    Tensor::from_vec(data, (1, cols, rows.len()), &Device::Cpu)
}

/// `[N, C]` output of an anchor based model, objectness inserted after the box.
fn anchor_based_output(rows: &[Vec<f32>], objectness: f32) -> Result<Tensor, candle_core::Error> {
    let data: Vec<f32> = rows
        .iter()
        .flat_map(|row| {
            let mut row = row.clone();
            row.insert(4, objectness);
            row
        })
        .collect();
    Tensor::from_vec(data, (rows.len(), 5 + NUM_CLASSES), &Device::Cpu)
}

fn decode(raw: &Tensor, spec: &ModelSpec, config: &DetectorConfig) -> Result<Detections, DetectError> {
    let image_size = ImageSize {
        width: 1920,
        height: 1080,
    };
    decode_detections(raw, spec, image_size, config)
}

#[test]
fn test_deterministic() -> Result<(), Box<dyn std::error::Error>> {
    let spec = anchor_free_spec()?;
    let raw = anchor_free_output(&candidate_rows())?;
    let config = DetectorConfig::default();

    let first = decode(&raw, &spec, &config)?;
    assert!(!first.is_empty());
    for _ in 0..5 {
        assert_eq!(decode(&raw, &spec, &config)?, first);
    }
    Ok(())
}

#[test]
fn test_confidence_threshold_monotonic() -> Result<(), Box<dyn std::error::Error>> {
    let spec = anchor_free_spec()?;
    let raw = anchor_free_output(&candidate_rows())?;

    let mut previous = usize::MAX;
    for step in 0..=10 {
        let config = DetectorConfig {
            confidence_threshold: step as f32 / 10.0,
            ..Default::default()
        };
        let count = decode(&raw, &spec, &config)?.len();
        assert!(count <= previous, "threshold {step}/10 returned more detections");
        previous = count;
    }
    Ok(())
}

#[test]
fn test_no_same_class_overlap() -> Result<(), Box<dyn std::error::Error>> {
    let spec = anchor_free_spec()?;
    let raw = anchor_free_output(&candidate_rows())?;

    for iou_threshold in [0.1, 0.3, 0.45, 0.7] {
        let config = DetectorConfig {
            confidence_threshold: 0.1,
            iou_threshold,
            ..Default::default()
        };
        let detections = decode(&raw, &spec, &config)?;
        for (i, a) in detections.iter().enumerate() {
            for b in detections.iter().skip(i + 1) {
                if a.class_id == b.class_id {
                    assert!(iou(&a.bbox, &b.bbox) < iou_threshold);
                }
            }
        }
    }
    Ok(())
}

#[test]
fn test_suppression_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let spec = anchor_free_spec()?;
    let raw = anchor_free_output(&candidate_rows())?;

    for nms_mode in [NmsMode::ClassAware, NmsMode::Global] {
        let config = DetectorConfig {
            confidence_threshold: 0.1,
            nms_mode,
            ..Default::default()
        };
        let detections = decode(&raw, &spec, &config)?;
        let again = non_maximum_suppression(detections.as_slice(), config.iou_threshold, nms_mode);
        assert_eq!(again, detections.as_slice());
    }
    Ok(())
}

#[test]
fn test_all_scores_non_positive() -> Result<(), Box<dyn std::error::Error>> {
    let spec = anchor_free_spec()?;
    let rows = vec![
        vec![100., 100., 80., 80., 0.0, -0.2, 0.0],
        vec![200., 200., 80., 80., -1.0, -0.5, -0.1],
    ];
    let raw = anchor_free_output(&rows)?;
    let config = DetectorConfig {
        confidence_threshold: 0.0,
        ..Default::default()
    };
    assert!(decode(&raw, &spec, &config)?.is_empty());
    Ok(())
}

#[test]
fn test_empty_output() -> Result<(), Box<dyn std::error::Error>> {
    let spec = anchor_free_spec()?;
    let raw = Tensor::zeros((1, 4 + NUM_CLASSES, 0), candle_core::DType::F32, &Device::Cpu)?;
    assert!(decode(&raw, &spec, &DetectorConfig::default())?.is_empty());
    Ok(())
}

#[test]
fn test_two_overlapping_boxes() -> Result<(), Box<dyn std::error::Error>> {
    let spec = anchor_free_spec()?;
    // boxes [0, 100) and [25, 125) overlap with an IoU of 0.6
    let rows = vec![
        vec![50., 50., 100., 100., 0.9, 0.0, 0.0],
        vec![75., 50., 100., 100., 0.7, 0.0, 0.0],
    ];
    let raw = anchor_free_output(&rows)?;
    let config = DetectorConfig {
        iou_threshold: 0.45,
        ..Default::default()
    };

    let detections = decode_detections(&raw, &spec, INPUT_SIZE, &config)?;
    assert_eq!(detections.len(), 1);
    assert_eq!(detections.as_slice()[0].score, 0.9);
    assert_eq!(detections.as_slice()[0].bbox.left, 0);
    Ok(())
}

#[test]
fn test_layout_equivalence() -> Result<(), Box<dyn std::error::Error>> {
    let rows = candidate_rows();
    let config = DetectorConfig {
        confidence_threshold: 0.2,
        ..Default::default()
    };

    let anchor_free = decode(&anchor_free_output(&rows)?, &anchor_free_spec()?, &config)?;
    let anchor_based = decode(
        &anchor_based_output(&rows, 1.0)?,
        &anchor_based_spec()?,
        &config,
    )?;
    assert!(!anchor_free.is_empty());
    assert_eq!(anchor_free, anchor_based);
    Ok(())
}

#[test]
fn test_anchor_based_with_batch_axis() -> Result<(), Box<dyn std::error::Error>> {
    let rows = candidate_rows();
    let spec = ModelSpec::with_layout(
        INPUT_SIZE,
        TensorShape::new(vec![Some(1), None, Some(5 + NUM_CLASSES)]),
        OutputLayout::AnchorBased,
        NUM_CLASSES,
    )?;
    let raw = anchor_based_output(&rows, 1.0)?.unsqueeze(0)?;
    let config = DetectorConfig::default();

    let batched = decode(&raw, &spec, &config)?;
    let flat = decode(&anchor_based_output(&rows, 1.0)?, &anchor_based_spec()?, &config)?;
    assert_eq!(batched, flat);
    Ok(())
}

#[test]
fn test_shape_mismatch_fails_before_decoding() -> Result<(), Box<dyn std::error::Error>> {
    let spec = anchor_based_spec()?;
    // anchor free data handed to an anchor based model
    let raw = anchor_free_output(&candidate_rows())?.squeeze(0)?.t()?;
    let res = decode(&raw, &spec, &DetectorConfig::default());
    assert!(matches!(res, Err(DetectError::ShapeMismatch { .. })));
    Ok(())
}

#[test]
fn test_degenerate_boxes_dropped() -> Result<(), Box<dyn std::error::Error>> {
    let spec = anchor_free_spec()?;
    // the last candidate row is 0.4 pixels wide
    let rows = vec![candidate_rows()[8].clone()];
    let raw = anchor_free_output(&rows)?;
    let detections = decode_detections(&raw, &spec, INPUT_SIZE, &DetectorConfig::default())?;
    assert!(detections.is_empty());
    Ok(())
}
