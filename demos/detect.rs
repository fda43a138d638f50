use argh::FromArgs;
use std::path::PathBuf;

use candle_core::Device;
use kornia_io::functional as F;
use kornia_yolo_decode::{
    DetectorConfig, LabelTable, ModelSpec, NmsMode, OutputLayout, TensorShape, decode_detections,
};

#[derive(FromArgs)]
/// Decode a saved YOLO output tensor and visualize the detections
struct Args {
    /// path to the input image the output was computed from
    #[argh(option)]
    image_path: PathBuf,

    /// path to a safetensors file holding the raw model output
    #[argh(option)]
    output_path: PathBuf,

    /// name of the output tensor in the safetensors file
    #[argh(option, default = "\"output0\".to_string()")]
    tensor_name: String,

    /// path to a dataset yaml file with the class names
    #[argh(option)]
    labels_path: Option<PathBuf>,

    /// the number of classes the model predicts
    #[argh(option, default = "80")]
    num_classes: usize,

    /// the model input width
    #[argh(option, default = "640")]
    input_width: usize,

    /// the model input height
    #[argh(option, default = "640")]
    input_height: usize,

    /// treat a batched output as anchor based (objectness column)
    #[argh(switch)]
    anchor_based: bool,

    /// the confidence threshold
    #[argh(option, default = "0.5")]
    confidence_threshold: f32,

    /// the nms threshold
    #[argh(option, default = "0.45")]
    nms_threshold: f32,

    /// suppress overlapping boxes across classes
    #[argh(switch)]
    global_nms: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Args = argh::from_env();

    let rec = rerun::RecordingStreamBuilder::new("YOLO Decode App").spawn()?;

    // read the image as RGB8
    let image = F::read_image_any(&args.image_path)?;

    // read the raw output saved from the network
    let mut tensors = candle_core::safetensors::load(&args.output_path, &Device::Cpu)?;
    let raw = tensors
        .remove(&args.tensor_name)
        .ok_or_else(|| format!("tensor {} not found in {:?}", args.tensor_name, args.output_path))?;

    let input_size = kornia_image::ImageSize {
        width: args.input_width,
        height: args.input_height,
    };
    let output_shape = TensorShape::fixed(raw.dims());
    let spec = if args.anchor_based {
        ModelSpec::with_layout(
            input_size,
            output_shape,
            OutputLayout::AnchorBased,
            args.num_classes,
        )?
    } else {
        ModelSpec::new(input_size, output_shape, args.num_classes)?
    };

    let config = DetectorConfig {
        confidence_threshold: args.confidence_threshold,
        iou_threshold: args.nms_threshold,
        nms_mode: if args.global_nms {
            NmsMode::Global
        } else {
            NmsMode::ClassAware
        },
        clip_boxes: true,
    };

    let labels = match &args.labels_path {
        Some(path) => LabelTable::from_yaml_file(path)?,
        None => LabelTable::default(),
    };

    // decode the detections
    let detections = decode_detections(&raw, &spec, image.size(), &config)?;

    rec.log(
        "image",
        &rerun::Image::from_elements(
            image.as_slice(),
            image.size().into(),
            rerun::ColorModel::RGB,
        ),
    )?;

    let mut boxes_mins = Vec::new();
    let mut boxes_sizes = Vec::new();
    let mut class_ids = Vec::new();
    let mut texts = Vec::new();
    for (detection, text) in detections.labeled(&labels) {
        boxes_mins.push((detection.bbox.left as f32, detection.bbox.top as f32));
        boxes_sizes.push((detection.bbox.width as f32, detection.bbox.height as f32));
        class_ids.push(detection.class_id as u16);
        texts.push(text);
    }

    rec.log(
        "boxes",
        &rerun::Boxes2D::from_mins_and_sizes(boxes_mins, boxes_sizes)
            .with_class_ids(class_ids)
            .with_labels(texts),
    )?;

    Ok(())
}
