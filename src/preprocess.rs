use candle_core::{Device, Tensor};
use kornia_image::{Image, ImageSize};
use kornia_imgproc::{interpolation::InterpolationMode, resize::resize_fast};

use crate::{error::DetectError, rescale::ScaleFactors};

/// Resize an rgb8 image to the model input size and convert it to a tensor.
///
/// The image is stretched to `input_size` without preserving its aspect ratio,
/// normalized to `[0, 1]` and laid out as `[1, 3, height, width]`.
///
/// # Returns
///
/// The input tensor and the factors mapping model space back to the image.
pub fn preprocess_image(
    image: &Image<u8, 3>,
    input_size: ImageSize,
    device: &Device,
) -> Result<(Tensor, ScaleFactors), DetectError> {
    let factors = ScaleFactors::new(image.size(), input_size)?;

    let mut image_resized = Image::from_size_val(input_size, 0)?;
    resize_fast(image, &mut image_resized, InterpolationMode::Bilinear)?;

    let image_resized = image_resized.map(|&x| x as f32 / 255.0);

    let image_t = Tensor::from_vec::<_, f32>(
        image_resized.into_vec(),
        (input_size.height, input_size.width, 3),
        device,
    )?
    .permute((2, 0, 1))?
    .unsqueeze(0)?;

    Ok((image_t, factors))
}
