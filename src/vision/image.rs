//! Utility functions to load and resize images into model inputs.
//!
//! Input tensors use the NHWC layout with RGB values in `[0, 255]`.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb32FImage, RgbImage};
use tch::{Kind, Tensor};

use crate::error::{Error, Result};

/// Loads a JPEG file as a 3-channel image at its native resolution.
///
/// Channels are kept as `f32` in `[0, 1]` so that resizing does not round.
pub fn load_image<T: AsRef<Path>>(path: T) -> Result<Rgb32FImage> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let image = image::load(reader, ImageFormat::Jpeg)?;
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        path = %path.display(),
        "decoded image"
    );
    Ok(image.to_rgb32f())
}

/// Resizes an image to exactly `out_h` x `out_w` with a Lanczos3 filter.
///
/// The filter support is stretched by the downscaling factor, which
/// band-limits the source before it is subsampled.
pub fn resize(image: &Rgb32FImage, out_h: i64, out_w: i64) -> Result<Rgb32FImage> {
    if out_h <= 0 || out_w <= 0 {
        return Err(Error::Shape(format!("cannot resize to {out_h}x{out_w}")));
    }
    let scale = (out_h as f32 / image.height() as f32, out_w as f32 / image.width() as f32);
    tracing::debug!(?scale, "resizing");
    Ok(imageops::resize(image, out_w as u32, out_h as u32, FilterType::Lanczos3))
}

/// Converts an image to a `[1, h, w, 3]` float tensor in `[0, 255]`.
pub fn to_input_tensor(image: &Rgb32FImage) -> Result<Tensor> {
    let size = [1, image.height() as i64, image.width() as i64, 3];
    let tensor = Tensor::f_from_slice(image.as_raw())?.f_view(size)?;
    Ok(tensor * 255.)
}

/// Loads a JPEG file and resizes it to the given dimensions.
///
/// On success returns a tensor of shape `[1, out_h, out_w, 3]`.
pub fn load_image_and_resize<T: AsRef<Path>>(path: T, out_h: i64, out_w: i64) -> Result<Tensor> {
    let image = load_image(path)?;
    to_input_tensor(&resize(&image, out_h, out_w)?)
}

/// Saves an input tensor as an 8-bit image.
///
/// This expects a tensor of shape `[1, h, w, 3]` or `[h, w, 3]` with values
/// in `[0, 255]`. The format is picked from the file extension.
pub fn save_image<T: AsRef<Path>>(tensor: &Tensor, path: T) -> Result<()> {
    let tensor = match tensor.size().as_slice() {
        [1, _, _, 3] => tensor.squeeze_dim(0),
        [_, _, 3] => tensor.shallow_clone(),
        size => return Err(Error::Shape(format!("expected [1, h, w, 3] image, got {size:?}"))),
    };
    let (height, width) = (tensor.size()[0], tensor.size()[1]);
    let pixels = tensor
        .clamp(0., 255.)
        .round()
        .to_kind(Kind::Uint8)
        .contiguous()
        .view([-1]);
    let pixels = Vec::<u8>::try_from(&pixels)?;
    let image = RgbImage::from_raw(width as u32, height as u32, pixels)
        .ok_or_else(|| Error::Shape("pixel buffer does not match the image size".to_string()))?;
    image.save(path.as_ref())?;
    tracing::info!(path = %path.as_ref().display(), "saved image");
    Ok(())
}
