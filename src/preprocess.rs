use image::{imageops::FilterType, DynamicImage, ImageReader};
use ndarray::{Array, Ix4};
use std::io::Cursor;
use thiserror::Error;

pub const DEFAULT_INPUT_SIZE: u32 = 224;
const CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Error reading image: {0}")]
    Read(#[from] std::io::Error),
    #[error("Error decoding image: {0}")]
    Decode(#[from] image::ImageError),
}

pub fn decode_image(image_data: &[u8]) -> Result<DynamicImage, PreprocessError> {
    let image_reader = ImageReader::new(Cursor::new(image_data)).with_guessed_format()?;
    Ok(image_reader.decode()?)
}

/// Resizes to `size x size` and lays the pixels out as NHWC `f32` in `[0, 1]`,
/// shape `(1, size, size, 3)`.
pub fn to_input_tensor(image: &DynamicImage, size: u32) -> Array<f32, Ix4> {
    let img = image
        .resize_exact(size, size, FilterType::CatmullRom)
        .to_rgb8();

    let side = size as usize;
    let mut input = Array::zeros((1, side, side, CHANNELS));
    for (x, y, pixel) in img.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for (c, value) in pixel.0.iter().enumerate() {
            input[[0, y, x, c]] = (*value as f32) / 255.;
        }
    }

    input
}
