use image::{GrayImage, Luma, RgbImage, imageops};
use ndarray::Array2;

pub fn rgb_to_gray(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let lum = (0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64)
            .round()
            .min(255.0) as u8;
        gray.put_pixel(x, y, Luma([lum]));
    }

    gray
}

pub fn gray_to_array(image: &GrayImage) -> Array2<f64> {
    let (width, height) = image.dimensions();
    let mut arr = Array2::zeros((height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        arr[[y as usize, x as usize]] = pixel[0] as f64;
    }

    arr
}

/// Copies a `side`×`side` square out of `image`, clipped to the image bounds.
pub fn crop_square(image: &GrayImage, x: u32, y: u32, side: u32) -> GrayImage {
    let width = side.min(image.width().saturating_sub(x));
    let height = side.min(image.height().saturating_sub(y));

    imageops::crop_imm(image, x, y, width, height).to_image()
}
