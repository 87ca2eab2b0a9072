use crate::error::PredictError;
use image::imageops::FilterType;
use image::GenericImageView;
use ndarray::{Array, Ix4};

pub(crate) const TARGET_WIDTH: u32 = 224;
pub(crate) const TARGET_HEIGHT: u32 = 224;

/// Decodes an encoded image and lays it out as the `[1, 3, 224, 224]` float
/// tensor the model expects: channel planes in B,G,R order, raw 0-255 values,
/// with the pixel column as the third axis and the row as the fourth. The
/// model was exported against this layout, so the axis order must stay as-is.
pub(crate) fn image_to_tensor(image_bytes: &[u8]) -> Result<Array<f32, Ix4>, PredictError> {
    let reader = image::ImageReader::new(std::io::Cursor::new(image_bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;

    let original_img = reader.decode()?;
    let (img_width, img_height) = original_img.dimensions();
    tracing::debug!("decoded {}x{} image", img_width, img_height);

    // Stretch resize: width and height scale independently, aspect ratio is
    // not preserved and the whole target frame is filled.
    let img = original_img.resize_exact(TARGET_WIDTH, TARGET_HEIGHT, FilterType::CatmullRom);

    let mut input = Array::zeros((1, 3, TARGET_WIDTH as usize, TARGET_HEIGHT as usize));
    for pixel in img.pixels() {
        let x = pixel.0 as usize;
        let y = pixel.1 as usize;
        let [r, g, b, _] = pixel.2 .0;
        input[[0, 0, x, y]] = b as f32;
        input[[0, 1, x, y]] = g as f32;
        input[[0, 2, x, y]] = r as f32;
    }

    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn png_bytes(img: ImageBuffer<Rgb<u8>, Vec<u8>>) -> Vec<u8> {
        let mut bytes: Vec<u8> = Vec::new();
        let mut cursor = Cursor::new(&mut bytes);
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        bytes
    }

    #[test]
    fn tensor_shape_is_fixed_for_any_input_size() {
        for (w, h) in [(100, 100), (640, 480), (1, 1), (37, 512)] {
            let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(w, h, Rgb([10, 20, 30]));
            let input = image_to_tensor(&png_bytes(img)).unwrap();
            assert_eq!(input.shape(), &[1, 3, 224, 224]);
        }
    }

    #[test]
    fn channel_planes_are_blue_green_red_unnormalized() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 100, Rgb([10, 20, 30]));
        let input = image_to_tensor(&png_bytes(img)).unwrap();

        for x in 0..224 {
            for y in 0..224 {
                assert_eq!(input[[0, 0, x, y]], 30.0, "blue at ({}, {})", x, y);
                assert_eq!(input[[0, 1, x, y]], 20.0, "green at ({}, {})", x, y);
                assert_eq!(input[[0, 2, x, y]], 10.0, "red at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn stretch_resize_fills_the_whole_frame() {
        // A wide image must stretch vertically with no letterbox rows.
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 50, Rgb([255, 255, 255]));
        let input = image_to_tensor(&png_bytes(img)).unwrap();

        for c in 0..3 {
            for x in 0..224 {
                for y in 0..224 {
                    assert_eq!(input[[0, c, x, y]], 255.0, "plane {} at ({}, {})", c, x, y);
                }
            }
        }
    }

    #[test]
    fn third_axis_is_the_pixel_column() {
        // Left half red, right half blue; away from the seam the planes must
        // vary with x (axis 2) and be constant in y (axis 3).
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_fn(100, 50, |x, _| {
            if x < 50 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        let input = image_to_tensor(&png_bytes(img)).unwrap();

        for y in [0, 111, 223] {
            assert_eq!(input[[0, 2, 30, y]], 255.0, "red plane, left, y={}", y);
            assert_eq!(input[[0, 0, 30, y]], 0.0, "blue plane, left, y={}", y);
            assert_eq!(input[[0, 0, 190, y]], 255.0, "blue plane, right, y={}", y);
            assert_eq!(input[[0, 2, 190, y]], 0.0, "red plane, right, y={}", y);
        }
    }

    #[test]
    fn invalid_bytes_fail_with_decode_error() {
        let not_an_image = b"definitely not an encoded image";
        let result = image_to_tensor(not_an_image);

        assert!(matches!(result, Err(PredictError::Decode(_))));
    }
}
