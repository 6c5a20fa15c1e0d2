//! Image preprocessing module
//!
//! Classical cleanup of a card photo before OCR:
//! - Grayscale conversion (BT.601 weights)
//! - Gaussian blur to suppress sensor noise
//! - Gaussian-weighted adaptive thresholding
//!
//! Card lighting is rarely even, so the threshold is computed per pixel from
//! its neighbourhood rather than once for the whole image. Both convolutions
//! replicate edge pixels past the border, run in `f32` and round to the
//! nearest 8-bit value once at the end.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::filter::separable_filter_equal;
use serde::{Deserialize, Serialize};

/// Parameters for [`preprocess_with`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Side of the square blur kernel (odd)
    pub blur_kernel_size: u32,
    /// Blur standard deviation; zero or less derives it from the kernel size
    pub blur_sigma: f32,
    /// Side of the square neighbourhood used for the local threshold (odd)
    pub threshold_block_size: u32,
    /// Subtracted from the local weighted mean before comparing
    pub threshold_offset: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            blur_kernel_size: 5,
            blur_sigma: 0.0,
            threshold_block_size: 11,
            threshold_offset: 2.0,
        }
    }
}

/// Preprocess a card photo for OCR with the default parameters
pub fn preprocess_image(input: &DynamicImage) -> GrayImage {
    preprocess_with(input, &PreprocessConfig::default())
}

/// Grayscale, blur and binarize an image
///
/// The output has the input's dimensions and every pixel is 0 or 255.
pub fn preprocess_with(input: &DynamicImage, config: &PreprocessConfig) -> GrayImage {
    let gray = to_grayscale(input);
    let blurred = gaussian_blur(&gray, config.blur_kernel_size, config.blur_sigma);
    adaptive_threshold_gaussian(
        &blurred,
        config.threshold_block_size,
        config.threshold_offset,
    )
}

/// Luma from BT.601 weights (0.299 R + 0.587 G + 0.114 B), rounded
///
/// Alpha is ignored.
pub fn to_grayscale(input: &DynamicImage) -> GrayImage {
    let rgb = input.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
        Luma([round_to_u8(luma)])
    })
}

/// Blur with a fixed-size normalized Gaussian kernel
pub fn gaussian_blur(input: &GrayImage, kernel_size: u32, sigma: f32) -> GrayImage {
    if input.width() == 0 || input.height() == 0 {
        return input.clone();
    }
    let kernel = gaussian_kernel(kernel_size, sigma);

    // Filtering u8 directly would truncate after each pass
    let float: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(input.width(), input.height(), |x, y| {
            Luma([f32::from(input.get_pixel(x, y)[0])])
        });
    let filtered = separable_filter_equal(&float, &kernel);

    GrayImage::from_fn(input.width(), input.height(), |x, y| {
        Luma([round_to_u8(filtered.get_pixel(x, y)[0])])
    })
}

/// Binarize against the Gaussian-weighted mean of each pixel's neighbourhood
///
/// A pixel becomes 255 when it is strictly brighter than `mean - offset`,
/// otherwise 0.
pub fn adaptive_threshold_gaussian(input: &GrayImage, block_size: u32, offset: f32) -> GrayImage {
    if input.width() == 0 || input.height() == 0 {
        return input.clone();
    }
    let local_mean = gaussian_blur(input, block_size, 0.0);

    GrayImage::from_fn(input.width(), input.height(), |x, y| {
        let value = f32::from(input.get_pixel(x, y)[0]);
        let mean = f32::from(local_mean.get_pixel(x, y)[0]);
        if value > mean - offset {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Binomial kernels used for sizes up to 7 when sigma is not given
const SMALL_GAUSSIAN_KERNELS: [&[f32]; 4] = [
    &[1.0],
    &[0.25, 0.5, 0.25],
    &[0.0625, 0.25, 0.375, 0.25, 0.0625],
    &[0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125],
];

/// Normalized 1-D Gaussian kernel of `size` taps
///
/// Even sizes are bumped to the next odd size. With a non-positive `sigma`,
/// sizes up to 7 use fixed binomial weights (`[1, 4, 6, 4, 1] / 16` for 5)
/// and larger sizes derive sigma as `0.3 * ((size - 1) / 2 - 1) + 0.8`.
pub fn gaussian_kernel(size: u32, sigma: f32) -> Vec<f32> {
    let size = odd_kernel_size(size);
    if sigma <= 0.0 && size <= 7 {
        return SMALL_GAUSSIAN_KERNELS[(size / 2) as usize].to_vec();
    }
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
    };
    let radius = (size / 2) as i32;
    let denom = 2.0 * sigma * sigma;

    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

fn round_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn odd_kernel_size(size: u32) -> u32 {
    let size = size.max(1);
    if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn is_binary(image: &GrayImage) -> bool {
        image.pixels().all(|p| p[0] == 0 || p[0] == 255)
    }

    #[test]
    fn test_grayscale_uses_bt601_weights() {
        let img = ImageBuffer::from_fn(4, 1, |x, _| match x {
            0 => Rgb([255u8, 0, 0]),
            1 => Rgb([0u8, 255, 0]),
            2 => Rgb([0u8, 0, 255]),
            _ => Rgb([255u8, 255, 255]),
        });
        let gray = to_grayscale(&DynamicImage::ImageRgb8(img));

        assert_eq!(gray.get_pixel(0, 0)[0], 76);
        assert_eq!(gray.get_pixel(1, 0)[0], 150);
        assert_eq!(gray.get_pixel(2, 0)[0], 29);
        assert_eq!(gray.get_pixel(3, 0)[0], 255);
    }

    #[test]
    fn test_green_stroke_on_gray_card_survives() {
        // Under Rec.709 weights this green is brighter than the card and vanishes.
        let img = ImageBuffer::from_fn(30, 30, |x, y| {
            if (15..17).contains(&x) && (10..20).contains(&y) {
                Rgb([0u8, 180, 0])
            } else {
                Rgb([128u8, 128, 128])
            }
        });
        let result = preprocess_image(&DynamicImage::ImageRgb8(img));
        assert_eq!(result.get_pixel(15, 15)[0], 0);
        assert_eq!(result.get_pixel(3, 3)[0], 255);
    }

    #[test]
    fn test_small_kernels_use_binomial_weights() {
        assert_eq!(gaussian_kernel(5, 0.0), vec![0.0625, 0.25, 0.375, 0.25, 0.0625]);
        assert_eq!(gaussian_kernel(3, 0.0), vec![0.25, 0.5, 0.25]);
        assert_eq!(gaussian_kernel(7, -1.0).len(), 7);
    }

    #[test]
    fn test_blur_rounds_instead_of_truncating() {
        // 100 and 101 alternating average to 100.5 under a 3-tap kernel
        // centred on 100: 0.25 * 101 + 0.5 * 100 + 0.25 * 101 = 100.5
        let img = GrayImage::from_fn(9, 1, |x, _| Luma([if x % 2 == 0 { 100 } else { 101 }]));
        let blurred = gaussian_blur(&img, 3, 0.0);
        assert_eq!(blurred.get_pixel(4, 0)[0], 101);
    }

    #[test]
    fn test_gaussian_kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(11, 0.0);
        assert_eq!(kernel.len(), 11);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!((kernel[0] - kernel[10]).abs() < 1e-6);
        assert!((kernel[3] - kernel[7]).abs() < 1e-6);
        assert!(kernel[5] > kernel[4] && kernel[4] > kernel[0]);
    }

    #[test]
    fn test_gaussian_kernel_rounds_even_size_up() {
        assert_eq!(gaussian_kernel(4, 0.0).len(), 5);
        assert_eq!(gaussian_kernel(0, 0.0), vec![1.0]);
    }

    #[test]
    fn test_preprocess_preserves_dimensions() {
        let img = ImageBuffer::from_pixel(37, 23, Rgb([120u8, 80u8, 200u8]));
        let result = preprocess_image(&DynamicImage::ImageRgb8(img));
        assert_eq!(result.dimensions(), (37, 23));
        assert!(is_binary(&result));
    }

    #[test]
    fn test_preprocess_uniform_image_is_white() {
        let img = ImageBuffer::from_pixel(30, 30, Rgb([128u8, 128u8, 128u8]));
        let result = preprocess_image(&DynamicImage::ImageRgb8(img));
        assert!(result.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_preprocess_dark_glyph_on_light_card_turns_black() {
        let img = ImageBuffer::from_fn(40, 40, |x, y| {
            if (18..23).contains(&x) && (18..23).contains(&y) {
                Rgb([0u8, 0u8, 0u8])
            } else {
                Rgb([255u8, 255u8, 255u8])
            }
        });
        let result = preprocess_image(&DynamicImage::ImageRgb8(img));

        assert!(is_binary(&result));
        assert_eq!(result.get_pixel(20, 20)[0], 0);
        assert_eq!(result.get_pixel(2, 2)[0], 255);
        assert_eq!(result.get_pixel(39, 39)[0], 255);
    }

    #[test]
    fn test_preprocess_handles_tiny_images() {
        let img = ImageBuffer::from_pixel(1, 1, Rgb([5u8, 5u8, 5u8]));
        let result = preprocess_image(&DynamicImage::ImageRgb8(img));
        assert_eq!(result.dimensions(), (1, 1));
        assert!(is_binary(&result));
    }

    #[test]
    fn test_custom_offset_changes_threshold() {
        // A faint mark only survives when the offset is small enough.
        let img = ImageBuffer::from_fn(30, 30, |x, y| {
            if x == 15 && y == 15 {
                Luma([200u8])
            } else {
                Luma([210u8])
            }
        });
        let dynamic = DynamicImage::ImageLuma8(img);
        let strict = PreprocessConfig {
            blur_kernel_size: 1,
            threshold_offset: 0.0,
            ..PreprocessConfig::default()
        };
        let lenient = PreprocessConfig {
            blur_kernel_size: 1,
            threshold_offset: 50.0,
            ..PreprocessConfig::default()
        };

        assert_eq!(preprocess_with(&dynamic, &strict).get_pixel(15, 15)[0], 0);
        assert_eq!(preprocess_with(&dynamic, &lenient).get_pixel(15, 15)[0], 255);
    }
}
