//! Letterbox preprocessing for YOLO-style detectors.

use image::{DynamicImage, GenericImageView};
use ndarray::Array4;
use tracing::debug;

/// Gray used by Ultralytics for letterbox padding.
const PAD_VALUE: f32 = 114.0 / 255.0;

/// A letterboxed input tensor and the transform back to image coordinates.
#[derive(Debug, Clone)]
pub struct Letterbox {
    /// NCHW tensor, values in [0, 1].
    pub tensor: Array4<f32>,
    /// Resize factor applied to the original image.
    pub scale: f32,
    /// Horizontal padding in model pixels.
    pub pad_x: f32,
    /// Vertical padding in model pixels.
    pub pad_y: f32,
    /// Original image size (width, height).
    pub image_size: (u32, u32),
}

impl Letterbox {
    /// Map a model-space `(cx, cy, w, h)` box to clipped image-space `[x1, y1, x2, y2]`.
    pub fn to_image_box(&self, cx: f32, cy: f32, w: f32, h: f32) -> [f32; 4] {
        let (width, height) = (self.image_size.0 as f32, self.image_size.1 as f32);
        let x1 = (cx - w / 2.0 - self.pad_x) / self.scale;
        let y1 = (cy - h / 2.0 - self.pad_y) / self.scale;
        let x2 = (cx + w / 2.0 - self.pad_x) / self.scale;
        let y2 = (cy + h / 2.0 - self.pad_y) / self.scale;
        [
            x1.clamp(0.0, width),
            y1.clamp(0.0, height),
            x2.clamp(0.0, width),
            y2.clamp(0.0, height),
        ]
    }
}

/// Resizes an image into a square model input, keeping aspect ratio.
#[derive(Debug, Clone)]
pub struct LetterboxPreprocessor {
    input_size: u32,
}

impl LetterboxPreprocessor {
    pub fn new(input_size: u32) -> Self {
        Self {
            input_size: input_size.max(1),
        }
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Letterbox `image` into an `input_size` square tensor.
    pub fn letterbox(&self, image: &DynamicImage) -> Letterbox {
        let (orig_w, orig_h) = image.dimensions();
        let size = self.input_size;

        let scale = (size as f32 / orig_w.max(1) as f32).min(size as f32 / orig_h.max(1) as f32);
        let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, size);
        let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, size);
        let pad_x = (size - new_w) / 2;
        let pad_y = (size - new_h) / 2;

        debug!(
            "Letterbox {}x{} -> {}x{} (scale {:.3}, pad {},{})",
            orig_w, orig_h, new_w, new_h, scale, pad_x, pad_y
        );

        let rgb = image
            .resize_exact(new_w, new_h, image::imageops::FilterType::Triangle)
            .to_rgb8();

        let mut tensor =
            Array4::<f32>::from_elem((1, 3, size as usize, size as usize), PAD_VALUE);

        for (x, y, pixel) in rgb.enumerate_pixels() {
            let tx = (x + pad_x) as usize;
            let ty = (y + pad_y) as usize;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = pixel[c] as f32 / 255.0;
            }
        }

        Letterbox {
            tensor,
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            image_size: (orig_w, orig_h),
        }
    }
}

impl Default for LetterboxPreprocessor {
    fn default() -> Self {
        Self::new(640)
    }
}
