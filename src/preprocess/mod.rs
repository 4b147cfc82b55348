//! Image preprocessing for card captures
//!
//! Grayscale conversion, rotation, downscaling, and adaptive binarization.
//! Every operation is pure: it borrows its input read-only and returns a new
//! buffer. Polarity is normalized exactly once per image, in [`binarize`].

use image::imageops::FilterType;
use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use tracing::debug;

use crate::error::OcrError;

/// Pixel value for "ink" after binarization.
pub const INK: u8 = 255;
/// Pixel value for "background" after binarization.
pub const BACKGROUND: u8 = 0;

/// A binarized image with normalized polarity: ink pixels are [`INK`],
/// background pixels are [`BACKGROUND`], and ink is the minority class.
///
/// The invariant is established once, by [`binarize`]; crops of a
/// `BinaryImage` preserve it.
#[derive(Debug, Clone)]
pub struct BinaryImage(GrayImage);

impl BinaryImage {
    /// Wrap an already-normalized bitmap. Callers must uphold the polarity
    /// invariant; within the crate this is only used for crops of images
    /// that [`binarize`] produced.
    pub(crate) fn from_normalized(image: GrayImage) -> Self {
        Self(image)
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// The underlying bitmap.
    pub fn image(&self) -> &GrayImage {
        &self.0
    }

    pub fn into_inner(self) -> GrayImage {
        self.0
    }

    /// Fraction of pixels that are ink.
    pub fn ink_ratio(&self) -> f32 {
        let total = self.0.as_raw().len();
        if total == 0 {
            return 0.0;
        }
        let ink = self.0.as_raw().iter().filter(|&&p| p == INK).count();
        ink as f32 / total as f32
    }
}

/// Convert a raw RGBA capture to grayscale by per-channel average.
///
/// Fails only on an empty or truncated buffer.
pub fn to_grayscale(data: &[u8], width: u32, height: u32) -> Result<GrayImage, OcrError> {
    let expected = width as usize * height as usize * 4;
    if width == 0 || height == 0 || data.len() < expected {
        return Err(OcrError::EmptyInput { width, height });
    }

    let mut gray = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 4) as usize;
            let r = data[idx] as u16;
            let g = data[idx + 1] as u16;
            let b = data[idx + 2] as u16;
            gray.put_pixel(x, y, Luma([((r + g + b) / 3) as u8]));
        }
    }

    Ok(gray)
}

/// Rotate by an arbitrary angle in degrees.
///
/// The output canvas is expanded to the rotated bounding extent so no
/// content is clipped. Padding uses the mean luma so the binarization
/// statistics of the rotated image stay close to the original's.
pub fn rotate(image: &GrayImage, degrees: f32) -> GrayImage {
    let theta = degrees.to_radians();
    let (w, h) = image.dimensions();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());

    // Canvas covers both the source and the rotated bounding extent, so
    // rotation about the center cannot clip.
    let new_w = ((w as f32 * cos + h as f32 * sin).ceil() as u32).max(w);
    let new_h = ((w as f32 * sin + h as f32 * cos).ceil() as u32).max(h);

    let fill = mean_luma(image);
    let mut canvas = GrayImage::from_pixel(new_w, new_h, Luma([fill]));
    let off_x = ((new_w - w) / 2) as i64;
    let off_y = ((new_h - h) / 2) as i64;
    image::imageops::overlay(&mut canvas, image, off_x, off_y);

    rotate_about_center(&canvas, theta, Interpolation::Bilinear, Luma([fill]))
}

/// Downscale preserving aspect ratio, only if the image is wider than
/// `max_width`. No-op otherwise.
pub fn resize_max_width(image: &GrayImage, max_width: u32) -> GrayImage {
    let (w, h) = image.dimensions();
    if w <= max_width {
        return image.clone();
    }

    let new_h = ((h as u64 * max_width as u64) / w as u64).max(1) as u32;
    debug!("downscaling {}x{} to {}x{}", w, h, max_width, new_h);
    image::imageops::resize(image, max_width, new_h, FilterType::Triangle)
}

/// Binarize with an adaptive threshold and normalize polarity.
///
/// Without an explicit threshold, `(min+avg)/2 + (max-min)/10` is used. The
/// bias term leans toward preserving dark ink on variable backgrounds (ID
/// cards, phone screens) and must not be retuned casually. Pixels darker
/// than the threshold become ink; afterwards, a majority vote flips
/// polarity if needed so that ink is always the minority class.
pub fn binarize(image: &GrayImage, threshold: Option<u8>) -> BinaryImage {
    let threshold = threshold.unwrap_or_else(|| auto_threshold(image));

    let mut out = GrayImage::new(image.width(), image.height());
    let mut ink_count = 0usize;
    for (src, dst) in image.as_raw().iter().zip(out.iter_mut()) {
        if *src < threshold {
            *dst = INK;
            ink_count += 1;
        } else {
            *dst = BACKGROUND;
        }
    }

    let total = out.as_raw().len();
    if ink_count * 2 > total {
        debug!(
            "inverting polarity: {}/{} pixels classified as ink",
            ink_count, total
        );
        for p in out.iter_mut() {
            *p = if *p == INK { BACKGROUND } else { INK };
        }
    }

    BinaryImage(out)
}

fn auto_threshold(image: &GrayImage) -> u8 {
    let raw = image.as_raw();
    if raw.is_empty() {
        return 0;
    }

    let mut min = u32::MAX;
    let mut max = 0u32;
    let mut sum = 0u64;
    for &p in raw {
        let p = p as u32;
        min = min.min(p);
        max = max.max(p);
        sum += p as u64;
    }
    let avg = (sum / raw.len() as u64) as u32;

    (((min + avg) / 2 + (max - min) / 10).min(255)) as u8
}

fn mean_luma(image: &GrayImage) -> u8 {
    let raw = image.as_raw();
    if raw.is_empty() {
        return 0;
    }
    (raw.iter().map(|&p| p as u64).sum::<u64>() / raw.len() as u64) as u8
}
