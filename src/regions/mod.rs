//! Card region cropping
//!
//! Extracts the three fixed fractional bands of the card layout. The
//! fractions live in [`BandLayout`](crate::config::BandLayout), not here.

use image::GrayImage;

use crate::config::BandLayout;
use crate::preprocess::BinaryImage;

/// The three text fields of the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    /// Institution name, top band
    Institution,
    /// Person name, middle band
    Name,
    /// Register number, bottom band
    Number,
}

impl RegionKind {
    /// Display name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            RegionKind::Institution => "institution",
            RegionKind::Name => "name",
            RegionKind::Number => "number",
        }
    }
}

/// Pixel bounds of a region band within a card of the given dimensions.
/// Always at least one pixel tall, clamped to the image.
pub fn band_bounds(width: u32, height: u32, region: RegionKind, layout: &BandLayout) -> (u32, u32, u32, u32) {
    let h = height as f32;
    let (y0, band_h) = match region {
        RegionKind::Institution => (0.0, h * layout.institution_height),
        RegionKind::Name => (h * layout.name_start, h * layout.name_height),
        RegionKind::Number => (h - h * layout.number_height, h * layout.number_height),
    };

    let y = (y0 as u32).min(height.saturating_sub(1));
    let bh = (band_h as u32).clamp(1, height - y);
    (0, y, width, bh)
}

/// Crop a region band from a grayscale card image.
pub fn crop_band(image: &GrayImage, region: RegionKind, layout: &BandLayout) -> GrayImage {
    let (x, y, w, h) = band_bounds(image.width(), image.height(), region, layout);
    image::imageops::crop_imm(image, x, y, w, h).to_image()
}

/// Crop a region band from a binarized card image. Cropping preserves the
/// polarity invariant.
pub fn crop_band_binary(image: &BinaryImage, region: RegionKind, layout: &BandLayout) -> BinaryImage {
    BinaryImage::from_normalized(crop_band(image.image(), region, layout))
}
