//! Glyph segmentation
//!
//! Two algorithms with different assumptions:
//!
//! - [`extract_blobs`]: 8-connected component extraction over the full 2-D
//!   region. Handles multiple lines and modest skew.
//! - [`split_columns`]: 1-D vertical-projection splitting. Assumes a single
//!   near-horizontal text line; simpler and faster, but fails on multi-line
//!   or heavily skewed input. The caller picks per region type.

use image::GrayImage;
use tracing::debug;

use crate::config::SegmenterConfig;
use crate::preprocess::{BinaryImage, INK};

/// A connected ink region, cropped from the source bitmap with its original
/// polarity.
#[derive(Debug, Clone)]
pub struct Blob {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub bitmap: GrayImage,
}

impl Blob {
    /// Vertical center, used for line grouping.
    fn y_center(&self) -> u32 {
        self.y + self.height / 2
    }
}

/// A full-height glyph slice produced by projection splitting.
#[derive(Debug, Clone)]
pub struct Slice {
    pub x: u32,
    pub width: u32,
    pub bitmap: GrayImage,
}

/// Extract connected ink components from a binarized region.
///
/// Polarity is re-checked by majority vote so that the flood fill always
/// walks the minority, sparse class; crops are taken from the source bitmap
/// so the recognizer sees the original polarity. Noise filter: components
/// with width < `min_blob_width`, height < `min_blob_height`, or
/// width > `max_aspect` x height are discarded. The result is ordered in
/// reading order: same-line blobs (y-centers within `line_merge_px`) left to
/// right, lines top to bottom.
pub fn extract_blobs(image: &BinaryImage, cfg: &SegmenterConfig) -> Vec<Blob> {
    let src = image.image();
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return Vec::new();
    }

    let raw = src.as_raw();
    let total = raw.len();
    let ink_count = raw.iter().filter(|&&p| p == INK).count();
    // If ink won the majority vote the region polarity is inverted relative
    // to the canonical form; walk the complement instead of copying.
    let inverted = ink_count * 2 > total;
    let is_ink = |px: u8| (px == INK) != inverted;

    let mut visited = vec![false; total];
    let mut stack: Vec<(u32, u32)> = Vec::new();
    let mut blobs = Vec::new();

    for start_y in 0..h {
        for start_x in 0..w {
            let idx = (start_y * w + start_x) as usize;
            if visited[idx] || !is_ink(raw[idx]) {
                continue;
            }

            let (mut min_x, mut max_x) = (start_x, start_x);
            let (mut min_y, mut max_y) = (start_y, start_y);

            stack.push((start_x, start_y));
            while let Some((x, y)) = stack.pop() {
                let idx = (y * w + x) as usize;
                if visited[idx] || !is_ink(raw[idx]) {
                    continue;
                }
                visited[idx] = true;

                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);

                // 8-connectivity
                for dy in -1i32..=1 {
                    for dx in -1i32..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = x as i32 + dx;
                        let ny = y as i32 + dy;
                        if nx >= 0 && ny >= 0 && (nx as u32) < w && (ny as u32) < h {
                            stack.push((nx as u32, ny as u32));
                        }
                    }
                }
            }

            let bw = max_x - min_x + 1;
            let bh = max_y - min_y + 1;
            if bw < cfg.min_blob_width
                || bh < cfg.min_blob_height
                || bw as f32 > cfg.max_aspect * bh as f32
            {
                continue;
            }

            blobs.push(Blob {
                x: min_x,
                y: min_y,
                width: bw,
                height: bh,
                bitmap: image::imageops::crop_imm(src, min_x, min_y, bw, bh).to_image(),
            });
        }
    }

    debug!("extracted {} blobs from {}x{} region", blobs.len(), w, h);
    sort_reading_order(blobs, cfg.line_merge_px)
}

/// Order blobs in reading order. Line ids are assigned after a y-center
/// sort, then a (line, x) sort runs; this keeps the comparator a total
/// order even though line membership itself is a fuzzy relation.
fn sort_reading_order(mut blobs: Vec<Blob>, line_merge_px: u32) -> Vec<Blob> {
    blobs.sort_by_key(Blob::y_center);

    let mut line = 0usize;
    let mut prev_center: Option<u32> = None;
    let mut keyed: Vec<(usize, Blob)> = blobs
        .into_iter()
        .map(|b| {
            let cy = b.y_center();
            if let Some(prev) = prev_center {
                if cy.saturating_sub(prev) > line_merge_px {
                    line += 1;
                }
            }
            prev_center = Some(cy);
            (line, b)
        })
        .collect();

    keyed.sort_by_key(|(line, b)| (*line, b.x));
    keyed.into_iter().map(|(_, b)| b).collect()
}

/// Split a single-line region into glyph slices by vertical projection.
///
/// A column belongs to a glyph when it holds at least `min_column_ink` ink
/// pixels; contiguous glyph-column runs wider than `min_run_width` become
/// full-height crops.
pub fn split_columns(image: &BinaryImage, cfg: &SegmenterConfig) -> Vec<Slice> {
    let src = image.image();
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return Vec::new();
    }

    let mut slices = Vec::new();
    let mut run_start: Option<u32> = None;

    for x in 0..=w {
        let ink = if x < w {
            (0..h).filter(|&y| src.get_pixel(x, y).0[0] == INK).count() as u32
        } else {
            0 // virtual empty column flushes a trailing run
        };

        match (run_start, ink >= cfg.min_column_ink) {
            (None, true) => run_start = Some(x),
            (Some(start), false) => {
                let width = x - start;
                if width > cfg.min_run_width {
                    slices.push(Slice {
                        x: start,
                        width,
                        bitmap: image::imageops::crop_imm(src, start, 0, width, h).to_image(),
                    });
                }
                run_start = None;
            }
            _ => {}
        }
    }

    debug!("projection split produced {} slices", slices.len());
    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::BACKGROUND;
    use image::Luma;

    fn binary_with_rect(w: u32, h: u32, rx: u32, ry: u32, rw: u32, rh: u32) -> BinaryImage {
        let mut img = GrayImage::from_pixel(w, h, Luma([BACKGROUND]));
        for y in ry..ry + rh {
            for x in rx..rx + rw {
                img.put_pixel(x, y, Luma([INK]));
            }
        }
        BinaryImage::from_normalized(img)
    }

    #[test]
    fn test_blob_filter_rejects_thin_blobs() {
        let cfg = SegmenterConfig::default();

        // 1x10: fails min width
        let tall = binary_with_rect(30, 30, 5, 5, 1, 10);
        assert!(extract_blobs(&tall, &cfg).is_empty());

        // 10x1: fails min height (and aspect)
        let flat = binary_with_rect(30, 30, 5, 5, 10, 1);
        assert!(extract_blobs(&flat, &cfg).is_empty());
    }

    #[test]
    fn test_blob_filter_accepts_glyph_sized_blob() {
        let cfg = SegmenterConfig::default();
        let ok = binary_with_rect(30, 30, 5, 5, 8, 10);
        let blobs = extract_blobs(&ok, &cfg);
        assert_eq!(blobs.len(), 1);
        assert_eq!((blobs[0].x, blobs[0].y), (5, 5));
        assert_eq!((blobs[0].width, blobs[0].height), (8, 10));
    }

    #[test]
    fn test_blob_crop_keeps_source_polarity() {
        let cfg = SegmenterConfig::default();
        let img = binary_with_rect(30, 30, 5, 5, 8, 10);
        let blobs = extract_blobs(&img, &cfg);
        // Cropped bitmap is ink-on-background exactly as in the source
        assert_eq!(blobs[0].bitmap.get_pixel(0, 0).0[0], INK);
    }

    #[test]
    fn test_blobs_sorted_in_reading_order() {
        let cfg = SegmenterConfig::default();
        let mut img = GrayImage::from_pixel(60, 60, Luma([BACKGROUND]));
        // Two glyphs on one line (y-centers within 20px), one on a lower line
        for (rx, ry) in [(30u32, 2u32), (2, 6), (2, 40)] {
            for y in ry..ry + 10 {
                for x in rx..rx + 6 {
                    img.put_pixel(x, y, Luma([INK]));
                }
            }
        }
        let blobs = extract_blobs(&BinaryImage::from_normalized(img), &cfg);
        assert_eq!(blobs.len(), 3);
        // First line left-to-right, then the lower line
        assert_eq!((blobs[0].x, blobs[0].y), (2, 6));
        assert_eq!((blobs[1].x, blobs[1].y), (30, 2));
        assert_eq!((blobs[2].x, blobs[2].y), (2, 40));
    }

    #[test]
    fn test_blob_extraction_inverted_region() {
        let cfg = SegmenterConfig::default();
        // Ink-majority image: glyph drawn as BACKGROUND on INK
        let mut img = GrayImage::from_pixel(30, 30, Luma([INK]));
        for y in 5..15 {
            for x in 5..13 {
                img.put_pixel(x, y, Luma([BACKGROUND]));
            }
        }
        let blobs = extract_blobs(&BinaryImage::from_normalized(img), &cfg);
        assert_eq!(blobs.len(), 1);
        assert_eq!((blobs[0].width, blobs[0].height), (8, 10));
        // Crop still comes from the non-inverted source
        assert_eq!(blobs[0].bitmap.get_pixel(0, 0).0[0], BACKGROUND);
    }

    #[test]
    fn test_projection_split_two_runs() {
        let mut img = GrayImage::from_pixel(40, 12, Luma([BACKGROUND]));
        // Two solid runs: columns 2..10 and 20..30
        for x in (2..10).chain(20..30) {
            for y in 0..12 {
                img.put_pixel(x, y, Luma([INK]));
            }
        }
        let cfg = SegmenterConfig::default();
        let slices = split_columns(&BinaryImage::from_normalized(img), &cfg);
        assert_eq!(slices.len(), 2);
        assert_eq!((slices[0].x, slices[0].width), (2, 8));
        assert_eq!((slices[1].x, slices[1].width), (20, 10));
        assert_eq!(slices[0].bitmap.dimensions(), (8, 12));
    }

    #[test]
    fn test_projection_suppresses_narrow_and_sparse_noise() {
        let mut img = GrayImage::from_pixel(40, 12, Luma([BACKGROUND]));
        // 3-column run: too narrow (<= 5)
        for x in 2..5 {
            for y in 0..12 {
                img.put_pixel(x, y, Luma([INK]));
            }
        }
        // 8-column run but only one ink pixel per column: below min_column_ink
        for x in 20..28 {
            img.put_pixel(x, 0, Luma([INK]));
        }
        let cfg = SegmenterConfig::default();
        let slices = split_columns(&BinaryImage::from_normalized(img), &cfg);
        assert!(slices.is_empty());
    }

    #[test]
    fn test_projection_flushes_trailing_run() {
        let mut img = GrayImage::from_pixel(20, 12, Luma([BACKGROUND]));
        // Run extends to the right edge
        for x in 12..20 {
            for y in 0..12 {
                img.put_pixel(x, y, Luma([INK]));
            }
        }
        let cfg = SegmenterConfig::default();
        let slices = split_columns(&BinaryImage::from_normalized(img), &cfg);
        assert_eq!(slices.len(), 1);
        assert_eq!((slices[0].x, slices[0].width), (12, 8));
    }
}
