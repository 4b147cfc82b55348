//! Character template assets
//!
//! Loads the fixed A-Z / 0-9 character bitmap set and normalizes every
//! bitmap to one canonical size and polarity so templates and glyphs are
//! directly comparable. A missing label is simply absent from the store,
//! never an error; that character is unreachable by the matcher.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The labels the recognizer knows: A-Z then 0-9.
pub fn labels() -> impl Iterator<Item = char> {
    ('A'..='Z').chain('0'..='9')
}

/// Source of raw template bitmaps, one per character label.
///
/// Returning `None` for a label is not an error.
pub trait TemplateSource: Send + Sync {
    fn load(&self, label: char) -> Option<DynamicImage>;
}

/// Optional manifest mapping labels to file names.
#[derive(Debug, Default, Deserialize)]
struct TemplateManifest {
    #[serde(default)]
    files: HashMap<String, String>,
}

/// Loads templates from a directory of image files.
///
/// A label `X` resolves to `X.png` unless a `manifest.json` in the directory
/// overrides the file name (`{"files": {"X": "x_variant.png"}}`).
pub struct DirTemplateSource {
    dir: PathBuf,
    manifest: TemplateManifest,
}

impl DirTemplateSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let manifest = Self::read_manifest(&dir).unwrap_or_default();
        Self { dir, manifest }
    }

    fn read_manifest(dir: &Path) -> Option<TemplateManifest> {
        let path = dir.join("manifest.json");
        if !path.exists() {
            return None;
        }
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!("ignoring malformed template manifest {:?}: {}", path, e);
                None
            }
        }
    }
}

impl TemplateSource for DirTemplateSource {
    fn load(&self, label: char) -> Option<DynamicImage> {
        let name = self
            .manifest
            .files
            .get(&label.to_string())
            .cloned()
            .unwrap_or_else(|| format!("{label}.png"));
        image::open(self.dir.join(name)).ok()
    }
}

/// The normalized character template set. Read-only after load.
pub struct TemplateStore {
    templates: HashMap<char, GrayImage>,
    size: u32,
}

impl TemplateStore {
    /// Load every available label from `source`, normalizing each bitmap to
    /// `size`x`size` with canonical polarity.
    pub fn load(source: &dyn TemplateSource, size: u32) -> Self {
        let mut templates = HashMap::new();

        for label in labels() {
            match source.load(label) {
                Some(img) => {
                    templates.insert(label, normalize_template(&img, size));
                }
                None => debug!("no template for '{}'; label unreachable", label),
            }
        }

        info!("loaded {} character templates", templates.len());
        Self { templates, size }
    }

    pub fn get(&self, label: char) -> Option<&GrayImage> {
        self.templates.get(&label)
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, &GrayImage)> {
        self.templates.iter().map(|(&label, img)| (label, img))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Canonical template edge length in pixels.
    pub fn size(&self) -> u32 {
        self.size
    }
}

/// Resize to the canonical square and normalize polarity.
///
/// Average red-channel intensity above 128 means a light-background,
/// dark-ink source; it is inverted so that ink is maximal-intensity on a
/// minimal-intensity background, matching binarized glyph crops.
fn normalize_template(image: &DynamicImage, size: u32) -> GrayImage {
    let rgba = image.to_rgba8();
    let resized = if rgba.dimensions() == (size, size) {
        rgba
    } else {
        image::imageops::resize(&rgba, size, size, FilterType::Triangle)
    };

    let pixel_count = (size * size) as u64;
    let red_sum: u64 = resized.pixels().map(|p| p.0[0] as u64).sum();
    let light_background = red_sum / pixel_count.max(1) > 128;

    let mut gray = DynamicImage::ImageRgba8(resized).to_luma8();
    if light_background {
        for p in gray.iter_mut() {
            *p = 255 - *p;
        }
    }
    gray
}
