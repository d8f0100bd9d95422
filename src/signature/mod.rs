use std::{fmt, io::Cursor, sync::OnceLock};

use image::{DynamicImage, ExtendedColorType, GrayImage, ImageDecoder, ImageFormat, ImageReader};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{correlation::CorrelationSearch, fuzzy::content_digest},
    error::Result,
    image_utils::{crop_square, rgb_to_gray},
    metadata::exif::{CameraSummary, ExifExtractor},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorMode {
    Grayscale,
    GrayscaleAlpha,
    Rgb,
    Rgba,
    Indexed,
    Other,
}

impl ColorMode {
    pub fn label(&self) -> &'static str {
        match self {
            ColorMode::Grayscale => "L",
            ColorMode::GrayscaleAlpha => "LA",
            ColorMode::Rgb => "RGB",
            ColorMode::Rgba => "RGBA",
            ColorMode::Indexed => "P",
            ColorMode::Other => "other",
        }
    }
}

impl From<ExtendedColorType> for ColorMode {
    fn from(color: ExtendedColorType) -> Self {
        use ExtendedColorType as C;

        match color {
            C::L1 | C::L2 | C::L4 | C::L8 | C::L16 => ColorMode::Grayscale,
            C::La1 | C::La2 | C::La4 | C::La8 | C::La16 => ColorMode::GrayscaleAlpha,
            C::Rgb1 | C::Rgb2 | C::Rgb4 | C::Rgb8 | C::Rgb16 | C::Rgb32F => ColorMode::Rgb,
            C::Rgba1 | C::Rgba2 | C::Rgba4 | C::Rgba8 | C::Rgba16 | C::Rgba32F => ColorMode::Rgba,
            _ => ColorMode::Other,
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A named anchor in relative image coordinates, both axes in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRegion {
    pub name: String,
    pub anchor_x: f64,
    pub anchor_y: f64,
}

impl TemplateRegion {
    pub fn new(name: &str, anchor_x: f64, anchor_y: f64) -> Self {
        Self {
            name: name.into(),
            anchor_x,
            anchor_y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub regions: Vec<TemplateRegion>,
    /// Template side as a fraction of the shorter image side.
    pub size_fraction: f64,
    pub max_side: u32,
    pub min_side: u32,
    /// Per-pixel variance below which a template is treated as featureless.
    pub flat_variance: f64,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            regions: vec![
                TemplateRegion::new("top-left", 0.0, 0.0),
                TemplateRegion::new("top-right", 1.0, 0.0),
                TemplateRegion::new("bottom-left", 0.0, 1.0),
                TemplateRegion::new("bottom-right", 1.0, 1.0),
                TemplateRegion::new("center", 0.5, 0.5),
            ],
            size_fraction: 0.25,
            max_side: 64,
            min_side: 8,
            flat_variance: 1.0,
        }
    }
}

impl TemplateConfig {
    pub fn template_side(&self, width: u32, height: u32) -> Option<u32> {
        let side = ((width.min(height) as f64) * self.size_fraction).floor() as u32;
        let side = side.min(self.max_side);

        (side >= self.min_side.max(1)).then_some(side)
    }
}

#[derive(Debug, Clone)]
pub struct RegionTemplate {
    pub region: String,
    pub x: u32,
    pub y: u32,
    pub pixels: GrayImage,
}

#[derive(Debug, Clone)]
pub struct ImageSignature {
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub color_mode: ColorMode,
    pub format: Option<ImageFormat>,
    pub camera: Option<CameraSummary>,
    pub content_digest: String,
    /// Luma plane searched when this image is a candidate.
    pub luma: GrayImage,
    /// Only populated for registration targets.
    pub region_templates: Vec<RegionTemplate>,
    pub(crate) search: OnceLock<CorrelationSearch>,
}

impl ImageSignature {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Search state over `luma`, built on first use and shared by every
    /// target this signature is compared against.
    pub fn correlation_search(&self) -> &CorrelationSearch {
        self.search.get_or_init(|| CorrelationSearch::new(&self.luma))
    }
}

pub struct SignatureExtractor {
    config: TemplateConfig,
}

impl SignatureExtractor {
    pub fn new() -> Self {
        Self {
            config: TemplateConfig::default(),
        }
    }

    pub fn with_config(config: TemplateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    pub fn extract(&self, data: &[u8], with_templates: bool) -> Result<ImageSignature> {
        let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
        let format = reader.format();
        let decoder = reader.into_decoder()?;
        let color_mode = if format == Some(ImageFormat::Png) && is_palette_png(data) {
            ColorMode::Indexed
        } else {
            ColorMode::from(decoder.original_color_type())
        };
        let image = DynamicImage::from_decoder(decoder)?;

        let (width, height) = (image.width(), image.height());
        let luma = rgb_to_gray(&image.to_rgb8());

        let region_templates = if with_templates {
            self.cut_templates(&luma)
        } else {
            Vec::new()
        };

        debug!(
            "signature: {} bytes, {}x{} {}, {} templates",
            data.len(),
            width,
            height,
            color_mode,
            region_templates.len()
        );

        Ok(ImageSignature {
            file_size: data.len() as u64,
            width,
            height,
            color_mode,
            format,
            camera: ExifExtractor::extract(data),
            content_digest: content_digest(data),
            luma,
            region_templates,
            search: OnceLock::new(),
        })
    }

    fn cut_templates(&self, luma: &GrayImage) -> Vec<RegionTemplate> {
        let (width, height) = luma.dimensions();
        let Some(side) = self.config.template_side(width, height) else {
            return Vec::new();
        };

        self.config
            .regions
            .iter()
            .map(|region| {
                let x = (region.anchor_x.clamp(0.0, 1.0) * (width - side) as f64).round() as u32;
                let y = (region.anchor_y.clamp(0.0, 1.0) * (height - side) as f64).round() as u32;

                RegionTemplate {
                    region: region.name.clone(),
                    x,
                    y,
                    pixels: crop_square(luma, x, y, side),
                }
            })
            .collect()
    }
}

/// The PNG decoder expands palettes to RGB(A), so the IHDR colour type
/// (byte 25, value 3 for indexed) is read directly.
fn is_palette_png(data: &[u8]) -> bool {
    const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

    data.starts_with(PNG_SIGNATURE) && data.get(12..16) == Some(&b"IHDR"[..]) && data.get(25) == Some(&3)
}

impl Default for SignatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}
