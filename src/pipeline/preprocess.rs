//! Fixed-shape image preprocessing for the gatekeeper and specialist models.
//!
//! Each model was trained behind a specific loader, so every transform here
//! reproduces that loader step for step: decode → colour conversion → resize
//! → NHWC float tensor with a batch axis → normalization. Conversion always
//! happens before resizing.
//!
//! Grayscale conversion uses the ITU-R 601-2 luma transform in the same 16-bit
//! fixed-point form the training loader used, so equal-channel pixels map to
//! themselves exactly. Nearest-neighbour resizing samples the source pixel
//! whose centre is closest to the destination pixel centre.

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, ImageBuffer, Luma, Pixel, RgbImage};
use thiserror::Error;
use tracing::debug;

use crate::inference::ImageTensor;
use crate::modality::ModalityLabel;

// ═══════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════

/// Uploads larger than this are rejected before decoding.
const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

/// Smallest byte count that can hold a real image header.
const MIN_IMAGE_BYTES: usize = 8;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Grayscale,
    Rgb,
}

impl ColorMode {
    pub fn channels(&self) -> usize {
        match self {
            ColorMode::Grayscale => 1,
            ColorMode::Rgb => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeFilter {
    /// Centre-aligned nearest-neighbour sampling.
    Nearest,
    /// Catmull-Rom cubic.
    Bicubic,
}

/// Per-pixel value mapping applied after the tensor is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// `x / 255`, range [0, 1].
    Rescale,
    /// Xception centering, `x / 127.5 - 1`, range [-1, 1].
    Xception,
    /// MobileNetV2 centering, `x / 127.5 - 1`, range [-1, 1].
    MobileNetV2,
}

impl Normalization {
    pub fn apply(&self, value: u8) -> f32 {
        let v = f32::from(value);
        match self {
            Normalization::Rescale => v / 255.0,
            Normalization::Xception | Normalization::MobileNetV2 => v / 127.5 - 1.0,
        }
    }
}

/// Everything that defines one model's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSpec {
    pub width: u32,
    pub height: u32,
    pub color: ColorMode,
    pub filter: ResizeFilter,
    pub normalization: Normalization,
}

impl InputSpec {
    pub const GATEKEEPER: InputSpec = InputSpec {
        width: 150,
        height: 150,
        color: ColorMode::Grayscale,
        filter: ResizeFilter::Bicubic,
        normalization: Normalization::Rescale,
    };

    pub const CHEST_XRAY: InputSpec = InputSpec {
        width: 150,
        height: 150,
        color: ColorMode::Grayscale,
        filter: ResizeFilter::Nearest,
        normalization: Normalization::Rescale,
    };

    pub const BRAIN_TUMOR: InputSpec = InputSpec {
        width: 299,
        height: 299,
        color: ColorMode::Rgb,
        filter: ResizeFilter::Nearest,
        normalization: Normalization::Xception,
    };

    pub const SKIN_CANCER: InputSpec = InputSpec {
        width: 224,
        height: 224,
        color: ColorMode::Rgb,
        filter: ResizeFilter::Nearest,
        normalization: Normalization::MobileNetV2,
    };

    pub const BONE_FRACTURE: InputSpec = InputSpec {
        width: 180,
        height: 180,
        color: ColorMode::Rgb,
        filter: ResizeFilter::Nearest,
        normalization: Normalization::Rescale,
    };

    /// Input spec of the specialist for `modality`. `None` for `Other`.
    pub fn for_specialist(modality: ModalityLabel) -> Option<InputSpec> {
        match modality {
            ModalityLabel::ChestXray => Some(Self::CHEST_XRAY),
            ModalityLabel::BrainTumor => Some(Self::BRAIN_TUMOR),
            ModalityLabel::SkinCancer => Some(Self::SKIN_CANCER),
            ModalityLabel::BoneFracture => Some(Self::BONE_FRACTURE),
            ModalityLabel::Other => None,
        }
    }

    /// Tensor shape produced for this spec, `[1, H, W, C]`.
    pub fn tensor_shape(&self) -> [usize; 4] {
        [
            1,
            self.height as usize,
            self.width as usize,
            self.color.channels(),
        ]
    }
}

// ═══════════════════════════════════════════════════════════
// Preprocessor
// ═══════════════════════════════════════════════════════════

/// Turns an image file into a model-ready tensor.
pub trait ImagePreprocessor: Send + Sync {
    fn preprocess(&self, path: &Path) -> Result<ImageTensor, PreprocessError>;

    fn input_shape(&self) -> [usize; 4];
}

/// Stateless preprocessor driven entirely by an `InputSpec`.
#[derive(Debug, Clone, Copy)]
pub struct FixedShapePreprocessor {
    spec: InputSpec,
}

impl FixedShapePreprocessor {
    pub const fn new(spec: InputSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &InputSpec {
        &self.spec
    }

    /// Preprocess already-loaded bytes. `preprocess` is a thin file wrapper over this.
    pub fn preprocess_bytes(&self, bytes: &[u8]) -> Result<ImageTensor, PreprocessError> {
        validate_image_bytes(bytes)?;

        let img = image::load_from_memory(bytes)
            .map_err(|e| PreprocessError::Decode(e.to_string()))?;
        let (orig_w, orig_h) = img.dimensions();
        if orig_w == 0 || orig_h == 0 {
            return Err(PreprocessError::InvalidImage("image has no pixels".into()));
        }

        let spec = &self.spec;
        let tensor = match spec.color {
            ColorMode::Grayscale => {
                let gray = to_luma_601(&img);
                let resized = match spec.filter {
                    ResizeFilter::Nearest => resize_nearest(&gray, spec.width, spec.height),
                    ResizeFilter::Bicubic => image::imageops::resize(
                        &gray,
                        spec.width,
                        spec.height,
                        FilterType::CatmullRom,
                    ),
                };
                gray_to_tensor(&resized, spec.normalization)
            }
            ColorMode::Rgb => {
                let rgb = img.to_rgb8();
                let resized = match spec.filter {
                    ResizeFilter::Nearest => resize_nearest(&rgb, spec.width, spec.height),
                    ResizeFilter::Bicubic => image::imageops::resize(
                        &rgb,
                        spec.width,
                        spec.height,
                        FilterType::CatmullRom,
                    ),
                };
                rgb_to_tensor(&resized, spec.normalization)
            }
        };

        debug!(
            original = %format!("{orig_w}x{orig_h}"),
            shape = ?tensor.shape(),
            normalization = ?spec.normalization,
            "Image preprocessed"
        );

        Ok(tensor)
    }
}

impl ImagePreprocessor for FixedShapePreprocessor {
    fn preprocess(&self, path: &Path) -> Result<ImageTensor, PreprocessError> {
        let bytes = std::fs::read(path)?;
        self.preprocess_bytes(&bytes)
    }

    fn input_shape(&self) -> [usize; 4] {
        self.spec.tensor_shape()
    }
}

// ═══════════════════════════════════════════════════════════
// Pixel transforms
// ═══════════════════════════════════════════════════════════

/// Reject byte buffers that cannot be a valid image or are too large to decode safely.
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), PreprocessError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(PreprocessError::InvalidImage(
            "Image data too small to be valid".into(),
        ));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(PreprocessError::InvalidImage(format!(
            "Image data exceeds {}MB limit",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// ITU-R 601-2 luma in 16-bit fixed point: `L = R*299/1000 + G*587/1000 + B*114/1000`.
pub fn luma_601(r: u8, g: u8, b: u8) -> u8 {
    let l = (u32::from(r) * 19_595 + u32::from(g) * 38_470 + u32::from(b) * 7_471 + 0x8000) >> 16;
    l as u8
}

/// Convert any decoded image to 8-bit luma (alpha discarded).
fn to_luma_601(img: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = img {
        return gray.clone();
    }
    let rgb = img.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        Luma([luma_601(r, g, b)])
    })
}

/// Index of the source pixel sampled for destination index `dst`.
pub fn nearest_source_index(dst: u32, dst_len: u32, src_len: u32) -> u32 {
    let scale = f64::from(src_len) / f64::from(dst_len);
    let src = ((f64::from(dst) + 0.5) * scale).floor() as u32;
    src.min(src_len.saturating_sub(1))
}

fn resize_nearest<P>(
    src: &ImageBuffer<P, Vec<P::Subpixel>>,
    width: u32,
    height: u32,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    let (src_w, src_h) = src.dimensions();
    ImageBuffer::from_fn(width, height, |x, y| {
        let sx = nearest_source_index(x, width, src_w);
        let sy = nearest_source_index(y, height, src_h);
        *src.get_pixel(sx, sy)
    })
}

fn gray_to_tensor(img: &GrayImage, norm: Normalization) -> ImageTensor {
    let (w, h) = img.dimensions();
    ImageTensor::from_shape_fn((1, h as usize, w as usize, 1), |(_, y, x, _)| {
        norm.apply(img.get_pixel(x as u32, y as u32).0[0])
    })
}

fn rgb_to_tensor(img: &RgbImage, norm: Normalization) -> ImageTensor {
    let (w, h) = img.dimensions();
    ImageTensor::from_shape_fn((1, h as usize, w as usize, 3), |(_, y, x, c)| {
        norm.apply(img.get_pixel(x as u32, y as u32).0[c])
    })
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
