use std::sync::Arc;

use bytes::Bytes;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};

use crate::error::PipelineError;
use crate::processor::encoder::encode_to;
use crate::processor::sniffer::SniffedImage;
use crate::utils::run_on_pool;

/// The payload produced for a single variant.
#[derive(Debug, Clone)]
pub enum Rendered {
    /// The source already fits the target so its original bytes are reused.
    Passthrough(Bytes),

    /// The source was scaled down and padded to the exact target size.
    Resized(Bytes),
}

impl Rendered {
    #[inline]
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Passthrough(_))
    }

    #[inline]
    pub fn bytes(&self) -> &Bytes {
        match self {
            Self::Passthrough(buff) | Self::Resized(buff) => buff,
        }
    }

    #[inline]
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Passthrough(buff) | Self::Resized(buff) => buff,
        }
    }
}

#[inline]
pub fn fits_within(source: &SniffedImage, width: u32, height: u32) -> bool {
    source.width <= width && source.height <= height
}

/// Produces the variant for a `width` x `height` target.
///
/// Images are never upscaled, anything that already fits is passed through
/// untouched.
pub fn render(
    original: &Bytes,
    source: &SniffedImage,
    width: u32,
    height: u32,
) -> Result<Rendered, PipelineError> {
    if fits_within(source, width, height) {
        return Ok(Rendered::Passthrough(original.clone()));
    }

    let canvas = resize_and_pad(&source.img, width, height);
    let buff = encode_to(&canvas, source.kind)
        .map_err(|e| PipelineError::Encode { source: e.into() })?;

    Ok(Rendered::Resized(buff))
}

/// Scales the image to fit within the target box keeping its aspect ratio
/// and pastes it onto the top left of a transparent canvas of exactly
/// the target size.
pub fn resize_and_pad(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let thumb = img.resize(width, height, FilterType::CatmullRom).to_rgba8();

    let mut canvas = RgbaImage::new(width, height);
    imageops::overlay(&mut canvas, &thumb, 0, 0);

    DynamicImage::ImageRgba8(canvas)
}

/// Runs [`render`] on the rayon pool so the async workers are never
/// blocked by resizing.
pub async fn render_on_pool(
    original: Bytes,
    source: Arc<SniffedImage>,
    width: u32,
    height: u32,
) -> Result<Rendered, PipelineError> {
    if fits_within(&source, width, height) {
        return Ok(Rendered::Passthrough(original));
    }

    run_on_pool(move || render(&original, &source, width, height))
        .await
        .ok_or_else(|| PipelineError::Encode {
            source: "resize panicked while rendering the variant".into(),
        })?
}
