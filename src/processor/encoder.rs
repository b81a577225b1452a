use std::io::Cursor;

use bytes::Bytes;
use image::{DynamicImage, ImageResult};

use crate::processor::sniffer::ImageKind;

/// Encodes the image in the given format.
///
/// JPEG has no alpha channel so the image is flattened to RGB first,
/// transparent padding ends up black.
#[inline]
pub fn encode_to(img: &DynamicImage, kind: ImageKind) -> ImageResult<Bytes> {
    let mut buff = Cursor::new(Vec::new());

    match kind {
        ImageKind::Jpeg if img.color().has_alpha() => {
            DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut buff, image::ImageFormat::Jpeg)?;
        },
        _ => img.write_to(&mut buff, image::ImageFormat::from(kind))?,
    }

    Ok(Bytes::from(buff.into_inner()))
}
