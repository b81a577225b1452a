use bytes::Bytes;
use enum_dispatch::enum_dispatch;
use image::{load_from_memory_with_format, DynamicImage, GenericImageView, ImageResult};
use strum::Display;

use crate::error::PipelineError;
use crate::utils::run_on_pool;

/// The closed set of raster formats the pipeline understands.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
}

impl ImageKind {
    #[inline]
    pub fn mime(self) -> mime::Mime {
        match self {
            Self::Png => mime::IMAGE_PNG,
            Self::Jpeg => mime::IMAGE_JPEG,
            Self::Gif => mime::IMAGE_GIF,
        }
    }
}

impl From<ImageKind> for image::ImageFormat {
    fn from(kind: ImageKind) -> Self {
        match kind {
            ImageKind::Png => image::ImageFormat::Png,
            ImageKind::Jpeg => image::ImageFormat::Jpeg,
            ImageKind::Gif => image::ImageFormat::Gif,
        }
    }
}

/// The result of successfully sniffing a buffer.
///
/// The pixels are kept around so the resizer does not have to decode
/// the source a second time for every variant.
pub struct SniffedImage {
    pub kind: ImageKind,
    pub width: u32,
    pub height: u32,
    pub img: DynamicImage,
}

impl std::fmt::Debug for SniffedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SniffedImage")
            .field("kind", &self.kind)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

#[enum_dispatch]
pub trait FormatDecoder {
    fn kind(&self) -> ImageKind;

    /// Checks the leading magic bytes of the buffer.
    fn matches(&self, data: &[u8]) -> bool;

    /// Decodes the whole image, not just the header, so truncated
    /// uploads are caught here rather than half way through a resize.
    fn decode(&self, data: &[u8]) -> ImageResult<DynamicImage> {
        load_from_memory_with_format(data, self.kind().into())
    }
}

pub struct PngDecoder;

impl FormatDecoder for PngDecoder {
    fn kind(&self) -> ImageKind {
        ImageKind::Png
    }

    fn matches(&self, data: &[u8]) -> bool {
        data.starts_with(b"\x89PNG\r\n\x1a\n")
    }
}

pub struct JpegDecoder;

impl FormatDecoder for JpegDecoder {
    fn kind(&self) -> ImageKind {
        ImageKind::Jpeg
    }

    fn matches(&self, data: &[u8]) -> bool {
        data.starts_with(&[0xFF, 0xD8])
    }
}

pub struct GifDecoder;

impl FormatDecoder for GifDecoder {
    fn kind(&self) -> ImageKind {
        ImageKind::Gif
    }

    fn matches(&self, data: &[u8]) -> bool {
        data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a")
    }
}

/// Decoders are selected here rather than through a `Box<dyn FormatDecoder>`
/// as the set is closed and known at compile time.
#[allow(clippy::enum_variant_names)]
#[enum_dispatch(FormatDecoder)]
pub enum Decoder {
    PngDecoder,
    JpegDecoder,
    GifDecoder,
}

/// Decoders in the order they are tried.
///
/// Supporting a new format is a matter of adding its decoder here.
pub static DECODERS: [Decoder; 3] = [
    Decoder::PngDecoder(PngDecoder),
    Decoder::JpegDecoder(JpegDecoder),
    Decoder::GifDecoder(GifDecoder),
];

fn decoder_for(data: &[u8]) -> Result<&'static Decoder, PipelineError> {
    DECODERS
        .iter()
        .find(|decoder| decoder.matches(data))
        .ok_or(PipelineError::UnrecognizedFormat)
}

fn decode_with(decoder: &Decoder, data: &[u8]) -> Result<SniffedImage, PipelineError> {
    let kind = decoder.kind();
    let img = decoder
        .decode(data)
        .map_err(|source| PipelineError::CorruptImage { kind, source })?;
    let (width, height) = img.dimensions();

    Ok(SniffedImage {
        kind,
        width,
        height,
        img,
    })
}

/// Works out the format and dimensions of the given buffer from its
/// contents alone.
pub fn detect(data: &[u8]) -> Result<SniffedImage, PipelineError> {
    decode_with(decoder_for(data)?, data)
}

/// Runs [`detect`] on the rayon pool, decoding can take a while for
/// large uploads.
pub async fn detect_on_pool(data: Bytes) -> Result<SniffedImage, PipelineError> {
    let kind = decoder_for(&data)?.kind();

    run_on_pool(move || detect(&data))
        .await
        .ok_or_else(|| PipelineError::CorruptImage {
            kind,
            source: image::ImageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                "decoder panicked while reading the image",
            )),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::sample_image;

    #[test]
    fn detects_every_supported_format() {
        for kind in [ImageKind::Png, ImageKind::Jpeg, ImageKind::Gif] {
            let data = sample_image(kind, 37, 21);
            let sniffed = detect(&data).unwrap();

            assert_eq!(sniffed.kind, kind);
            assert_eq!((sniffed.width, sniffed.height), (37, 21));
        }
    }

    #[test]
    fn truncated_images_are_corrupt() {
        let cases = [
            (ImageKind::Png, 20),
            (ImageKind::Jpeg, 4),
            (ImageKind::Gif, 8),
        ];

        for (kind, keep) in cases {
            let data = sample_image(kind, 16, 16);
            let err = detect(&data[..keep]).unwrap_err();

            assert!(
                matches!(err, PipelineError::CorruptImage { kind: k, .. } if k == kind),
                "expected corrupt {} got {:?}",
                kind,
                err,
            );
        }
    }

    #[test]
    fn arbitrary_bytes_are_unrecognized() {
        let err = detect(b"definitely not an image, just some text").unwrap_err();
        assert!(matches!(err, PipelineError::UnrecognizedFormat));

        let err = detect(&[]).unwrap_err();
        assert!(matches!(err, PipelineError::UnrecognizedFormat));
    }

    #[test]
    fn content_is_trusted_over_naming() {
        // A png is a png no matter what the key claims.
        let data = sample_image(ImageKind::Png, 4, 4);
        assert!(!JpegDecoder.matches(&data));
        assert!(!GifDecoder.matches(&data));
        assert_eq!(detect(&data).unwrap().kind, ImageKind::Png);
    }

    #[tokio::test]
    async fn pool_detection_matches_inline_detection() {
        let data = Bytes::from(sample_image(ImageKind::Gif, 12, 9));
        let sniffed = detect_on_pool(data).await.unwrap();
        assert_eq!((sniffed.kind, sniffed.width, sniffed.height), (ImageKind::Gif, 12, 9));

        let err = detect_on_pool(Bytes::from_static(b"nope")).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnrecognizedFormat));
    }

    #[test]
    fn content_types_follow_the_format() {
        assert_eq!(ImageKind::Png.mime().as_ref(), "image/png");
        assert_eq!(ImageKind::Jpeg.mime().as_ref(), "image/jpeg");
        assert_eq!(ImageKind::Gif.mime().as_ref(), "image/gif");
    }
}
