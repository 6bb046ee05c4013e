//! Conversion input: image bytes in a supported encoding.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use super::error::ConversionError;

/// JPEG quality used when encoding a raw image for upload.
pub const JPEG_QUALITY: u8 = 90;

/// Image encodings accepted by the conversion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
}

impl ImageFormat {
    /// File type string sent in the task request.
    pub fn wire_name(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::WebP => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::WebP => "image/webp",
        }
    }

    /// Sniff the encoding from magic bytes.
    pub fn detect(bytes: &[u8]) -> Result<Self, ConversionError> {
        match image::guess_format(bytes) {
            Ok(image::ImageFormat::Jpeg) => Ok(ImageFormat::Jpeg),
            Ok(image::ImageFormat::Png) => Ok(ImageFormat::Png),
            Ok(image::ImageFormat::WebP) => Ok(ImageFormat::WebP),
            _ => Err(ConversionError::UnsupportedImageFormat),
        }
    }
}

impl FromStr for ImageFormat {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "image/jpeg" => Ok(ImageFormat::Jpeg),
            "png" | "image/png" => Ok(ImageFormat::Png),
            "webp" | "image/webp" => Ok(ImageFormat::WebP),
            _ => Err(ConversionError::UnsupportedImageFormat),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Image bytes plus their validated format.
///
/// Immutable once built. Construction is the only place an unsupported
/// format can be rejected, so no network call ever sees one.
#[derive(Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl ConversionRequest {
    /// Build a request, detecting the format from the bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ConversionError> {
        let format = ImageFormat::detect(&bytes)?;
        Ok(Self { bytes, format })
    }

    /// Build a request with a declared format such as `"png"`.
    pub fn with_format(bytes: Vec<u8>, declared: &str) -> Result<Self, ConversionError> {
        let format: ImageFormat = declared.parse()?;
        if bytes.is_empty() {
            return Err(ConversionError::UnsupportedImageFormat);
        }
        Ok(Self { bytes, format })
    }

    /// Encode a decoded image as JPEG for upload.
    pub fn from_image(image: &DynamicImage) -> Result<Self, ConversionError> {
        let rgb = image.to_rgb8();
        let mut buffer = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
            .encode_image(&rgb)
            .map_err(|_| ConversionError::UnsupportedImageFormat)?;
        Ok(Self {
            bytes: buffer.into_inner(),
            format: ImageFormat::Jpeg,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// File name reported in the multipart upload.
    pub fn file_name(&self) -> String {
        format!("image.{}", self.format.wire_name())
    }
}

impl fmt::Debug for ConversionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRequest")
            .field("format", &self.format)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Opaque server reference to an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteImageToken(String);

impl RemoteImageToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteImageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
