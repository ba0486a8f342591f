use std::io::Read;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;

use crate::error::ImageProcessingError;

/// Formats the generation API takes as-is.
pub const ACCEPTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];
pub const FALLBACK_MIME_TYPE: &str = "image/jpeg";
pub const FALLBACK_JPEG_QUALITY: u8 = 95;

/// A user-supplied image file as it was loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub encoded_data: String,
    pub format: String,
}

impl SourceImage {
    /// Builds a source from raw bytes. The mime type is the declared one if
    /// given, else the file extension's, else whatever the bytes look like.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>, declared: Option<&str>) -> Self {
        let name = name.into();
        let mime_type = declared
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| value.to_ascii_lowercase())
            .or_else(|| mime_for_path(Path::new(&name)).map(str::to_string))
            .or_else(|| sniff_mime(&bytes).map(str::to_string))
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Self {
            name,
            mime_type,
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ImageProcessingError> {
        let bytes = std::fs::read(path).map_err(|err| {
            ImageProcessingError::Unreadable(format!("{}: {err}", path.display()))
        })?;
        let name = path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or("image")
            .to_string();
        Ok(Self::from_bytes(name, bytes, mime_for_path(path)))
    }

    pub fn from_reader(name: &str, mut reader: impl Read) -> Result<Self, ImageProcessingError> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|err| ImageProcessingError::Unreadable(err.to_string()))?;
        Ok(Self::from_bytes(name, bytes, None))
    }

    pub fn is_accepted_format(&self) -> bool {
        ACCEPTED_MIME_TYPES.contains(&self.mime_type.as_str())
    }
}

/// Produces an encoding the generation API accepts, re-encoding to JPEG when
/// the source format is not in [`ACCEPTED_MIME_TYPES`].
pub fn normalize(source: &SourceImage) -> Result<NormalizedImage, ImageProcessingError> {
    if source.bytes.is_empty() {
        return Err(ImageProcessingError::Unreadable(format!(
            "{} is empty",
            source.name
        )));
    }

    if source.is_accepted_format() {
        return Ok(NormalizedImage {
            encoded_data: BASE64.encode(&source.bytes),
            format: source.mime_type.clone(),
        });
    }

    tracing::debug!(
        name = %source.name,
        mime = %source.mime_type,
        "re-encoding unsupported source format as JPEG"
    );
    let decoded = image::load_from_memory(&source.bytes)
        .map_err(|err| ImageProcessingError::Decode(err.to_string()))?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(ImageProcessingError::NoSurface);
    }

    let mut buffer = Vec::new();
    decoded
        .to_rgb8()
        .write_with_encoder(JpegEncoder::new_with_quality(
            &mut buffer,
            FALLBACK_JPEG_QUALITY,
        ))
        .map_err(|err| ImageProcessingError::Encode(err.to_string()))?;

    Ok(NormalizedImage {
        encoded_data: BASE64.encode(&buffer),
        format: FALLBACK_MIME_TYPE.to_string(),
    })
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "avif" => Some("image/avif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
}
