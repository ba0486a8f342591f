use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, ImageReader, Rgb, RgbImage};
use restyle_contracts::images::EncodedImage;
use sha2::{Digest, Sha256};

use super::{GenerateRequest, ImageProvider};
use crate::error::{GenerationError, ImageProcessingError};

const FALLBACK_SIDE: u32 = 512;

/// Offline provider: answers with a solid PNG the size of the source image,
/// coloured by a hash of the instruction and the source data.
pub struct DryrunProvider;

impl ImageProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, request: &GenerateRequest) -> Result<EncodedImage, GenerationError> {
        let (width, height) = source_dims(&request.image.encoded_data);
        let (r, g, b) = color_from_request(request);
        let image = RgbImage::from_pixel(width, height, Rgb([r, g, b]));

        let mut cursor = Cursor::new(Vec::new());
        image
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|err| ImageProcessingError::Encode(err.to_string()))?;
        tracing::debug!(width, height, "dryrun provider produced a placeholder");
        Ok(EncodedImage::from_bytes("image/png", &cursor.into_inner()))
    }
}

fn source_dims(encoded_data: &str) -> (u32, u32) {
    let Ok(bytes) = BASE64.decode(encoded_data.as_bytes()) else {
        return (FALLBACK_SIDE, FALLBACK_SIDE);
    };
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok())
        .filter(|(width, height)| *width > 0 && *height > 0)
        .unwrap_or((FALLBACK_SIDE, FALLBACK_SIDE))
}

fn color_from_request(request: &GenerateRequest) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(request.instruction.as_bytes());
    hasher.update(request.image.encoded_data.as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}
