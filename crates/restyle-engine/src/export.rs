use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::ImageFormat;
use restyle_contracts::images::EncodedImage;

pub fn export_file_name(stamp_millis: i64) -> String {
    format!("generated-image-{stamp_millis}.png")
}

/// Writes `image` into `dir` as a PNG named after `stamp_millis`,
/// transcoding when the image is in another format.
pub fn write_png(image: &EncodedImage, dir: &Path, stamp_millis: i64) -> Result<PathBuf> {
    let bytes = image.bytes().context("generated image data is not valid base64")?;
    let png = if image.mime_type.eq_ignore_ascii_case("image/png") {
        bytes
    } else {
        let decoded = image::load_from_memory(&bytes)
            .with_context(|| format!("failed to decode {} result", image.mime_type))?;
        let mut cursor = Cursor::new(Vec::new());
        decoded
            .write_to(&mut cursor, ImageFormat::Png)
            .context("failed to encode PNG")?;
        cursor.into_inner()
    };

    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(export_file_name(stamp_millis));
    std::fs::write(&path, png).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
