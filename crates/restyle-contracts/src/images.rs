use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RESULT_MIME: &str = "image/png";

/// One gallery record. `payload` is a `data:` URL and never changes after
/// insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImage {
    pub id: i64,
    pub payload: String,
}

impl StoredImage {
    pub fn new(id: i64, payload: impl Into<String>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }

    pub fn decode(&self) -> anyhow::Result<EncodedImage> {
        EncodedImage::from_data_url(&self.payload)
    }
}

/// Base64 image data tagged with its mime type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: String,
}

impl EncodedImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(mime_type, BASE64.encode(bytes))
    }

    pub fn from_data_url(raw: &str) -> anyhow::Result<Self> {
        let Some(rest) = raw.trim().strip_prefix("data:") else {
            anyhow::bail!("not a data URL");
        };
        let Some((header, data)) = rest.split_once(',') else {
            anyhow::bail!("data URL is missing its payload separator");
        };
        let Some(mime_type) = header.strip_suffix(";base64") else {
            anyhow::bail!("data URL is not base64 encoded");
        };
        if mime_type.trim().is_empty() {
            anyhow::bail!("data URL has no mime type");
        }
        Ok(Self::new(mime_type.trim(), data))
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn bytes(&self) -> anyhow::Result<Vec<u8>> {
        Ok(BASE64.decode(self.data.as_bytes())?)
    }
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    let lowered = mime.to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    if lowered.contains("avif") {
        return "avif";
    }
    if lowered.contains("bmp") {
        return "bmp";
    }
    if lowered.contains("tiff") {
        return "tiff";
    }
    "png"
}
