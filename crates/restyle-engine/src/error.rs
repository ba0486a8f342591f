use thiserror::Error;

pub const RATE_LIMIT_MESSAGE: &str =
    "Rate limit exceeded. Please wait a little while before trying again.";

/// Failures while turning a user file into something the API accepts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageProcessingError {
    #[error("Could not read image: {0}")]
    Unreadable(String),

    #[error("Failed to load image for conversion: {0}")]
    Decode(String),

    #[error("Could not get a drawing surface for image conversion.")]
    NoSurface,

    #[error("Failed to re-encode image: {0}")]
    Encode(String),
}

/// Everything a single generation attempt can end with other than an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("{0}")]
    ConfigurationError(String),

    #[error(transparent)]
    ImageProcessingError(#[from] ImageProcessingError),

    #[error("Rate limit exceeded. Please wait a little while before trying again.")]
    RateLimited,

    #[error("{0}")]
    ServiceError(String),

    #[error("No image data found in the API response.")]
    NoImageReturned,

    #[error("{0}")]
    UnknownGenerationError(String),
}

impl GenerationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigurationError(_) => "configuration",
            Self::ImageProcessingError(_) => "image_processing",
            Self::RateLimited => "rate_limited",
            Self::ServiceError(_) => "service",
            Self::NoImageReturned => "no_image",
            Self::UnknownGenerationError(_) => "unknown",
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            return Self::UnknownGenerationError(
                "Failed to generate image. An unexpected error occurred.".to_string(),
            );
        }
        Self::UnknownGenerationError(message)
    }
}
