mod dryrun;
mod gemini;

use std::collections::BTreeMap;
use std::sync::Arc;

use restyle_contracts::images::EncodedImage;

use crate::config::EngineConfig;
use crate::error::GenerationError;
use crate::normalize::NormalizedImage;

pub use dryrun::DryrunProvider;
pub use gemini::GeminiProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub image: NormalizedImage,
    pub instruction: String,
}

/// One round-trip to an image generation backend. Implementations send at
/// most one request per call and never retry.
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &GenerateRequest) -> Result<EncodedImage, GenerationError>;
}

#[derive(Default)]
pub struct ImageProviderRegistry {
    providers: BTreeMap<String, Arc<dyn ImageProvider>>,
}

impl ImageProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: ImageProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Arc::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ImageProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

/// Resolves the configured provider. Configuration problems, such as a
/// missing API key, are reported here rather than on first use.
pub fn provider_from_config(config: &EngineConfig) -> Result<Arc<dyn ImageProvider>, GenerationError> {
    config.validate()?;
    let mut providers = ImageProviderRegistry::new();
    providers.register(DryrunProvider);
    if config.provider == "gemini" {
        providers.register(GeminiProvider::from_config(config)?);
    }
    providers.get(&config.provider).ok_or_else(|| {
        GenerationError::ConfigurationError(format!(
            "Image provider '{}' is not available (known: {}).",
            config.provider,
            providers.names().join(", ")
        ))
    })
}
