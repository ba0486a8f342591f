use std::env;
use std::path::PathBuf;

use crate::error::GenerationError;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_PROVIDER: &str = "gemini";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub provider: String,
    pub model: String,
    pub api_base: String,
    pub api_key: Option<String>,
    pub data_dir: Option<PathBuf>,
}

/// Values given on the command line; each one wins over its env var.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub data_dir: Option<PathBuf>,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::resolve(ConfigOverrides::default(), non_empty_env)
    }

    pub fn from_env_with(overrides: ConfigOverrides) -> Self {
        Self::resolve(overrides, non_empty_env)
    }

    fn resolve(overrides: ConfigOverrides, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let provider = overrides
            .provider
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| !value.is_empty())
            .or_else(|| lookup("RESTYLE_PROVIDER").map(|value| value.to_ascii_lowercase()))
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());
        let model = overrides
            .model
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or_else(|| lookup("RESTYLE_IMAGE_MODEL"))
            .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string());
        let api_base = lookup("GEMINI_API_BASE")
            .map(|value| value.trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string());
        let api_key = lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_API_KEY"));
        let data_dir = overrides
            .data_dir
            .or_else(|| lookup("RESTYLE_DATA_DIR").map(PathBuf::from))
            .or_else(|| dirs::data_dir().map(|dir| dir.join("restyle")));

        Self {
            provider,
            model,
            api_base,
            api_key,
            data_dir,
        }
    }

    /// Fails when the selected provider needs a credential that is missing.
    pub fn validate(&self) -> Result<(), GenerationError> {
        match self.provider.as_str() {
            "gemini" if self.api_key.is_none() => Err(GenerationError::ConfigurationError(
                "GEMINI_API_KEY (or GOOGLE_API_KEY) environment variable is not set.".to_string(),
            )),
            "gemini" | "dryrun" => Ok(()),
            other => Err(GenerationError::ConfigurationError(format!(
                "Unknown image provider '{other}'. Expected 'gemini' or 'dryrun'."
            ))),
        }
    }

    pub fn events_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("events.jsonl"))
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
