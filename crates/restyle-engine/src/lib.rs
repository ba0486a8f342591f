pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod normalize;
pub mod preview;
pub mod providers;
pub mod session;

pub use config::{ConfigOverrides, EngineConfig};
pub use controller::{Completion, Controller, ControllerError, GenerationJob, Phase, ZoomTarget};
pub use error::{GenerationError, ImageProcessingError};
pub use normalize::{normalize, NormalizedImage, SourceImage};
pub use providers::{
    provider_from_config, DryrunProvider, GeminiProvider, GenerateRequest, ImageProvider,
    ImageProviderRegistry,
};
pub use session::{Session, SessionEvent};
