mod quick;
mod styles;

pub use quick::QuickTransform;
pub use styles::{ArtStyle, StyleCatalog};
