use std::path::Path;

use anyhow::{Context, Result};
use restyle_contracts::images::extension_for_mime;
use tempfile::NamedTempFile;

/// Temporary on-disk copy of image bytes for viewers. The file is deleted
/// when the handle is dropped.
#[derive(Debug)]
pub struct PreviewHandle {
    file: NamedTempFile,
}

impl PreviewHandle {
    pub fn acquire(bytes: &[u8], mime_type: &str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("restyle-preview-")
            .suffix(&format!(".{}", extension_for_mime(mime_type)))
            .tempfile()
            .context("failed to create preview file")?;
        std::io::Write::write_all(&mut file, bytes).context("failed to write preview file")?;
        tracing::trace!(path = %file.path().display(), "acquired preview handle");
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
