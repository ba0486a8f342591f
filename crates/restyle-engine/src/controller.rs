use std::path::{Path, PathBuf};

use restyle_contracts::catalog::{QuickTransform, StyleCatalog};
use restyle_contracts::events::EventWriter;
use restyle_contracts::gallery::GalleryManager;
use restyle_contracts::images::{EncodedImage, StoredImage};
use serde_json::{json, Value};
use thiserror::Error;

use crate::error::GenerationError;
use crate::export;
use crate::normalize::{normalize, SourceImage};
use crate::preview::PreviewHandle;
use crate::providers::{GenerateRequest, ImageProvider};

pub const NO_SOURCE_MESSAGE: &str = "Please upload an image first.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Ready,
    Generating,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ready => "ready",
            Self::Generating => "generating",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomTarget {
    Original,
    Result,
    Gallery(i64),
}

impl ZoomTarget {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "original" | "source" => Some(Self::Original),
            "result" | "generated" => Some(Self::Result),
            _ => trimmed.parse::<i64>().ok().map(Self::Gallery),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("Please upload an image first.")]
    NoSource,

    #[error("A generation is already in progress.")]
    Busy,

    #[error("Please enter a prompt.")]
    EmptyPrompt,

    #[error("Unknown art style '{0}'.")]
    UnknownStyle(String),

    #[error("There is no generated image yet.")]
    NoResult,

    #[error("No gallery image with id {0}.")]
    NotInGallery(i64),

    #[error("Could not load gallery. {0}")]
    GalleryLoad(String),

    #[error("Could not save image to the gallery.")]
    GallerySave,

    #[error("Could not delete image from the gallery.")]
    GalleryDelete,

    #[error("Could not open image for viewing: {0}")]
    Preview(String),

    #[error("Could not download image: {0}")]
    Export(String),
}

/// Work for one generation attempt, detached from the controller so it can
/// run on another thread.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    token: u64,
    label: String,
    source: SourceImage,
    instruction: String,
}

impl GenerationJob {
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn run(&self, provider: &dyn ImageProvider) -> Result<EncodedImage, GenerationError> {
        let image = normalize(&self.source)?;
        provider.generate(&GenerateRequest {
            image,
            instruction: self.instruction.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Discarded,
}

#[derive(Debug)]
struct Displayed<T> {
    image: T,
    preview: Option<PreviewHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InFlight {
    token: u64,
    label: String,
}

/// Owns all transient session state and sequences user actions against the
/// normalizer, the generation provider and the gallery.
pub struct Controller {
    catalog: StyleCatalog,
    gallery: GalleryManager,
    journal: Option<EventWriter>,
    source: Option<Displayed<SourceImage>>,
    result: Option<Displayed<EncodedImage>>,
    error: Option<String>,
    in_flight: Option<InFlight>,
    next_token: u64,
    gallery_items: Vec<StoredImage>,
    gallery_open: bool,
    zoom: Option<(ZoomTarget, PreviewHandle)>,
}

impl Controller {
    pub fn new(gallery: GalleryManager, catalog: StyleCatalog) -> Self {
        Self {
            catalog,
            gallery,
            journal: None,
            source: None,
            result: None,
            error: None,
            in_flight: None,
            next_token: 1,
            gallery_items: Vec::new(),
            gallery_open: false,
            zoom: None,
        }
    }

    pub fn with_journal(mut self, journal: EventWriter) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn catalog(&self) -> &StyleCatalog {
        &self.catalog
    }

    pub fn phase(&self) -> Phase {
        if self.in_flight.is_some() {
            Phase::Generating
        } else if self.source.is_some() {
            Phase::Ready
        } else {
            Phase::Idle
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref().map(|shown| &shown.image)
    }

    pub fn source_preview(&self) -> Option<&Path> {
        self.source
            .as_ref()
            .and_then(|shown| shown.preview.as_ref())
            .map(PreviewHandle::path)
    }

    pub fn result(&self) -> Option<&EncodedImage> {
        self.result.as_ref().map(|shown| &shown.image)
    }

    pub fn result_preview(&self) -> Option<&Path> {
        self.result
            .as_ref()
            .and_then(|shown| shown.preview.as_ref())
            .map(PreviewHandle::path)
    }

    pub fn in_flight_label(&self) -> Option<&str> {
        self.in_flight.as_ref().map(|job| job.label.as_str())
    }

    /// Replaces the source image. Resets to Ready with no result and no
    /// error; an in-flight generation is abandoned and its completion will
    /// be discarded.
    pub fn upload(&mut self, source: SourceImage) {
        if let Some(abandoned) = self.in_flight.take() {
            tracing::info!(token = abandoned.token, "upload abandons in-flight generation");
        }
        self.result = None;
        self.error = None;
        if matches!(
            self.zoom,
            Some((ZoomTarget::Original | ZoomTarget::Result, _))
        ) {
            self.zoom = None;
        }

        let preview = acquire_preview(&source.bytes, &source.mime_type);
        self.record(
            "image_uploaded",
            json!({
                "name": source.name,
                "mime_type": source.mime_type,
                "bytes": source.bytes.len(),
            }),
        );
        self.source = Some(Displayed {
            image: source,
            preview,
        });
    }

    pub fn select_style(&mut self, style_id: &str) -> Result<GenerationJob, ControllerError> {
        let Some(style) = self.catalog.get(style_id) else {
            return Err(ControllerError::UnknownStyle(style_id.trim().to_string()));
        };
        let (label, prompt) = (style.name.clone(), style.prompt.clone());
        self.begin_generation(&label, &prompt)
    }

    pub fn quick_transform(
        &mut self,
        transform: QuickTransform,
    ) -> Result<GenerationJob, ControllerError> {
        self.begin_generation(transform.name(), transform.prompt())
    }

    pub fn manual_prompt(&mut self, prompt: &str) -> Result<GenerationJob, ControllerError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ControllerError::EmptyPrompt);
        }
        self.begin_generation("prompt", prompt)
    }

    /// Enters Generating and hands back the job to run. Rejected while a
    /// generation is already in flight.
    pub fn begin_generation(
        &mut self,
        label: &str,
        instruction: &str,
    ) -> Result<GenerationJob, ControllerError> {
        if self.in_flight.is_some() {
            return Err(ControllerError::Busy);
        }
        let Some(source) = self.source.as_ref().map(|shown| shown.image.clone()) else {
            self.error = Some(NO_SOURCE_MESSAGE.to_string());
            return Err(ControllerError::NoSource);
        };

        let token = self.next_token;
        self.next_token += 1;
        self.result = None;
        self.error = None;
        if matches!(self.zoom, Some((ZoomTarget::Result, _))) {
            self.zoom = None;
        }
        self.in_flight = Some(InFlight {
            token,
            label: label.to_string(),
        });
        self.record(
            "generation_started",
            json!({ "token": token, "label": label, "source": source.name }),
        );
        Ok(GenerationJob {
            token,
            label: label.to_string(),
            source,
            instruction: instruction.to_string(),
        })
    }

    /// Applies a generation outcome if `token` is still the current request,
    /// otherwise drops it.
    pub fn finish_generation(
        &mut self,
        token: u64,
        outcome: Result<EncodedImage, GenerationError>,
    ) -> Completion {
        let current = self.in_flight.as_ref().map(|job| job.token);
        if current != Some(token) {
            tracing::debug!(token, ?current, "discarding stale generation outcome");
            self.record("generation_discarded", json!({ "token": token }));
            return Completion::Discarded;
        }
        self.in_flight = None;

        match outcome {
            Ok(image) => {
                let preview = image
                    .bytes()
                    .ok()
                    .and_then(|bytes| acquire_preview(&bytes, &image.mime_type));
                self.record(
                    "generation_finished",
                    json!({ "token": token, "mime_type": image.mime_type }),
                );
                self.result = Some(Displayed { image, preview });
            }
            Err(err) => {
                tracing::warn!(token, kind = err.kind(), error = %err, "generation failed");
                self.record(
                    "generation_failed",
                    json!({ "token": token, "kind": err.kind(), "message": err.to_string() }),
                );
                self.error = Some(err.to_string());
            }
        }
        Completion::Applied
    }

    pub fn gallery_items(&self) -> &[StoredImage] {
        &self.gallery_items
    }

    pub fn is_gallery_open(&self) -> bool {
        self.gallery_open
    }

    /// Reloads the cached gallery. On failure the cache stays as it was.
    pub fn load_gallery(&mut self) -> Result<&[StoredImage], ControllerError> {
        match self.gallery.list() {
            Ok(items) => {
                self.gallery_items = items;
                Ok(&self.gallery_items)
            }
            Err(err) => Err(self.fail(ControllerError::GalleryLoad(err.to_string()))),
        }
    }

    /// Saves the current result. Returns `false` when there is nothing to
    /// save.
    pub fn save_result(&mut self) -> Result<bool, ControllerError> {
        let Some(payload) = self.result().map(EncodedImage::to_data_url) else {
            return Ok(false);
        };
        match self.gallery.save(&payload) {
            Ok(items) => {
                let id = items
                    .iter()
                    .find(|image| image.payload == payload)
                    .map(|image| image.id);
                self.gallery_items = items;
                self.record(
                    "gallery_saved",
                    json!({ "id": id, "count": self.gallery_items.len() }),
                );
                Ok(true)
            }
            Err(err) => {
                tracing::warn!(error = %err, "gallery save failed");
                Err(self.fail(ControllerError::GallerySave))
            }
        }
    }

    pub fn delete_from_gallery(&mut self, id: i64) -> Result<(), ControllerError> {
        match self.gallery.delete(id) {
            Ok(items) => {
                self.gallery_items = items;
                if matches!(self.zoom, Some((ZoomTarget::Gallery(zoomed), _)) if zoomed == id) {
                    self.zoom = None;
                }
                self.record(
                    "gallery_deleted",
                    json!({ "id": id, "count": self.gallery_items.len() }),
                );
                Ok(())
            }
            Err(err) => {
                tracing::warn!(id, error = %err, "gallery delete failed");
                Err(self.fail(ControllerError::GalleryDelete))
            }
        }
    }

    /// Whether the current result is in the cached gallery.
    pub fn is_result_saved(&self) -> bool {
        let Some(payload) = self.result().map(EncodedImage::to_data_url) else {
            return false;
        };
        self.gallery_items.iter().any(|image| image.payload == payload)
    }

    pub fn open_gallery(&mut self) -> Result<&[StoredImage], ControllerError> {
        self.gallery_open = true;
        self.load_gallery()
    }

    pub fn close_gallery(&mut self) {
        self.gallery_open = false;
    }

    pub fn zoomed(&self) -> Option<(ZoomTarget, &Path)> {
        self.zoom
            .as_ref()
            .map(|(target, handle)| (*target, handle.path()))
    }

    /// Opens `target` for full-size viewing and returns the file to show.
    pub fn zoom(&mut self, target: ZoomTarget) -> Result<PathBuf, ControllerError> {
        let (bytes, mime_type) = match target {
            ZoomTarget::Original => {
                let source = self.source().ok_or(ControllerError::NoSource)?;
                (source.bytes.clone(), source.mime_type.clone())
            }
            ZoomTarget::Result => {
                let result = self.result().ok_or(ControllerError::NoResult)?;
                let bytes = result
                    .bytes()
                    .map_err(|err| ControllerError::Preview(err.to_string()))?;
                (bytes, result.mime_type.clone())
            }
            ZoomTarget::Gallery(id) => {
                let stored = self
                    .gallery_items
                    .iter()
                    .find(|image| image.id == id)
                    .ok_or(ControllerError::NotInGallery(id))?;
                let image = stored
                    .decode()
                    .map_err(|err| ControllerError::Preview(err.to_string()))?;
                let bytes = image
                    .bytes()
                    .map_err(|err| ControllerError::Preview(err.to_string()))?;
                (bytes, image.mime_type)
            }
        };

        let handle = PreviewHandle::acquire(&bytes, &mime_type)
            .map_err(|err| ControllerError::Preview(format!("{err:#}")))?;
        let path = handle.path().to_path_buf();
        self.zoom = Some((target, handle));
        Ok(path)
    }

    pub fn close_zoom(&mut self) {
        self.zoom = None;
    }

    /// Writes the current result into `dir` as a timestamped PNG.
    pub fn download(&self, dir: &Path) -> Result<PathBuf, ControllerError> {
        self.download_at(dir, chrono::Utc::now().timestamp_millis())
    }

    pub fn download_at(&self, dir: &Path, stamp_millis: i64) -> Result<PathBuf, ControllerError> {
        let result = self.result().ok_or(ControllerError::NoResult)?;
        let path = export::write_png(result, dir, stamp_millis)
            .map_err(|err| ControllerError::Export(format!("{err:#}")))?;
        self.record(
            "result_exported",
            json!({ "path": path.to_string_lossy() }),
        );
        Ok(path)
    }

    fn fail(&mut self, err: ControllerError) -> ControllerError {
        self.error = Some(err.to_string());
        err
    }

    fn record(&self, event_type: &str, payload: Value) {
        let Some(journal) = self.journal.as_ref() else {
            return;
        };
        if let Err(err) = journal.emit(event_type, payload) {
            tracing::warn!(event_type, error = %err, "failed to write journal event");
        }
    }
}

fn acquire_preview(bytes: &[u8], mime_type: &str) -> Option<PreviewHandle> {
    match PreviewHandle::acquire(bytes, mime_type) {
        Ok(handle) => Some(handle),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "could not create preview file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use image::{ImageFormat, Rgb, RgbImage};
    use restyle_contracts::catalog::{QuickTransform, StyleCatalog};
    use restyle_contracts::events::EventWriter;
    use restyle_contracts::gallery::{
        FileImageStore, GalleryManager, ImageStore, MemoryImageStore,
    };
    use restyle_contracts::images::EncodedImage;
    use serde_json::Value;

    use super::{Completion, Controller, ControllerError, Phase, ZoomTarget, NO_SOURCE_MESSAGE};
    use crate::error::GenerationError;
    use crate::normalize::SourceImage;
    use crate::providers::{GenerateRequest, ImageProvider};

    struct ScriptedProvider {
        outcome: Result<EncodedImage, GenerationError>,
        seen: Mutex<Vec<GenerateRequest>>,
    }

    impl ScriptedProvider {
        fn returning(outcome: Result<EncodedImage, GenerationError>) -> Self {
            Self {
                outcome,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ImageProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn generate(&self, request: &GenerateRequest) -> Result<EncodedImage, GenerationError> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(request.clone());
            }
            self.outcome.clone()
        }
    }

    fn png(color: [u8; 3]) -> anyhow::Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        RgbImage::from_pixel(4, 4, Rgb(color)).write_to(&mut cursor, ImageFormat::Png)?;
        Ok(cursor.into_inner())
    }

    fn photo() -> anyhow::Result<SourceImage> {
        Ok(SourceImage::from_bytes("photo.png", png([200, 10, 10])?, None))
    }

    fn controller_with(store: Arc<dyn ImageStore>) -> Controller {
        let clock = Arc::new(Mutex::new(1_000_i64));
        let gallery = GalleryManager::new(store).with_clock(move || {
            clock
                .lock()
                .map(|mut now| {
                    *now += 1;
                    *now
                })
                .unwrap_or_default()
        });
        Controller::new(gallery, StyleCatalog::default())
    }

    fn controller() -> Controller {
        controller_with(Arc::new(MemoryImageStore::new()))
    }

    #[test]
    fn starts_idle() {
        let controller = controller();
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(!controller.is_loading());
        assert!(controller.error().is_none());
    }

    #[test]
    fn styled_result_can_be_saved_once() -> anyhow::Result<()> {
        let result_bytes = png([1, 2, 3])?;
        let provider =
            ScriptedProvider::returning(Ok(EncodedImage::from_bytes("image/png", &result_bytes)));
        let mut controller = controller();

        controller.upload(photo()?);
        assert_eq!(controller.phase(), Phase::Ready);

        let job = controller.select_style("Naruto")?;
        assert_eq!(job.label(), "Naruto");
        assert_eq!(controller.phase(), Phase::Generating);
        assert!(controller.is_loading());

        let outcome = job.run(&provider);
        assert_eq!(controller.finish_generation(job.token(), outcome), Completion::Applied);
        assert_eq!(controller.phase(), Phase::Ready);
        assert!(controller.result_preview().is_some_and(|path| path.exists()));

        let seen = provider.seen.lock().map(|seen| seen.clone()).unwrap_or_default();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].image.format, "image/png");
        assert!(seen[0].instruction.contains("Naruto"));

        assert!(!controller.is_result_saved());
        assert!(controller.save_result()?);
        assert!(controller.save_result()?);
        assert!(controller.is_result_saved());

        let items = controller.load_gallery()?.to_vec();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].decode()?.bytes()?, result_bytes);
        Ok(())
    }

    #[test]
    fn rate_limit_surfaces_message_without_result() -> anyhow::Result<()> {
        let provider = ScriptedProvider::returning(Err(GenerationError::RateLimited));
        let mut controller = controller();
        controller.upload(photo()?);

        let job = controller.quick_transform(QuickTransform::Female)?;
        controller.finish_generation(job.token(), job.run(&provider));

        assert_eq!(controller.phase(), Phase::Ready);
        assert!(!controller.is_loading());
        assert!(controller.result().is_none());
        assert!(controller
            .error()
            .is_some_and(|message| message.starts_with("Rate limit exceeded")));
        Ok(())
    }

    #[test]
    fn missing_image_part_is_ready_with_error() -> anyhow::Result<()> {
        let provider = ScriptedProvider::returning(Err(GenerationError::NoImageReturned));
        let mut controller = controller();
        controller.upload(photo()?);

        let job = controller.manual_prompt("add a hat")?;
        controller.finish_generation(job.token(), job.run(&provider));

        assert_eq!(controller.phase(), Phase::Ready);
        assert_eq!(
            controller.error(),
            Some("No image data found in the API response.")
        );
        Ok(())
    }

    #[test]
    fn transform_without_upload_sets_error() {
        let mut controller = controller();
        assert_eq!(
            controller.select_style("naruto").err(),
            Some(ControllerError::NoSource)
        );
        assert_eq!(controller.error(), Some(NO_SOURCE_MESSAGE));
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[test]
    fn second_trigger_while_generating_is_busy() -> anyhow::Result<()> {
        let mut controller = controller();
        controller.upload(photo()?);
        let job = controller.select_style("persona")?;

        assert_eq!(
            controller.quick_transform(QuickTransform::Male).err(),
            Some(ControllerError::Busy)
        );
        assert_eq!(controller.in_flight_label(), Some("Persona"));
        assert_eq!(controller.phase(), Phase::Generating);
        assert_eq!(
            controller.finish_generation(job.token(), Ok(EncodedImage::from_bytes("image/png", &png([9, 9, 9])?))),
            Completion::Applied
        );
        Ok(())
    }

    #[test]
    fn entering_generation_clears_result_and_error() -> anyhow::Result<()> {
        let mut controller = controller();
        controller.upload(photo()?);
        let first = controller.select_style("rezero")?;
        controller.finish_generation(
            first.token(),
            Ok(EncodedImage::from_bytes("image/png", &png([5, 5, 5])?)),
        );
        assert!(controller.result().is_some());

        let second = controller.select_style("dragonball")?;
        assert!(controller.result().is_none());
        controller.finish_generation(second.token(), Err(GenerationError::NoImageReturned));
        assert!(controller.error().is_some());

        controller.manual_prompt("try again")?;
        assert!(controller.error().is_none());
        Ok(())
    }

    #[test]
    fn upload_while_generating_discards_the_old_completion() -> anyhow::Result<()> {
        let mut controller = controller();
        controller.upload(photo()?);
        let stale = controller.select_style("naruto")?;

        controller.upload(SourceImage::from_bytes("other.png", png([0, 0, 255])?, None));
        assert_eq!(controller.phase(), Phase::Ready);
        assert!(controller.result().is_none());
        assert!(controller.error().is_none());

        let outcome = controller.finish_generation(
            stale.token(),
            Ok(EncodedImage::from_bytes("image/png", &png([7, 7, 7])?)),
        );
        assert_eq!(outcome, Completion::Discarded);
        assert!(controller.result().is_none());
        Ok(())
    }

    #[test]
    fn stale_completion_leaves_newer_generation_in_flight() -> anyhow::Result<()> {
        let mut controller = controller();
        controller.upload(photo()?);
        let stale = controller.select_style("naruto")?;
        controller.upload(SourceImage::from_bytes("second.png", png([0, 255, 0])?, None));
        let live = controller.select_style("persona")?;

        let outcome = controller.finish_generation(
            stale.token(),
            Ok(EncodedImage::from_bytes("image/png", &png([1, 1, 1])?)),
        );
        assert_eq!(outcome, Completion::Discarded);
        assert_eq!(controller.phase(), Phase::Generating);
        assert_eq!(controller.in_flight_label(), Some("Persona"));
        assert!(controller.result().is_none());

        let fresh = EncodedImage::from_bytes("image/png", &png([2, 2, 2])?);
        assert_eq!(
            controller.finish_generation(live.token(), Ok(fresh.clone())),
            Completion::Applied
        );
        assert_eq!(controller.phase(), Phase::Ready);
        assert_eq!(controller.result(), Some(&fresh));
        Ok(())
    }

    #[test]
    fn unknown_style_is_rejected() -> anyhow::Result<()> {
        let mut controller = controller();
        controller.upload(photo()?);
        assert_eq!(
            controller.select_style("cubism").err(),
            Some(ControllerError::UnknownStyle("cubism".to_string()))
        );
        assert_eq!(controller.phase(), Phase::Ready);
        Ok(())
    }

    #[test]
    fn unavailable_storage_keeps_gallery_unchanged() -> anyhow::Result<()> {
        let mut controller = controller_with(Arc::new(FileImageStore::unavailable()));
        assert!(matches!(
            controller.load_gallery(),
            Err(ControllerError::GalleryLoad(_))
        ));
        assert!(controller
            .error()
            .is_some_and(|message| message.starts_with("Could not load gallery. ")));

        controller.upload(photo()?);
        let job = controller.select_style("naruto")?;
        controller.finish_generation(
            job.token(),
            Ok(EncodedImage::from_bytes("image/png", &png([3, 3, 3])?)),
        );
        assert_eq!(controller.save_result(), Err(ControllerError::GallerySave));
        assert_eq!(controller.error(), Some("Could not save image to the gallery."));
        assert_eq!(
            controller.delete_from_gallery(1),
            Err(ControllerError::GalleryDelete)
        );
        assert!(controller.gallery_items().is_empty());
        Ok(())
    }

    #[test]
    fn save_without_result_is_a_no_op() -> anyhow::Result<()> {
        let mut controller = controller();
        assert!(!controller.save_result()?);
        assert!(controller.open_gallery()?.is_empty());
        assert!(controller.is_gallery_open());
        controller.close_gallery();
        assert!(!controller.is_gallery_open());
        Ok(())
    }

    #[test]
    fn zoom_holds_one_preview_at_a_time() -> anyhow::Result<()> {
        let mut controller = controller();
        assert_eq!(
            controller.zoom(ZoomTarget::Original).err(),
            Some(ControllerError::NoSource)
        );

        controller.upload(photo()?);
        let original = controller.zoom(ZoomTarget::Original)?;
        assert!(original.exists());
        assert_eq!(std::fs::read(&original)?, png([200, 10, 10])?);

        let job = controller.select_style("naruto")?;
        controller.finish_generation(
            job.token(),
            Ok(EncodedImage::from_bytes("image/png", &png([4, 4, 4])?)),
        );
        controller.save_result()?;
        let id = controller.gallery_items()[0].id;

        let zoomed = controller.zoom(ZoomTarget::Gallery(id))?;
        assert!(!original.exists());
        assert!(zoomed.exists());

        controller.delete_from_gallery(id)?;
        assert!(!zoomed.exists());
        assert!(controller.zoomed().is_none());
        assert_eq!(
            controller.zoom(ZoomTarget::Gallery(id)).err(),
            Some(ControllerError::NotInGallery(id))
        );
        Ok(())
    }

    #[test]
    fn zoom_targets_parse() {
        assert_eq!(ZoomTarget::parse("Original"), Some(ZoomTarget::Original));
        assert_eq!(ZoomTarget::parse(" result "), Some(ZoomTarget::Result));
        assert_eq!(ZoomTarget::parse("1700"), Some(ZoomTarget::Gallery(1700)));
        assert_eq!(ZoomTarget::parse("latest"), None);
    }

    #[test]
    fn download_writes_png() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut controller = controller();
        assert_eq!(
            controller.download_at(temp.path(), 5).err(),
            Some(ControllerError::NoResult)
        );

        controller.upload(photo()?);
        let job = controller.select_style("naruto")?;
        controller.finish_generation(
            job.token(),
            Ok(EncodedImage::from_bytes("image/png", &png([8, 8, 8])?)),
        );
        let path = controller.download_at(temp.path(), 1_700_000_000_000)?;
        assert_eq!(path, temp.path().join("generated-image-1700000000000.png"));
        assert_eq!(std::fs::read(path)?, png([8, 8, 8])?);
        Ok(())
    }

    #[test]
    fn journal_records_the_session() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let mut controller =
            controller().with_journal(EventWriter::new(&events_path, "session-test"));

        controller.upload(photo()?);
        let stale = controller.select_style("naruto")?;
        controller.upload(photo()?);
        controller.finish_generation(stale.token(), Err(GenerationError::RateLimited));
        let job = controller.manual_prompt("sketch")?;
        controller.finish_generation(job.token(), Err(GenerationError::RateLimited));

        let types = std::fs::read_to_string(&events_path)?
            .lines()
            .map(serde_json::from_str::<Value>)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|event| event["type"].as_str().unwrap_or_default().to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            types,
            vec![
                "image_uploaded",
                "generation_started",
                "image_uploaded",
                "generation_discarded",
                "generation_started",
                "generation_failed",
            ]
        );
        Ok(())
    }
}
