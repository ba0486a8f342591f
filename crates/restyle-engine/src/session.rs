use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use restyle_contracts::images::EncodedImage;

use crate::controller::{Completion, Controller, GenerationJob};
use crate::error::GenerationError;
use crate::providers::ImageProvider;

#[derive(Debug)]
pub enum SessionEvent {
    Input(String),
    InputClosed,
    GenerationFinished {
        token: u64,
        outcome: Result<EncodedImage, GenerationError>,
    },
}

/// Event loop state: the controller lives on the loop thread, generations
/// run on worker threads and report back through the session channel.
pub struct Session {
    controller: Controller,
    provider: Arc<dyn ImageProvider>,
    tx: Sender<SessionEvent>,
    rx: Receiver<SessionEvent>,
}

impl Session {
    pub fn new(controller: Controller, provider: Arc<dyn ImageProvider>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            controller,
            provider,
            tx,
            rx,
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Runs `job` on a worker thread. Its outcome arrives later as
    /// [`SessionEvent::GenerationFinished`].
    pub fn dispatch(&self, job: GenerationJob) -> Result<()> {
        let provider = Arc::clone(&self.provider);
        let tx = self.tx.clone();
        thread::Builder::new()
            .name(format!("restyle-generation-{}", job.token()))
            .spawn(move || {
                let outcome = job.run(provider.as_ref());
                let token = job.token();
                if tx
                    .send(SessionEvent::GenerationFinished { token, outcome })
                    .is_err()
                {
                    tracing::debug!(token, "session closed before generation finished");
                }
            })
            .context("failed to spawn generation worker")?;
        Ok(())
    }

    /// Blocks until the next event. The session holds a sender of its own,
    /// so this only returns `None` if every sender is gone.
    pub fn next_event(&self) -> Option<SessionEvent> {
        self.rx.recv().ok()
    }

    pub fn handle_completion(
        &mut self,
        token: u64,
        outcome: Result<EncodedImage, GenerationError>,
    ) -> Completion {
        self.controller.finish_generation(token, outcome)
    }

    /// Runs `job` on the calling thread and applies its outcome.
    pub fn run_blocking(&mut self, job: GenerationJob) -> Completion {
        let outcome = job.run(self.provider.as_ref());
        self.controller.finish_generation(job.token(), outcome)
    }

    /// Forwards lines from `reader` as [`SessionEvent::Input`], then sends
    /// [`SessionEvent::InputClosed`] at end of input.
    pub fn spawn_line_reader<R>(&self, reader: R) -> Result<JoinHandle<()>>
    where
        R: BufRead + Send + 'static,
    {
        let tx = self.tx.clone();
        thread::Builder::new()
            .name("restyle-input".to_string())
            .spawn(move || {
                for line in reader.lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(SessionEvent::Input(line)).is_err() {
                                return;
                            }
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to read input line");
                            break;
                        }
                    }
                }
                let _ = tx.send(SessionEvent::InputClosed);
            })
            .context("failed to spawn input reader")
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Condvar, Mutex};

    use image::{ImageFormat, Rgb, RgbImage};
    use restyle_contracts::catalog::StyleCatalog;
    use restyle_contracts::gallery::{GalleryManager, MemoryImageStore};
    use restyle_contracts::images::EncodedImage;

    use super::{Session, SessionEvent};
    use crate::controller::{Completion, Controller, Phase};
    use crate::error::GenerationError;
    use crate::normalize::SourceImage;
    use crate::providers::{DryrunProvider, GenerateRequest, ImageProvider};

    fn png() -> anyhow::Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        RgbImage::from_pixel(3, 2, Rgb([40, 80, 120])).write_to(&mut cursor, ImageFormat::Png)?;
        Ok(cursor.into_inner())
    }

    fn session(provider: Arc<dyn ImageProvider>) -> anyhow::Result<Session> {
        let gallery = GalleryManager::new(Arc::new(MemoryImageStore::new()));
        let mut controller = Controller::new(gallery, StyleCatalog::default());
        controller.upload(SourceImage::from_bytes("photo.png", png()?, None));
        Ok(Session::new(controller, provider))
    }

    /// Holds every generation until the test opens the gate.
    struct GatedProvider {
        open: Mutex<bool>,
        signal: Condvar,
    }

    impl GatedProvider {
        fn new() -> Self {
            Self {
                open: Mutex::new(false),
                signal: Condvar::new(),
            }
        }

        fn release(&self) {
            if let Ok(mut open) = self.open.lock() {
                *open = true;
                self.signal.notify_all();
            }
        }
    }

    impl ImageProvider for GatedProvider {
        fn name(&self) -> &str {
            "gated"
        }

        fn generate(&self, request: &GenerateRequest) -> Result<EncodedImage, GenerationError> {
            let mut open = self
                .open
                .lock()
                .map_err(|_| GenerationError::unknown("gate poisoned"))?;
            while !*open {
                open = self
                    .signal
                    .wait(open)
                    .map_err(|_| GenerationError::unknown("gate poisoned"))?;
            }
            Ok(EncodedImage::from_bytes(
                "image/png",
                request.instruction.as_bytes(),
            ))
        }
    }

    #[test]
    fn run_blocking_applies_the_result() -> anyhow::Result<()> {
        let mut session = session(Arc::new(DryrunProvider))?;
        let job = session.controller_mut().select_style("naruto")?;
        assert_eq!(session.run_blocking(job), Completion::Applied);
        assert_eq!(session.controller().phase(), Phase::Ready);
        assert!(session.controller().result().is_some());
        Ok(())
    }

    #[test]
    fn dispatched_generation_reports_back() -> anyhow::Result<()> {
        let mut session = session(Arc::new(DryrunProvider))?;
        let job = session.controller_mut().manual_prompt("make it blue")?;
        let token = job.token();
        session.dispatch(job)?;

        match session.next_event() {
            Some(SessionEvent::GenerationFinished { token: done, outcome }) => {
                assert_eq!(done, token);
                assert_eq!(session.handle_completion(done, outcome), Completion::Applied);
            }
            other => anyhow::bail!("unexpected event: {other:?}"),
        }
        assert!(session.controller().result().is_some());
        Ok(())
    }

    #[test]
    fn gallery_works_while_generating() -> anyhow::Result<()> {
        let gate = Arc::new(GatedProvider::new());
        let mut session = session(gate.clone())?;
        let job = session.controller_mut().select_style("persona")?;
        session.dispatch(job)?;

        assert_eq!(session.controller().phase(), Phase::Generating);
        assert!(session.controller_mut().load_gallery()?.is_empty());
        assert!(!session.controller_mut().save_result()?);

        gate.release();
        let Some(SessionEvent::GenerationFinished { token, outcome }) = session.next_event() else {
            anyhow::bail!("expected a generation outcome");
        };
        session.handle_completion(token, outcome);
        assert!(session.controller_mut().save_result()?);
        assert_eq!(session.controller().gallery_items().len(), 1);
        Ok(())
    }

    #[test]
    fn line_reader_forwards_input_then_closes() -> anyhow::Result<()> {
        let session = session(Arc::new(DryrunProvider))?;
        let reader = session.spawn_line_reader(Cursor::new("/styles\n/male\n"))?;
        reader
            .join()
            .map_err(|_| anyhow::anyhow!("input reader panicked"))?;

        let mut seen = Vec::new();
        loop {
            match session.next_event() {
                Some(SessionEvent::Input(line)) => seen.push(line),
                Some(SessionEvent::InputClosed) => break,
                other => anyhow::bail!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(seen, vec!["/styles", "/male"]);
        Ok(())
    }
}
