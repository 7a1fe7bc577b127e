use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;

use super::source::{IncidentSource, SourceRead};
use crate::capability::{DiffCapability, FaceCapability};
use crate::classify::{
    AudioWindow, Capabilities, ClassificationResult, Classifier, Evidence, KnownFaceGallery,
};
use crate::protocol::{FrameDecoder, IncidentKind, IncidentRecord};
use crate::reference::ReferenceStore;
use crate::runtime::Shutdown;
use crate::sink::{CloudSink, EventDocument, EventKind, NO_IMAGE_URL};
use crate::telemetry::TelemetrySnapshot;

pub const NEW_REFERENCE_REASON: &str = "new reference";

/// Timestamp used in uploaded image names.
fn name_stamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

#[derive(Clone, Debug)]
pub struct EdgeIdentity {
    pub edge_id: String,
    pub device_id: String,
}

/// Everything the ingestion unit owns.
pub struct PipelineParts {
    pub identity: EdgeIdentity,
    pub classifier: Classifier,
    pub gallery: Arc<KnownFaceGallery>,
    pub reference: ReferenceStore,
    pub faces: Arc<dyn FaceCapability>,
    pub diff: Arc<dyn DiffCapability>,
    pub sink: Box<dyn CloudSink>,
    pub telemetry: TelemetrySnapshot,
}

/// Decodes, classifies and reports incidents from the Reporter.
///
/// The decoder state, the audio window and the reference store are only
/// touched from the ingestion unit, so none of them is shared.
pub struct IncidentPipeline {
    identity: EdgeIdentity,
    decoder: FrameDecoder,
    classifier: Classifier,
    audio: AudioWindow,
    gallery: Arc<KnownFaceGallery>,
    reference: ReferenceStore,
    faces: Arc<dyn FaceCapability>,
    diff: Arc<dyn DiffCapability>,
    sink: Box<dyn CloudSink>,
    telemetry: TelemetrySnapshot,
    processed: u64,
}

impl IncidentPipeline {
    pub fn new(parts: PipelineParts) -> Self {
        let audio = parts.classifier.audio_window();
        Self {
            identity: parts.identity,
            decoder: FrameDecoder::new(),
            classifier: parts.classifier,
            audio,
            gallery: parts.gallery,
            reference: parts.reference,
            faces: parts.faces,
            diff: parts.diff,
            sink: parts.sink,
            telemetry: parts.telemetry,
            processed: 0,
        }
    }

    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    pub fn reference(&self) -> &ReferenceStore {
        &self.reference
    }

    pub fn audio_count(&self) -> usize {
        self.audio.count()
    }

    /// Incidents fully processed so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Drop any partial incident.
    pub fn abandon(&mut self) {
        if self.decoder.buffered_bytes() > 0 {
            log::debug!(
                "discarding {} bytes of partial incident",
                self.decoder.buffered_bytes()
            );
        }
        self.decoder.reset();
    }

    /// Feed one line. Returns the verdict when the line completed an
    /// incident and it was processed.
    pub fn push_line(&mut self, line: &[u8]) -> Option<ClassificationResult> {
        let record = self.decoder.push_line(line)?;
        match self.process_at(record, Instant::now()) {
            Ok(result) => Some(result),
            Err(e) => {
                log::error!("incident processing failed: {:#}", e);
                self.decoder.reset();
                None
            }
        }
    }

    /// Process one completed incident as if it arrived at `now`.
    pub fn process_at(&mut self, record: IncidentRecord, now: Instant) -> Result<ClassificationResult> {
        let IncidentRecord { kind, image } = record;
        let result = match kind {
            IncidentKind::InitialReference => {
                log::info!("new reference image ({} bytes)", image.len());
                if let Err(e) = self.reference.replace(&image) {
                    log::error!("failed to store reference image: {:#}; keeping it in memory", e);
                    self.reference.hold_in_memory(image.clone());
                }
                let result = ClassificationResult::info(NEW_REFERENCE_REASON);
                let hint = format!("ref_{}", name_stamp());
                self.report(EventKind::Reference, &result, &image, &hint);
                result
            }
            IncidentKind::Detection(detection) => {
                log::info!(
                    "incident {}:{} (telemetry: {})",
                    detection.category,
                    detection.value,
                    self.telemetry.get()
                );
                let result = self.classifier.classify(
                    Evidence {
                        detection: &detection,
                        image: &image,
                    },
                    &mut self.audio,
                    &self.gallery,
                    self.reference.current(),
                    Capabilities {
                        faces: self.faces.as_ref(),
                        diff: self.diff.as_ref(),
                    },
                    now,
                );
                log::info!(
                    "verdict {} reasons {:?}",
                    result.verdict,
                    result.reasons
                );
                let hint = format!("evidence_{}", name_stamp());
                self.report(EventKind::Event, &result, &image, &hint);
                result
            }
        };
        self.processed += 1;
        Ok(result)
    }

    fn report(&self, kind: EventKind, result: &ClassificationResult, image: &[u8], hint: &str) {
        let image_url = match self.sink.upload_image(image, hint) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("image upload failed, recording without image: {:#}", e);
                NO_IMAGE_URL.to_string()
            }
        };
        let document = EventDocument::new(
            &self.identity.edge_id,
            &self.identity.device_id,
            kind,
            result,
            image_url,
            self.telemetry.get(),
        );
        match self.sink.record_event(&document) {
            Ok(()) => log::info!("event {} recorded", document.id),
            Err(e) => log::error!("event {} not recorded: {:#}", document.id, e),
        }
    }

    /// Read from `source` until it closes, fails or shutdown is requested.
    /// A transport error is returned; a partial incident is discarded on
    /// every exit.
    pub fn run(&mut self, source: &mut dyn IncidentSource, shutdown: &Shutdown) -> Result<()> {
        let outcome = loop {
            if shutdown.is_triggered() {
                break Ok(());
            }
            match source.read_line() {
                Ok(SourceRead::Line(line)) => {
                    self.push_line(&line);
                }
                Ok(SourceRead::Idle) => {}
                Ok(SourceRead::Closed) => {
                    log::info!("{} closed", source.describe());
                    break Ok(());
                }
                Err(e) => break Err(e),
            }
        };
        self.abandon();
        outcome
    }
}
