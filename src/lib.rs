//! Watchdog edge gateway.
//!
//! Bridges two embedded devices to a cloud backend and a local UI:
//!
//! - the **Reporter** streams incident reports (header, type line, raw JPEG)
//!   over a serial link;
//! - the **Watchdog** publishes short telemetry strings over a wireless link.
//!
//! Each incident is decoded, classified against the audio burst window, the
//! known-face gallery and the current reference image, and reported as one
//! event document plus one image upload. Telemetry is mirrored into a shared
//! snapshot and forwarded live to the UI channel.
//!
//! # Module Structure
//!
//! - `protocol`: line splitting and the incident frame decoder
//! - `classify`: audio window, face gallery and the classifier
//! - `capability`: face embedding and visual diff contracts plus backends
//! - `reference`: the reference image store
//! - `sink`: cloud sinks and the event document
//! - `telemetry`: telemetry snapshot, wireless link and relay
//! - `transport`: UI channel and its connection supervisor
//! - `ingest`: incident sources and the ingestion pipeline
//! - `runtime`: shutdown token and unit orchestration
//! - `config`: daemon configuration

pub mod capability;
pub mod classify;
pub mod config;
pub mod ingest;
pub mod protocol;
pub mod reference;
pub mod runtime;
pub mod sink;
pub mod telemetry;
pub mod transport;

pub use capability::{DiffCapability, FaceCapability, PixelDiffBackend, StubFaceBackend};
pub use classify::{ClassificationResult, Classifier, KnownFaceGallery, Thresholds, Verdict};
pub use config::GatewayConfig;
pub use ingest::{EdgeIdentity, IncidentPipeline, IncidentSource, PipelineParts};
pub use protocol::{FrameDecoder, IncidentKind, IncidentRecord};
pub use reference::{ReferenceImage, ReferenceStore};
pub use runtime::{Gateway, Shutdown};
pub use sink::{CloudSink, EventDocument, EventKind};
pub use telemetry::{TelemetryRelay, TelemetrySnapshot};
pub use transport::{ConnectionSupervisor, UiTransport};
