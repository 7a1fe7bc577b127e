//! Incident ingestion.
//!
//! Sources deliver Reporter lines; the pipeline decodes them into incidents,
//! classifies detections, maintains the reference image and reports every
//! outcome to the cloud sink.

mod pipeline;
mod source;

pub use pipeline::{EdgeIdentity, IncidentPipeline, PipelineParts, NEW_REFERENCE_REASON};
pub use source::{
    IncidentSource, ReaderSource, SerialIncidentSource, SerialSourceConfig, SourceRead,
};
