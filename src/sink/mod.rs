//! Cloud sinks for classified incidents.
//!
//! Every processed incident produces one image upload attempt and one event
//! document. A failed upload degrades to `NO_IMAGE`; a failed document write
//! is logged. Neither stops ingestion.

mod document;
mod http;
mod log_sink;
mod memory;

use anyhow::Result;

pub use document::{EventDocument, EventKind, NO_IMAGE_URL};
pub use http::{HttpCloudSink, HttpSinkConfig};
pub use log_sink::LogSink;
pub use memory::RecordingSink;

/// Storage/UI backend for processed incidents.
pub trait CloudSink: Send {
    /// Upload an encoded image and return its public URL.
    fn upload_image(&self, bytes: &[u8], name_hint: &str) -> Result<String>;

    /// Persist one event document.
    fn record_event(&self, document: &EventDocument) -> Result<()>;
}
