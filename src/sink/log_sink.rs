use anyhow::Result;

use super::{CloudSink, EventDocument, NO_IMAGE_URL};

/// Sink used when no cloud endpoint is configured: documents go to the log.
#[derive(Clone, Debug, Default)]
pub struct LogSink;

impl CloudSink for LogSink {
    fn upload_image(&self, bytes: &[u8], name_hint: &str) -> Result<String> {
        log::debug!(
            "no image store configured; dropping {} ({} bytes)",
            name_hint,
            bytes.len()
        );
        Ok(NO_IMAGE_URL.to_string())
    }

    fn record_event(&self, document: &EventDocument) -> Result<()> {
        log::info!("event document: {}", serde_json::to_string(document)?);
        Ok(())
    }
}
