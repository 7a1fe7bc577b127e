use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::{CloudSink, EventDocument};

#[derive(Debug, Default)]
struct Recorded {
    uploads: Vec<(String, Vec<u8>)>,
    documents: Vec<EventDocument>,
}

/// In-memory sink for replay runs and tests. Clones share the same record.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<Recorded>>,
    fail_uploads: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose uploads always fail.
    pub fn failing_uploads() -> Self {
        Self {
            fail_uploads: true,
            ..Self::default()
        }
    }

    pub fn documents(&self) -> Vec<EventDocument> {
        self.inner
            .lock()
            .map(|r| r.documents.clone())
            .unwrap_or_default()
    }

    /// Name hints of uploaded images, in upload order.
    pub fn uploads(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|r| r.uploads.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }
}

impl CloudSink for RecordingSink {
    fn upload_image(&self, bytes: &[u8], name_hint: &str) -> Result<String> {
        if self.fail_uploads {
            return Err(anyhow!("image store unavailable"));
        }
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| anyhow!("recording sink lock poisoned"))?;
        inner.uploads.push((name_hint.to_string(), bytes.to_vec()));
        Ok(format!("memory://{}", name_hint))
    }

    fn record_event(&self, document: &EventDocument) -> Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| anyhow!("recording sink lock poisoned"))?;
        inner.documents.push(document.clone());
        Ok(())
    }
}
