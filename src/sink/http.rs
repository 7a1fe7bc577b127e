use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use super::{CloudSink, EventDocument};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_FOLDER: &str = "security_events";

#[derive(Clone, Debug, Default)]
pub struct HttpSinkConfig {
    /// Endpoint accepting a raw JPEG body; replies with the stored URL.
    pub upload_url: Option<String>,
    /// Endpoint accepting an event document as JSON.
    pub events_url: Option<String>,
    /// Sent as a bearer token when present.
    pub api_key: Option<String>,
    /// Uploads are stored under `<folder>/<edge_id>/<name_hint>`.
    pub edge_id: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
}

/// HTTP sink for an image store plus a document store.
pub struct HttpCloudSink {
    agent: ureq::Agent,
    config: HttpSinkConfig,
}

impl HttpCloudSink {
    pub fn new(config: HttpSinkConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(DEFAULT_TIMEOUT).build();
        Self { agent, config }
    }

    fn authorize(&self, request: ureq::Request) -> ureq::Request {
        match &self.config.api_key {
            Some(key) => request.set("Authorization", &format!("Bearer {}", key)),
            None => request,
        }
    }
}

impl CloudSink for HttpCloudSink {
    fn upload_image(&self, bytes: &[u8], name_hint: &str) -> Result<String> {
        let url = self
            .config
            .upload_url
            .as_deref()
            .ok_or_else(|| anyhow!("no image upload endpoint configured"))?;
        let public_id = format!("{}/{}", self.config.edge_id, name_hint);
        let request = self
            .agent
            .post(url)
            .query("public_id", &public_id)
            .query("folder", DEFAULT_FOLDER)
            .set("Content-Type", "image/jpeg");
        let response = self
            .authorize(request)
            .send_bytes(bytes)
            .with_context(|| format!("upload image {}", public_id))?;
        let body: UploadResponse = response
            .into_json()
            .context("parse image upload response")?;
        body.secure_url
            .or(body.url)
            .ok_or_else(|| anyhow!("image upload response has no url"))
    }

    fn record_event(&self, document: &EventDocument) -> Result<()> {
        let url = self
            .config
            .events_url
            .as_deref()
            .ok_or_else(|| anyhow!("no event endpoint configured"))?;
        let request = self.agent.post(url);
        self.authorize(request)
            .send_json(document)
            .with_context(|| format!("write event document {}", document.id))?;
        Ok(())
    }
}
