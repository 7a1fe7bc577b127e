use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::{ClassificationResult, Verdict};

/// Image URL recorded when no upload succeeded.
pub const NO_IMAGE_URL: &str = "NO_IMAGE";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// New baseline image.
    Reference,
    /// Classified detection.
    Event,
}

/// Document written to the event store for every processed incident.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventDocument {
    pub id: String,
    pub edge_id: String,
    pub device_id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub verdict: Verdict,
    pub reasons: Vec<String>,
    pub image_url: String,
    pub telemetry_snapshot: String,
}

impl EventDocument {
    pub fn new(
        edge_id: &str,
        device_id: &str,
        kind: EventKind,
        result: &ClassificationResult,
        image_url: String,
        telemetry_snapshot: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            edge_id: edge_id.to_string(),
            device_id: device_id.to_string(),
            kind,
            timestamp: Utc::now(),
            verdict: result.verdict,
            reasons: result.reasons.clone(),
            image_url,
            telemetry_snapshot,
        }
    }
}
