use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::audio_window::AudioWindow;
use super::gallery::KnownFaceGallery;
use super::verdict::{ClassificationResult, Verdict};
use crate::capability::{DiffCapability, FaceCapability};
use crate::protocol::Detection;
use crate::reference::ReferenceImage;

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.5;
pub const DEFAULT_VISUAL_DIFF_PERCENTAGE: f64 = 20.0;
pub const DEFAULT_AUDIO_LOUD_THRESHOLD: i64 = 2000;
pub const DEFAULT_AUDIO_WINDOW_SECS: u64 = 30;
pub const DEFAULT_AUDIO_MAX_COUNT: usize = 2;

/// Decision thresholds. Supplied by configuration, never hard-coded in rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Cosine similarity a gallery face must exceed to count as a match.
    pub similarity: f32,
    /// Visual change, in percent, above which a faceless image is an alarm.
    pub visual_diff_percentage: f64,
    /// Audio sensor reading above which a single event is an alarm.
    pub audio_loud: i64,
    pub audio_window_secs: u64,
    /// Audio events inside the window that make a burst.
    pub audio_max_count: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            similarity: DEFAULT_SIMILARITY_THRESHOLD,
            visual_diff_percentage: DEFAULT_VISUAL_DIFF_PERCENTAGE,
            audio_loud: DEFAULT_AUDIO_LOUD_THRESHOLD,
            audio_window_secs: DEFAULT_AUDIO_WINDOW_SECS,
            audio_max_count: DEFAULT_AUDIO_MAX_COUNT,
        }
    }
}

impl Thresholds {
    pub fn audio_window(&self) -> Duration {
        Duration::from_secs(self.audio_window_secs)
    }
}

/// What the Reporter sent for one detection.
#[derive(Clone, Copy, Debug)]
pub struct Evidence<'a> {
    pub detection: &'a Detection,
    pub image: &'a [u8],
}

/// External capabilities consulted by the visual rules.
#[derive(Clone, Copy)]
pub struct Capabilities<'a> {
    pub faces: &'a dyn FaceCapability,
    pub diff: &'a dyn DiffCapability,
}

/// Turns a detection into a verdict.
///
/// Every rule is evaluated; the verdict is positive when any rule fires and
/// the reasons of all fired rules are kept in rule order. Capability failures
/// only remove that rule's evidence.
#[derive(Clone, Debug, Default)]
pub struct Classifier {
    thresholds: Thresholds,
}

impl Classifier {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Fresh audio window sized for these thresholds.
    pub fn audio_window(&self) -> AudioWindow {
        AudioWindow::new(self.thresholds.audio_window())
    }

    pub fn classify(
        &self,
        evidence: Evidence<'_>,
        audio: &mut AudioWindow,
        gallery: &KnownFaceGallery,
        reference: Option<&ReferenceImage>,
        caps: Capabilities<'_>,
        now: Instant,
    ) -> ClassificationResult {
        let detection = evidence.detection;
        let mut positive = false;
        let mut reasons = Vec::new();

        if detection.is_imu() {
            positive = true;
            reasons.push(format!("IMU activated ({})", detection.category));
        }

        if detection.is_audio() {
            if detection.value > self.thresholds.audio_loud {
                positive = true;
                reasons.push(format!("loud audio ({})", detection.value));
            }

            audio.insert(now);
            let count = audio.count();
            if count >= self.thresholds.audio_max_count {
                positive = true;
                reasons.push(format!(
                    "audio frequency ({} in {}s)",
                    count, self.thresholds.audio_window_secs
                ));
            }
        }

        let faces = match caps.faces.detect_and_embed(evidence.image) {
            Ok(faces) => faces,
            Err(err) => {
                log::warn!("face backend '{}' failed: {}", caps.faces.name(), err);
                Vec::new()
            }
        };

        if let Some(face) = faces.first() {
            match gallery.match_face(face, self.thresholds.similarity) {
                Some((known, similarity)) => {
                    log::info!("known face: {} (similarity {:.3})", known.name, similarity);
                    reasons.push(format!("identified ({})", known.name));
                }
                None => {
                    positive = true;
                    reasons.push("unregistered face".to_string());
                }
            }
        } else {
            let pct = self.visual_difference(reference, evidence.image, caps.diff);
            log::info!("visual change: {:.2}%", pct);
            if pct > self.thresholds.visual_diff_percentage {
                positive = true;
                reasons.push(format!("visual change > threshold ({:.2}%)", pct));
            }
        }

        ClassificationResult {
            verdict: if positive {
                Verdict::Positive
            } else {
                Verdict::Negative
            },
            reasons,
        }
    }

    fn visual_difference(
        &self,
        reference: Option<&ReferenceImage>,
        image: &[u8],
        diff: &dyn DiffCapability,
    ) -> f64 {
        let Some(reference) = reference else {
            log::debug!("no reference image yet; visual change treated as 0");
            return 0.0;
        };
        let reference = match reference.load() {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("reference image unavailable: {:#}", err);
                return 0.0;
            }
        };
        match diff.percent_difference(&reference, image) {
            Ok(pct) => pct.clamp(0.0, 100.0),
            Err(err) => {
                log::warn!("diff backend '{}' failed: {:#}", diff.name(), err);
                0.0
            }
        }
    }
}
