//! Incident classification.
//!
//! The classifier is a pure decision function over one detection plus the
//! state it consults: the audio burst window, the known-face gallery and the
//! current reference image. Reference updates never reach it.

mod audio_window;
mod classifier;
mod gallery;
mod verdict;

pub use audio_window::AudioWindow;
pub use classifier::{
    Capabilities, Classifier, Evidence, Thresholds, DEFAULT_AUDIO_LOUD_THRESHOLD,
    DEFAULT_AUDIO_MAX_COUNT, DEFAULT_AUDIO_WINDOW_SECS, DEFAULT_SIMILARITY_THRESHOLD,
    DEFAULT_VISUAL_DIFF_PERCENTAGE,
};
pub use gallery::{cosine_similarity, KnownFace, KnownFaceGallery};
pub use verdict::{ClassificationResult, Verdict};
