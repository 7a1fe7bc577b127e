//! Reporter wire protocol.
//!
//! The Reporter prints incidents over a byte stream that is text around the
//! edges and raw JPEG in the middle:
//!
//! ```text
//! === INCIDENT REPORT ===
//! TYPE:DETECTION:AUDIO:2500
//! --- FOTO START ---
//! <jpeg bytes, possibly containing newlines>
//! --- FOTO END ---
//! ```
//!
//! `LineSplitter` turns transport chunks into lines and `FrameDecoder` turns
//! lines into `IncidentRecord`s.

mod decoder;
mod lines;
mod record;

pub use decoder::{
    DecoderState, DecoderStats, FrameDecoder, HEADER_MARKER, MAX_PHOTO_BYTES, PHOTO_END_MARKER,
    PHOTO_START_MARKER, TYPE_PREFIX,
};
pub use lines::LineSplitter;
pub use record::{Detection, IncidentKind, IncidentRecord, UNKNOWN_CATEGORY};
