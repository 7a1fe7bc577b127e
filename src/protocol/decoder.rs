use super::record::{IncidentKind, IncidentRecord};

pub const HEADER_MARKER: &str = "=== INCIDENT REPORT ===";
pub const TYPE_PREFIX: &str = "TYPE:";
pub const PHOTO_START_MARKER: &str = "--- FOTO START ---";
pub const PHOTO_END_MARKER: &[u8] = b"--- FOTO END ---";

/// Upper bound on a single photo. Anything larger is a lost end marker.
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderState {
    Idle,
    Metadata,
    Photo,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub incidents: u64,
    pub abandoned: u64,
}

/// Rebuilds incident records from the Reporter's line-oriented stream.
///
/// The decoder never fails: text it cannot make sense of is ignored and the
/// current state is kept, because photo bytes routinely look like garbage text.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecoderState,
    kind: Option<IncidentKind>,
    photo: Vec<u8>,
    stats: DecoderStats,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Idle,
            kind: None,
            photo: Vec::new(),
            stats: DecoderStats::default(),
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Bytes captured so far for the photo in flight.
    pub fn buffered_bytes(&self) -> usize {
        self.photo.len()
    }

    /// Drop any incident in flight and return to `Idle`.
    pub fn reset(&mut self) {
        if self.state != DecoderState::Idle {
            self.stats.abandoned += 1;
            log::debug!(
                "discarding partial incident ({} photo bytes buffered)",
                self.photo.len()
            );
        }
        self.state = DecoderState::Idle;
        self.kind = None;
        self.photo = Vec::new();
    }

    /// Feed one raw line (terminator included). Returns a record when the line
    /// closes a photo.
    pub fn push_line(&mut self, raw: &[u8]) -> Option<IncidentRecord> {
        if self.state == DecoderState::Photo {
            if let Some(pos) = find_subslice(raw, PHOTO_END_MARKER) {
                self.photo.extend_from_slice(&raw[..pos]);
                return Some(self.finish());
            }
        }

        let text = String::from_utf8_lossy(raw);
        let text = text.trim();

        if text.contains(HEADER_MARKER) {
            if self.state == DecoderState::Photo {
                log::warn!(
                    "incident header received mid-photo; dropping {} buffered bytes",
                    self.photo.len()
                );
            }
            self.reset();
            self.state = DecoderState::Metadata;
            return None;
        }

        match self.state {
            DecoderState::Idle => {
                if text.contains(PHOTO_START_MARKER) {
                    log::debug!("photo start without incident header; capturing untyped photo");
                    self.state = DecoderState::Photo;
                } else {
                    log::trace!("ignoring line outside incident: {:?}", text);
                }
                None
            }
            DecoderState::Metadata => {
                if let Some(raw_type) = text.strip_prefix(TYPE_PREFIX) {
                    let kind = IncidentKind::parse(raw_type);
                    log::debug!("incident type: {:?}", kind);
                    self.kind = Some(kind);
                } else if text.contains(PHOTO_START_MARKER) {
                    self.state = DecoderState::Photo;
                } else {
                    log::trace!("ignoring metadata line: {:?}", text);
                }
                None
            }
            DecoderState::Photo => {
                self.photo.extend_from_slice(raw);
                if self.photo.len() > MAX_PHOTO_BYTES {
                    log::warn!(
                        "photo exceeded {} bytes without end marker; abandoning incident",
                        MAX_PHOTO_BYTES
                    );
                    self.reset();
                }
                None
            }
        }
    }

    fn finish(&mut self) -> IncidentRecord {
        let kind = self.kind.take().unwrap_or_else(IncidentKind::unknown);
        let image = std::mem::take(&mut self.photo);
        self.state = DecoderState::Idle;
        self.stats.incidents += 1;
        IncidentRecord { kind, image }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
