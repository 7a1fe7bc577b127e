/// Category used when the firmware omits or blanks the category segment.
pub const UNKNOWN_CATEGORY: &str = "UNKNOWN";

const INITIAL_REFERENCE: &str = "INITIAL_REFERENCE";

/// Sensor trigger reported with a `DETECTION` incident.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Detection {
    /// Free-text category. Compound values such as `IMU_Y` or `AUDIO_PEAK`
    /// are matched by substring, never by equality.
    pub category: String,
    /// Raw sensor reading. Defaults to 0 when the firmware sends garbage.
    pub value: i64,
}

impl Detection {
    pub fn is_imu(&self) -> bool {
        self.category.contains("IMU")
    }

    pub fn is_audio(&self) -> bool {
        self.category.contains("AUDIO")
    }
}

/// Incident type carried by the `TYPE:` line, parsed once at the protocol boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncidentKind {
    InitialReference,
    Detection(Detection),
}

impl IncidentKind {
    /// Parse the value of a `TYPE:` line.
    ///
    /// `INITIAL_REFERENCE` is matched exactly. Anything else is read as
    /// `<TAG>:<CATEGORY>:<INTEGER>`; missing or blank segments fall back to
    /// [`UNKNOWN_CATEGORY`] and `0` instead of rejecting the incident.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == INITIAL_REFERENCE {
            return Self::InitialReference;
        }

        let mut parts = raw.split(':').skip(1);
        let category = parts
            .next()
            .map(str::trim)
            .filter(|category| !category.is_empty())
            .unwrap_or(UNKNOWN_CATEGORY)
            .to_string();
        let value = parts
            .next()
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(0);

        Self::Detection(Detection { category, value })
    }

    /// Kind assumed when a photo completes without any `TYPE:` line.
    pub fn unknown() -> Self {
        Self::Detection(Detection {
            category: UNKNOWN_CATEGORY.to_string(),
            value: 0,
        })
    }
}

/// A fully received incident: metadata plus the verbatim photo bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncidentRecord {
    pub kind: IncidentKind,
    pub image: Vec<u8>,
}

impl IncidentRecord {
    pub fn is_reference(&self) -> bool {
        matches!(self.kind, IncidentKind::InitialReference)
    }
}
