use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Alarm.
    Positive,
    /// Benign.
    Negative,
    /// Informational, e.g. a reference update.
    Info,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "POSITIVE",
            Self::Negative => "NEGATIVE",
            Self::Info => "INFO",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub verdict: Verdict,
    /// Human-readable reasons in the order the rules fired.
    pub reasons: Vec<String>,
}

impl ClassificationResult {
    pub fn info(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Info,
            reasons: vec![reason.into()],
        }
    }

    pub fn is_positive(&self) -> bool {
        self.verdict == Verdict::Positive
    }

    pub fn has_reason(&self, needle: &str) -> bool {
        self.reasons.iter().any(|reason| reason.contains(needle))
    }
}
