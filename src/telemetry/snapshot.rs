use std::sync::{Arc, RwLock};

pub const DEFAULT_TELEMETRY: &str = "Waiting for telemetry...";

/// Latest telemetry string from the Watchdog.
///
/// Single writer (the telemetry relay), any number of readers. Readers get a
/// copy and must tolerate a stale or default value; the lock is only held
/// for the copy or the replacement.
#[derive(Clone, Debug)]
pub struct TelemetrySnapshot {
    inner: Arc<RwLock<String>>,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self::new(DEFAULT_TELEMETRY)
    }
}

impl TelemetrySnapshot {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial.into())),
        }
    }

    pub fn get(&self) -> String {
        self.inner
            .read()
            .map(|value| value.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn replace(&self, value: String) {
        match self.inner.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }
}
