use std::sync::Arc;
use std::time::Duration;

use super::link::{TelemetryLink, TelemetrySession};
use super::snapshot::TelemetrySnapshot;
use crate::runtime::Shutdown;
use crate::transport::{UiTransport, TELEMETRY_EVENT};

#[derive(Clone, Debug)]
pub struct RelaySettings {
    pub device_name: String,
    pub characteristic: String,
    pub scan_timeout: Duration,
    /// Pause after a failed scan or a link error.
    pub retry_interval: Duration,
    /// How long one notification read may block before shutdown is checked.
    pub poll_interval: Duration,
}

/// Mirrors Watchdog telemetry into the snapshot and onto the UI channel.
pub struct TelemetryRelay {
    link: Box<dyn TelemetryLink>,
    snapshot: TelemetrySnapshot,
    ui: Option<Arc<dyn UiTransport>>,
    settings: RelaySettings,
}

impl TelemetryRelay {
    pub fn new(
        link: Box<dyn TelemetryLink>,
        snapshot: TelemetrySnapshot,
        ui: Option<Arc<dyn UiTransport>>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            link,
            snapshot,
            ui,
            settings,
        }
    }

    /// Handle one notification: decode leniently, store, forward if the UI is
    /// up. Returns the decoded text.
    pub fn handle_payload(&self, payload: &[u8]) -> String {
        let text = String::from_utf8_lossy(payload).into_owned();
        self.snapshot.replace(text.clone());
        if let Some(ui) = &self.ui {
            if ui.is_connected() {
                if let Err(e) = ui.emit(TELEMETRY_EVENT, &text) {
                    log::debug!("telemetry not forwarded: {:#}", e);
                }
            }
        }
        text
    }

    pub fn run(&mut self, shutdown: &Shutdown) {
        log::info!(
            "telemetry relay looking for '{}'",
            self.settings.device_name
        );
        while !shutdown.is_triggered() {
            let attempt = self.link.connect(
                &self.settings.device_name,
                &self.settings.characteristic,
                self.settings.scan_timeout,
            );
            match attempt {
                Ok(Some(session)) => {
                    log::info!("telemetry device found at {}", session.address());
                    let failed = self.follow(session, shutdown);
                    if shutdown.is_triggered() {
                        break;
                    }
                    log::warn!("telemetry device disconnected");
                    if failed && shutdown.wait(self.settings.retry_interval) {
                        break;
                    }
                }
                Ok(None) => {
                    log::warn!(
                        "telemetry device '{}' not found, retrying",
                        self.settings.device_name
                    );
                    if shutdown.wait(self.settings.retry_interval) {
                        break;
                    }
                }
                Err(e) => {
                    log::error!("telemetry link error: {:#}", e);
                    if shutdown.wait(self.settings.retry_interval) {
                        break;
                    }
                }
            }
        }
        log::info!("telemetry relay stopped");
    }

    /// Forward notifications until the session ends. Returns true when it
    /// ended on a read error.
    fn follow(&self, mut session: Box<dyn TelemetrySession>, shutdown: &Shutdown) -> bool {
        while session.is_connected() && !shutdown.is_triggered() {
            match session.next_notification(self.settings.poll_interval) {
                Ok(Some(payload)) => {
                    self.handle_payload(&payload);
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!("telemetry read failed: {:#}", e);
                    return true;
                }
            }
        }
        false
    }
}
