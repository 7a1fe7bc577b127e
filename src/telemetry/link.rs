use std::time::Duration;

use anyhow::Result;

/// Short-range wireless transport to the Watchdog.
///
/// Implementations scan for a device by its advertised name and subscribe to
/// one notifying characteristic. Calls may block, but never longer than the
/// timeout they are given.
pub trait TelemetryLink: Send {
    /// Scan up to `scan_timeout` for `device_name` and subscribe to
    /// `characteristic`. `Ok(None)` means the device was not found.
    fn connect(
        &mut self,
        device_name: &str,
        characteristic: &str,
        scan_timeout: Duration,
    ) -> Result<Option<Box<dyn TelemetrySession>>>;
}

/// A live subscription.
pub trait TelemetrySession: Send {
    /// Transport address of the connected device, for logs.
    fn address(&self) -> String;

    fn is_connected(&self) -> bool;

    /// Wait up to `timeout` for the next notification payload.
    /// `Ok(None)` on timeout.
    fn next_notification(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;
}
