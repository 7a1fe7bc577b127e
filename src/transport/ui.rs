use anyhow::Result;

/// Event name carrying raw telemetry strings to the local UI.
pub const TELEMETRY_EVENT: &str = "telemetry_data";

/// Persistent channel to the local UI server.
///
/// Shared between the telemetry relay (emits) and the connection supervisor
/// (connects). Implementations must not hold internal locks while waiting on
/// the network.
pub trait UiTransport: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Attempt one connection. Bounded in time.
    fn connect(&self) -> Result<()>;

    /// Send one named event. Callers only emit while connected; a failed emit
    /// is dropped, never queued.
    fn emit(&self, event: &str, payload: &str) -> Result<()>;

    fn disconnect(&self) {}
}
