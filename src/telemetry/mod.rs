//! Watchdog telemetry relay.
//!
//! Telemetry arrives as short text notifications over the wireless link. The
//! latest value is kept in a shared snapshot (attached to every cloud event)
//! and forwarded live to the UI channel when it is up.

mod link;
mod relay;
mod serial_bridge;
mod snapshot;

pub use link::{TelemetryLink, TelemetrySession};
pub use relay::{RelaySettings, TelemetryRelay};
pub use serial_bridge::{port_matches, SerialBridgeLink};
pub use snapshot::{TelemetrySnapshot, DEFAULT_TELEMETRY};
