//! Local UI channel.
//!
//! The gateway pushes raw telemetry to a UI server on the same host. The
//! channel is an MQTT broker connection; the UI server subscribes to
//! `<prefix>/telemetry_data`.

mod endpoint;
mod mqtt;
mod supervisor;
mod ui;

pub use endpoint::BrokerAddress;
pub use mqtt::{MqttUiConfig, MqttUiTransport};
pub use supervisor::ConnectionSupervisor;
pub use ui::{UiTransport, TELEMETRY_EVENT};
