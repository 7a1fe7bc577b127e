use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{Client, Connection, Event, MqttOptions};

use super::endpoint::BrokerAddress;
use super::ui::UiTransport;

#[derive(Clone, Debug)]
pub struct MqttUiConfig {
    pub broker: BrokerAddress,
    /// PEM CA for a TLS broker; the default roots otherwise.
    pub tls_ca: Option<Vec<u8>>,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Events go to `<topic_prefix>/<event>`.
    pub topic_prefix: String,
    pub connect_timeout: Duration,
}

struct Session {
    client: Client,
    connected: Arc<AtomicBool>,
}

/// UI channel over an MQTT broker the UI server subscribes to.
///
/// Each `connect` builds a fresh client with its own event-loop thread. The
/// thread flips the session's connected flag on CONNACK and clears it when
/// the connection drops, then exits. No reconnection happens here; the
/// connection supervisor decides when to try again.
pub struct MqttUiTransport {
    config: MqttUiConfig,
    session: Mutex<Option<Session>>,
}

impl MqttUiTransport {
    pub fn new(config: MqttUiConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    pub fn broker(&self) -> &BrokerAddress {
        &self.config.broker
    }

    pub fn topic_for(&self, event: &str) -> String {
        let prefix = self.config.topic_prefix.trim_end_matches('/');
        if prefix.is_empty() {
            event.to_string()
        } else {
            format!("{}/{}", prefix, event)
        }
    }

    fn options(&self) -> Result<MqttOptions> {
        let broker = &self.config.broker;
        let mut options =
            MqttOptions::new(self.config.client_id.clone(), &broker.host, broker.port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_clean_start(true);
        if let Some(user) = &self.config.username {
            options.set_credentials(
                user.clone(),
                self.config.password.clone().unwrap_or_default(),
            );
        }
        options.set_transport(broker.transport(self.config.tls_ca.clone())?);
        Ok(options)
    }

    fn take_session(&self) -> Option<Session> {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    fn current_client(&self) -> Option<Client> {
        let guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .filter(|s| s.connected.load(Ordering::SeqCst))
            .map(|s| s.client.clone())
    }
}

fn spawn_event_loop(
    mut connection: Connection,
    connected: Arc<AtomicBool>,
    ack: mpsc::Sender<Result<(), String>>,
) -> Result<()> {
    std::thread::Builder::new()
        .name("ui-mqtt".to_string())
        .spawn(move || {
            for event in connection.iter() {
                match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        connected.store(true, Ordering::SeqCst);
                        let _ = ack.send(Ok(()));
                    }
                    Ok(Event::Incoming(Packet::Disconnect(_))) => {
                        log::warn!("UI broker closed the session");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if connected.load(Ordering::SeqCst) {
                            log::warn!("UI connection lost: {}", e);
                        }
                        let _ = ack.send(Err(e.to_string()));
                        break;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
        })
        .context("failed to spawn UI event loop")?;
    Ok(())
}

impl UiTransport for MqttUiTransport {
    fn is_connected(&self) -> bool {
        let guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .map(|s| s.connected.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    fn connect(&self) -> Result<()> {
        if let Some(stale) = self.take_session() {
            let _ = stale.client.disconnect();
        }

        let options = self.options()?;
        let (client, connection) = Client::new(options, 10);
        let connected = Arc::new(AtomicBool::new(false));
        let (ack_tx, ack_rx) = mpsc::channel();
        spawn_event_loop(connection, connected.clone(), ack_tx)?;

        // Wait without holding the session lock so emits never block on a
        // connection attempt.
        match ack_rx.recv_timeout(self.config.connect_timeout) {
            Ok(Ok(())) => {
                let mut guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
                *guard = Some(Session { client, connected });
                Ok(())
            }
            Ok(Err(reason)) => Err(anyhow!(
                "UI broker {} refused connection: {}",
                self.config.broker,
                reason
            )),
            Err(_) => {
                let _ = client.disconnect();
                Err(anyhow!(
                    "UI broker {} did not answer within {:?}",
                    self.config.broker,
                    self.config.connect_timeout
                ))
            }
        }
    }

    fn emit(&self, event: &str, payload: &str) -> Result<()> {
        let client = self
            .current_client()
            .ok_or_else(|| anyhow!("UI channel not connected"))?;
        client
            .try_publish(
                self.topic_for(event),
                QoS::AtMostOnce,
                false,
                payload.as_bytes().to_vec(),
            )
            .context("UI publish failed")?;
        Ok(())
    }

    fn disconnect(&self) {
        if let Some(session) = self.take_session() {
            session.connected.store(false, Ordering::SeqCst);
            let _ = session.client.disconnect();
        }
    }
}
