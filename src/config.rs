use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classify::Thresholds;

const DEFAULT_EDGE_ID: &str = "Edge_Default";
const DEFAULT_DEVICE_ID: &str = "Device_Default";
const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";
const DEFAULT_BAUD_RATE: u32 = 115_200;
const DEFAULT_READ_TIMEOUT_MS: u64 = 100;
const DEFAULT_BLE_NAME: &str = "WATCHDOG";
const DEFAULT_CHARACTERISTIC: &str = "beb5483e-36e1-4688-b7f5-ea07361b26a8";
const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 10;
const DEFAULT_UI_BROKER: &str = "127.0.0.1:1883";
const DEFAULT_UI_TOPIC_PREFIX: &str = "watchdog";
const DEFAULT_UI_CLIENT_ID: &str = "watchdog-edge";
const DEFAULT_UI_CONNECT_TIMEOUT_SECS: u64 = 3;
const DEFAULT_KNOWN_FACES_DIR: &str = "known_faces";
const DEFAULT_REFERENCE_PATH: &str = "reference.jpg";
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Deserialize, Default)]
struct GatewayConfigFile {
    edge_id: Option<String>,
    device_id: Option<String>,
    serial: Option<SerialConfigFile>,
    telemetry: Option<TelemetryConfigFile>,
    ui: Option<UiConfigFile>,
    cloud: Option<CloudConfigFile>,
    paths: Option<PathsConfigFile>,
    thresholds: Option<ThresholdsConfigFile>,
    retry_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SerialConfigFile {
    port: Option<String>,
    baud_rate: Option<u32>,
    read_timeout_ms: Option<u64>,
    reconnect: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct TelemetryConfigFile {
    enabled: Option<bool>,
    device_name: Option<String>,
    characteristic: Option<String>,
    scan_timeout_secs: Option<u64>,
    bridge_baud_rate: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct UiConfigFile {
    enabled: Option<bool>,
    broker: Option<String>,
    topic_prefix: Option<String>,
    client_id: Option<String>,
    username: Option<String>,
    password: Option<String>,
    tls: Option<bool>,
    tls_ca_path: Option<PathBuf>,
    connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct CloudConfigFile {
    upload_url: Option<String>,
    events_url: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct PathsConfigFile {
    known_faces_dir: Option<PathBuf>,
    reference_path: Option<PathBuf>,
    reference_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdsConfigFile {
    similarity: Option<f32>,
    visual_diff_percentage: Option<f64>,
    audio_loud: Option<i64>,
    audio_window_secs: Option<u64>,
    audio_max_count: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub edge_id: String,
    pub device_id: String,
    pub serial: SerialSettings,
    pub telemetry: TelemetrySettings,
    pub ui: UiSettings,
    pub cloud: CloudSettings,
    pub paths: PathSettings,
    pub thresholds: Thresholds,
    pub retry_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
    pub reconnect: bool,
}

#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub enabled: bool,
    pub device_name: String,
    pub characteristic: String,
    pub scan_timeout: Duration,
    pub bridge_baud_rate: u32,
}

#[derive(Debug, Clone)]
pub struct UiSettings {
    pub enabled: bool,
    pub broker: String,
    pub topic_prefix: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
    pub tls_ca_path: Option<PathBuf>,
    pub connect_timeout: Duration,
}

/// Cloud endpoints. Both URLs must be set for the HTTP sink to be used.
#[derive(Debug, Clone, Default)]
pub struct CloudSettings {
    pub upload_url: Option<String>,
    pub events_url: Option<String>,
    pub api_key: Option<String>,
}

impl CloudSettings {
    pub fn is_configured(&self) -> bool {
        self.upload_url.is_some() && self.events_url.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct PathSettings {
    pub known_faces_dir: PathBuf,
    pub reference_path: PathBuf,
    pub reference_url: Option<String>,
}

impl GatewayConfig {
    /// Load from `WATCHDOG_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("WATCHDOG_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (or defaults), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: GatewayConfigFile) -> Self {
        let serial = file.serial.unwrap_or_default();
        let telemetry = file.telemetry.unwrap_or_default();
        let ui = file.ui.unwrap_or_default();
        let cloud = file.cloud.unwrap_or_default();
        let paths = file.paths.unwrap_or_default();
        let thresholds = file.thresholds.unwrap_or_default();
        let defaults = Thresholds::default();

        Self {
            edge_id: file.edge_id.unwrap_or_else(|| DEFAULT_EDGE_ID.to_string()),
            device_id: file
                .device_id
                .unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string()),
            serial: SerialSettings {
                port: serial
                    .port
                    .unwrap_or_else(|| DEFAULT_SERIAL_PORT.to_string()),
                baud_rate: serial.baud_rate.unwrap_or(DEFAULT_BAUD_RATE),
                read_timeout: Duration::from_millis(
                    serial.read_timeout_ms.unwrap_or(DEFAULT_READ_TIMEOUT_MS),
                ),
                reconnect: serial.reconnect.unwrap_or(false),
            },
            telemetry: TelemetrySettings {
                enabled: telemetry.enabled.unwrap_or(true),
                device_name: telemetry
                    .device_name
                    .unwrap_or_else(|| DEFAULT_BLE_NAME.to_string()),
                characteristic: telemetry
                    .characteristic
                    .unwrap_or_else(|| DEFAULT_CHARACTERISTIC.to_string()),
                scan_timeout: Duration::from_secs(
                    telemetry
                        .scan_timeout_secs
                        .unwrap_or(DEFAULT_SCAN_TIMEOUT_SECS),
                ),
                bridge_baud_rate: telemetry.bridge_baud_rate.unwrap_or(DEFAULT_BAUD_RATE),
            },
            ui: UiSettings {
                enabled: ui.enabled.unwrap_or(true),
                broker: ui.broker.unwrap_or_else(|| DEFAULT_UI_BROKER.to_string()),
                topic_prefix: ui
                    .topic_prefix
                    .unwrap_or_else(|| DEFAULT_UI_TOPIC_PREFIX.to_string()),
                client_id: ui
                    .client_id
                    .unwrap_or_else(|| DEFAULT_UI_CLIENT_ID.to_string()),
                username: ui.username,
                password: ui.password,
                tls: ui.tls.unwrap_or(false),
                tls_ca_path: ui.tls_ca_path,
                connect_timeout: Duration::from_secs(
                    ui.connect_timeout_secs
                        .unwrap_or(DEFAULT_UI_CONNECT_TIMEOUT_SECS),
                ),
            },
            cloud: CloudSettings {
                upload_url: cloud.upload_url,
                events_url: cloud.events_url,
                api_key: cloud.api_key,
            },
            paths: PathSettings {
                known_faces_dir: paths
                    .known_faces_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_KNOWN_FACES_DIR)),
                reference_path: paths
                    .reference_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_REFERENCE_PATH)),
                reference_url: paths.reference_url,
            },
            thresholds: Thresholds {
                similarity: thresholds.similarity.unwrap_or(defaults.similarity),
                visual_diff_percentage: thresholds
                    .visual_diff_percentage
                    .unwrap_or(defaults.visual_diff_percentage),
                audio_loud: thresholds.audio_loud.unwrap_or(defaults.audio_loud),
                audio_window_secs: thresholds
                    .audio_window_secs
                    .unwrap_or(defaults.audio_window_secs),
                audio_max_count: thresholds
                    .audio_max_count
                    .unwrap_or(defaults.audio_max_count),
            },
            retry_interval: Duration::from_secs(
                file.retry_interval_secs
                    .unwrap_or(DEFAULT_RETRY_INTERVAL_SECS),
            ),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(value) = env_non_empty("EDGE_ID") {
            self.edge_id = value;
        }
        if let Some(value) = env_non_empty("DEVICE_ID") {
            self.device_id = value;
        }
        if let Some(value) = env_non_empty("WATCHDOG_SERIAL_PORT") {
            self.serial.port = value;
        }
        if let Some(value) = env_parsed("WATCHDOG_BAUD_RATE", "an integer baud rate")? {
            self.serial.baud_rate = value;
        }
        if let Some(value) = env_non_empty("WATCHDOG_BLE_NAME") {
            self.telemetry.device_name = value;
        }
        if let Some(value) = env_non_empty("WATCHDOG_UI_BROKER") {
            self.ui.broker = value;
        }
        if let Some(value) = env_non_empty("WATCHDOG_KNOWN_FACES_DIR") {
            self.paths.known_faces_dir = PathBuf::from(value);
        }
        if let Some(value) = env_non_empty("WATCHDOG_REFERENCE_PATH") {
            self.paths.reference_path = PathBuf::from(value);
        }
        if let Some(value) = env_parsed("WATCHDOG_SIMILARITY_THRESHOLD", "a number")? {
            self.thresholds.similarity = value;
        }
        if let Some(value) = env_parsed("WATCHDOG_VISUAL_DIFF_PERCENTAGE", "a number")? {
            self.thresholds.visual_diff_percentage = value;
        }
        if let Some(value) = env_parsed("WATCHDOG_AUDIO_LOUD_THRESHOLD", "an integer")? {
            self.thresholds.audio_loud = value;
        }
        if let Some(value) =
            env_parsed("WATCHDOG_AUDIO_WINDOW_SECS", "an integer number of seconds")?
        {
            self.thresholds.audio_window_secs = value;
        }
        if let Some(value) = env_parsed("WATCHDOG_AUDIO_MAX_COUNT", "an integer")? {
            self.thresholds.audio_max_count = value;
        }
        if let Some(value) = env_non_empty("CLOUD_UPLOAD_URL") {
            self.cloud.upload_url = Some(value);
        }
        if let Some(value) = env_non_empty("CLOUD_EVENTS_URL") {
            self.cloud.events_url = Some(value);
        }
        if let Some(value) = env_non_empty("CLOUD_API_KEY") {
            self.cloud.api_key = Some(value);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.edge_id = self.edge_id.trim().to_string();
        self.device_id = self.device_id.trim().to_string();
        if self.edge_id.is_empty() {
            return Err(anyhow!("edge_id must not be empty"));
        }
        if self.device_id.is_empty() {
            return Err(anyhow!("device_id must not be empty"));
        }
        let similarity = self.thresholds.similarity;
        if !(similarity > 0.0 && similarity <= 1.0) {
            return Err(anyhow!(
                "similarity threshold must be in (0, 1], got {}",
                similarity
            ));
        }
        let diff = self.thresholds.visual_diff_percentage;
        if !(0.0..=100.0).contains(&diff) {
            return Err(anyhow!(
                "visual diff percentage must be in [0, 100], got {}",
                diff
            ));
        }
        if self.thresholds.audio_window_secs == 0 {
            return Err(anyhow!("audio window must be greater than zero"));
        }
        if self.thresholds.audio_max_count == 0 {
            return Err(anyhow!("audio max count must be greater than zero"));
        }
        if self.retry_interval.as_secs() == 0 {
            return Err(anyhow!("retry interval must be greater than zero"));
        }
        if self.serial.baud_rate == 0 {
            return Err(anyhow!("serial baud rate must be greater than zero"));
        }
        if self.serial.read_timeout.is_zero() {
            return Err(anyhow!("serial read timeout must be greater than zero"));
        }
        if self.cloud.upload_url.is_some() != self.cloud.events_url.is_some() {
            return Err(anyhow!(
                "cloud upload_url and events_url must be configured together"
            ));
        }
        Ok(())
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str, expected: &str) -> Result<Option<T>> {
    match env_non_empty(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be {}, got '{}'", key, expected, raw)),
        None => Ok(None),
    }
}

fn read_config_file(path: &Path) -> Result<GatewayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg: GatewayConfigFile = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
