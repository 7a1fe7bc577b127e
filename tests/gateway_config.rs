use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::Builder;

use watchdog_edge::config::GatewayConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "WATCHDOG_CONFIG",
        "EDGE_ID",
        "DEVICE_ID",
        "WATCHDOG_SERIAL_PORT",
        "WATCHDOG_BAUD_RATE",
        "WATCHDOG_BLE_NAME",
        "WATCHDOG_UI_BROKER",
        "WATCHDOG_KNOWN_FACES_DIR",
        "WATCHDOG_REFERENCE_PATH",
        "WATCHDOG_SIMILARITY_THRESHOLD",
        "WATCHDOG_VISUAL_DIFF_PERCENTAGE",
        "WATCHDOG_AUDIO_LOUD_THRESHOLD",
        "WATCHDOG_AUDIO_WINDOW_SECS",
        "WATCHDOG_AUDIO_MAX_COUNT",
        "CLOUD_UPLOAD_URL",
        "CLOUD_EVENTS_URL",
        "CLOUD_API_KEY",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    std::io::Write::write_all(&mut file, contents.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = GatewayConfig::load().expect("load defaults");
    assert_eq!(cfg.edge_id, "Edge_Default");
    assert_eq!(cfg.device_id, "Device_Default");
    assert_eq!(cfg.serial.baud_rate, 115_200);
    assert_eq!(cfg.serial.read_timeout, Duration::from_millis(100));
    assert!(!cfg.serial.reconnect);
    assert_eq!(cfg.telemetry.device_name, "WATCHDOG");
    assert_eq!(
        cfg.telemetry.characteristic,
        "beb5483e-36e1-4688-b7f5-ea07361b26a8"
    );
    assert_eq!(cfg.telemetry.scan_timeout, Duration::from_secs(10));
    assert_eq!(cfg.ui.broker, "127.0.0.1:1883");
    assert!(!cfg.cloud.is_configured());
    assert_eq!(cfg.paths.known_faces_dir, PathBuf::from("known_faces"));
    assert_eq!(cfg.thresholds.similarity, 0.5);
    assert_eq!(cfg.thresholds.visual_diff_percentage, 20.0);
    assert_eq!(cfg.thresholds.audio_loud, 2000);
    assert_eq!(cfg.thresholds.audio_window_secs, 30);
    assert_eq!(cfg.thresholds.audio_max_count, 2);
    assert_eq!(cfg.retry_interval, Duration::from_secs(5));
}

#[test]
fn loads_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".json",
        r#"{
            "edge_id": "edge-lobby",
            "serial": { "port": "/dev/ttyACM0", "reconnect": true },
            "ui": { "broker": "mqtt://127.0.0.1:1884", "topic_prefix": "lobby" },
            "cloud": {
                "upload_url": "https://cloud.example/upload",
                "events_url": "https://cloud.example/events"
            },
            "thresholds": { "audio_loud": 1500, "audio_max_count": 3 },
            "retry_interval_secs": 2
        }"#,
    );

    std::env::set_var("WATCHDOG_CONFIG", file.path());
    std::env::set_var("DEVICE_ID", "reporter-9");
    std::env::set_var("WATCHDOG_SIMILARITY_THRESHOLD", "0.65");
    std::env::set_var("CLOUD_API_KEY", "secret");

    let cfg = GatewayConfig::load().expect("load config");
    assert_eq!(cfg.edge_id, "edge-lobby");
    assert_eq!(cfg.device_id, "reporter-9");
    assert_eq!(cfg.serial.port, "/dev/ttyACM0");
    assert!(cfg.serial.reconnect);
    assert_eq!(cfg.ui.broker, "mqtt://127.0.0.1:1884");
    assert_eq!(cfg.ui.topic_prefix, "lobby");
    assert!(cfg.cloud.is_configured());
    assert_eq!(cfg.cloud.api_key.as_deref(), Some("secret"));
    assert_eq!(cfg.thresholds.audio_loud, 1500);
    assert_eq!(cfg.thresholds.audio_max_count, 3);
    assert_eq!(cfg.thresholds.similarity, 0.65);
    assert_eq!(cfg.retry_interval, Duration::from_secs(2));

    clear_env();
}

#[test]
fn loads_toml_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".toml",
        r#"
            device_id = "reporter-2"

            [telemetry]
            enabled = false
            device_name = "WATCHDOG-2"

            [thresholds]
            visual_diff_percentage = 35.5
        "#,
    );

    let cfg = GatewayConfig::load_from(Some(file.path())).expect("load toml");
    assert_eq!(cfg.device_id, "reporter-2");
    assert!(!cfg.telemetry.enabled);
    assert_eq!(cfg.telemetry.device_name, "WATCHDOG-2");
    assert_eq!(cfg.thresholds.visual_diff_percentage, 35.5);
}

#[test]
fn rejects_invalid_thresholds() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("WATCHDOG_SIMILARITY_THRESHOLD", "1.5");
    let err = GatewayConfig::load().expect_err("similarity out of range");
    assert!(err.to_string().contains("similarity"));

    clear_env();
    std::env::set_var("WATCHDOG_AUDIO_MAX_COUNT", "0");
    assert!(GatewayConfig::load().is_err());

    clear_env();
    std::env::set_var("WATCHDOG_VISUAL_DIFF_PERCENTAGE", "120");
    assert!(GatewayConfig::load().is_err());

    clear_env();
    std::env::set_var("WATCHDOG_BAUD_RATE", "fast");
    let err = GatewayConfig::load().expect_err("baud must be numeric");
    assert!(err.to_string().contains("WATCHDOG_BAUD_RATE"));

    clear_env();
}

#[test]
fn rejects_half_configured_cloud_and_blank_ids() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CLOUD_UPLOAD_URL", "https://cloud.example/upload");
    assert!(GatewayConfig::load().is_err());
    clear_env();

    let file = write_config(".json", r#"{ "edge_id": "   " }"#);
    assert!(GatewayConfig::load_from(Some(file.path())).is_err());
}

#[test]
fn rejects_unreadable_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(".json", "{ not json");
    let err = GatewayConfig::load_from(Some(file.path())).expect_err("bad json");
    assert!(err.to_string().contains("invalid config file"));
}
