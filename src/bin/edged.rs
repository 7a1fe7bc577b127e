//! edged - Watchdog edge gateway daemon
//!
//! This daemon:
//! 1. Reads incident reports from the Reporter over serial (or a capture file)
//! 2. Classifies each detection and keeps the reference image current
//! 3. Uploads evidence and writes one event document per incident
//! 4. Relays Watchdog telemetry to the local UI channel

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use watchdog_edge::{
    capability::{DiffCapability, FaceCapability, PixelDiffBackend, StubFaceBackend},
    config::GatewayConfig,
    ingest::{
        EdgeIdentity, IncidentPipeline, IncidentSource, PipelineParts, ReaderSource,
        SerialIncidentSource, SerialSourceConfig,
    },
    runtime::{Gateway, IngestionUnit, Shutdown, SourceOpener},
    sink::{CloudSink, HttpCloudSink, HttpSinkConfig, LogSink},
    telemetry::{RelaySettings, SerialBridgeLink, TelemetryRelay, TelemetrySnapshot},
    transport::{BrokerAddress, ConnectionSupervisor, MqttUiConfig, MqttUiTransport, UiTransport},
    Classifier, KnownFaceGallery, ReferenceImage, ReferenceStore,
};

const TELEMETRY_POLL: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(author, version, about = "Watchdog edge gateway")]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "WATCHDOG_CONFIG")]
    config: Option<PathBuf>,

    /// Replay a captured Reporter stream instead of opening the serial port.
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Do not start the telemetry relay.
    #[arg(long)]
    no_telemetry: bool,

    /// Do not connect to the UI channel.
    #[arg(long)]
    no_ui: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = GatewayConfig::load_from(args.config.as_deref())?;
    log::info!(
        "edged {} starting as {}/{}",
        env!("CARGO_PKG_VERSION"),
        cfg.edge_id,
        cfg.device_id
    );

    let shutdown = Shutdown::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || signal.trigger()).context("error setting Ctrl-C handler")?;

    let snapshot = TelemetrySnapshot::default();
    let ui = if cfg.ui.enabled && !args.no_ui {
        Some(build_ui(&cfg)?)
    } else {
        log::info!("UI channel disabled");
        None
    };

    let mut gateway = Gateway::new(shutdown);
    gateway.spawn_ingestion(build_ingestion(&cfg, &args, snapshot.clone())?)?;

    if cfg.telemetry.enabled && !args.no_telemetry {
        let relay = TelemetryRelay::new(
            Box::new(SerialBridgeLink::new(cfg.telemetry.bridge_baud_rate)),
            snapshot,
            ui.clone(),
            RelaySettings {
                device_name: cfg.telemetry.device_name.clone(),
                characteristic: cfg.telemetry.characteristic.clone(),
                scan_timeout: cfg.telemetry.scan_timeout,
                retry_interval: cfg.retry_interval,
                poll_interval: TELEMETRY_POLL,
            },
        );
        gateway.spawn_telemetry(relay)?;
    } else {
        log::info!("telemetry relay disabled");
    }

    if let Some(ui) = ui {
        gateway.spawn_supervisor(ConnectionSupervisor::new(ui, cfg.retry_interval))?;
    }

    log::info!("edged running (Ctrl-C to stop)");
    gateway.wait()?;
    log::info!("edged stopped");
    Ok(())
}

fn build_ui(cfg: &GatewayConfig) -> Result<Arc<dyn UiTransport>> {
    let broker = BrokerAddress::parse(&cfg.ui.broker, cfg.ui.tls)?;
    if !broker.is_local() {
        log::warn!("UI broker {} is not on this host", broker);
    }
    let tls_ca = match &cfg.ui.tls_ca_path {
        Some(path) => Some(
            std::fs::read(path)
                .with_context(|| format!("failed to read UI TLS CA '{}'", path.display()))?,
        ),
        None => None,
    };
    let transport = MqttUiTransport::new(MqttUiConfig {
        broker,
        tls_ca,
        client_id: cfg.ui.client_id.clone(),
        username: cfg.ui.username.clone(),
        password: cfg.ui.password.clone(),
        topic_prefix: cfg.ui.topic_prefix.clone(),
        connect_timeout: cfg.ui.connect_timeout,
    });
    Ok(Arc::new(transport))
}

fn build_sink(cfg: &GatewayConfig) -> Box<dyn CloudSink> {
    if cfg.cloud.is_configured() {
        log::info!("reporting to cloud endpoints");
        Box::new(HttpCloudSink::new(HttpSinkConfig {
            upload_url: cfg.cloud.upload_url.clone(),
            events_url: cfg.cloud.events_url.clone(),
            api_key: cfg.cloud.api_key.clone(),
            edge_id: cfg.edge_id.clone(),
        }))
    } else {
        log::warn!("no cloud endpoints configured; events are only logged");
        Box::new(LogSink)
    }
}

fn build_ingestion(
    cfg: &GatewayConfig,
    args: &Args,
    telemetry: TelemetrySnapshot,
) -> Result<IngestionUnit> {
    let faces: Arc<dyn FaceCapability> = Arc::new(StubFaceBackend::new());
    let diff: Arc<dyn DiffCapability> = Arc::new(PixelDiffBackend::new());
    log::info!(
        "face capability '{}', diff capability '{}'",
        faces.name(),
        diff.name()
    );

    let gallery = KnownFaceGallery::load(&cfg.paths.known_faces_dir, faces.as_ref())?;
    log::info!("{} known faces loaded", gallery.len());

    let fallback = cfg
        .paths
        .reference_url
        .as_deref()
        .map(ReferenceImage::from_source)
        .transpose()?;
    let reference = ReferenceStore::open(cfg.paths.reference_path.clone(), fallback);
    if reference.current().is_none() {
        log::warn!("no reference image yet; visual change rule inactive");
    }

    let pipeline = IncidentPipeline::new(PipelineParts {
        identity: EdgeIdentity {
            edge_id: cfg.edge_id.clone(),
            device_id: cfg.device_id.clone(),
        },
        classifier: Classifier::new(cfg.thresholds.clone()),
        gallery: Arc::new(gallery),
        reference,
        faces,
        diff,
        sink: build_sink(cfg),
        telemetry,
    });

    let (open, reconnect): (SourceOpener, Option<Duration>) = match &args.replay {
        Some(path) => {
            let path = path.clone();
            let open: SourceOpener = Box::new(move || {
                let file = std::fs::File::open(&path)
                    .with_context(|| format!("failed to open capture {}", path.display()))?;
                let source: Box<dyn IncidentSource> =
                    Box::new(ReaderSource::new(path.display().to_string(), file));
                Ok(source)
            });
            (open, None)
        }
        None => {
            let serial = SerialSourceConfig {
                port: cfg.serial.port.clone(),
                baud_rate: cfg.serial.baud_rate,
                read_timeout: cfg.serial.read_timeout,
            };
            if serial.port.is_empty() {
                return Err(anyhow!("serial port must be configured"));
            }
            let open: SourceOpener = Box::new(move || {
                let source: Box<dyn IncidentSource> =
                    Box::new(SerialIncidentSource::open(&serial)?);
                Ok(source)
            });
            let reconnect = cfg.serial.reconnect.then_some(cfg.retry_interval);
            (open, reconnect)
        }
    };

    Ok(IngestionUnit {
        open,
        pipeline,
        reconnect,
    })
}
