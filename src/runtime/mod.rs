//! Unit orchestration.
//!
//! The gateway runs three long-lived units on their own threads: incident
//! ingestion, the telemetry relay and the UI connection supervisor. A unit
//! that stops (its transport failed for good, or a replay ran out) is logged
//! and the others keep running. All units observe one [`Shutdown`] token.

mod shutdown;

use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::ingest::{IncidentPipeline, IncidentSource};
use crate::telemetry::TelemetryRelay;
use crate::transport::ConnectionSupervisor;

pub use shutdown::Shutdown;

/// Opens the incident transport. Called again on every reconnect.
pub type SourceOpener = Box<dyn FnMut() -> Result<Box<dyn IncidentSource>> + Send>;

pub struct IngestionUnit {
    pub open: SourceOpener,
    pub pipeline: IncidentPipeline,
    /// Reopen the transport after it fails or closes, waiting this long.
    /// `None` ends the unit on the first failure.
    pub reconnect: Option<Duration>,
}

struct Unit {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Handle to the running units.
pub struct Gateway {
    shutdown: Shutdown,
    units: Vec<Unit>,
}

impl Gateway {
    pub fn new(shutdown: Shutdown) -> Self {
        Self {
            shutdown,
            units: Vec::new(),
        }
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn unit_names(&self) -> Vec<&'static str> {
        self.units.iter().map(|u| u.name).collect()
    }

    fn spawn<F>(&mut self, name: &'static str, body: F) -> Result<()>
    where
        F: FnOnce(Shutdown) + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(shutdown))
            .with_context(|| format!("failed to spawn {} unit", name))?;
        log::info!("{} unit started", name);
        self.units.push(Unit { name, handle });
        Ok(())
    }

    pub fn spawn_ingestion(&mut self, unit: IngestionUnit) -> Result<()> {
        self.spawn("ingestion", move |shutdown| run_ingestion(unit, &shutdown))
    }

    pub fn spawn_telemetry(&mut self, mut relay: TelemetryRelay) -> Result<()> {
        self.spawn("telemetry", move |shutdown| relay.run(&shutdown))
    }

    pub fn spawn_supervisor(&mut self, supervisor: ConnectionSupervisor) -> Result<()> {
        self.spawn("ui-supervisor", move |shutdown| supervisor.run(&shutdown))
    }

    /// Block until shutdown is requested or every unit has stopped on its
    /// own, then stop and join everything.
    pub fn wait(self) -> Result<()> {
        loop {
            if self.units.iter().all(|u| u.handle.is_finished()) {
                log::info!("all units stopped");
                break;
            }
            if self.shutdown.wait(Duration::from_millis(250)) {
                log::info!("shutdown requested");
                break;
            }
        }
        self.stop()
    }

    /// Request shutdown and join every unit.
    pub fn stop(self) -> Result<()> {
        self.shutdown.trigger();
        let mut panicked = Vec::new();
        for unit in self.units {
            if unit.handle.join().is_err() {
                log::error!("{} unit panicked", unit.name);
                panicked.push(unit.name);
            }
        }
        if panicked.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("units panicked: {}", panicked.join(", ")))
        }
    }
}

fn run_ingestion(mut unit: IngestionUnit, shutdown: &Shutdown) {
    loop {
        match (unit.open)() {
            Ok(mut source) => {
                log::info!("reading incidents from {}", source.describe());
                if let Err(e) = unit.pipeline.run(source.as_mut(), shutdown) {
                    log::error!("incident transport failed: {:#}", e);
                }
            }
            Err(e) => log::error!("cannot open incident transport: {:#}", e),
        }
        if shutdown.is_triggered() {
            break;
        }
        let Some(delay) = unit.reconnect else {
            log::warn!("ingestion stopped; reconnect disabled");
            break;
        };
        if shutdown.wait(delay) {
            break;
        }
    }
    let stats = unit.pipeline.decoder().stats();
    log::info!(
        "ingestion unit stopped after {} incidents ({} decoded, {} abandoned)",
        unit.pipeline.processed(),
        stats.incidents,
        stats.abandoned
    );
}
