use std::sync::Arc;
use std::time::Duration;

use super::ui::UiTransport;
use crate::runtime::Shutdown;

/// Keeps the UI channel up by retrying on a fixed interval.
pub struct ConnectionSupervisor {
    ui: Arc<dyn UiTransport>,
    interval: Duration,
}

impl ConnectionSupervisor {
    pub fn new(ui: Arc<dyn UiTransport>, interval: Duration) -> Self {
        Self { ui, interval }
    }

    /// One supervision step. Returns whether the channel is up afterwards.
    pub fn tick(&self) -> bool {
        if self.ui.is_connected() {
            return true;
        }
        match self.ui.connect() {
            Ok(()) => {
                log::info!("connected to UI server");
                true
            }
            Err(e) => {
                log::warn!(
                    "UI server unavailable, retrying in {}s: {:#}",
                    self.interval.as_secs(),
                    e
                );
                false
            }
        }
    }

    pub fn run(&self, shutdown: &Shutdown) {
        log::info!("UI connection supervisor started");
        loop {
            self.tick();
            if shutdown.wait(self.interval) {
                break;
            }
        }
        self.ui.disconnect();
        log::info!("UI connection supervisor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FlakyUi {
        connected: AtomicBool,
        attempts: AtomicUsize,
        fail_first: usize,
    }

    impl UiTransport for FlakyUi {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn connect(&self) -> Result<()> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_first {
                return Err(anyhow!("connection refused"));
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn emit(&self, _event: &str, _payload: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn retries_until_connected_then_idles() {
        let ui = Arc::new(FlakyUi {
            fail_first: 2,
            ..FlakyUi::default()
        });
        let supervisor = ConnectionSupervisor::new(ui.clone(), Duration::from_millis(1));
        assert!(!supervisor.tick());
        assert!(!supervisor.tick());
        assert!(supervisor.tick());
        assert!(supervisor.tick());
        assert_eq!(ui.attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn reconnects_after_drop() {
        let ui = Arc::new(FlakyUi::default());
        let supervisor = ConnectionSupervisor::new(ui.clone(), Duration::from_millis(1));
        assert!(supervisor.tick());
        ui.connected.store(false, Ordering::SeqCst);
        assert!(supervisor.tick());
        assert_eq!(ui.attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn run_exits_on_shutdown() {
        let ui = Arc::new(FlakyUi {
            fail_first: usize::MAX,
            ..FlakyUi::default()
        });
        let supervisor = ConnectionSupervisor::new(ui.clone(), Duration::from_secs(60));
        let shutdown = Shutdown::new();
        let trigger = shutdown.clone();
        let handle = std::thread::spawn(move || supervisor.run(&shutdown));
        std::thread::sleep(Duration::from_millis(20));
        trigger.trigger();
        handle.join().unwrap();
        assert_eq!(ui.attempts.load(Ordering::SeqCst), 1);
    }
}
