use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use log::{debug, info};

use crate::config::PrinterConfig;
use crate::monitor::{CycleReport, PrinterMonitor, Services};

/// Drives every printer's monitor on a fixed interval.
///
/// Printers are checked one after another in configuration order; a slow remote call
/// delays the printers behind it but never overlaps with them.
pub struct MonitorScheduler {
    monitors: Vec<PrinterMonitor>,
    services: Services,
    interval: Duration,
}

impl MonitorScheduler {
    /// # Arguments
    ///
    /// * `printers` - Printers to monitor, in check order
    /// * `services` - Remote collaborators shared by all monitors
    /// * `interval` - Pause between the end of one tick and the start of the next
    pub fn new(printers: Vec<PrinterConfig>, services: Services, interval: Duration) -> Self {
        Self {
            monitors: printers.into_iter().map(PrinterMonitor::new).collect(),
            services,
            interval,
        }
    }

    pub fn monitors(&self) -> &[PrinterMonitor] {
        &self.monitors
    }

    /// Run one cycle on every printer, in order.
    pub fn tick(&mut self) -> Vec<CycleReport> {
        let services = &mut self.services;
        self.monitors
            .iter_mut()
            .map(|monitor| monitor.run_cycle(services))
            .collect()
    }

    /// Tick until `shutdown` receives a message or its sender is dropped.
    ///
    /// The wait between ticks is interrupted by shutdown; a tick already in progress is
    /// always completed. Returns the number of ticks run.
    pub fn run(&mut self, shutdown: &Receiver<()>) -> u64 {
        info!(
            "Monitoring {} printer(s) every {:?}",
            self.monitors.len(),
            self.interval
        );

        let mut ticks = 0;
        loop {
            let reports = self.tick();
            ticks += 1;

            let alerts = reports.iter().filter(|r| r.alert_sent).count();
            debug!("Tick {} complete, {} alert(s) sent", ticks, alerts);

            match shutdown.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    info!("Shutdown requested, stopping after {} tick(s)", ticks);
                    return ticks;
                }
            }
        }
    }
}
