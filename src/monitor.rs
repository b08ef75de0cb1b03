//! Per-printer monitoring state machine.
//!
//! A [`PrinterMonitor`] moves between three phases:
//!
//! ```text
//!            printing                 qualifying failure (alert once)
//!   Idle ─────────────▶ PrintingOk ─────────────────────────────▶ PrintingFailed
//!    ▲                      ▲  ◀──────── no qualifying failure ───────┘  │
//!    └──── not printing ────┴────────────── not printing ────────────────┘
//! ```
//!
//! Alerts are edge-triggered: only the `PrintingOk → PrintingFailed` transition
//! annotates a snapshot and notifies, no matter how long the failure persists.

use log::{debug, error, info, warn};

use crate::alerts::{AlertEvent, Notify};
use crate::annotator::Annotate;
use crate::config::PrinterConfig;
use crate::detector::{Detect, Detection};
use crate::printer::PrinterStatus;
use crate::snapshot_store::SnapshotLinks;

/// Where a printer currently sits in its print lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrintPhase {
    #[default]
    Idle,
    PrintingOk,
    PrintingFailed,
}

impl PrintPhase {
    pub fn is_printing(self) -> bool {
        self != PrintPhase::Idle
    }

    /// Only reachable while printing.
    pub fn has_active_failure(self) -> bool {
        self == PrintPhase::PrintingFailed
    }
}

/// A state change produced by one step of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    PrintStarted,
    PrintStopped,
    FailureDetected,
    Recovered,
}

/// What happened to one printer during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Result of the status check.
    pub print: Transition,

    /// Result of the detection cycle, `None` when none ran.
    pub failure: Option<Transition>,

    /// Whether a failure alert was delivered this tick.
    pub alert_sent: bool,
}

/// The collaborators a monitor drives during a cycle.
pub struct Services {
    pub status: Box<dyn PrinterStatus>,
    pub detector: Box<dyn Detect>,
    pub annotator: Box<dyn Annotate>,
    pub notifier: Box<dyn Notify>,
    pub links: SnapshotLinks,
}

/// Monitors a single printer and exclusively owns its state.
#[derive(Debug)]
pub struct PrinterMonitor {
    printer: PrinterConfig,
    phase: PrintPhase,
}

impl PrinterMonitor {
    pub fn new(printer: PrinterConfig) -> Self {
        Self {
            printer,
            phase: PrintPhase::Idle,
        }
    }

    pub fn printer(&self) -> &PrinterConfig {
        &self.printer
    }

    pub fn phase(&self) -> PrintPhase {
        self.phase
    }

    pub fn is_printing(&self) -> bool {
        self.phase.is_printing()
    }

    pub fn has_active_failure(&self) -> bool {
        self.phase.has_active_failure()
    }

    /// Run one full cycle: a status check, then a detection cycle if printing.
    pub fn run_cycle(&mut self, services: &mut Services) -> CycleReport {
        let print = self.check_status(services.status.as_ref());
        if !self.is_printing() {
            return CycleReport {
                print,
                failure: None,
                alert_sent: false,
            };
        }

        let (failure, alert_sent) = self.run_detection_cycle(services);
        CycleReport {
            print,
            failure: Some(failure),
            alert_sent,
        }
    }

    /// Query the status endpoint and apply the result. Any error counts as not printing.
    pub fn check_status(&mut self, status: &dyn PrinterStatus) -> Transition {
        let printing = match status.is_printing(&self.printer) {
            Ok(printing) => printing,
            Err(e) => {
                warn!(
                    "[{}] Status check failed, treating as not printing: {}",
                    self.printer.label, e
                );
                false
            }
        };
        self.apply_print_state(printing)
    }

    /// Move between idle and printing. Stopping discards any active failure.
    pub fn apply_print_state(&mut self, printing: bool) -> Transition {
        match (self.phase, printing) {
            (PrintPhase::Idle, true) => {
                info!("[{}] Print started", self.printer.label);
                self.phase = PrintPhase::PrintingOk;
                Transition::PrintStarted
            }
            (PrintPhase::PrintingOk | PrintPhase::PrintingFailed, false) => {
                info!("[{}] Print stopped", self.printer.label);
                self.phase = PrintPhase::Idle;
                Transition::PrintStopped
            }
            _ => Transition::Unchanged,
        }
    }

    /// Ask the detector about the current frame and alert on a new failure episode.
    ///
    /// Returns the failure transition and whether an alert was delivered. A detector
    /// error leaves the state unchanged.
    pub fn run_detection_cycle(&mut self, services: &mut Services) -> (Transition, bool) {
        let detections = match services.detector.detect(&self.printer.camera_url) {
            Ok(detections) => detections,
            Err(e) => {
                warn!(
                    "[{}] Detection failed, skipping this cycle: {}",
                    self.printer.label, e
                );
                return (Transition::Unchanged, false);
            }
        };

        let transition = self.apply_detections(&detections);
        let alert_sent = transition == Transition::FailureDetected
            && self.raise_alert(services, &detections);
        (transition, alert_sent)
    }

    /// Apply one cycle's detections to the state. Only meaningful while printing.
    pub fn apply_detections(&mut self, detections: &[Detection]) -> Transition {
        if !self.is_printing() {
            return Transition::Unchanged;
        }

        let threshold = self.printer.min_confidence;
        let qualifying: Vec<&Detection> = detections
            .iter()
            .filter(|d| d.is_qualifying_failure(threshold))
            .collect();

        let max_confidence = detections
            .iter()
            .filter(|d| d.is_failure())
            .map(Detection::confidence_percent)
            .fold(0.0_f32, f32::max);
        debug!(
            "[{}] {} detection(s), {} qualifying, max failure confidence {:.2}%",
            self.printer.label,
            detections.len(),
            qualifying.len(),
            max_confidence
        );

        match (self.phase, qualifying.is_empty()) {
            (PrintPhase::PrintingOk, false) => {
                for detection in &qualifying {
                    warn!(
                        "[{}] Detected print failure with {:.2}% confidence at x: {:.1}, y: {:.1}, w: {:.1}, h: {:.1}",
                        self.printer.label,
                        detection.confidence_percent(),
                        detection.center_x(),
                        detection.center_y(),
                        detection.width(),
                        detection.height()
                    );
                }
                self.phase = PrintPhase::PrintingFailed;
                Transition::FailureDetected
            }
            (PrintPhase::PrintingFailed, true) => {
                info!("[{}] Recovered from failure", self.printer.label);
                self.phase = PrintPhase::PrintingOk;
                Transition::Recovered
            }
            (PrintPhase::PrintingFailed, false) => {
                debug!("[{}] Failure persists, alert already raised", self.printer.label);
                Transition::Unchanged
            }
            _ => Transition::Unchanged,
        }
    }

    /// Annotate the frame and notify the webhook. Failures abandon the alert for this
    /// episode; the state is not rolled back.
    fn raise_alert(&self, services: &mut Services, detections: &[Detection]) -> bool {
        let snapshot = match services.annotator.annotate(&self.printer, detections) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(
                    "[{}] Failed to annotate snapshot, no alert sent: {}",
                    self.printer.label, e
                );
                return false;
            }
        };

        let event = AlertEvent::print_failure(services.links.url_for(&snapshot.file_name));
        match services.notifier.notify(&self.printer.webhook_url, &event) {
            Ok(()) => {
                info!(
                    "[{}] Sent print failure alert with image {}",
                    self.printer.label, event.image
                );
                true
            }
            Err(e) => {
                error!(
                    "[{}] Failed to send print failure alert: {}",
                    self.printer.label, e
                );
                false
            }
        }
    }
}
