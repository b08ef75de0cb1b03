//! Print Watch - 3D print failure monitoring with edge-triggered alerts.
//!
//! Polls each configured printer's status endpoint, submits camera snapshots of active
//! prints to a remote failure detector and, the first time a failure shows up in a print,
//! posts an alert with an annotated snapshot to the printer's webhook.
//!
//! # Core Components
//!
//! * [`monitor`] - Per-printer state machine deciding when to alert
//! * [`scheduler`] - Fixed-interval loop running every printer's cycle in order
//! * [`config`] - Configuration loaded from environment variables
//! * [`printer`] - Printer status endpoint client
//! * [`detector`] - Remote failure detection client
//! * [`annotator`] - Camera frame annotation and snapshot persistence
//! * [`alerts`] - Webhook notifications
//! * [`snapshot_store`] - Snapshot directory lifecycle and public URLs
//! * [`server`] - HTTP server exposing stored snapshots
//! * [`error`] - Error types
//!
//! # Quick Start
//!
//! ```no_run
//! use print_watch::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let client = http::build_client(config.http_timeout)?;
//! let snapshots = SnapshotDir::acquire(&config.snapshot_dir)?;
//!
//! let services = Services {
//!     status: Box::new(PrinterService::new(client.clone(), config.printing_pointer.clone())),
//!     detector: Box::new(FailureDetector::new(client.clone(), config.detector_url.clone())),
//!     annotator: Box::new(SnapshotAnnotator::new(client.clone(), snapshots.path().to_path_buf())),
//!     notifier: Box::new(AlertService::new(client)),
//!     links: SnapshotLinks::new(&config.public_base_url, config::constants::SNAPSHOT_MOUNT),
//! };
//! let mut scheduler = MonitorScheduler::new(config.printers.clone(), services, config.poll_interval);
//! scheduler.tick();
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod annotator;
pub mod config;
pub mod detector;
pub mod error;
pub mod http;
pub mod monitor;
pub mod printer;
pub mod scheduler;
pub mod server;
pub mod snapshot_store;

// Re-export commonly used types for convenience
pub use alerts::{AlertEvent, AlertKind, AlertService, Notify};
pub use annotator::{Annotate, AnnotatedSnapshot, SnapshotAnnotator};
pub use config::{Config, PrinterConfig};
pub use detector::{BoundingBox, Detect, Detection, FailureDetector};
pub use error::{AnnotationError, ClientError, ConfigError, NotificationError};
pub use monitor::{CycleReport, PrintPhase, PrinterMonitor, Services, Transition};
pub use printer::{PrinterService, PrinterStatus};
pub use scheduler::MonitorScheduler;
pub use server::SnapshotServer;
pub use snapshot_store::{SnapshotDir, SnapshotLinks};
