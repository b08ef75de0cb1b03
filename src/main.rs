use std::sync::mpsc;

use anyhow::{Context, Result};
use log::info;

use print_watch::config::constants::SNAPSHOT_MOUNT;
use print_watch::{
    AlertService, Config, FailureDetector, MonitorScheduler, PrinterService, Services,
    SnapshotAnnotator, SnapshotDir, SnapshotLinks, SnapshotServer, http,
};

/// Print Watch - 3D print failure monitoring with edge-triggered alerts.
///
/// Checks every configured printer once per tick. While a printer is printing, its
/// camera is submitted to the failure detector; the first qualifying failure of an
/// episode produces an annotated snapshot and a webhook alert linking to it. Alerts are
/// not repeated while the failure persists.
///
/// # Environment Variables
///
/// Required:
/// * `DETECTOR_URL` - Failure detection endpoint
/// * `PRINTERS_FILE` - JSON printer list, or for a single printer:
///   `STATUS_URL`, `CAMERA_URL` and `WEBHOOK_URL` (plus optional `PRINTER_LABEL`, `FLIP_IMAGE`)
///
/// Optional (with defaults):
/// * `CONFIDENCE_THRESHOLD` - Minimum failure confidence (default: "0.5")
/// * `POLL_INTERVAL_SECONDS` - Pause between ticks (default: "10")
/// * `HTTP_TIMEOUT_SECONDS` - Timeout for every outbound request (default: "10")
/// * `STATUS_PRINTING_POINTER` - JSON pointer to the printing flag (default: "/state/flags/printing")
/// * `LISTEN_ADDRESS` / `LISTEN_PORT` - Snapshot server bind address (default: "0.0.0.0:8080")
/// * `PUBLIC_BASE_URL` - Base URL embedded in alerts (default: "http://localhost:<port>")
/// * `SNAPSHOT_DIR` - Snapshot directory, emptied on exit (default: "./snapshots")
///
/// # Usage
///
/// ```bash
/// export DETECTOR_URL="http://ml-api:3333/p/"
/// export STATUS_URL="http://octopi.local/api/printer?apikey=..."
/// export CAMERA_URL="http://octopi.local/webcam/?action=snapshot"
/// export WEBHOOK_URL="https://hooks.example.com/print-alerts"
/// export PUBLIC_BASE_URL="http://192.168.1.20:8080"
/// ./print-watch
/// ```
fn main() -> Result<()> {
    // Initialize logger to output to stdout, using RUST_LOG env var or info level by default
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stdout)
        .filter_level(
            std::env::var("RUST_LOG")
                .ok()
                .and_then(|level| level.parse().ok())
                .unwrap_or(log::LevelFilter::Info),
        )
        .init();

    let config = Config::load().context(
        "Failed to load configuration. Please ensure all required environment variables are set.",
    )?;

    info!("Print Watch starting...");
    info!("Using failure detector: {}", config.detector_url);
    for printer in &config.printers {
        info!(
            "Monitoring printer '{}' (status: {}, camera: {}, min confidence: {:.2})",
            printer.label, printer.status_url, printer.camera_url, printer.min_confidence
        );
    }

    let client = http::build_client(config.http_timeout)?;

    let snapshots = SnapshotDir::acquire(&config.snapshot_dir).with_context(|| {
        format!(
            "Failed to prepare snapshot directory {}",
            config.snapshot_dir.display()
        )
    })?;

    let (termination_tx, termination_rx) = mpsc::channel();
    let server = SnapshotServer::start(
        config.listen_addr,
        SNAPSHOT_MOUNT,
        snapshots.path().to_path_buf(),
        Some(termination_tx),
    )?;

    let services = Services {
        status: Box::new(PrinterService::new(
            client.clone(),
            config.printing_pointer.clone(),
        )),
        detector: Box::new(FailureDetector::new(
            client.clone(),
            config.detector_url.clone(),
        )),
        annotator: Box::new(SnapshotAnnotator::new(
            client.clone(),
            snapshots.path().to_path_buf(),
        )),
        notifier: Box::new(AlertService::new(client)),
        links: SnapshotLinks::new(&config.public_base_url, SNAPSHOT_MOUNT),
    };

    let mut scheduler = MonitorScheduler::new(config.printers.clone(), services, config.poll_interval);

    info!("Print Watch initialized successfully. Starting monitoring loop...");
    scheduler.run(&termination_rx);

    let removed = snapshots
        .release()
        .context("Failed to empty snapshot directory")?;
    info!("Removed {} snapshot(s)", removed);

    server.shutdown()?;
    info!("Print Watch stopped");

    Ok(())
}
