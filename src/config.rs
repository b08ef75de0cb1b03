use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// A single monitored printer.
///
/// Immutable for the lifetime of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct PrinterConfig {
    /// Human readable identity used in logs.
    pub label: String,

    /// Status endpoint queried every tick.
    pub status_url: String,

    /// Camera endpoint returning the current frame as raw image bytes.
    pub camera_url: String,

    /// Webhook receiving failure alerts for this printer.
    pub webhook_url: String,

    /// Detections must exceed this confidence to count as a failure.
    pub min_confidence: f32,

    /// Flip annotated frames vertically before saving them.
    pub flip_image: bool,
}

/// Printer entry as written in the printers file.
#[derive(Debug, Deserialize)]
struct PrinterEntry {
    label: String,
    status_url: String,
    camera_url: String,
    webhook_url: String,
    #[serde(default)]
    min_confidence: Option<f32>,
    #[serde(default)]
    flip_image: bool,
}

/// Configuration for the monitoring service loaded from environment variables.
///
/// Values are loaded once at startup; there is no hot reload.
#[derive(Debug, Clone)]
pub struct Config {
    /// Printers in the order they are checked on every tick.
    /// Environment variable: `PRINTERS_FILE`, or the single-printer variables
    /// `PRINTER_LABEL`, `STATUS_URL`, `CAMERA_URL`, `WEBHOOK_URL`, `FLIP_IMAGE`.
    pub printers: Vec<PrinterConfig>,

    /// Shared failure detection endpoint.
    /// Environment variable: `DETECTOR_URL`
    pub detector_url: String,

    /// Default minimum confidence for printers that do not override it.
    /// Environment variable: `CONFIDENCE_THRESHOLD`
    pub confidence_threshold: f32,

    /// Delay between the end of one tick and the start of the next.
    /// Environment variable: `POLL_INTERVAL_SECONDS`
    pub poll_interval: Duration,

    /// Timeout applied to every outbound HTTP call.
    /// Environment variable: `HTTP_TIMEOUT_SECONDS`
    pub http_timeout: Duration,

    /// JSON pointer to the "currently printing" boolean in the status document.
    /// Environment variable: `STATUS_PRINTING_POINTER`
    pub printing_pointer: String,

    /// Address the snapshot server binds to.
    /// Environment variables: `LISTEN_ADDRESS`, `LISTEN_PORT`
    pub listen_addr: SocketAddr,

    /// Externally reachable base URL embedded in alert payloads.
    /// Environment variable: `PUBLIC_BASE_URL`
    pub public_base_url: String,

    /// Directory annotated snapshots are written to and served from.
    /// Environment variable: `SNAPSHOT_DIR`
    pub snapshot_dir: PathBuf,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Config::from_lookup`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a value cannot be parsed or
    /// is out of range, or the printers file is unreadable, malformed, empty or contains
    /// duplicate labels.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let detector_url = required(&lookup, "DETECTOR_URL")?;

        let confidence_threshold: f32 =
            parse_or(&lookup, "CONFIDENCE_THRESHOLD", defaults::CONFIDENCE_THRESHOLD)?;
        check_confidence("CONFIDENCE_THRESHOLD", confidence_threshold)?;

        let poll_interval = positive_seconds(
            &lookup,
            "POLL_INTERVAL_SECONDS",
            defaults::POLL_INTERVAL_SECONDS,
        )?;
        let http_timeout = positive_seconds(
            &lookup,
            "HTTP_TIMEOUT_SECONDS",
            defaults::HTTP_TIMEOUT_SECONDS,
        )?;

        let printing_pointer = lookup("STATUS_PRINTING_POINTER")
            .unwrap_or_else(|| defaults::PRINTING_POINTER.to_string());
        if !printing_pointer.starts_with('/') {
            return Err(ConfigError::invalid(
                "STATUS_PRINTING_POINTER",
                &printing_pointer,
                "a JSON pointer must start with '/'",
            ));
        }

        let port: u16 = parse_or(&lookup, "LISTEN_PORT", defaults::LISTEN_PORT)?;
        let address =
            lookup("LISTEN_ADDRESS").unwrap_or_else(|| defaults::LISTEN_ADDRESS.to_string());
        let listen_addr = format!("{}:{}", address, port)
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("LISTEN_ADDRESS", &address, e))?;

        let public_base_url = lookup("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        let snapshot_dir = PathBuf::from(
            lookup("SNAPSHOT_DIR").unwrap_or_else(|| defaults::SNAPSHOT_DIR.to_string()),
        );

        let printers = match lookup("PRINTERS_FILE") {
            Some(path) => load_printers_file(Path::new(&path), confidence_threshold)?,
            None => vec![single_printer(&lookup, confidence_threshold)?],
        };
        validate_printers(&printers)?;

        Ok(Config {
            printers,
            detector_url,
            confidence_threshold,
            poll_interval,
            http_timeout,
            printing_pointer,
            listen_addr,
            public_base_url,
            snapshot_dir,
        })
    }
}

/// Parse a JSON printer list, filling missing thresholds with `default_confidence`.
///
/// # Errors
///
/// Returns the JSON error if the document is not a printer list.
pub fn parse_printers(
    json: &str,
    default_confidence: f32,
) -> Result<Vec<PrinterConfig>, serde_json::Error> {
    let entries: Vec<PrinterEntry> = serde_json::from_str(json)?;
    Ok(entries
        .into_iter()
        .map(|entry| PrinterConfig {
            label: entry.label,
            status_url: entry.status_url,
            camera_url: entry.camera_url,
            webhook_url: entry.webhook_url,
            min_confidence: entry.min_confidence.unwrap_or(default_confidence),
            flip_image: entry.flip_image,
        })
        .collect())
}

fn load_printers_file(
    path: &Path,
    default_confidence: f32,
) -> Result<Vec<PrinterConfig>, ConfigError> {
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_printers(&json, default_confidence).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn single_printer<F>(lookup: &F, default_confidence: f32) -> Result<PrinterConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(PrinterConfig {
        label: lookup("PRINTER_LABEL").unwrap_or_else(|| "printer".to_string()),
        status_url: required(lookup, "STATUS_URL")?,
        camera_url: required(lookup, "CAMERA_URL")?,
        webhook_url: required(lookup, "WEBHOOK_URL")?,
        min_confidence: default_confidence,
        flip_image: parse_or(lookup, "FLIP_IMAGE", false)?,
    })
}

fn validate_printers(printers: &[PrinterConfig]) -> Result<(), ConfigError> {
    if printers.is_empty() {
        return Err(ConfigError::NoPrinters);
    }

    let mut labels = HashSet::new();
    for printer in printers {
        check_confidence(&format!("{}.min_confidence", printer.label), printer.min_confidence)?;
        if !labels.insert(printer.label.as_str()) {
            return Err(ConfigError::DuplicateLabel(printer.label.clone()));
        }
    }

    Ok(())
}

fn check_confidence(field: &str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, &value.to_string(), "must be between 0 and 1"))
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::invalid(key, &raw, e)),
        None => Ok(default),
    }
}

fn positive_seconds<F>(lookup: &F, key: &str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let seconds: u64 = parse_or(lookup, key, default)?;
    if seconds == 0 {
        return Err(ConfigError::invalid(key, "0", "must be greater than zero"));
    }
    Ok(Duration::from_secs(seconds))
}

/// Default values for optional settings.
pub mod defaults {
    pub const CONFIDENCE_THRESHOLD: f32 = 0.5;
    pub const POLL_INTERVAL_SECONDS: u64 = 10;
    pub const HTTP_TIMEOUT_SECONDS: u64 = 10;
    /// OctoPrint's `/api/printer` layout.
    pub const PRINTING_POINTER: &str = "/state/flags/printing";
    pub const LISTEN_ADDRESS: &str = "0.0.0.0";
    pub const LISTEN_PORT: u16 = 8080;
    pub const SNAPSHOT_DIR: &str = "./snapshots";
}

/// Application constants used throughout the system.
pub mod constants {
    /// Path the snapshot server mounts the snapshot directory under.
    pub const SNAPSHOT_MOUNT: &str = "/snapshots";

    /// Detection label that denotes a print failure.
    pub const FAILURE_LABEL: &str = "failure";
}
