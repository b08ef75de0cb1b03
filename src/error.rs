//! Error types for the print monitoring system.
//!
//! The split mirrors how each failure is handled: [`ClientError`] always degrades to a
//! safe default inside the monitor, [`AnnotationError`] and [`NotificationError`] only
//! abort the alert side effect, and [`ConfigError`] is fatal at startup.

use std::path::PathBuf;

/// Errors raised when calling a remote endpoint (status, detector, camera, webhook).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced a response (DNS, connection, timeout).
    #[error("request to '{url}' failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-success status code.
    #[error("'{url}' responded with HTTP {status}")]
    Status { url: String, status: u16 },

    /// The response body could not be interpreted.
    #[error("malformed response from '{url}': {reason}")]
    Parse { url: String, reason: String },
}

impl ClientError {
    pub(crate) fn transport(url: &str, source: reqwest::Error) -> Self {
        ClientError::Transport {
            url: url.to_string(),
            source,
        }
    }

    pub(crate) fn parse(url: &str, reason: impl ToString) -> Self {
        ClientError::Parse {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised while producing an annotated snapshot.
#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    /// The camera frame could not be fetched.
    #[error("failed to fetch camera frame: {0}")]
    Fetch(#[from] ClientError),

    /// The frame could not be decoded or the annotated image could not be encoded.
    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    /// The annotated image could not be written to the snapshot directory.
    #[error("failed to write snapshot '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised when delivering an alert to a webhook.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("alert delivery failed: {0}")]
    Delivery(#[from] ClientError),
}

/// Errors related to configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("required environment variable '{0}' is not set")]
    MissingVar(String),

    /// A value could not be parsed or is out of range.
    #[error("invalid value '{value}' for '{field}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// The printers file could not be read.
    #[error("failed to read printers file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The printers file is not a valid printer list.
    #[error("invalid printers file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No printers were configured.
    #[error("no printers configured")]
    NoPrinters,

    /// Two printers share the same label.
    #[error("duplicate printer label '{0}'")]
    DuplicateLabel(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, value: &str, reason: impl ToString) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
