use reqwest::blocking::Client;
use serde_json::Value;

use crate::config::PrinterConfig;
use crate::error::ClientError;
use crate::http;

/// Source of the "is this printer currently printing" signal.
pub trait PrinterStatus {
    /// Query the printer's status endpoint.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] on transport failure, non-success status or a status
    /// document without the printing flag. Callers treat every error as "not printing".
    fn is_printing(&self, printer: &PrinterConfig) -> Result<bool, ClientError>;
}

/// Printer status client for HTTP status endpoints.
///
/// Reduces the printer's status document to a single boolean found at a configurable
/// JSON pointer (OctoPrint's `/state/flags/printing` by default).
pub struct PrinterService {
    client: Client,
    printing_pointer: String,
}

impl PrinterService {
    /// Create a new PrinterService.
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client
    /// * `printing_pointer` - JSON pointer to the printing flag (e.g., "/state/flags/printing")
    ///
    pub fn new(client: Client, printing_pointer: String) -> Self {
        Self {
            client,
            printing_pointer,
        }
    }

    /// Get the current printer status document.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The HTTP request fails
    /// - The status endpoint returns an error status
    /// - JSON parsing fails
    pub fn get_printer_status(&self, status_url: &str) -> Result<Value, ClientError> {
        let body = http::get_text(&self.client, status_url)?;
        serde_json::from_str(&body).map_err(|e| ClientError::parse(status_url, e))
    }

    /// Extract the printing flag from a status document.
    pub fn printing_flag(&self, status: &Value) -> Option<bool> {
        status.pointer(&self.printing_pointer).and_then(Value::as_bool)
    }
}

impl PrinterStatus for PrinterService {
    fn is_printing(&self, printer: &PrinterConfig) -> Result<bool, ClientError> {
        let status = self.get_printer_status(&printer.status_url)?;
        self.printing_flag(&status).ok_or_else(|| {
            ClientError::parse(
                &printer.status_url,
                format!("no boolean at '{}'", self.printing_pointer),
            )
        })
    }
}
