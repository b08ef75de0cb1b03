use log::warn;
use reqwest::blocking::Client;
use serde::Serialize;

use crate::error::{ClientError, NotificationError};

/// Kind of alert carried in the webhook payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertKind {
    PrintFailure,
}

/// Webhook payload: `{"message": "PrintFailure", "image": "<url>"}`.
///
/// Built once per failure episode and dropped after dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub message: AlertKind,
    pub image: String,
}

impl AlertEvent {
    pub fn print_failure(image_url: String) -> Self {
        Self {
            message: AlertKind::PrintFailure,
            image: image_url,
        }
    }
}

/// Delivers alerts to an external webhook.
pub trait Notify {
    /// # Errors
    ///
    /// Returns a [`NotificationError`] if the request could not be delivered.
    fn notify(&self, webhook_url: &str, event: &AlertEvent) -> Result<(), NotificationError>;
}

/// Webhook alert service posting JSON alert events.
///
/// Delivery is fire-and-forget: once the request completes the alert counts as sent,
/// and a non-success response is only logged.
pub struct AlertService {
    client: Client,
}

impl AlertService {
    /// Create a new AlertService.
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Notify for AlertService {
    fn notify(&self, webhook_url: &str, event: &AlertEvent) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(webhook_url)
            .json(event)
            .send()
            .map_err(|e| ClientError::transport(webhook_url, e))?;

        if !response.status().is_success() {
            warn!(
                "Webhook {} answered alert with HTTP {}",
                webhook_url,
                response.status()
            );
        }

        Ok(())
    }
}
