use std::time::Duration;

use reqwest::blocking::{Client, Response};

use crate::error::ClientError;

/// Build the blocking HTTP client shared by every remote call.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

/// Send a GET request and require a success status.
pub(crate) fn get(client: &Client, url: &str) -> Result<Response, ClientError> {
    let response = client
        .get(url)
        .send()
        .map_err(|e| ClientError::transport(url, e))?;
    require_success(url, response)
}

/// GET `url` and return the body as text.
pub(crate) fn get_text(client: &Client, url: &str) -> Result<String, ClientError> {
    get(client, url)?
        .text()
        .map_err(|e| ClientError::transport(url, e))
}

/// GET `url` and return the raw body.
pub(crate) fn get_bytes(client: &Client, url: &str) -> Result<Vec<u8>, ClientError> {
    let data = get(client, url)?
        .bytes()
        .map_err(|e| ClientError::transport(url, e))?;
    Ok(data.to_vec())
}

/// Turn a non-success response into [`ClientError::Status`], passing others through.
pub(crate) fn require_success(url: &str, response: Response) -> Result<Response, ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    Ok(response)
}
