use reqwest::blocking::Client;
use serde::Deserialize;

use crate::config::constants::FAILURE_LABEL;
use crate::error::ClientError;
use crate::http;

/// Remote print failure classifier.
pub trait Detect {
    /// Submit a camera snapshot reference and return the detections found in it.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] on transport failure, non-success status or a malformed
    /// response body.
    fn detect(&self, camera_url: &str) -> Result<Vec<Detection>, ClientError>;
}

/// Print failure detection client for a remote inference service.
///
/// The service fetches the snapshot itself; this client only passes the camera URL
/// along as the `img` query parameter and parses the detections it returns.
pub struct FailureDetector {
    client: Client,
    detection_url: String,
}

#[derive(Debug, Deserialize)]
struct DetectionResponse {
    #[serde(default)]
    detections: Vec<Detection>,
}

impl FailureDetector {
    /// Create a new FailureDetector.
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client
    /// * `detection_url` - Inference endpoint (e.g., "http://ml-api:3333/p/")
    pub fn new(client: Client, detection_url: String) -> Self {
        Self {
            client,
            detection_url,
        }
    }

    /// Parse an inference response body.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the body is not `{"detections": [[label, confidence, [x, y, w, h]], ...]}`.
    pub fn parse_detections(body: &str) -> Result<Vec<Detection>, serde_json::Error> {
        let response: DetectionResponse = serde_json::from_str(body)?;
        Ok(response.detections)
    }
}

impl Detect for FailureDetector {
    fn detect(&self, camera_url: &str) -> Result<Vec<Detection>, ClientError> {
        let url = &self.detection_url;
        let response = self
            .client
            .get(url)
            .query(&[("img", camera_url)])
            .send()
            .map_err(|e| ClientError::transport(url, e))?;
        let body = http::require_success(url, response)?
            .text()
            .map_err(|e| ClientError::transport(url, e))?;

        Self::parse_detections(&body).map_err(|e| ClientError::parse(url, e))
    }
}

/// Bounding box in image pixel space, anchored at its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Represents a single detection result.
///
/// Deserialized from the wire tuple `[label, confidence, [center_x, center_y, width, height]]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "(String, f32, [f32; 4])")]
pub struct Detection {
    /// The detected class (`"failure"` for print failures).
    pub label: String,

    /// Confidence score from 0.0 to 1.0.
    pub confidence: f32,

    /// Bounding box coordinates and dimensions.
    pub bbox: BoundingBox,
}

impl From<(String, f32, [f32; 4])> for Detection {
    fn from((label, confidence, [x, y, w, h]): (String, f32, [f32; 4])) -> Self {
        Detection {
            label,
            confidence,
            bbox: BoundingBox { x, y, w, h },
        }
    }
}

impl Detection {
    pub fn new(label: &str, confidence: f32, bbox: [f32; 4]) -> Self {
        Detection::from((label.to_string(), confidence, bbox))
    }

    /// Get the bounding box center X coordinate.
    pub fn center_x(&self) -> f32 {
        self.bbox.x
    }

    /// Get the bounding box center Y coordinate.
    pub fn center_y(&self) -> f32 {
        self.bbox.y
    }

    /// Get the bounding box width.
    pub fn width(&self) -> f32 {
        self.bbox.w
    }

    /// Get the bounding box height.
    pub fn height(&self) -> f32 {
        self.bbox.h
    }

    /// Get the confidence as a percentage.
    pub fn confidence_percent(&self) -> f32 {
        self.confidence * 100.0
    }

    /// Whether this detection is labeled as a print failure.
    pub fn is_failure(&self) -> bool {
        self.label == FAILURE_LABEL
    }

    /// Check if this detection exceeds the specified confidence threshold.
    ///
    /// # Arguments
    ///
    /// * `threshold` - Confidence threshold to check against (0.0 to 1.0)
    pub fn exceeds_threshold(&self, threshold: f32) -> bool {
        self.confidence > threshold
    }

    /// A failure detection confident enough to count against the printer.
    pub fn is_qualifying_failure(&self, threshold: f32) -> bool {
        self.is_failure() && self.exceeds_threshold(threshold)
    }
}
