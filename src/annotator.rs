use std::io::Cursor;
use std::path::PathBuf;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use log::debug;
use reqwest::blocking::Client;

use crate::config::PrinterConfig;
use crate::detector::Detection;
use crate::error::AnnotationError;
use crate::http;

/// Box color drawn around failures.
const BOX_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

/// An annotated image persisted to the snapshot directory.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedSnapshot {
    /// Unique file name, servable by the snapshot server.
    pub file_name: String,

    /// Location on disk.
    pub path: PathBuf,
}

/// Produces annotated snapshots of a printer's camera.
pub trait Annotate {
    /// Fetch the printer's current frame, box every failure detection and persist it.
    ///
    /// # Errors
    ///
    /// Returns an [`AnnotationError`] if the frame cannot be fetched, decoded, encoded or
    /// written. Nothing is written on error.
    fn annotate(
        &mut self,
        printer: &PrinterConfig,
        detections: &[Detection],
    ) -> Result<AnnotatedSnapshot, AnnotationError>;
}

/// Snapshot annotator writing JPEG files named by a millisecond timestamp.
pub struct SnapshotAnnotator {
    client: Client,
    snapshot_dir: PathBuf,
    last_stamp: i64,
}

impl SnapshotAnnotator {
    /// Create a new SnapshotAnnotator.
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client used to fetch camera frames
    /// * `snapshot_dir` - Directory annotated images are written to
    pub fn new(client: Client, snapshot_dir: PathBuf) -> Self {
        Self {
            client,
            snapshot_dir,
            last_stamp: 0,
        }
    }

    /// Next file stamp: the current time in milliseconds, bumped past the previous stamp
    /// so two snapshots within the same millisecond never collide.
    fn next_stamp(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        self.last_stamp = now.max(self.last_stamp + 1);
        self.last_stamp
    }
}

impl Annotate for SnapshotAnnotator {
    fn annotate(
        &mut self,
        printer: &PrinterConfig,
        detections: &[Detection],
    ) -> Result<AnnotatedSnapshot, AnnotationError> {
        let frame = http::get_bytes(&self.client, &printer.camera_url)?;
        let encoded = render_annotations(&frame, detections, printer.flip_image)?;

        let file_name = format!("{}.jpg", self.next_stamp());
        let path = self.snapshot_dir.join(&file_name);
        std::fs::write(&path, &encoded).map_err(|source| AnnotationError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(
            "[{}] Wrote annotated snapshot {} ({} bytes)",
            printer.label,
            path.display(),
            encoded.len()
        );

        Ok(AnnotatedSnapshot { file_name, path })
    }
}

/// Decode a camera frame, box every failure detection, optionally flip the result and
/// encode it as JPEG.
///
/// # Arguments
///
/// * `frame` - Raw image bytes (JPEG, PNG, etc.)
/// * `detections` - Full detection set; only failure-labeled entries are drawn
/// * `flip_vertical` - Whether to flip the annotated frame vertically
///
/// # Errors
///
/// Returns an error if the frame cannot be decoded or the result cannot be encoded.
pub fn render_annotations(
    frame: &[u8],
    detections: &[Detection],
    flip_vertical: bool,
) -> Result<Vec<u8>, AnnotationError> {
    let rgb_image = annotate_frame(image::load_from_memory(frame)?, detections, flip_vertical);

    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(rgb_image)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)?;
    Ok(buffer)
}

/// Box failures on the frame as the detector saw it, then flip if requested.
///
/// Detection coordinates refer to the unflipped camera frame, so the flip has to come
/// last for the boxes to stay on the objects they surround.
pub fn annotate_frame(
    frame: DynamicImage,
    detections: &[Detection],
    flip_vertical: bool,
) -> RgbImage {
    let mut rgb_image = frame.to_rgb8();
    draw_failure_boxes(&mut rgb_image, detections);
    if flip_vertical {
        image::imageops::flip_vertical_in_place(&mut rgb_image);
    }
    rgb_image
}

/// Draw one hollow rectangle per failure detection, returning how many were drawn.
pub fn draw_failure_boxes(image: &mut RgbImage, detections: &[Detection]) -> usize {
    let (width, height) = image.dimensions();
    let rects = failure_rects(detections, width, height);
    for rect in &rects {
        draw_hollow_rect_mut(image, *rect, BOX_COLOR);
    }
    rects.len()
}

/// Rectangles for every detection labeled as a failure, regardless of confidence,
/// clipped to a `width` x `height` image.
///
/// The corner sits at `center - extent / 2`; sizes are at least one pixel. Boxes that
/// fall entirely outside the image, or have non-finite coordinates, are skipped.
pub fn failure_rects(detections: &[Detection], width: u32, height: u32) -> Vec<Rect> {
    detections
        .iter()
        .filter(|d| d.is_failure())
        .filter_map(|d| {
            let (left, right) = clip_span(d.center_x(), d.width(), width)?;
            let (top, bottom) = clip_span(d.center_y(), d.height(), height)?;
            Some(Rect::at(left as i32, top as i32).of_size(right - left, bottom - top))
        })
        .collect()
}

/// Clip the span of `extent` pixels centered on `center` to `[0, limit)`.
fn clip_span(center: f32, extent: f32, limit: u32) -> Option<(u32, u32)> {
    let extent = f64::from(extent).round().max(1.0);
    let start = (f64::from(center) - extent / 2.0).round();
    let end = start + extent;
    if !start.is_finite() || !end.is_finite() {
        return None;
    }

    let start = start.max(0.0);
    let end = end.min(f64::from(limit));
    if end <= start {
        return None;
    }
    Some((start as u32, end as u32))
}
