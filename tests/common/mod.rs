#![allow(dead_code)]
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::PathBuf;
use std::rc::Rc;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use print_watch::{
    AlertEvent, Annotate, AnnotatedSnapshot, AnnotationError, ClientError, Detect, Detection,
    NotificationError, Notify, PrinterConfig, PrinterStatus, Services, SnapshotLinks,
};

pub const PUBLIC_BASE: &str = "http://watch.local:8080";

pub fn printer(label: &str, min_confidence: f32) -> PrinterConfig {
    PrinterConfig {
        label: label.to_string(),
        status_url: format!("http://{}/api/printer", label),
        camera_url: format!("http://{}/webcam/snapshot", label),
        webhook_url: format!("http://hooks.local/{}", label),
        min_confidence,
        flip_image: false,
    }
}

pub fn failure(confidence: f32) -> Detection {
    Detection::new("failure", confidence, [10.0, 10.0, 20.0, 20.0])
}

fn fake_error(url: &str) -> ClientError {
    ClientError::Parse {
        url: url.to_string(),
        reason: "scripted failure".to_string(),
    }
}

/// Status endpoint answering from a per-label table. Unknown labels are not printing.
#[derive(Clone, Default)]
pub struct FakeStatus {
    printing: Rc<RefCell<HashMap<String, bool>>>,
    failing: Rc<RefCell<HashSet<String>>>,
    pub calls: Rc<RefCell<Vec<String>>>,
}

impl FakeStatus {
    pub fn set_printing(&self, label: &str, printing: bool) {
        self.printing.borrow_mut().insert(label.to_string(), printing);
    }

    pub fn set_failing(&self, label: &str, failing: bool) {
        if failing {
            self.failing.borrow_mut().insert(label.to_string());
        } else {
            self.failing.borrow_mut().remove(label);
        }
    }
}

impl PrinterStatus for FakeStatus {
    fn is_printing(&self, printer: &PrinterConfig) -> Result<bool, ClientError> {
        self.calls.borrow_mut().push(printer.label.clone());
        if self.failing.borrow().contains(&printer.label) {
            return Err(fake_error(&printer.status_url));
        }
        Ok(self
            .printing
            .borrow()
            .get(&printer.label)
            .copied()
            .unwrap_or(false))
    }
}

/// Detector returning the detections currently set for a camera URL.
#[derive(Clone, Default)]
pub struct FakeDetector {
    detections: Rc<RefCell<HashMap<String, Vec<Detection>>>>,
    failing: Rc<Cell<bool>>,
    pub calls: Rc<RefCell<Vec<String>>>,
}

impl FakeDetector {
    pub fn set_detections(&self, camera_url: &str, detections: Vec<Detection>) {
        self.detections
            .borrow_mut()
            .insert(camera_url.to_string(), detections);
    }

    pub fn clear(&self, camera_url: &str) {
        self.detections.borrow_mut().remove(camera_url);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Detect for FakeDetector {
    fn detect(&self, camera_url: &str) -> Result<Vec<Detection>, ClientError> {
        self.calls.borrow_mut().push(camera_url.to_string());
        if self.failing.get() {
            return Err(fake_error(camera_url));
        }
        Ok(self
            .detections
            .borrow()
            .get(camera_url)
            .cloned()
            .unwrap_or_default())
    }
}

/// Annotator that records its inputs and hands out sequential file names.
#[derive(Clone, Default)]
pub struct FakeAnnotator {
    failing: Rc<Cell<bool>>,
    pub calls: Rc<RefCell<Vec<(String, Vec<Detection>)>>>,
}

impl FakeAnnotator {
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Annotate for FakeAnnotator {
    fn annotate(
        &mut self,
        printer: &PrinterConfig,
        detections: &[Detection],
    ) -> Result<AnnotatedSnapshot, AnnotationError> {
        self.calls
            .borrow_mut()
            .push((printer.label.clone(), detections.to_vec()));
        if self.failing.get() {
            return Err(AnnotationError::Fetch(fake_error(&printer.camera_url)));
        }

        let file_name = format!("{}.jpg", 1_700_000_000_000_u64 + self.call_count() as u64);
        Ok(AnnotatedSnapshot {
            path: PathBuf::from("/tmp/snapshots").join(&file_name),
            file_name,
        })
    }
}

/// Notifier recording every delivered alert.
#[derive(Clone, Default)]
pub struct FakeNotifier {
    failing: Rc<Cell<bool>>,
    pub sent: Rc<RefCell<Vec<(String, AlertEvent)>>>,
    pub attempts: Rc<Cell<usize>>,
}

impl FakeNotifier {
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.borrow().len()
    }
}

impl Notify for FakeNotifier {
    fn notify(&self, webhook_url: &str, event: &AlertEvent) -> Result<(), NotificationError> {
        self.attempts.set(self.attempts.get() + 1);
        if self.failing.get() {
            return Err(NotificationError::Delivery(fake_error(webhook_url)));
        }
        self.sent
            .borrow_mut()
            .push((webhook_url.to_string(), event.clone()));
        Ok(())
    }
}

/// All fakes wired together; clones share state with the boxed copies in [`Services`].
#[derive(Clone, Default)]
pub struct Harness {
    pub status: FakeStatus,
    pub detector: FakeDetector,
    pub annotator: FakeAnnotator,
    pub notifier: FakeNotifier,
}

impl Harness {
    pub fn services(&self) -> Services {
        Services {
            status: Box::new(self.status.clone()),
            detector: Box::new(self.detector.clone()),
            annotator: Box::new(self.annotator.clone()),
            notifier: Box::new(self.notifier.clone()),
            links: SnapshotLinks::new(PUBLIC_BASE, "/snapshots"),
        }
    }
}

/// A solid black PNG frame.
pub fn png_frame(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .expect("encode png");
    buffer
}
