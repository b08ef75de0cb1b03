mod common;

use common::{Harness, failure, printer};
use print_watch::{AlertKind, Detection, PrintPhase, PrinterMonitor, Services, Transition};

fn assert_invariant(monitor: &PrinterMonitor) {
    if !monitor.is_printing() {
        assert!(
            !monitor.has_active_failure(),
            "active failure while not printing"
        );
    }
}

fn cycle(monitor: &mut PrinterMonitor, services: &mut Services) {
    monitor.run_cycle(services);
    assert_invariant(monitor);
}

#[test]
fn test_monitor_starts_idle() {
    let monitor = PrinterMonitor::new(printer("mk4", 0.5));
    assert_eq!(monitor.phase(), PrintPhase::Idle);
    assert!(!monitor.is_printing());
    assert!(!monitor.has_active_failure());
}

#[test]
fn test_no_detection_while_idle() {
    let harness = Harness::default();
    let mut services = harness.services();
    let mut monitor = PrinterMonitor::new(printer("mk4", 0.5));
    harness
        .detector
        .set_detections(&monitor.printer().camera_url, vec![failure(0.9)]);

    let report = monitor.run_cycle(&mut services);

    assert_eq!(report.print, Transition::Unchanged);
    assert_eq!(report.failure, None);
    assert_eq!(harness.detector.call_count(), 0);
    assert_eq!(monitor.phase(), PrintPhase::Idle);
}

#[test]
fn test_print_started_and_stopped() {
    let harness = Harness::default();
    let mut services = harness.services();
    let mut monitor = PrinterMonitor::new(printer("mk4", 0.5));

    harness.status.set_printing("mk4", true);
    let report = monitor.run_cycle(&mut services);
    assert_eq!(report.print, Transition::PrintStarted);
    assert_eq!(report.failure, Some(Transition::Unchanged));
    assert_eq!(monitor.phase(), PrintPhase::PrintingOk);

    let report = monitor.run_cycle(&mut services);
    assert_eq!(report.print, Transition::Unchanged);

    harness.status.set_printing("mk4", false);
    let report = monitor.run_cycle(&mut services);
    assert_eq!(report.print, Transition::PrintStopped);
    assert_eq!(report.failure, None);
    assert_eq!(monitor.phase(), PrintPhase::Idle);
}

#[test]
fn test_contiguous_failures_alert_once() {
    let harness = Harness::default();
    let mut services = harness.services();
    let mut monitor = PrinterMonitor::new(printer("mk4", 0.5));
    let camera = monitor.printer().camera_url.clone();
    harness.status.set_printing("mk4", true);

    let mut alert_cycles = Vec::new();
    for n in 1..=8 {
        if (2..=5).contains(&n) {
            harness.detector.set_detections(&camera, vec![failure(0.9)]);
        } else {
            harness.detector.clear(&camera);
        }

        let report = monitor.run_cycle(&mut services);
        assert_invariant(&monitor);
        if report.alert_sent {
            alert_cycles.push(n);
        }

        match n {
            2 => assert_eq!(report.failure, Some(Transition::FailureDetected)),
            3..=5 => assert_eq!(report.failure, Some(Transition::Unchanged)),
            6 => assert_eq!(report.failure, Some(Transition::Recovered)),
            _ => {}
        }
    }

    assert_eq!(alert_cycles, vec![2]);
    assert_eq!(harness.notifier.sent_count(), 1);
    assert_eq!(harness.annotator.call_count(), 1);
    assert_eq!(monitor.phase(), PrintPhase::PrintingOk);
}

#[test]
fn test_detection_below_threshold_is_ignored() {
    let harness = Harness::default();
    let mut services = harness.services();
    let mut monitor = PrinterMonitor::new(printer("mk4", 0.6));
    harness.status.set_printing("mk4", true);
    harness.detector.set_detections(
        &monitor.printer().camera_url,
        vec![Detection::new("failure", 0.4, [10.0, 10.0, 20.0, 20.0])],
    );

    cycle(&mut monitor, &mut services);
    cycle(&mut monitor, &mut services);

    assert_eq!(monitor.phase(), PrintPhase::PrintingOk);
    assert_eq!(harness.notifier.sent_count(), 0);
}

#[test]
fn test_threshold_must_be_exceeded() {
    let mut monitor = PrinterMonitor::new(printer("mk4", 0.6));
    monitor.apply_print_state(true);

    assert_eq!(monitor.apply_detections(&[failure(0.6)]), Transition::Unchanged);
    assert_eq!(
        monitor.apply_detections(&[failure(0.61)]),
        Transition::FailureDetected
    );
}

#[test]
fn test_other_labels_never_trigger() {
    let mut monitor = PrinterMonitor::new(printer("mk4", 0.5));
    monitor.apply_print_state(true);

    let transition =
        monitor.apply_detections(&[Detection::new("nozzle", 0.99, [5.0, 5.0, 4.0, 4.0])]);

    assert_eq!(transition, Transition::Unchanged);
    assert_eq!(monitor.phase(), PrintPhase::PrintingOk);
}

#[test]
fn test_detections_ignored_while_idle() {
    let mut monitor = PrinterMonitor::new(printer("mk4", 0.5));
    assert_eq!(monitor.apply_detections(&[failure(0.9)]), Transition::Unchanged);
    assert_eq!(monitor.phase(), PrintPhase::Idle);
}

#[test]
fn test_stop_while_failed_clears_failure_and_new_episode_alerts_again() {
    let harness = Harness::default();
    let mut services = harness.services();
    let mut monitor = PrinterMonitor::new(printer("mk4", 0.5));
    let camera = monitor.printer().camera_url.clone();

    harness.status.set_printing("mk4", true);
    harness.detector.set_detections(&camera, vec![failure(0.9)]);
    cycle(&mut monitor, &mut services);
    assert_eq!(monitor.phase(), PrintPhase::PrintingFailed);

    harness.status.set_printing("mk4", false);
    let report = monitor.run_cycle(&mut services);
    assert_eq!(report.print, Transition::PrintStopped);
    assert_eq!(report.failure, None);
    assert!(!monitor.has_active_failure());

    harness.status.set_printing("mk4", true);
    let report = monitor.run_cycle(&mut services);
    assert_eq!(report.print, Transition::PrintStarted);
    assert_eq!(report.failure, Some(Transition::FailureDetected));
    assert!(report.alert_sent);

    assert_eq!(harness.notifier.sent_count(), 2);
}

#[test]
fn test_status_error_counts_as_not_printing() {
    let harness = Harness::default();
    let mut services = harness.services();
    let mut monitor = PrinterMonitor::new(printer("mk4", 0.5));
    let camera = monitor.printer().camera_url.clone();

    harness.status.set_printing("mk4", true);
    harness.detector.set_detections(&camera, vec![failure(0.9)]);
    cycle(&mut monitor, &mut services);
    assert_eq!(monitor.phase(), PrintPhase::PrintingFailed);

    harness.status.set_failing("mk4", true);
    let report = monitor.run_cycle(&mut services);
    assert_eq!(report.print, Transition::PrintStopped);
    assert_eq!(report.failure, None);
    assert_eq!(monitor.phase(), PrintPhase::Idle);
    assert_eq!(harness.detector.call_count(), 1);
}

#[test]
fn test_detector_error_leaves_state_unchanged() {
    let harness = Harness::default();
    let mut services = harness.services();
    let mut monitor = PrinterMonitor::new(printer("mk4", 0.5));
    let camera = monitor.printer().camera_url.clone();
    harness.status.set_printing("mk4", true);

    harness.detector.set_failing(true);
    let report = monitor.run_cycle(&mut services);
    assert_eq!(report.failure, Some(Transition::Unchanged));
    assert_eq!(monitor.phase(), PrintPhase::PrintingOk);

    harness.detector.set_failing(false);
    harness.detector.set_detections(&camera, vec![failure(0.9)]);
    cycle(&mut monitor, &mut services);
    assert_eq!(monitor.phase(), PrintPhase::PrintingFailed);

    // An error while failed must not read as a recovery.
    harness.detector.set_failing(true);
    let report = monitor.run_cycle(&mut services);
    assert_eq!(report.failure, Some(Transition::Unchanged));
    assert_eq!(monitor.phase(), PrintPhase::PrintingFailed);
    assert_eq!(harness.notifier.sent_count(), 1);
}

#[test]
fn test_annotation_failure_still_enters_failed_without_retry() {
    let harness = Harness::default();
    let mut services = harness.services();
    let mut monitor = PrinterMonitor::new(printer("mk4", 0.5));
    harness.status.set_printing("mk4", true);
    harness
        .detector
        .set_detections(&monitor.printer().camera_url, vec![failure(0.9)]);
    harness.annotator.set_failing(true);

    let report = monitor.run_cycle(&mut services);
    assert_eq!(report.failure, Some(Transition::FailureDetected));
    assert!(!report.alert_sent);
    assert_eq!(monitor.phase(), PrintPhase::PrintingFailed);

    harness.annotator.set_failing(false);
    cycle(&mut monitor, &mut services);
    cycle(&mut monitor, &mut services);

    assert_eq!(harness.annotator.call_count(), 1);
    assert_eq!(harness.notifier.attempts.get(), 0);
}

#[test]
fn test_notification_failure_is_not_resent() {
    let harness = Harness::default();
    let mut services = harness.services();
    let mut monitor = PrinterMonitor::new(printer("mk4", 0.5));
    harness.status.set_printing("mk4", true);
    harness
        .detector
        .set_detections(&monitor.printer().camera_url, vec![failure(0.9)]);
    harness.notifier.set_failing(true);

    let report = monitor.run_cycle(&mut services);
    assert!(!report.alert_sent);
    assert_eq!(monitor.phase(), PrintPhase::PrintingFailed);

    harness.notifier.set_failing(false);
    cycle(&mut monitor, &mut services);

    assert_eq!(harness.notifier.attempts.get(), 1);
    assert_eq!(harness.notifier.sent_count(), 0);
}

#[test]
fn test_annotator_receives_full_detection_set() {
    let harness = Harness::default();
    let mut services = harness.services();
    let mut monitor = PrinterMonitor::new(printer("mk4", 0.5));
    let detections = vec![
        failure(0.9),
        Detection::new("failure", 0.2, [50.0, 50.0, 10.0, 10.0]),
        Detection::new("nozzle", 0.8, [5.0, 5.0, 4.0, 4.0]),
    ];
    harness.status.set_printing("mk4", true);
    harness
        .detector
        .set_detections(&monitor.printer().camera_url, detections.clone());

    cycle(&mut monitor, &mut services);

    let calls = harness.annotator.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "mk4");
    assert_eq!(calls[0].1, detections);
}

#[test]
fn test_alert_event_points_at_public_snapshot_url() {
    let harness = Harness::default();
    let mut services = harness.services();
    let mut monitor = PrinterMonitor::new(printer("mk4", 0.5));
    harness.status.set_printing("mk4", true);
    harness
        .detector
        .set_detections(&monitor.printer().camera_url, vec![failure(0.9)]);

    cycle(&mut monitor, &mut services);

    let sent = harness.notifier.sent.borrow();
    assert_eq!(sent.len(), 1);
    let (webhook, event) = &sent[0];
    assert_eq!(webhook, "http://hooks.local/mk4");
    assert_eq!(event.message, AlertKind::PrintFailure);
    assert_eq!(
        event.image,
        "http://watch.local:8080/snapshots/1700000000001.jpg"
    );
}
