//! Integration tests for the update lifecycle coordinator.
//!
//! Drives the state machine the way the external executor would and verifies
//! phases, persistence, event fan-out, and the notification projection
//! against each other.

use chrono::{TimeZone, Utc};
use seamless_update::{
    ActionIndicator, EventBus, LifecycleEvent, NotificationProjection, NotificationSink,
    ProgressIndicator, ProgressSample, SettingsStore, Subscription, UpdateDescriptor,
    UpdateLifecycle, UpdatePhase,
};

fn descriptor(version: &str, date_secs: i64, changelog: &str) -> UpdateDescriptor {
    UpdateDescriptor::new(
        version,
        Utc.timestamp_opt(date_secs, 0).single().unwrap(),
        changelog,
    )
}

fn drain(sub: &mut Subscription) -> Vec<LifecycleEvent> {
    let mut events = Vec::new();
    while let Some(record) = sub.try_recv() {
        events.push(record.event);
    }
    events
}

/// Full happy path: check → download → install → done.
#[test]
fn test_full_update_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::open(dir.path().join("settings.json"));
    let lifecycle = UpdateLifecycle::new(store, EventBus::new());
    let mut sub = lifecycle.subscribe();

    lifecycle.report_check_result(true, Some(descriptor("2.0", 1000, "fix")));
    assert_eq!(lifecycle.snapshot().phase, UpdatePhase::Available);

    lifecycle.report_download_progress(ProgressSample::new(0, 1000));
    assert_eq!(lifecycle.snapshot().phase, UpdatePhase::Downloading);

    lifecycle.report_download_progress(ProgressSample::new(1000, 1000));
    assert_eq!(lifecycle.snapshot().phase, UpdatePhase::Downloading);

    lifecycle.report_install_progress(ProgressSample::new(50, 100));
    assert_eq!(lifecycle.snapshot().phase, UpdatePhase::Installing);

    lifecycle.report_install_complete();
    let snap = lifecycle.snapshot();
    assert_eq!(snap.phase, UpdatePhase::UpdateDone);
    assert!(snap.flags.waiting_for_reboot);
    assert!(snap.progress.is_none());

    let events = drain(&mut sub);
    assert_eq!(
        events,
        vec![
            LifecycleEvent::InfoAvailable(descriptor("2.0", 1000, "fix")),
            LifecycleEvent::DownloadProgress(ProgressSample::new(0, 1000)),
            LifecycleEvent::DownloadProgress(ProgressSample::new(1000, 1000)),
            LifecycleEvent::InstallProgress(ProgressSample::new(50, 100)),
            LifecycleEvent::Done,
        ]
    );
}

/// A no-update check from idle still emits and records the check time.
#[test]
fn test_check_not_found_from_idle() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::open(dir.path().join("settings.json"));
    let lifecycle = UpdateLifecycle::new(store, EventBus::new());
    let mut sub = lifecycle.subscribe();

    assert!(lifecycle.snapshot().flags.last_check.is_none());
    lifecycle.report_check_result(false, None);

    let snap = lifecycle.snapshot();
    assert_eq!(snap.phase, UpdatePhase::NotAvailable);
    assert!(snap.flags.last_check.is_some());
    assert_eq!(drain(&mut sub), vec![LifecycleEvent::NotAvailable]);
}

/// Failure mid-download resets the cycle without touching the reboot flag.
#[test]
fn test_failure_during_download() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::open(dir.path().join("settings.json"));
    let lifecycle = UpdateLifecycle::new(store, EventBus::new());

    lifecycle.report_check_result(true, Some(descriptor("2.0", 1000, "fix")));
    lifecycle.report_download_progress(ProgressSample::new(10, 1000));

    let mut sub = lifecycle.subscribe();
    let waiting_before = lifecycle.snapshot().flags.waiting_for_reboot;
    lifecycle.report_failure("network");

    let snap = lifecycle.snapshot();
    assert_eq!(snap.phase, UpdatePhase::NotAvailable);
    assert_eq!(snap.flags.waiting_for_reboot, waiting_before);
    assert_eq!(
        drain(&mut sub),
        vec![LifecycleEvent::Failed {
            reason: "network".to_string()
        }]
    );
}

/// The persisted document carries phase, flags, and descriptor across a
/// simulated process restart; observers re-sync from the snapshot.
#[test]
fn test_restart_resynchronizes_from_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");

    {
        let lifecycle = UpdateLifecycle::new(SettingsStore::open(&path), EventBus::new());
        lifecycle.report_check_result(true, Some(descriptor("2.0", 1000, "fix")));
        lifecycle.report_download_progress(ProgressSample::new(10, 1000));
        lifecycle.report_install_progress(ProgressSample::new(1, 100));
        lifecycle.report_install_complete();
    }

    let lifecycle = UpdateLifecycle::new(SettingsStore::open(&path), EventBus::new());
    let snap = lifecycle.snapshot();
    assert_eq!(snap.phase, UpdatePhase::UpdateDone);
    assert!(snap.flags.waiting_for_reboot);
    assert_eq!(snap.descriptor.unwrap().version, "2.0");

    // The new process sees no replayed events, only the snapshot.
    let mut sub = lifecycle.subscribe();
    assert!(sub.try_recv().is_none());
}

/// Two observers subscribed for the same span see the same event order; an
/// unsubscribed observer sees nothing more.
#[test]
fn test_observer_fanout_and_release() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::open(dir.path().join("settings.json"));
    let lifecycle = UpdateLifecycle::new(store, EventBus::new());

    let mut ui = lifecycle.subscribe();
    let mut projection_feed = lifecycle.subscribe();

    lifecycle.report_check_result(true, Some(descriptor("2.0", 1000, "fix")));
    lifecycle.report_download_progress(ProgressSample::new(1, 10));

    let seen_ui = drain(&mut ui);
    let seen_projection = drain(&mut projection_feed);
    assert_eq!(seen_ui, seen_projection);
    assert_eq!(seen_ui.len(), 2);

    lifecycle.bus().unsubscribe(ui.id());
    lifecycle.report_download_progress(ProgressSample::new(2, 10));
    assert!(drain(&mut ui).is_empty());
    assert_eq!(drain(&mut projection_feed).len(), 1);
}

#[derive(Default)]
struct ConsoleSink {
    progress: Option<ProgressIndicator>,
    action: Option<ActionIndicator>,
    transient: Vec<String>,
}

impl NotificationSink for ConsoleSink {
    fn show_progress(&mut self, indicator: &ProgressIndicator) -> anyhow::Result<()> {
        self.progress = Some(*indicator);
        Ok(())
    }

    fn clear_progress(&mut self) -> anyhow::Result<()> {
        self.progress = None;
        Ok(())
    }

    fn show_action(&mut self, indicator: ActionIndicator) -> anyhow::Result<()> {
        self.action = Some(indicator);
        Ok(())
    }

    fn clear_action(&mut self) -> anyhow::Result<()> {
        self.action = None;
        Ok(())
    }

    fn notify_failure(&mut self, reason: &str) -> anyhow::Result<()> {
        self.transient.push(reason.to_string());
        Ok(())
    }
}

/// Wire the projection to the event stream end to end and walk a cycle.
#[test]
fn test_projection_follows_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::open(dir.path().join("settings.json"));
    let lifecycle = UpdateLifecycle::new(store, EventBus::new());
    let mut feed = lifecycle.subscribe();
    let mut projection = NotificationProjection::new(ConsoleSink::default());

    let mut pump = |projection: &mut NotificationProjection<ConsoleSink>| {
        while let Some(record) = feed.try_recv() {
            projection.handle_event(&record, &lifecycle.snapshot());
        }
    };

    lifecycle.report_check_result(true, Some(descriptor("2.0", 1000, "fix")));
    pump(&mut projection);
    assert_eq!(
        projection.sink().action,
        Some(ActionIndicator::NewUpdateFound)
    );
    assert!(projection.sink().progress.is_none());

    lifecycle.report_download_progress(ProgressSample::new(250, 1000));
    pump(&mut projection);
    let progress = projection.sink().progress.unwrap();
    assert_eq!(progress.done, 250);
    assert!(!progress.is_indeterminate());
    assert!(projection.sink().action.is_none());

    lifecycle.report_install_complete();
    pump(&mut projection);
    assert!(projection.sink().progress.is_none());
    assert_eq!(
        projection.sink().action,
        Some(ActionIndicator::RebootRequired)
    );

    // Reboot consumed the update; no event is published, so the host
    // refreshes explicitly.
    lifecycle.report_reboot_completed(true);
    projection.refresh(&lifecycle.snapshot());
    assert!(projection.sink().action.is_none());
    assert!(projection.sink().transient.is_empty());
}

/// Failure surfaces once as a transient notice and leaves no indicator.
#[test]
fn test_projection_failure_notice() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::open(dir.path().join("settings.json"));
    let lifecycle = UpdateLifecycle::new(store, EventBus::new());
    let mut feed = lifecycle.subscribe();
    let mut projection = NotificationProjection::new(ConsoleSink::default());

    lifecycle.report_check_result(true, Some(descriptor("2.0", 1000, "fix")));
    lifecycle.report_download_progress(ProgressSample::new(10, 100));
    lifecycle.report_failure("verification failed");

    while let Some(record) = feed.try_recv() {
        projection.handle_event(&record, &lifecycle.snapshot());
    }

    assert_eq!(projection.sink().transient, vec!["verification failed"]);
    assert!(projection.sink().action.is_none());
    assert!(projection.sink().progress.is_none());
}

/// Stale executor callbacks after completion change nothing anywhere.
#[test]
fn test_stale_callbacks_are_inert_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::open(dir.path().join("settings.json"));
    let lifecycle = UpdateLifecycle::new(store, EventBus::new());

    lifecycle.report_check_result(true, Some(descriptor("2.0", 1000, "fix")));
    lifecycle.report_download_progress(ProgressSample::new(100, 100));
    lifecycle.report_install_complete();

    let mut sub = lifecycle.subscribe();
    lifecycle.report_download_progress(ProgressSample::new(0, 100));
    lifecycle.report_install_progress(ProgressSample::new(0, 100));
    lifecycle.report_install_complete();

    assert!(drain(&mut sub).is_empty());
    assert_eq!(lifecycle.snapshot().phase, UpdatePhase::UpdateDone);
}
