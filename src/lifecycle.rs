//! Update lifecycle state machine
//!
//! Owns the update phase and everything hanging off it: the descriptor of an
//! available build, the live progress sample, and the lifecycle flags. Every
//! mutation goes through one of the `report_*` operations; they are
//! serialized on a single mutex, and the persistence write plus event
//! publication for a call happen under that guard, so a concurrent
//! [`UpdateLifecycle::snapshot`] never observes a half-applied transition.
//!
//! Reports that are invalid for the current phase never raise — an
//! asynchronous executor may legitimately deliver stale callbacks after the
//! phase has moved on, so they are debug-logged no-ops. A persistence
//! failure is logged and retried implicitly on the next mutation; in-memory
//! state stays authoritative throughout.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::bus::{EventBus, Subscription};
use crate::event::{LifecycleEvent, ProgressSample, UpdateDescriptor};
use crate::phase::UpdatePhase;
use crate::settings::{SettingsStore, UpdatePreferences};

/// Flags independent of the phase sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleFlags {
    /// An installed update is pending a reboot to take effect. Survives
    /// restarts and outlives `UpdateDone` until a reboot-completion signal
    /// clears it.
    pub waiting_for_reboot: bool,
    /// When the last update check ran, if ever
    pub last_check: Option<DateTime<Utc>>,
}

/// Consistent read of the full lifecycle state.
///
/// Late subscribers synchronize from this instead of event replay.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleSnapshot {
    pub phase: UpdatePhase,
    pub descriptor: Option<UpdateDescriptor>,
    pub progress: Option<ProgressSample>,
    pub flags: LifecycleFlags,
}

struct Inner {
    store: SettingsStore,
    phase: UpdatePhase,
    descriptor: Option<UpdateDescriptor>,
    progress: Option<ProgressSample>,
    waiting_for_reboot: bool,
    last_check: Option<DateTime<Utc>>,
}

impl Inner {
    /// Mirror in-memory state into the store and write it out. Progress
    /// samples are transient and never persisted.
    fn persist(&mut self) {
        self.store.set_phase(self.phase);
        self.store.set_waiting_for_reboot(self.waiting_for_reboot);
        if let Some(at) = self.last_check {
            self.store.set_last_update_check(at);
        }
        self.store.set_available_update(self.descriptor.as_ref());
        if let Err(e) = self.store.persist() {
            warn!(error = %e, "Failed to persist update state, in-memory state remains authoritative");
        }
    }

    fn snapshot(&self) -> LifecycleSnapshot {
        LifecycleSnapshot {
            phase: self.phase,
            descriptor: self.descriptor.clone(),
            progress: self.progress,
            flags: LifecycleFlags {
                waiting_for_reboot: self.waiting_for_reboot,
                last_check: self.last_check,
            },
        }
    }
}

/// The update lifecycle coordinator.
///
/// The external executor reports check results, progress, completion, and
/// failures; observers subscribe through [`UpdateLifecycle::subscribe`] and
/// receive the resulting [`LifecycleEvent`]s.
pub struct UpdateLifecycle {
    inner: Mutex<Inner>,
    bus: EventBus,
}

impl UpdateLifecycle {
    /// Build the state machine on top of an opened store, restoring the
    /// persisted phase, descriptor, and flags. Progress always starts empty;
    /// a restart invalidates any in-flight sample.
    pub fn new(store: SettingsStore, bus: EventBus) -> Self {
        let phase = store.phase();
        let descriptor = store.available_update();
        let waiting_for_reboot = store.waiting_for_reboot();
        let last_check = store.last_update_check();

        if phase.has_descriptor() && descriptor.is_none() {
            debug!(%phase, "Restored phase expects a descriptor but none is stored");
        }
        info!(
            %phase,
            waiting_for_reboot,
            version = descriptor.as_ref().map(|d| d.version.as_str()).unwrap_or(""),
            "Update lifecycle restored"
        );

        Self {
            inner: Mutex::new(Inner {
                store,
                phase,
                descriptor,
                progress: None,
                waiting_for_reboot,
                last_check,
            }),
            bus,
        }
    }

    /// The broadcast this lifecycle publishes on.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Register a new observer on the event broadcast.
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// Record the outcome of an update check.
    ///
    /// The check timestamp is recorded unconditionally. `found == false`
    /// forces the phase back to `NotAvailable` and clears the descriptor.
    /// `found == true` with a descriptor enters `Available`; re-reporting the
    /// version already known is idempotent (no event), while a different
    /// version restarts the cycle and drops stale progress.
    #[instrument(skip(self, descriptor))]
    pub fn report_check_result(&self, found: bool, descriptor: Option<UpdateDescriptor>) {
        let mut inner = self.lock();
        inner.last_check = Some(Utc::now());

        if !found {
            info!(previous = %inner.phase, "Check found no update");
            inner.phase = UpdatePhase::NotAvailable;
            inner.descriptor = None;
            inner.progress = None;
            inner.persist();
            self.bus.publish(LifecycleEvent::NotAvailable);
            return;
        }

        let descriptor = match descriptor {
            Some(d) => d,
            None => {
                debug!("Check reported an update without a descriptor, ignoring");
                inner.persist();
                return;
            }
        };

        let same_version = inner.phase.has_descriptor()
            && inner
                .descriptor
                .as_ref()
                .map(|d| d.version == descriptor.version)
                .unwrap_or(false);
        if same_version {
            debug!(version = %descriptor.version, "Check re-reported the known update");
            inner.persist();
            return;
        }

        info!(version = %descriptor.version, previous = %inner.phase, "Update available");
        inner.phase = UpdatePhase::Available;
        inner.descriptor = Some(descriptor.clone());
        inner.progress = None;
        inner.persist();
        self.bus.publish(LifecycleEvent::InfoAvailable(descriptor));
    }

    /// Record download progress from the executor.
    ///
    /// Valid from `Available` (enters `Downloading`) and `Downloading`.
    /// Samples pass through untouched. Anything later in the cycle means the
    /// callback is stale and is ignored.
    #[instrument(skip(self))]
    pub fn report_download_progress(&self, sample: ProgressSample) {
        let mut inner = self.lock();
        match inner.phase {
            UpdatePhase::Available | UpdatePhase::Downloading => {
                if inner.phase != UpdatePhase::Downloading {
                    info!("Download started");
                    inner.phase = UpdatePhase::Downloading;
                    inner.persist();
                }
                inner.progress = Some(sample);
                self.bus.publish(LifecycleEvent::DownloadProgress(sample));
            }
            phase => {
                debug!(%phase, done = sample.done, "Stale download progress, ignoring");
            }
        }
    }

    /// Record install progress from the executor.
    ///
    /// Valid from `Downloading` (enters `Installing`) and `Installing`.
    #[instrument(skip(self))]
    pub fn report_install_progress(&self, sample: ProgressSample) {
        let mut inner = self.lock();
        match inner.phase {
            UpdatePhase::Downloading | UpdatePhase::Installing => {
                if inner.phase != UpdatePhase::Installing {
                    info!("Install started");
                    inner.phase = UpdatePhase::Installing;
                    inner.persist();
                }
                inner.progress = Some(sample);
                self.bus.publish(LifecycleEvent::InstallProgress(sample));
            }
            phase => {
                debug!(%phase, done = sample.done, "Stale install progress, ignoring");
            }
        }
    }

    /// Record an executor failure. Resets the cycle to `NotAvailable`
    /// without touching the reboot flag. A failure reported after
    /// `UpdateDone` can only be a late callback from a finished cycle and is
    /// ignored.
    #[instrument(skip(self, reason))]
    pub fn report_failure(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let mut inner = self.lock();
        if inner.phase == UpdatePhase::UpdateDone {
            debug!(%reason, "Failure reported after completion, ignoring");
            return;
        }

        warn!(%reason, phase = %inner.phase, "Update failed");
        inner.phase = UpdatePhase::NotAvailable;
        inner.descriptor = None;
        inner.progress = None;
        inner.persist();
        self.bus.publish(LifecycleEvent::Failed { reason });
    }

    /// Record that the executor finished installing. Enters `UpdateDone` and
    /// raises `waiting_for_reboot`.
    #[instrument(skip(self))]
    pub fn report_install_complete(&self) {
        let mut inner = self.lock();
        match inner.phase {
            UpdatePhase::Available | UpdatePhase::Downloading | UpdatePhase::Installing => {
                info!(
                    version = inner.descriptor.as_ref().map(|d| d.version.as_str()).unwrap_or(""),
                    "Install complete, waiting for reboot"
                );
                inner.phase = UpdatePhase::UpdateDone;
                inner.waiting_for_reboot = true;
                inner.progress = None;
                inner.persist();
                self.bus.publish(LifecycleEvent::Done);
            }
            UpdatePhase::UpdateDone => {
                debug!("Install completion re-reported, ignoring");
            }
            UpdatePhase::NotAvailable => {
                debug!("Install completion without an active cycle, ignoring");
            }
        }
    }

    /// Record that the device rebooted.
    ///
    /// Always clears `waiting_for_reboot`. When `update_applied` is true and
    /// the phase is still `UpdateDone`, the consumed cycle resets to
    /// `NotAvailable` and the descriptor is dropped. When false, the phase is
    /// left alone so the caller can decide whether to re-check. No event is
    /// published; hosts refresh projections from [`UpdateLifecycle::snapshot`].
    #[instrument(skip(self))]
    pub fn report_reboot_completed(&self, update_applied: bool) {
        let mut inner = self.lock();
        info!(update_applied, phase = %inner.phase, "Reboot completed");
        inner.waiting_for_reboot = false;
        if update_applied && inner.phase == UpdatePhase::UpdateDone {
            inner.phase = UpdatePhase::NotAvailable;
            inner.descriptor = None;
        }
        inner.persist();
    }

    /// Gate for the manual/periodic check trigger: a new check may only be
    /// dispatched while nothing is in flight and no reboot is pending.
    pub fn should_dispatch_check(&self) -> bool {
        let inner = self.lock();
        inner.phase == UpdatePhase::NotAvailable && !inner.waiting_for_reboot
    }

    /// Consistent read-only view of the current state.
    pub fn snapshot(&self) -> LifecycleSnapshot {
        self.lock().snapshot()
    }

    /// Configuration inputs for the external executor and scheduler.
    pub fn preferences(&self) -> UpdatePreferences {
        self.lock().store.preferences()
    }

    /// Replace the configuration inputs; the write path for the external
    /// preference editor.
    pub fn set_preferences(&self, preferences: UpdatePreferences) {
        let mut inner = self.lock();
        inner.store.set_preferences(preferences);
        if let Err(e) = inner.store.persist() {
            warn!(error = %e, "Failed to persist preferences");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Mutations are plain field writes; poisoning cannot leave torn state.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
