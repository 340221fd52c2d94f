//! Notification projection
//!
//! Derives, from the current lifecycle snapshot, the target state for two
//! independent indicators and pushes only the differences to a host-provided
//! sink:
//! - progress indicator while the phase is Downloading or Installing
//!   (indeterminate when the total extent is unknown)
//! - action-required indicator: reboot-required while an installed update is
//!   pending, otherwise new-update-found while an update is merely available
//!
//! The projection tracks the last content it rendered; re-rendering identical
//! content never reaches the sink, so observers are not alerted redundantly.
//! Failure events additionally produce a one-shot transient notice, never a
//! persistent indicator.
//!
//! Sink callbacks run on whatever execution context drives the projection;
//! presentation adapters redispatch to their own rendering context.

use tracing::warn;

use crate::event::{EventRecord, LifecycleEvent};
use crate::lifecycle::LifecycleSnapshot;
use crate::phase::UpdatePhase;

/// Which executor activity a progress indicator describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    Download,
    Install,
}

/// Target content of the persistent progress indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressIndicator {
    pub kind: ProgressKind,
    pub done: u64,
    pub total: u64,
}

impl ProgressIndicator {
    /// Whether the indicator should render without a determinate bar.
    pub fn is_indeterminate(self) -> bool {
        self.total == 0
    }
}

/// Target content of the action-required indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionIndicator {
    /// A check found a new update; installing it needs user action
    NewUpdateFound,
    /// An installed update takes effect on the next reboot
    RebootRequired,
}

/// Host-side notification surface.
///
/// All operations must be idempotent at the presentation boundary; the
/// projection already suppresses identical re-renders, but a sink may still
/// be asked to clear an indicator it never showed (e.g. after a restart).
pub trait NotificationSink {
    /// Show or update the persistent progress indicator.
    fn show_progress(&mut self, indicator: &ProgressIndicator) -> anyhow::Result<()>;

    /// Remove the progress indicator.
    fn clear_progress(&mut self) -> anyhow::Result<()>;

    /// Show or replace the action-required indicator.
    fn show_action(&mut self, indicator: ActionIndicator) -> anyhow::Result<()>;

    /// Remove the action-required indicator.
    fn clear_action(&mut self) -> anyhow::Result<()>;

    /// Surface a one-shot transient failure notice.
    fn notify_failure(&mut self, reason: &str) -> anyhow::Result<()>;
}

/// Idempotently rendered view of the lifecycle state.
pub struct NotificationProjection<S: NotificationSink> {
    sink: S,
    rendered_progress: Option<ProgressIndicator>,
    rendered_action: Option<ActionIndicator>,
}

impl<S: NotificationSink> NotificationProjection<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            rendered_progress: None,
            rendered_action: None,
        }
    }

    /// Recompute the target indicators from `snapshot` and push differences
    /// to the sink. A sink error leaves the last-rendered record unchanged,
    /// so the next refresh retries the same content.
    pub fn refresh(&mut self, snapshot: &LifecycleSnapshot) {
        let progress = target_progress(snapshot);
        if progress != self.rendered_progress {
            let result = match &progress {
                Some(indicator) => self.sink.show_progress(indicator),
                None => self.sink.clear_progress(),
            };
            match result {
                Ok(()) => self.rendered_progress = progress,
                Err(e) => warn!(error = %e, "Notification sink rejected progress update"),
            }
        }

        let action = target_action(snapshot);
        if action != self.rendered_action {
            let result = match action {
                Some(indicator) => self.sink.show_action(indicator),
                None => self.sink.clear_action(),
            };
            match result {
                Ok(()) => self.rendered_action = action,
                Err(e) => warn!(error = %e, "Notification sink rejected action update"),
            }
        }
    }

    /// React to a published event: surface transient failure notices, then
    /// re-render from the snapshot.
    pub fn handle_event(&mut self, record: &EventRecord, snapshot: &LifecycleSnapshot) {
        if let LifecycleEvent::Failed { reason } = &record.event {
            if let Err(e) = self.sink.notify_failure(reason) {
                warn!(error = %e, "Notification sink rejected failure notice");
            }
        }
        self.refresh(snapshot);
    }

    /// Access the wrapped sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

fn target_progress(snapshot: &LifecycleSnapshot) -> Option<ProgressIndicator> {
    let kind = match snapshot.phase {
        UpdatePhase::Downloading => ProgressKind::Download,
        UpdatePhase::Installing => ProgressKind::Install,
        _ => return None,
    };
    // Missing sample renders as indeterminate until the first report lands.
    let (done, total) = snapshot
        .progress
        .map(|sample| (sample.done, sample.total))
        .unwrap_or((0, 0));
    Some(ProgressIndicator { kind, done, total })
}

fn target_action(snapshot: &LifecycleSnapshot) -> Option<ActionIndicator> {
    if snapshot.phase == UpdatePhase::UpdateDone || snapshot.flags.waiting_for_reboot {
        Some(ActionIndicator::RebootRequired)
    } else if snapshot.phase == UpdatePhase::Available {
        Some(ActionIndicator::NewUpdateFound)
    } else {
        None
    }
}
