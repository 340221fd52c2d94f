//! Lifecycle event types
//!
//! The closed set of events the state machine publishes, together with the
//! payloads they carry. Events are immutable, timestamped at emission, and
//! carry no subscriber identity. Each variant maps to exactly one
//! phase-relevant occurrence; consumers match on the variant instead of
//! poking at string-keyed payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata identifying an available update build.
///
/// Owned by the state machine and replaced wholesale each time a new update
/// is discovered; never partially mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDescriptor {
    /// Build version string
    pub version: String,
    /// Publish timestamp of the build (UTC)
    pub publish_date: DateTime<Utc>,
    /// Human-readable changelog
    pub changelog: String,
}

impl UpdateDescriptor {
    pub fn new(
        version: impl Into<String>,
        publish_date: DateTime<Utc>,
        changelog: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            publish_date,
            changelog: changelog.into(),
        }
    }
}

/// Point-in-time (done, total) pair for a download or install.
///
/// `total == 0` means the extent is unknown and the progress is
/// indeterminate. Samples pass through the core untouched: no clamping, no
/// monotonicity enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSample {
    /// Bytes or work units completed so far
    pub done: u64,
    /// Total bytes or work units, 0 when unknown
    pub total: u64,
}

impl ProgressSample {
    pub fn new(done: u64, total: u64) -> Self {
        Self { done, total }
    }

    /// Whether the total extent is unknown.
    pub fn is_indeterminate(self) -> bool {
        self.total == 0
    }
}

/// A lifecycle occurrence published on the event broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A check found an update; carries the full descriptor
    InfoAvailable(UpdateDescriptor),

    /// Download progressed
    DownloadProgress(ProgressSample),

    /// Install progressed
    InstallProgress(ProgressSample),

    /// A check found no update, or the cycle was reset
    NotAvailable,

    /// The executor reported a failure; the cycle resets
    Failed { reason: String },

    /// Install finished; a reboot will apply the update
    Done,
}

/// An event as delivered to observers, stamped at emission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Emission timestamp
    pub timestamp: DateTime<Utc>,
    /// The occurrence itself
    pub event: LifecycleEvent,
}

impl EventRecord {
    /// Stamp an event with the current time.
    pub fn now(event: LifecycleEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}
