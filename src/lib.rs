//! # Seamless Update — Client Coordination Core
//!
//! Client-side coordinator for an over-the-air (OTA) update lifecycle. The
//! hosting application supplies the moving parts — the download/install
//! executor, the preference editor, the presentation layer, the periodic
//! trigger — and this crate coordinates them:
//!
//! - [`UpdateLifecycle`] owns the phase state machine
//!   (`NotAvailable → Available → Downloading → Installing → UpdateDone`),
//!   validates executor reports, and persists phase and metadata through the
//!   [`SettingsStore`].
//! - [`EventBus`] fans the resulting [`LifecycleEvent`]s out to any number of
//!   live observers with explicit subscribe/unsubscribe handles and no
//!   backlog for absent subscribers.
//! - [`NotificationProjection`] derives the persistent progress and
//!   action-required indicators idempotently from lifecycle snapshots,
//!   rendered through a host-provided [`NotificationSink`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  report_*   ┌──────────────────┐  publish  ┌───────────┐
//! │   executor   │────────────►│ UpdateLifecycle  │──────────►│ EventBus  │
//! │ (download /  │             │  phase machine   │           └─────┬─────┘
//! │   install)   │             │        │         │                 │ events
//! └──────────────┘             │  SettingsStore   │        ┌────────┴────────┐
//!                              │  (JSON on disk)  │        ▼                 ▼
//!                              └──────────────────┘  presentation   NotificationProjection
//! ```
//!
//! Observers synchronize initial state from [`UpdateLifecycle::snapshot`];
//! events missed while unsubscribed are never replayed.
//!
//! ## Example
//!
//! ```no_run
//! use seamless_update::{EventBus, SettingsStore, UpdateDescriptor, UpdateLifecycle};
//!
//! let store = SettingsStore::open("/var/lib/seamless-update/settings.json");
//! let lifecycle = UpdateLifecycle::new(store, EventBus::new());
//!
//! let mut observer = lifecycle.subscribe();
//! lifecycle.report_check_result(
//!     true,
//!     Some(UpdateDescriptor::new("2024.11.1", chrono::Utc::now(), "security fixes")),
//! );
//! ```

pub mod bus;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod logging;
pub mod notify;
pub mod phase;
pub mod settings;

pub use bus::{EventBus, Subscription};
pub use error::StoreError;
pub use event::{EventRecord, LifecycleEvent, ProgressSample, UpdateDescriptor};
pub use lifecycle::{LifecycleFlags, LifecycleSnapshot, UpdateLifecycle};
pub use logging::{init_logging, init_logging_json};
pub use notify::{
    ActionIndicator, NotificationProjection, NotificationSink, ProgressIndicator, ProgressKind,
};
pub use phase::UpdatePhase;
pub use settings::{SettingsStore, UpdatePreferences};
