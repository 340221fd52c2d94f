//! Persisted settings store
//!
//! Durable key/value storage for the update phase and its metadata, plus the
//! configuration inputs written by the external preference editor. The whole
//! document is a single JSON file; every write replaces it atomically (temp
//! file + rename), so a crash mid-write leaves the previous document intact.
//!
//! Ownership: the state machine is the sole writer. Other components read
//! through `UpdateLifecycle::snapshot` or subscribe to events; they never
//! touch storage directly. In-memory copies held elsewhere are caches that
//! must be re-synchronized after a process restart.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::event::UpdateDescriptor;
use crate::phase::UpdatePhase;

/// Configuration inputs owned by the external preference editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePreferences {
    /// Release channel to check against
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Network type the executor may use (1 = any, 2 = unmetered)
    #[serde(default = "default_network_type")]
    pub network_type: u32,

    /// Only run while the battery is not low
    #[serde(default = "default_battery_not_low")]
    pub battery_not_low: bool,

    /// Reboot automatically once the device is idle after an update
    #[serde(default)]
    pub idle_reboot: bool,
}

fn default_channel() -> String {
    "stable".to_string()
}

fn default_network_type() -> u32 {
    2
}

fn default_battery_not_low() -> bool {
    true
}

impl Default for UpdatePreferences {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            network_type: default_network_type(),
            battery_not_low: default_battery_not_low(),
            idle_reboot: false,
        }
    }
}

/// On-disk document. Missing keys take their defaults, so documents written
/// by older builds keep loading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SettingsDocument {
    #[serde(default)]
    update_status: UpdatePhase,

    #[serde(default)]
    waiting_for_reboot: bool,

    /// Epoch seconds of the last update check, unset until the first check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_update_check: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    available_update_version: Option<String>,

    /// Epoch seconds of the available build's publish date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    available_update_date: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    available_update_description: Option<String>,

    #[serde(flatten)]
    preferences: UpdatePreferences,
}

/// Durable store backing the state machine.
pub struct SettingsStore {
    path: PathBuf,
    doc: SettingsDocument,
}

impl SettingsStore {
    /// Open the store at `path`, loading the existing document if present.
    ///
    /// A missing, unreadable, or corrupt document degrades to defaults
    /// (phase `NotAvailable`, no pending reboot) rather than failing; the
    /// safe default for every storage problem is "no update currently
    /// available".
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt settings document, starting from defaults");
                    SettingsDocument::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No settings document yet, starting from defaults");
                SettingsDocument::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read settings document, starting from defaults");
                SettingsDocument::default()
            }
        };
        Self { path, doc }
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn phase(&self) -> UpdatePhase {
        self.doc.update_status
    }

    pub fn set_phase(&mut self, phase: UpdatePhase) {
        self.doc.update_status = phase;
    }

    pub fn waiting_for_reboot(&self) -> bool {
        self.doc.waiting_for_reboot
    }

    pub fn set_waiting_for_reboot(&mut self, waiting: bool) {
        self.doc.waiting_for_reboot = waiting;
    }

    pub fn last_update_check(&self) -> Option<DateTime<Utc>> {
        self.doc
            .last_update_check
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    pub fn set_last_update_check(&mut self, at: DateTime<Utc>) {
        self.doc.last_update_check = Some(at.timestamp());
    }

    /// The available update's descriptor, if a complete one is stored.
    pub fn available_update(&self) -> Option<UpdateDescriptor> {
        let version = self.doc.available_update_version.clone()?;
        let date = self
            .doc
            .available_update_date
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())?;
        Some(UpdateDescriptor {
            version,
            publish_date: date,
            changelog: self
                .doc
                .available_update_description
                .clone()
                .unwrap_or_default(),
        })
    }

    /// Replace the stored descriptor wholesale, or clear it.
    pub fn set_available_update(&mut self, descriptor: Option<&UpdateDescriptor>) {
        match descriptor {
            Some(d) => {
                self.doc.available_update_version = Some(d.version.clone());
                self.doc.available_update_date = Some(d.publish_date.timestamp());
                self.doc.available_update_description = Some(d.changelog.clone());
            }
            None => {
                self.doc.available_update_version = None;
                self.doc.available_update_date = None;
                self.doc.available_update_description = None;
            }
        }
    }

    pub fn preferences(&self) -> UpdatePreferences {
        self.doc.preferences.clone()
    }

    pub fn set_preferences(&mut self, preferences: UpdatePreferences) {
        self.doc.preferences = preferences;
    }

    /// Write the current document to disk, replacing the previous one
    /// atomically.
    pub fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.doc)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "Settings persisted");
        Ok(())
    }
}
