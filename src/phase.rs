//! Update phase tracking
//!
//! Provides the single enumeration describing where an update cycle currently
//! stands. The phase is monotonic along
//! `NotAvailable → Available → Downloading → Installing → UpdateDone` for one
//! cycle, except that `NotAvailable` is reachable from anywhere as an
//! abort/reset and `Available` is re-enterable once a new check finds an
//! update.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current phase of the update cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UpdatePhase {
    /// No update cycle in progress (initial state, also the abort/reset target)
    NotAvailable,

    /// A check found an update; metadata is known, nothing downloaded yet
    Available,

    /// The executor is downloading the update image
    Downloading,

    /// The executor is installing the downloaded image
    Installing,

    /// Install finished; the update takes effect on the next reboot
    UpdateDone,
}

impl UpdatePhase {
    /// Whether the executor is actively working (a progress indicator applies).
    pub fn is_in_progress(self) -> bool {
        matches!(self, UpdatePhase::Downloading | UpdatePhase::Installing)
    }

    /// Whether this phase carries a meaningful update descriptor.
    pub fn has_descriptor(self) -> bool {
        self >= UpdatePhase::Available
    }

    /// Name used for the persisted enum string.
    pub fn as_str(self) -> &'static str {
        match self {
            UpdatePhase::NotAvailable => "NotAvailable",
            UpdatePhase::Available => "Available",
            UpdatePhase::Downloading => "Downloading",
            UpdatePhase::Installing => "Installing",
            UpdatePhase::UpdateDone => "UpdateDone",
        }
    }
}

impl Default for UpdatePhase {
    fn default() -> Self {
        UpdatePhase::NotAvailable
    }
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognized persisted phase strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePhaseError(pub String);

impl fmt::Display for ParsePhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown update phase: {}", self.0)
    }
}

impl std::error::Error for ParsePhaseError {}

impl FromStr for UpdatePhase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NotAvailable" => Ok(UpdatePhase::NotAvailable),
            "Available" => Ok(UpdatePhase::Available),
            "Downloading" => Ok(UpdatePhase::Downloading),
            "Installing" => Ok(UpdatePhase::Installing),
            "UpdateDone" => Ok(UpdatePhase::UpdateDone),
            other => Err(ParsePhaseError(other.to_string())),
        }
    }
}
