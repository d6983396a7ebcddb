//! Status vocabulary mapping
//!
//! One authoritative table (configuration-supplied) maps external case
//! statuses to tracked issue states. The inverse walks the same table
//! and takes the first entry whose tracked value matches, so it is only
//! well-defined when the table is a bijection.

use crate::config::StatusMapping;

/// Tracked state used when the table lacks an external status
const DEFAULT_TRACKED_STATE: &str = "open";
/// External status for a closed tracked item absent a table entry
const CLOSED_EXTERNAL_STATUS: &str = "Closed";
/// External status for any other tracked state absent a table entry
const FALLBACK_EXTERNAL_STATUS: &str = "In Progress";

/// Bidirectional status mapper over the configured table
#[derive(Debug, Clone)]
pub struct StatusMapper {
    table: Vec<StatusMapping>,
}

impl StatusMapper {
    pub fn new(table: Vec<StatusMapping>) -> Self {
        Self { table }
    }

    /// Map an external case status to a tracked issue state.
    /// Unknown statuses fall back to `"open"`.
    pub fn to_tracked(&self, external_status: &str) -> String {
        self.table
            .iter()
            .find(|m| m.external == external_status)
            .map(|m| m.tracked.clone())
            .unwrap_or_else(|| DEFAULT_TRACKED_STATE.to_string())
    }

    /// Map a tracked issue state back to an external case status.
    ///
    /// Scans table entries in order and returns the first whose tracked
    /// value matches. When nothing matches, `closed` maps to `"Closed"`
    /// and everything else to `"In Progress"`.
    pub fn to_external(&self, tracked_state: &str) -> String {
        if let Some(m) = self.table.iter().find(|m| m.tracked == tracked_state) {
            return m.external.clone();
        }
        if tracked_state == "closed" {
            CLOSED_EXTERNAL_STATUS.to_string()
        } else {
            FALLBACK_EXTERNAL_STATUS.to_string()
        }
    }
}
