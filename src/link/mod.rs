//! Link data model
//!
//! A "link" is the association between one tracked item (GitHub issue or
//! pull request) and one external item (support case). It is represented
//! by a [`SyncRecord`] embedded in the tracked item's body text between
//! two marker tokens.
//!
//! The record is the single source of truth for the link: it is created
//! when the two items are first associated, re-serialized in place on
//! every subsequent sync action, and never explicitly deleted.

mod codec;
mod status_map;
mod title;

pub use codec::{CaseRefPatch, IssueRefPatch, MetadataCodec, RecordFields, RecordPatch, StatePatch};
pub use status_map::StatusMapper;
pub use title::{case_label, extract_case_number, format_title};

use serde::{Deserialize, Serialize};

/// Current schema version written into new records
pub const SCHEMA_VERSION: &str = "1.0";

/// The structured metadata record embedded in a tracked item's body.
///
/// Wire names are camelCase. The three group objects are required: a
/// block missing any of them fails deserialization and is treated as
/// not-found by the codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub version: String,
    pub timestamp: String,
    pub salesforce: CaseRef,
    pub github: IssueRef,
    pub sync: SyncState,
}

/// External-system side of a link (all fields nullable on the wire)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRef {
    #[serde(default)]
    pub case_id: Option<String>,
    #[serde(default)]
    pub case_number: Option<String>,
    #[serde(default)]
    pub case_status: Option<String>,
    #[serde(default)]
    pub case_url: Option<String>,
}

/// Tracked-system side of a link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRef {
    pub repo: String,
    #[serde(default)]
    pub issue_number: Option<u64>,
    #[serde(default)]
    pub pr_number: Option<u64>,
    pub last_synced_at: String,
    pub synced_by: String,
}

/// Sync bookkeeping for a link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub direction: SyncDirection,
    pub status: SyncStatus,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// Which way the link was established / flows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncDirection {
    #[serde(rename = "salesforce-to-github")]
    CaseToIssue,
    #[serde(rename = "github-to-salesforce")]
    IssueToCase,
    #[default]
    #[serde(rename = "bidirectional")]
    Bidirectional,
}

/// Health of a link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Active,
    Error,
    Paused,
}

/// State of the link between one tracked item and one external item.
///
/// `Error` is recoverable: the next successful sync re-stamps the record
/// with `active` status and clears `lastError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No sync record embedded in the body
    Unlinked,
    Active,
    Error,
    Paused,
}

impl LinkState {
    /// Derive the link state from an optional decoded record
    pub fn from_record(record: Option<&SyncRecord>) -> Self {
        match record {
            None => LinkState::Unlinked,
            Some(r) => match r.sync.status {
                SyncStatus::Active => LinkState::Active,
                SyncStatus::Error => LinkState::Error,
                SyncStatus::Paused => LinkState::Paused,
            },
        }
    }
}

impl SyncRecord {
    /// Case id of the linked external item, if the link carries one
    pub fn case_id(&self) -> Option<&str> {
        self.salesforce.case_id.as_deref()
    }
}
