//! Metadata codec
//!
//! Serializes a [`SyncRecord`] into a marker-delimited, fenced-JSON block
//! embedded in arbitrary body text, and back. The framing is
//! `<marker>\n```json\n<pretty JSON>\n```\n<marker>` and must reproduce
//! bit-for-bit so that encode/decode round-trips.
//!
//! The marker token is always matched as literal text. Bodies may carry
//! at most one record; if two blocks exist only the first is ever read
//! or replaced.

use super::{CaseRef, IssueRef, SyncDirection, SyncRecord, SyncState, SyncStatus, SCHEMA_VERSION};
use crate::Result;
use chrono::Utc;
use tracing::{debug, trace};

/// Actor recorded as `syncedBy` when none is supplied
const DEFAULT_ACTOR: &str = "casebridge";

/// Flat field set for building a fresh record. Omitted fields take
/// defaults (schema version, current timestamp, configured repo,
/// bidirectional direction, active status).
#[derive(Debug, Clone, Default)]
pub struct RecordFields {
    pub case_id: Option<String>,
    pub case_number: Option<String>,
    pub case_status: Option<String>,
    pub case_url: Option<String>,
    pub repo: Option<String>,
    pub issue_number: Option<u64>,
    pub pr_number: Option<u64>,
    pub last_synced_at: Option<String>,
    pub synced_by: Option<String>,
    pub direction: Option<SyncDirection>,
    pub status: Option<SyncStatus>,
    pub last_error: Option<String>,
}

/// Partial update applied group-by-group. `None` leaves the existing
/// value untouched; `Some` overwrites it.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub salesforce: Option<CaseRefPatch>,
    pub github: Option<IssueRefPatch>,
    pub sync: Option<StatePatch>,
}

#[derive(Debug, Clone, Default)]
pub struct CaseRefPatch {
    pub case_id: Option<String>,
    pub case_number: Option<String>,
    pub case_status: Option<String>,
    pub case_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct IssueRefPatch {
    pub repo: Option<String>,
    pub issue_number: Option<u64>,
    pub pr_number: Option<u64>,
    pub synced_by: Option<String>,
}

/// Patch for the sync group. `last_error` is doubly optional so a
/// successful sync can overwrite a stale error with null.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub direction: Option<SyncDirection>,
    pub status: Option<SyncStatus>,
    pub last_error: Option<Option<String>>,
}

impl RecordPatch {
    /// Patch that marks the link healthy: status active, error cleared
    pub fn healthy() -> Self {
        Self {
            sync: Some(StatePatch {
                status: Some(SyncStatus::Active),
                last_error: Some(None),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Byte span of an embedded block plus its captured JSON text
struct BlockSpan {
    start: usize,
    end: usize,
    json: String,
}

/// Encoder/decoder for the embedded metadata block
#[derive(Debug, Clone)]
pub struct MetadataCodec {
    marker: String,
    default_repo: String,
}

impl MetadataCodec {
    pub fn new(marker: impl Into<String>, default_repo: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            default_repo: default_repo.into(),
        }
    }

    /// Build a record from the supplied fields, applying defaults
    pub fn build_record(&self, fields: RecordFields) -> SyncRecord {
        let now = Utc::now().to_rfc3339();
        SyncRecord {
            version: SCHEMA_VERSION.to_string(),
            timestamp: now.clone(),
            salesforce: CaseRef {
                case_id: fields.case_id,
                case_number: fields.case_number,
                case_status: fields.case_status,
                case_url: fields.case_url,
            },
            github: IssueRef {
                repo: fields.repo.unwrap_or_else(|| self.default_repo.clone()),
                issue_number: fields.issue_number,
                pr_number: fields.pr_number,
                last_synced_at: fields.last_synced_at.unwrap_or(now),
                synced_by: fields.synced_by.unwrap_or_else(|| DEFAULT_ACTOR.to_string()),
            },
            sync: SyncState {
                direction: fields.direction.unwrap_or_default(),
                status: fields.status.unwrap_or_default(),
                last_error: fields.last_error,
            },
        }
    }

    /// Encode a field set as a framed metadata block
    pub fn encode(&self, fields: RecordFields) -> Result<String> {
        self.render(&self.build_record(fields))
    }

    /// Render a record with the marker + fenced-JSON framing
    pub fn render(&self, record: &SyncRecord) -> Result<String> {
        let json = serde_json::to_string_pretty(record)?;
        Ok(format!(
            "{m}\n```json\n{json}\n```\n{m}",
            m = self.marker,
            json = json
        ))
    }

    /// Decode the first embedded record from a body.
    ///
    /// Returns `None` both when no block exists and when the block's JSON
    /// is malformed or structurally invalid; the two cases differ only in
    /// what gets logged. Callers must treat them identically.
    pub fn decode(&self, body: &str) -> Option<SyncRecord> {
        let span = match self.find_block(body) {
            Some(span) => span,
            None => {
                trace!("No metadata block found in body");
                return None;
            }
        };

        match serde_json::from_str(&span.json) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(error = %e, "Failed to parse metadata block");
                None
            }
        }
    }

    /// Update the embedded record in place.
    ///
    /// With no existing block the patch is encoded fresh and appended.
    /// Otherwise the three groups are shallow-merged field-by-field, the
    /// record `timestamp` and `github.lastSyncedAt` are stamped with the
    /// current time, and the
    /// first matching block is replaced textually, leaving all
    /// surrounding body text untouched.
    pub fn update(&self, body: &str, patch: RecordPatch) -> Result<String> {
        let span = self.find_block(body);
        let existing = span
            .as_ref()
            .and_then(|s| match serde_json::from_str::<SyncRecord>(&s.json) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!(error = %e, "Existing metadata block is malformed, appending fresh");
                    None
                }
            });

        let (span, mut record) = match (span, existing) {
            (Some(span), Some(record)) => (span, record),
            _ => {
                let block = self.encode(patch_to_fields(patch))?;
                if body.is_empty() {
                    return Ok(block);
                }
                return Ok(format!("{}\n\n{}", body, block));
            }
        };

        apply_patch(&mut record, patch);
        let now = Utc::now().to_rfc3339();
        record.timestamp = now.clone();
        record.github.last_synced_at = now;

        let block = self.render(&record)?;
        let mut out = String::with_capacity(body.len() + block.len());
        out.push_str(&body[..span.start]);
        out.push_str(&block);
        out.push_str(&body[span.end..]);
        Ok(out)
    }

    /// Locate the first well-formed marker-delimited block.
    ///
    /// Scans successive literal occurrences of the marker; the first one
    /// followed by a ```json fence, a closing fence, and the marker again
    /// wins. Later blocks are ignored.
    fn find_block(&self, body: &str) -> Option<BlockSpan> {
        let marker = self.marker.as_str();
        let mut from = 0;
        while let Some(rel) = body[from..].find(marker) {
            let start = from + rel;
            let after = start + marker.len();
            if let Some((end, json)) = Self::match_fenced(body, after, marker) {
                return Some(BlockSpan { start, end, json });
            }
            from = after;
        }
        None
    }

    /// Match ` ```json … ``` <marker>` starting just after an opening
    /// marker. Returns the end offset of the closing marker and the
    /// captured JSON text.
    fn match_fenced(body: &str, pos: usize, marker: &str) -> Option<(usize, String)> {
        let pos = skip_whitespace(body, pos);
        let rest = body.get(pos..)?;
        let rest = rest.strip_prefix("```json")?;
        let json_start = body.len() - rest.len();

        let close_rel = rest.find("```")?;
        let json = body[json_start..json_start + close_rel].trim().to_string();

        let mut end = json_start + close_rel + 3;
        end = skip_whitespace(body, end);
        if body.get(end..)?.starts_with(marker) {
            Some((end + marker.len(), json))
        } else {
            None
        }
    }
}

fn skip_whitespace(s: &str, mut pos: usize) -> usize {
    let bytes = s.as_bytes();
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Shallow-merge a patch into an existing record, group by group
fn apply_patch(record: &mut SyncRecord, patch: RecordPatch) {
    if let Some(sf) = patch.salesforce {
        if sf.case_id.is_some() {
            record.salesforce.case_id = sf.case_id;
        }
        if sf.case_number.is_some() {
            record.salesforce.case_number = sf.case_number;
        }
        if sf.case_status.is_some() {
            record.salesforce.case_status = sf.case_status;
        }
        if sf.case_url.is_some() {
            record.salesforce.case_url = sf.case_url;
        }
    }
    if let Some(gh) = patch.github {
        if let Some(repo) = gh.repo {
            record.github.repo = repo;
        }
        if gh.issue_number.is_some() {
            record.github.issue_number = gh.issue_number;
        }
        if gh.pr_number.is_some() {
            record.github.pr_number = gh.pr_number;
        }
        if let Some(actor) = gh.synced_by {
            record.github.synced_by = actor;
        }
    }
    if let Some(sync) = patch.sync {
        if let Some(direction) = sync.direction {
            record.sync.direction = direction;
        }
        if let Some(status) = sync.status {
            record.sync.status = status;
        }
        if let Some(last_error) = sync.last_error {
            record.sync.last_error = last_error;
        }
    }
}

/// Flatten a patch into fresh-record fields (used when no block exists)
fn patch_to_fields(patch: RecordPatch) -> RecordFields {
    let sf = patch.salesforce.unwrap_or_default();
    let gh = patch.github.unwrap_or_default();
    let sync = patch.sync.unwrap_or_default();
    RecordFields {
        case_id: sf.case_id,
        case_number: sf.case_number,
        case_status: sf.case_status,
        case_url: sf.case_url,
        repo: gh.repo,
        issue_number: gh.issue_number,
        pr_number: gh.pr_number,
        last_synced_at: None,
        synced_by: gh.synced_by,
        direction: sync.direction,
        status: sync.status,
        last_error: sync.last_error.flatten(),
    }
}
