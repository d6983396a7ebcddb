//! Sync orchestrator
//!
//! Coordinates the metadata codec, title formatter, and status mapper
//! against the two system clients to implement the create, update,
//! comment, close, and failure-notification flows in both directions.
//!
//! Each operation is a single attempt triggered by an external event
//! (webhook-style): it awaits sequential client calls with no internal
//! parallelism, no retries, and no locking. Concurrent operations on the
//! same link race at the text-replacement layer, last writer wins.
//! Collaborator failures propagate to the caller after an `error` audit
//! event; only [`SyncOrchestrator::notify_sync_failure`] swallows its own
//! failures.

use crate::audit::{AuditEvent, AuditLog};
use crate::clients::{
    CaseUpdate, CreateCaseRequest, CreateItemRequest, ExternalClient, TrackedClient, TrackedRef,
    UpdateItemRequest,
};
use crate::config::BridgeConfig;
use crate::link::{
    case_label, format_title, CaseRefPatch, IssueRefPatch, LinkState, MetadataCodec, RecordFields,
    RecordPatch, StatePatch, StatusMapper, SyncDirection,
};
use crate::Result;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};

/// Color for per-case labels created on the tracked side
const CASE_LABEL_COLOR: &str = "0e8a16";

/// What a sync operation ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    CreatedIssue,
    CreatedCase,
    UpdatedCase,
    /// A comment was propagated to the counterpart system
    Commented,
    ClosedCase,
    /// Operation succeeded without mutating anything
    NoChange,
    /// Operation required a linked record and none existed
    NotLinked,
}

/// Result of one orchestration operation
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub action: SyncAction,
    pub case_id: Option<String>,
    pub issue_number: Option<u64>,
    pub reason: Option<String>,
}

impl SyncOutcome {
    fn new(action: SyncAction) -> Self {
        Self {
            action,
            case_id: None,
            issue_number: None,
            reason: None,
        }
    }

    fn not_linked(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(SyncAction::NotLinked)
        }
    }

    fn with_case(mut self, case_id: impl Into<String>) -> Self {
        self.case_id = Some(case_id.into());
        self
    }

    fn with_issue(mut self, number: u64) -> Self {
        self.issue_number = Some(number);
        self
    }

    fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// True unless the operation needed a link that wasn't there
    pub fn is_linked(&self) -> bool {
        self.action != SyncAction::NotLinked
    }
}

/// Orchestrates sync flows between a tracked-item client and an
/// external-item client. All collaborators and configuration are
/// injected at construction; nothing reads global state per call.
pub struct SyncOrchestrator<T, E> {
    tracked: T,
    external: E,
    config: BridgeConfig,
    codec: MetadataCodec,
    mapper: StatusMapper,
    audit: AuditLog,
}

impl<T: TrackedClient, E: ExternalClient> SyncOrchestrator<T, E> {
    pub fn new(tracked: T, external: E, config: BridgeConfig) -> Self {
        let codec = MetadataCodec::new(
            config.github.metadata_marker.clone(),
            config.github.default_repo.clone(),
        );
        let mapper = StatusMapper::new(config.salesforce.status_mapping.clone());
        let audit = AuditLog::new(config.audit.clone());

        Self {
            tracked,
            external,
            config,
            codec,
            mapper,
            audit,
        }
    }

    /// The codec this orchestrator embeds records with
    pub fn codec(&self) -> &MetadataCodec {
        &self.codec
    }

    /// The injected tracked-system client
    pub fn tracked(&self) -> &T {
        &self.tracked
    }

    /// The injected external-system client
    pub fn external(&self) -> &E {
        &self.external
    }

    // ============ Case → Issue ============

    /// Create a tracked issue from an external case and link the two.
    ///
    /// Fetches the case, formats the canonical title, embeds a fresh
    /// record in the issue body, idempotently ensures the case label,
    /// creates the issue, and writes the tracked reference back onto the
    /// case. A failure after issue creation but before the write-back
    /// leaves the issue linked while the case is not; that window is not
    /// automatically reconciled.
    pub async fn sync_case_to_issue(&self, case_id: &str) -> Result<SyncOutcome> {
        match self.case_to_issue_inner(case_id).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.audit.log(
                    AuditEvent::Error,
                    json!({ "action": "sync_case_to_issue", "caseId": case_id, "error": e.to_string() }),
                );
                Err(e)
            }
        }
    }

    async fn case_to_issue_inner(&self, case_id: &str) -> Result<SyncOutcome> {
        let case = self.external.get_case(case_id).await?;
        let repo = self.config.github.default_repo.clone();

        let title = format_title(&case.subject, &case.case_number);
        let case_url = self.external.case_url(&case.id);

        let block = self.codec.encode(RecordFields {
            case_id: Some(case.id.clone()),
            case_number: Some(case.case_number.clone()),
            case_status: Some(case.status.clone()),
            case_url: Some(case_url),
            repo: Some(repo.clone()),
            direction: Some(SyncDirection::CaseToIssue),
            ..Default::default()
        })?;
        let body = format!("{}\n\n{}", case.description.clone().unwrap_or_default(), block);

        let label = case_label(&self.config.github.label_prefix, &case.case_number);
        self.tracked
            .ensure_label(&repo, &label, CASE_LABEL_COLOR)
            .await?;

        let mut labels = vec![label, self.config.github.sync_labels.synced.clone()];
        if let Some(ref priority) = case.priority {
            labels.push(format!("priority:{}", priority.to_lowercase()));
        }

        let issue = self
            .tracked
            .create_issue(
                &repo,
                CreateItemRequest {
                    title,
                    body: Some(body),
                    labels: Some(labels),
                },
            )
            .await?;

        // Write the tracked reference back to the case. If this call
        // fails the issue side is linked but the case side is not.
        self.external
            .update_case(
                &case.id,
                CaseUpdate {
                    tracked_ref: Some(TrackedRef {
                        repo: repo.clone(),
                        issue_number: issue.number,
                        url: issue.html_url.clone(),
                    }),
                    ..Default::default()
                },
            )
            .await?;

        self.audit.log(
            AuditEvent::Creation,
            json!({
                "direction": "salesforce-to-github",
                "caseId": case.id,
                "issueNumber": issue.number,
            }),
        );

        Ok(SyncOutcome::new(SyncAction::CreatedIssue)
            .with_case(case.id)
            .with_issue(issue.number))
    }

    // ============ Issue → Case ============

    /// Create or update an external case from a tracked issue.
    ///
    /// If the issue body carries a linked record, the case is updated
    /// from the issue's title, body, and mapped state. Otherwise a new
    /// case is created, a fresh record is appended to the issue body, and
    /// the case and synced labels are applied.
    pub async fn sync_issue_to_case(&self, repo: &str, number: u64) -> Result<SyncOutcome> {
        match self.issue_to_case_inner(repo, number).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.audit.log(
                    AuditEvent::Error,
                    json!({ "action": "sync_issue_to_case", "repo": repo, "issueNumber": number, "error": e.to_string() }),
                );
                Err(e)
            }
        }
    }

    async fn issue_to_case_inner(&self, repo: &str, number: u64) -> Result<SyncOutcome> {
        let issue = self.tracked.get_issue(repo, number).await?;
        let body = issue.body.clone().unwrap_or_default();
        let record = self.codec.decode(&body);

        if let Some(case_id) = record.as_ref().and_then(|r| r.case_id()).map(String::from) {
            // Existing link: push issue state onto the case
            let case = self
                .external
                .update_case(
                    &case_id,
                    CaseUpdate {
                        subject: Some(issue.title.clone()),
                        description: issue.body.clone(),
                        status: Some(self.mapper.to_external(&issue.state)),
                        ..Default::default()
                    },
                )
                .await?;

            // A link previously in error recovers on this successful sync
            if LinkState::from_record(record.as_ref()) == LinkState::Error {
                let healed = self.codec.update(&body, RecordPatch::healthy())?;
                self.tracked
                    .update_issue(
                        repo,
                        number,
                        UpdateItemRequest {
                            body: Some(healed),
                            ..Default::default()
                        },
                    )
                    .await?;
            }

            self.audit.log(
                AuditEvent::Creation,
                json!({
                    "direction": "github-to-salesforce",
                    "issueNumber": number,
                    "caseId": case.id,
                }),
            );

            return Ok(SyncOutcome::new(SyncAction::UpdatedCase)
                .with_case(case.id)
                .with_issue(number));
        }

        // No link yet: create the case and embed a fresh record
        let case = self
            .external
            .create_case(CreateCaseRequest {
                subject: issue.title.clone(),
                description: issue.body.clone(),
                status: Some(self.mapper.to_external(&issue.state)),
                priority: None,
                tracked_ref: Some(TrackedRef {
                    repo: repo.to_string(),
                    issue_number: number,
                    url: issue.html_url.clone(),
                }),
            })
            .await?;

        let patch = RecordPatch {
            salesforce: Some(CaseRefPatch {
                case_id: Some(case.id.clone()),
                case_number: Some(case.case_number.clone()),
                case_status: Some(case.status.clone()),
                case_url: Some(self.external.case_url(&case.id)),
            }),
            github: Some(IssueRefPatch {
                repo: Some(repo.to_string()),
                issue_number: Some(number),
                ..Default::default()
            }),
            sync: Some(StatePatch {
                direction: Some(SyncDirection::IssueToCase),
                ..Default::default()
            }),
        };
        // No block exists, so update appends rather than replacing
        let updated_body = self.codec.update(&body, patch)?;

        self.tracked
            .update_issue(
                repo,
                number,
                UpdateItemRequest {
                    body: Some(updated_body),
                    ..Default::default()
                },
            )
            .await?;

        let label = case_label(&self.config.github.label_prefix, &case.case_number);
        self.tracked
            .ensure_label(repo, &label, CASE_LABEL_COLOR)
            .await?;
        self.tracked
            .add_labels(
                repo,
                number,
                &[label, self.config.github.sync_labels.synced.clone()],
            )
            .await?;

        self.audit.log(
            AuditEvent::Creation,
            json!({
                "direction": "github-to-salesforce",
                "issueNumber": number,
                "caseId": case.id,
            }),
        );

        Ok(SyncOutcome::new(SyncAction::CreatedCase)
            .with_case(case.id)
            .with_issue(number))
    }

    // ============ Comments ============

    /// Propagate a tracked-item comment to the linked case.
    ///
    /// Requires an existing link; with no embedded record this fails with
    /// [`crate::BridgeError::NotLinked`] before any external call.
    pub async fn sync_comment_to_case(
        &self,
        repo: &str,
        number: u64,
        comment_body: &str,
    ) -> Result<SyncOutcome> {
        match self.comment_to_case_inner(repo, number, comment_body).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.audit.log(
                    AuditEvent::Error,
                    json!({ "action": "sync_comment_to_case", "repo": repo, "issueNumber": number, "error": e.to_string() }),
                );
                Err(e)
            }
        }
    }

    async fn comment_to_case_inner(
        &self,
        repo: &str,
        number: u64,
        comment_body: &str,
    ) -> Result<SyncOutcome> {
        let issue = self.tracked.get_issue(repo, number).await?;
        let body = issue.body.clone().unwrap_or_default();

        let case_id = self
            .codec
            .decode(&body)
            .and_then(|r| r.case_id().map(String::from))
            .ok_or_else(|| {
                crate::BridgeError::NotLinked(format!(
                    "No case linked to issue {}#{}",
                    repo, number
                ))
            })?;

        let provenance = format!(
            "GitHub Comment:\n{}\n\nSource: {}",
            comment_body, issue.html_url
        );
        self.external.add_case_comment(&case_id, &provenance).await?;

        self.audit.log(
            AuditEvent::Comment,
            json!({
                "direction": "github-to-salesforce",
                "issueNumber": number,
                "caseId": case_id,
            }),
        );

        Ok(SyncOutcome::new(SyncAction::Commented)
            .with_case(case_id)
            .with_issue(number))
    }

    /// Propagate a case comment to the linked tracked item.
    ///
    /// Incomplete: resolving the tracked item needs
    /// [`ExternalClient::find_by_tracked_ref`]'s inverse, which the
    /// bundled client does not provide. Succeeds without mutating.
    pub async fn sync_comment_to_issue(
        &self,
        case_id: &str,
        _comment_body: &str,
    ) -> Result<SyncOutcome> {
        debug!(case_id = %case_id, "Case-to-issue comment lookup not implemented");

        self.audit.log(
            AuditEvent::Comment,
            json!({
                "direction": "salesforce-to-github",
                "caseId": case_id,
            }),
        );

        Ok(SyncOutcome::new(SyncAction::NoChange)
            .with_case(case_id)
            .with_reason("case-to-issue comment propagation not implemented"))
    }

    // ============ Status changes ============

    /// Propagate a case status change to the linked tracked item.
    ///
    /// Incomplete for the same reason as [`Self::sync_comment_to_issue`]:
    /// the mapped state is computed and audited but nothing is mutated.
    pub async fn sync_status_to_issue(
        &self,
        case_id: &str,
        new_status: &str,
    ) -> Result<SyncOutcome> {
        let tracked_state = self.mapper.to_tracked(new_status);
        debug!(
            case_id = %case_id,
            status = %new_status,
            mapped = %tracked_state,
            "Case-to-issue status lookup not implemented"
        );

        self.audit.log(
            AuditEvent::StatusChange,
            json!({
                "direction": "salesforce-to-github",
                "caseId": case_id,
                "newStatus": new_status,
            }),
        );

        Ok(SyncOutcome::new(SyncAction::NoChange)
            .with_case(case_id)
            .with_reason("case-to-issue status propagation not implemented"))
    }

    /// Propagate a tracked-item state change to the linked case.
    ///
    /// With no embedded record this reports a structured
    /// [`SyncAction::NotLinked`] outcome instead of an error.
    pub async fn sync_status_to_case(
        &self,
        repo: &str,
        number: u64,
        new_state: &str,
    ) -> Result<SyncOutcome> {
        match self.status_to_case_inner(repo, number, new_state).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.audit.log(
                    AuditEvent::Error,
                    json!({ "action": "sync_status_to_case", "repo": repo, "issueNumber": number, "error": e.to_string() }),
                );
                Err(e)
            }
        }
    }

    async fn status_to_case_inner(
        &self,
        repo: &str,
        number: u64,
        new_state: &str,
    ) -> Result<SyncOutcome> {
        let issue = self.tracked.get_issue(repo, number).await?;
        let body = issue.body.clone().unwrap_or_default();

        let Some(case_id) = self
            .codec
            .decode(&body)
            .and_then(|r| r.case_id().map(String::from))
        else {
            self.audit.log(
                AuditEvent::StatusChange,
                json!({
                    "direction": "github-to-salesforce",
                    "issueNumber": number,
                    "reason": "notLinked",
                }),
            );
            return Ok(SyncOutcome::not_linked("No linked case").with_issue(number));
        };

        let external_status = self.mapper.to_external(new_state);
        self.external
            .update_case(
                &case_id,
                CaseUpdate {
                    status: Some(external_status),
                    ..Default::default()
                },
            )
            .await?;

        self.audit.log(
            AuditEvent::StatusChange,
            json!({
                "direction": "github-to-salesforce",
                "issueNumber": number,
                "caseId": case_id,
                "newState": new_state,
            }),
        );

        Ok(SyncOutcome::new(SyncAction::UpdatedCase)
            .with_case(case_id)
            .with_issue(number))
    }

    // ============ PR merge ============

    /// Handle a pull-request merge notification.
    ///
    /// When the PR is merged, linked, and configuration asks for an
    /// immediate close, the case is closed with a synthesized resolution
    /// comment. Everything else is a no-op outcome.
    pub async fn handle_pr_merge(&self, repo: &str, pr_number: u64) -> Result<SyncOutcome> {
        match self.pr_merge_inner(repo, pr_number).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.audit.log(
                    AuditEvent::Error,
                    json!({ "action": "handle_pr_merge", "repo": repo, "prNumber": pr_number, "error": e.to_string() }),
                );
                Err(e)
            }
        }
    }

    async fn pr_merge_inner(&self, repo: &str, pr_number: u64) -> Result<SyncOutcome> {
        // Notifications can arrive for PRs that were closed unmerged
        if !self.tracked.is_merged(repo, pr_number).await? {
            return Ok(SyncOutcome::new(SyncAction::NoChange)
                .with_issue(pr_number)
                .with_reason("PR not merged"));
        }

        let pr = self.tracked.get_issue(repo, pr_number).await?;
        let body = pr.body.clone().unwrap_or_default();

        let Some(case_id) = self
            .codec
            .decode(&body)
            .and_then(|r| r.case_id().map(String::from))
        else {
            self.audit.log(
                AuditEvent::Closure,
                json!({
                    "direction": "github-to-salesforce",
                    "prNumber": pr_number,
                    "reason": "notLinked",
                }),
            );
            return Ok(SyncOutcome::not_linked("No linked case").with_issue(pr_number));
        };

        if !self.config.triggers.on_pr_merge.immediate_close {
            return Ok(SyncOutcome::new(SyncAction::NoChange)
                .with_case(case_id)
                .with_issue(pr_number)
                .with_reason("immediate close disabled"));
        }

        self.external
            .close_case(
                &case_id,
                &format!("Automatically closed: PR #{} merged to main", pr_number),
            )
            .await?;

        self.audit.log(
            AuditEvent::Closure,
            json!({
                "direction": "github-to-salesforce",
                "prNumber": pr_number,
                "caseId": case_id,
                "trigger": "immediate",
            }),
        );

        Ok(SyncOutcome::new(SyncAction::ClosedCase)
            .with_case(case_id)
            .with_issue(pr_number))
    }

    // ============ Failure notification ============

    /// Post a failure comment and apply the error label to a tracked
    /// item. Best-effort: returns false (after logging) when the
    /// notification itself fails, and never propagates that failure.
    pub async fn notify_sync_failure(&self, repo: &str, number: u64, error: &str) -> bool {
        let message = self
            .config
            .notifications
            .failure_template
            .replace("{error}", error)
            .replace("{timestamp}", &Utc::now().to_rfc3339());

        let result: Result<()> = async {
            self.tracked.add_comment(repo, number, &message).await?;
            self.tracked
                .add_labels(
                    repo,
                    number,
                    &[self.config.github.sync_labels.sync_error.clone()],
                )
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    repo = %repo,
                    number = %number,
                    error = %e,
                    "Failed to notify about sync failure"
                );
                false
            }
        }
    }
}
