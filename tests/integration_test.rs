//! Integration tests for CaseBridge
//!
//! These tests run the orchestrator flows end to end against in-memory
//! fake clients, asserting on the exact calls made to each side.

use async_trait::async_trait;
use casebridge::clients::{
    Case, CaseUpdate, CreateCaseRequest, CreateItemRequest, ExternalClient, ItemComment,
    TrackedClient, TrackedItem, TrackedRef, UpdateItemRequest,
};
use casebridge::config::BridgeConfig;
use casebridge::link::{extract_case_number, MetadataCodec, RecordFields, SyncDirection, SyncStatus};
use casebridge::sync::{SyncAction, SyncOrchestrator};
use casebridge::{BridgeError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// In-memory tracked-system client recording every call
#[derive(Default)]
struct FakeTracked {
    issues: Mutex<HashMap<u64, TrackedItem>>,
    comments: Mutex<Vec<String>>,
    labels_added: Mutex<Vec<String>>,
    labels_ensured: Mutex<Vec<String>>,
    merged: Mutex<HashSet<u64>>,
    next_number: AtomicU64,
    fail_writes: AtomicBool,
}

impl FakeTracked {
    fn seed_issue(&self, number: u64, title: &str, body: Option<&str>, state: &str) {
        let mut issues = self.issues.lock().unwrap();
        issues.insert(
            number,
            TrackedItem {
                number,
                title: title.to_string(),
                body: body.map(String::from),
                state: state.to_string(),
                labels: vec![],
                html_url: format!("https://github.com/acme/widgets/issues/{}", number),
            },
        );
    }

    fn mark_merged(&self, number: u64) {
        self.merged.lock().unwrap().insert(number);
    }

    fn body_of(&self, number: u64) -> String {
        self.issues
            .lock()
            .unwrap()
            .get(&number)
            .and_then(|i| i.body.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TrackedClient for FakeTracked {
    async fn get_issue(&self, _repo: &str, number: u64) -> Result<TrackedItem> {
        self.issues
            .lock()
            .unwrap()
            .get(&number)
            .cloned()
            .ok_or_else(|| BridgeError::Integration(format!("Issue not found: #{}", number)))
    }

    async fn create_issue(&self, repo: &str, request: CreateItemRequest) -> Result<TrackedItem> {
        let number = self.next_number.fetch_add(1, Ordering::SeqCst) + 1;
        let item = TrackedItem {
            number,
            title: request.title,
            body: request.body,
            state: "open".to_string(),
            labels: vec![],
            html_url: format!("https://github.com/{}/issues/{}", repo, number),
        };
        if let Some(labels) = request.labels {
            self.labels_added.lock().unwrap().extend(labels);
        }
        self.issues.lock().unwrap().insert(number, item.clone());
        Ok(item)
    }

    async fn update_issue(
        &self,
        _repo: &str,
        number: u64,
        request: UpdateItemRequest,
    ) -> Result<TrackedItem> {
        let mut issues = self.issues.lock().unwrap();
        let item = issues
            .get_mut(&number)
            .ok_or_else(|| BridgeError::Integration(format!("Issue not found: #{}", number)))?;
        if let Some(title) = request.title {
            item.title = title;
        }
        if request.body.is_some() {
            item.body = request.body;
        }
        if let Some(state) = request.state {
            item.state = state;
        }
        Ok(item.clone())
    }

    async fn add_comment(&self, _repo: &str, _number: u64, body: &str) -> Result<ItemComment> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::Integration("comment rejected".to_string()));
        }
        let mut comments = self.comments.lock().unwrap();
        comments.push(body.to_string());
        Ok(ItemComment {
            id: comments.len() as u64,
            body: body.to_string(),
        })
    }

    async fn add_labels(&self, _repo: &str, _number: u64, labels: &[String]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::Integration("labels rejected".to_string()));
        }
        self.labels_added.lock().unwrap().extend_from_slice(labels);
        Ok(())
    }

    async fn ensure_label(&self, _repo: &str, name: &str, _color: &str) -> Result<()> {
        self.labels_ensured.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn list_comments(&self, _repo: &str, _number: u64) -> Result<Vec<ItemComment>> {
        Ok(self
            .comments
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, body)| ItemComment {
                id: i as u64 + 1,
                body: body.clone(),
            })
            .collect())
    }

    async fn is_merged(&self, _repo: &str, number: u64) -> Result<bool> {
        Ok(self.merged.lock().unwrap().contains(&number))
    }
}

/// In-memory external-system client counting every call
#[derive(Default)]
struct FakeExternal {
    cases: Mutex<HashMap<String, Case>>,
    case_comments: Mutex<Vec<(String, String)>>,
    tracked_refs: Mutex<Vec<(String, TrackedRef)>>,
    calls: AtomicU64,
    next_seq: AtomicU64,
}

impl FakeExternal {
    fn seed_case(&self, id: &str, case_number: &str, subject: &str, status: &str) {
        self.cases.lock().unwrap().insert(
            id.to_string(),
            Case {
                id: id.to_string(),
                case_number: case_number.to_string(),
                subject: subject.to_string(),
                description: Some("Case description".to_string()),
                status: status.to_string(),
                priority: Some("High".to_string()),
            },
        );
    }

    fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn case(&self, id: &str) -> Option<Case> {
        self.cases.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl ExternalClient for FakeExternal {
    async fn get_case(&self, case_id: &str) -> Result<Case> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.case(case_id)
            .ok_or_else(|| BridgeError::Integration(format!("Case not found: {}", case_id)))
    }

    async fn create_case(&self, request: CreateCaseRequest) -> Result<Case> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let case = Case {
            id: format!("500FAKE{:03}", seq),
            case_number: format!("{}", 200000 + seq),
            subject: request.subject,
            description: request.description,
            status: request.status.unwrap_or_else(|| "New".to_string()),
            priority: request.priority,
        };
        if let Some(tracked) = request.tracked_ref {
            self.tracked_refs
                .lock()
                .unwrap()
                .push((case.id.clone(), tracked));
        }
        self.cases
            .lock()
            .unwrap()
            .insert(case.id.clone(), case.clone());
        Ok(case)
    }

    async fn update_case(&self, case_id: &str, update: CaseUpdate) -> Result<Case> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut cases = self.cases.lock().unwrap();
        let case = cases
            .get_mut(case_id)
            .ok_or_else(|| BridgeError::Integration(format!("Case not found: {}", case_id)))?;
        if let Some(subject) = update.subject {
            case.subject = subject;
        }
        if update.description.is_some() {
            case.description = update.description;
        }
        if let Some(status) = update.status {
            case.status = status;
        }
        if let Some(tracked) = update.tracked_ref {
            self.tracked_refs
                .lock()
                .unwrap()
                .push((case_id.to_string(), tracked));
        }
        Ok(case.clone())
    }

    async fn add_case_comment(&self, case_id: &str, body: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.case_comments
            .lock()
            .unwrap()
            .push((case_id.to_string(), body.to_string()));
        Ok(())
    }

    async fn close_case(&self, case_id: &str, _resolution: &str) -> Result<Case> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut cases = self.cases.lock().unwrap();
        let case = cases
            .get_mut(case_id)
            .ok_or_else(|| BridgeError::Integration(format!("Case not found: {}", case_id)))?;
        case.status = "Closed".to_string();
        Ok(case.clone())
    }

    async fn find_by_tracked_ref(&self, _repo: &str, _issue_number: u64) -> Result<Option<Case>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    fn case_url(&self, case_id: &str) -> String {
        format!("https://fake.example/cases/{}", case_id)
    }
}

fn orchestrator() -> SyncOrchestrator<FakeTracked, FakeExternal> {
    SyncOrchestrator::new(
        FakeTracked::default(),
        FakeExternal::default(),
        BridgeConfig::new(),
    )
}

/// Codec matching the default configuration, for seeding bodies
fn test_codec() -> MetadataCodec {
    let config = BridgeConfig::new();
    MetadataCodec::new(
        config.github.metadata_marker,
        config.github.default_repo,
    )
}

/// Body text with an embedded record linking to `case_id`
fn linked_body(case_id: &str, issue_number: u64) -> String {
    let block = test_codec()
        .encode(RecordFields {
            case_id: Some(case_id.to_string()),
            case_number: Some("12345".to_string()),
            issue_number: Some(issue_number),
            ..Default::default()
        })
        .unwrap();
    format!("Original description\n\n{}", block)
}

mod case_to_issue_tests {
    use super::*;

    #[tokio::test]
    async fn creates_issue_with_link_and_labels() {
        let orch = orchestrator();
        orch.external()
            .seed_case("500TEST123", "12345", "Login bug", "New");

        let outcome = orch.sync_case_to_issue("500TEST123").await.unwrap();
        assert_eq!(outcome.action, SyncAction::CreatedIssue);
        let number = outcome.issue_number.unwrap();

        // Canonical title
        let issue = orch.tracked().get_issue("acme/widgets", number).await.unwrap();
        assert_eq!(issue.title, "[SF Case #12345] Login bug");
        assert_eq!(extract_case_number(&issue.title).as_deref(), Some("12345"));

        // Body carries a decodable record with the case reference
        let record = test_codec().decode(&issue.body.unwrap()).unwrap();
        assert_eq!(record.salesforce.case_id.as_deref(), Some("500TEST123"));
        assert_eq!(record.sync.direction, SyncDirection::CaseToIssue);
        assert_eq!(
            record.salesforce.case_url.as_deref(),
            Some("https://fake.example/cases/500TEST123")
        );

        // Case label ensured before use, then applied with synced + priority
        let ensured = orch.tracked().labels_ensured.lock().unwrap().clone();
        assert_eq!(ensured, vec!["sf-case:12345"]);
        let labels = orch.tracked().labels_added.lock().unwrap().clone();
        assert!(labels.contains(&"sf-case:12345".to_string()));
        assert!(labels.contains(&"synced".to_string()));
        assert!(labels.contains(&"priority:high".to_string()));

        // Tracked reference written back onto the case
        let refs = orch.external().tracked_refs.lock().unwrap().clone();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].0, "500TEST123");
        assert_eq!(refs[0].1.issue_number, number);
    }

    #[tokio::test]
    async fn missing_case_propagates_error() {
        let orch = orchestrator();
        let result = orch.sync_case_to_issue("500NOPE").await;
        assert!(result.is_err());
    }
}

mod issue_to_case_tests {
    use super::*;

    #[tokio::test]
    async fn creates_case_and_appends_record() {
        let orch = orchestrator();
        orch.tracked()
            .seed_issue(7, "Crash on save", Some("Steps to reproduce"), "open");

        let outcome = orch.sync_issue_to_case("acme/widgets", 7).await.unwrap();
        assert_eq!(outcome.action, SyncAction::CreatedCase);
        let case_id = outcome.case_id.unwrap();

        // Case carries the issue's content and mapped state
        let case = orch.external().case(&case_id).unwrap();
        assert_eq!(case.subject, "Crash on save");
        assert_eq!(case.status, "New"); // open maps to New in defaults

        // A fresh record was appended after the original body
        let body = orch.tracked().body_of(7);
        assert!(body.starts_with("Steps to reproduce\n\n"));
        let record = test_codec().decode(&body).unwrap();
        assert_eq!(record.salesforce.case_id.as_deref(), Some(case_id.as_str()));
        assert_eq!(record.github.issue_number, Some(7));
        assert_eq!(record.sync.direction, SyncDirection::IssueToCase);

        // Labels ensured and applied
        let ensured = orch.tracked().labels_ensured.lock().unwrap().clone();
        assert_eq!(ensured, vec![format!("sf-case:{}", case.case_number)]);
    }

    #[tokio::test]
    async fn updates_linked_case_in_place() {
        let orch = orchestrator();
        orch.external()
            .seed_case("500LINKED", "12345", "Old subject", "New");
        orch.tracked().seed_issue(
            9,
            "[SF Case #12345] New subject",
            Some(&linked_body("500LINKED", 9)),
            "closed",
        );

        let outcome = orch.sync_issue_to_case("acme/widgets", 9).await.unwrap();
        assert_eq!(outcome.action, SyncAction::UpdatedCase);

        let case = orch.external().case("500LINKED").unwrap();
        assert_eq!(case.subject, "[SF Case #12345] New subject");
        assert_eq!(case.status, "Closed"); // closed maps back via the table
        // No second case was created
        assert_eq!(orch.external().cases.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn errored_link_recovers_on_successful_sync() {
        let orch = orchestrator();
        orch.external()
            .seed_case("500ERR", "12345", "Subject", "New");

        let block = test_codec()
            .encode(RecordFields {
                case_id: Some("500ERR".to_string()),
                case_number: Some("12345".to_string()),
                issue_number: Some(3),
                status: Some(SyncStatus::Error),
                last_error: Some("previous failure".to_string()),
                ..Default::default()
            })
            .unwrap();
        orch.tracked()
            .seed_issue(3, "Subject", Some(&block), "open");

        orch.sync_issue_to_case("acme/widgets", 3).await.unwrap();

        let record = test_codec().decode(&orch.tracked().body_of(3)).unwrap();
        assert_eq!(record.sync.status, SyncStatus::Active);
        assert_eq!(record.sync.last_error, None);
    }
}

mod comment_tests {
    use super::*;

    #[tokio::test]
    async fn propagates_comment_with_provenance() {
        let orch = orchestrator();
        orch.external()
            .seed_case("500LINKED", "12345", "Subject", "New");
        orch.tracked()
            .seed_issue(5, "Subject", Some(&linked_body("500LINKED", 5)), "open");

        let outcome = orch
            .sync_comment_to_case("acme/widgets", 5, "Fixed in the next build")
            .await
            .unwrap();
        assert_eq!(outcome.action, SyncAction::Commented);

        let comments = orch.external().case_comments.lock().unwrap().clone();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].0, "500LINKED");
        assert!(comments[0].1.starts_with("GitHub Comment:\nFixed in the next build"));
        assert!(comments[0]
            .1
            .contains("Source: https://github.com/acme/widgets/issues/5"));
    }

    #[tokio::test]
    async fn not_linked_comment_makes_no_external_call() {
        let orch = orchestrator();
        orch.tracked()
            .seed_issue(6, "Unlinked issue", Some("Plain body"), "open");

        let result = orch
            .sync_comment_to_case("acme/widgets", 6, "A comment")
            .await;

        assert!(matches!(result, Err(BridgeError::NotLinked(_))));
        assert_eq!(orch.external().call_count(), 0);
    }

    #[tokio::test]
    async fn case_to_issue_comment_is_a_stub() {
        let orch = orchestrator();
        let outcome = orch
            .sync_comment_to_issue("500ANY", "Case comment")
            .await
            .unwrap();
        assert_eq!(outcome.action, SyncAction::NoChange);
        // Nothing was mutated anywhere
        assert!(orch.tracked().comments.lock().unwrap().is_empty());
        assert_eq!(orch.external().call_count(), 0);
    }
}

mod status_tests {
    use super::*;

    #[tokio::test]
    async fn propagates_state_to_case() {
        let orch = orchestrator();
        orch.external()
            .seed_case("500LINKED", "12345", "Subject", "New");
        orch.tracked()
            .seed_issue(8, "Subject", Some(&linked_body("500LINKED", 8)), "open");

        let outcome = orch
            .sync_status_to_case("acme/widgets", 8, "closed")
            .await
            .unwrap();
        assert_eq!(outcome.action, SyncAction::UpdatedCase);

        let case = orch.external().case("500LINKED").unwrap();
        assert_eq!(case.status, "Closed");
    }

    #[tokio::test]
    async fn not_linked_is_a_structured_outcome() {
        let orch = orchestrator();
        orch.tracked()
            .seed_issue(2, "Unlinked", Some("no record here"), "open");

        let outcome = orch
            .sync_status_to_case("acme/widgets", 2, "closed")
            .await
            .unwrap();
        assert_eq!(outcome.action, SyncAction::NotLinked);
        assert!(!outcome.is_linked());
        assert_eq!(orch.external().call_count(), 0);
    }

    #[tokio::test]
    async fn case_to_issue_status_is_a_stub() {
        let orch = orchestrator();
        let outcome = orch
            .sync_status_to_issue("500ANY", "Closed")
            .await
            .unwrap();
        assert_eq!(outcome.action, SyncAction::NoChange);
        assert_eq!(orch.external().call_count(), 0);
    }
}

mod merge_tests {
    use super::*;

    #[tokio::test]
    async fn merged_pr_closes_linked_case() {
        let orch = orchestrator();
        orch.external()
            .seed_case("500LINKED", "12345", "Subject", "New");
        orch.tracked()
            .seed_issue(11, "Fix crash", Some(&linked_body("500LINKED", 11)), "closed");
        orch.tracked().mark_merged(11);

        let outcome = orch.handle_pr_merge("acme/widgets", 11).await.unwrap();
        assert_eq!(outcome.action, SyncAction::ClosedCase);

        let case = orch.external().case("500LINKED").unwrap();
        assert_eq!(case.status, "Closed");
    }

    #[tokio::test]
    async fn unmerged_pr_is_a_no_op() {
        let orch = orchestrator();
        orch.tracked()
            .seed_issue(12, "Open PR", Some(&linked_body("500X", 12)), "open");

        let outcome = orch.handle_pr_merge("acme/widgets", 12).await.unwrap();
        assert_eq!(outcome.action, SyncAction::NoChange);
        assert_eq!(outcome.reason.as_deref(), Some("PR not merged"));
        assert_eq!(orch.external().call_count(), 0);
    }

    #[tokio::test]
    async fn merge_without_link_reports_not_linked() {
        let orch = orchestrator();
        orch.tracked()
            .seed_issue(13, "Unlinked PR", Some("no record"), "closed");
        orch.tracked().mark_merged(13);

        let outcome = orch.handle_pr_merge("acme/widgets", 13).await.unwrap();
        assert_eq!(outcome.action, SyncAction::NotLinked);
    }

    #[tokio::test]
    async fn immediate_close_disabled_leaves_case_open() {
        let mut config = BridgeConfig::new();
        config.triggers.on_pr_merge.immediate_close = false;

        let orch = SyncOrchestrator::new(FakeTracked::default(), FakeExternal::default(), config);
        orch.external()
            .seed_case("500LINKED", "12345", "Subject", "New");
        orch.tracked()
            .seed_issue(14, "Fix", Some(&linked_body("500LINKED", 14)), "closed");
        orch.tracked().mark_merged(14);

        let outcome = orch.handle_pr_merge("acme/widgets", 14).await.unwrap();
        assert_eq!(outcome.action, SyncAction::NoChange);
        assert_eq!(orch.external().case("500LINKED").unwrap().status, "New");
    }
}

mod notify_tests {
    use super::*;

    #[tokio::test]
    async fn posts_templated_comment_and_error_label() {
        let orch = orchestrator();
        orch.tracked().seed_issue(20, "Broken sync", None, "open");

        let ok = orch
            .notify_sync_failure("acme/widgets", 20, "case update rejected")
            .await;
        assert!(ok);

        let comments = orch.tracked().comments.lock().unwrap().clone();
        assert_eq!(comments.len(), 1);
        // Placeholders substituted, none left behind
        assert!(comments[0].contains("case update rejected"));
        assert!(!comments[0].contains("{error}"));
        assert!(!comments[0].contains("{timestamp}"));

        let labels = orch.tracked().labels_added.lock().unwrap().clone();
        assert_eq!(labels, vec!["sync-error"]);
    }

    #[tokio::test]
    async fn notification_failure_is_swallowed() {
        let orch = orchestrator();
        orch.tracked().seed_issue(21, "Broken sync", None, "open");
        orch.tracked().fail_writes.store(true, Ordering::SeqCst);

        let ok = orch.notify_sync_failure("acme/widgets", 21, "boom").await;
        assert!(!ok);
    }
}
