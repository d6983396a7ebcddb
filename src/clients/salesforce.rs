//! Salesforce client (mock/placeholder)
//!
//! Implements [`ExternalClient`] against an in-memory case store. This is
//! an explicit placeholder: a production deployment would talk to the
//! Salesforce REST API instead. The shapes and generated identifiers
//! mirror real cases (Id prefixed "500", sequential case numbers) so the
//! rest of the system behaves realistically.

use super::{Case, CaseUpdate, CreateCaseRequest, ExternalClient};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// In-memory stand-in for the support system
pub struct SalesforceClient {
    instance_url: String,
    cases: Mutex<HashMap<String, Case>>,
    next_seq: AtomicU64,
}

impl SalesforceClient {
    pub fn new(instance_url: impl Into<String>) -> Self {
        Self {
            instance_url: instance_url.into().trim_end_matches('/').to_string(),
            cases: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Mock 18-character-style case Id ("500" prefix like real ones)
    fn generate_id(&self, seq: u64) -> String {
        format!("500MOCK{:011}", seq)
    }

    /// Sequential case numbers starting at 100000
    fn generate_case_number(seq: u64) -> String {
        format!("{:06}", 100000 + seq - 1)
    }

    /// Number of cases in the mock store (test hook)
    pub fn case_count(&self) -> usize {
        self.cases.lock().expect("case store poisoned").len()
    }
}

#[async_trait]
impl ExternalClient for SalesforceClient {
    async fn get_case(&self, case_id: &str) -> Result<Case> {
        let cases = self.cases.lock().expect("case store poisoned");
        cases.get(case_id).cloned().ok_or_else(|| {
            crate::BridgeError::Integration(format!("Case not found: {}", case_id))
        })
    }

    async fn create_case(&self, request: CreateCaseRequest) -> Result<Case> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let case = Case {
            id: self.generate_id(seq),
            case_number: Self::generate_case_number(seq),
            subject: request.subject,
            description: request.description,
            status: request.status.unwrap_or_else(|| "New".to_string()),
            priority: request.priority.or_else(|| Some("Medium".to_string())),
        };

        info!(
            case_id = %case.id,
            case_number = %case.case_number,
            "[mock] Created case"
        );

        let mut cases = self.cases.lock().expect("case store poisoned");
        cases.insert(case.id.clone(), case.clone());
        Ok(case)
    }

    async fn update_case(&self, case_id: &str, update: CaseUpdate) -> Result<Case> {
        let mut cases = self.cases.lock().expect("case store poisoned");
        let case = cases.get_mut(case_id).ok_or_else(|| {
            crate::BridgeError::Integration(format!("Case not found: {}", case_id))
        })?;

        if let Some(subject) = update.subject {
            case.subject = subject;
        }
        if update.description.is_some() {
            case.description = update.description;
        }
        if let Some(status) = update.status {
            case.status = status;
        }
        // tracked_ref would map to custom fields on a real org; the mock
        // has nowhere to put it beyond logging
        if let Some(ref tracked) = update.tracked_ref {
            debug!(
                case_id = %case_id,
                repo = %tracked.repo,
                issue = tracked.issue_number,
                "[mock] Recorded tracked ref on case"
            );
        }

        info!(case_id = %case_id, "[mock] Updated case");
        Ok(case.clone())
    }

    async fn add_case_comment(&self, case_id: &str, body: &str) -> Result<()> {
        // Comments aren't stored; existence check keeps the contract honest
        {
            let cases = self.cases.lock().expect("case store poisoned");
            if !cases.contains_key(case_id) {
                return Err(crate::BridgeError::Integration(format!(
                    "Case not found: {}",
                    case_id
                )));
            }
        }
        info!(case_id = %case_id, chars = body.len(), "[mock] Added case comment");
        Ok(())
    }

    async fn close_case(&self, case_id: &str, resolution: &str) -> Result<Case> {
        info!(case_id = %case_id, resolution = %resolution, "[mock] Closing case");
        self.update_case(
            case_id,
            CaseUpdate {
                status: Some("Closed".to_string()),
                ..Default::default()
            },
        )
        .await
    }

    async fn find_by_tracked_ref(&self, repo: &str, issue_number: u64) -> Result<Option<Case>> {
        // Stub: a real implementation queries the org for cases whose
        // tracked-ref fields match. Until then, case-initiated comment
        // and status flows cannot resolve their target.
        warn!(
            repo = %repo,
            issue = issue_number,
            "[mock] find_by_tracked_ref is a stub, returning not-found"
        );
        Ok(None)
    }

    fn case_url(&self, case_id: &str) -> String {
        format!("{}/lightning/r/Case/{}/view", self.instance_url, case_id)
    }
}
