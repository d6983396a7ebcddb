//! CaseBridge - Bidirectional GitHub/support-case synchronization
//!
//! CaseBridge keeps GitHub issues and pull requests ("tracked items") in
//! sync with customer-support cases ("external items"). The link between
//! the two is a structured metadata record embedded between marker
//! tokens in the issue/PR body; every sync action re-serializes the
//! record in place.
//!
//! # Architecture
//!
//! - **link**: Core data model (SyncRecord, LinkState), the metadata
//!   codec, title/label formatting, and status mapping
//! - **clients**: Async client contracts plus the GitHub REST adapter
//!   and the mock Salesforce client
//! - **sync**: The orchestrator implementing the create/update/comment/
//!   close/notify flows in both directions
//! - **config**: YAML configuration, injected at construction
//! - **audit**: Configuration-gated structured audit events

// Core modules
pub mod audit;
pub mod config;
pub mod error;
pub mod link;
pub mod logging;

// Components
pub mod clients;
pub mod sync;

// Re-exports
pub use error::{BridgeError, Result};
