//! Configuration system
//!
//! Recognized options for the sync bridge: repo defaults, metadata marker,
//! label names, the status-mapping table, merge-trigger behavior, failure
//! notification template, and audit settings.
//!
//! Configuration is loaded once (YAML file or defaults) and passed
//! explicitly into the orchestrator and codec at construction time. There
//! is no global config and nothing re-reads the file per call.

mod bridge_config;

pub use bridge_config::{
    AuditConfig, BridgeConfig, ExternalConfig, MergeTrigger, NotificationConfig, StatusMapping,
    SyncLabels, TrackedConfig, TriggerConfig,
};
