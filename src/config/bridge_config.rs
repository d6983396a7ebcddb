//! CaseBridge configuration file handling
//!
//! Loads and manages the ~/.config/casebridge/config.yaml file.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Tracked-system (GitHub) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedConfig {
    /// Default "owner/name" repository for case-initiated syncs
    #[serde(default = "default_repo")]
    pub default_repo: String,

    /// Marker token bounding the embedded metadata block.
    /// Treated as literal text, never as a pattern.
    #[serde(default = "default_marker")]
    pub metadata_marker: String,

    /// Prefix for per-case labels (label is "<prefix>:<caseNumber>")
    #[serde(default = "default_label_prefix")]
    pub label_prefix: String,

    /// Outcome label names
    #[serde(default)]
    pub sync_labels: SyncLabels,
}

fn default_repo() -> String {
    "acme/widgets".to_string()
}

fn default_marker() -> String {
    "<!-- CASEBRIDGE-METADATA -->".to_string()
}

fn default_label_prefix() -> String {
    "sf-case".to_string()
}

impl Default for TrackedConfig {
    fn default() -> Self {
        Self {
            default_repo: default_repo(),
            metadata_marker: default_marker(),
            label_prefix: default_label_prefix(),
            sync_labels: SyncLabels::default(),
        }
    }
}

/// Labels applied to tracked items by sync outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLabels {
    #[serde(default = "default_synced_label")]
    pub synced: String,

    #[serde(default = "default_sync_error_label")]
    pub sync_error: String,
}

fn default_synced_label() -> String {
    "synced".to_string()
}

fn default_sync_error_label() -> String {
    "sync-error".to_string()
}

impl Default for SyncLabels {
    fn default() -> Self {
        Self {
            synced: default_synced_label(),
            sync_error: default_sync_error_label(),
        }
    }
}

/// One entry of the external-status to tracked-state table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMapping {
    /// External (case) status name
    pub external: String,
    /// Tracked (issue) state
    pub tracked: String,
}

/// External-system (Salesforce) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalConfig {
    /// Instance base URL, used to build case links
    #[serde(default = "default_instance_url")]
    pub instance_url: String,

    /// Ordered status-mapping table. The inverse lookup walks entries in
    /// order and takes the first match, so a non-bijective table makes
    /// the inverse depend on entry order. Keep it bijective.
    #[serde(default = "default_status_mapping")]
    pub status_mapping: Vec<StatusMapping>,
}

fn default_instance_url() -> String {
    "https://example.salesforce.com".to_string()
}

fn default_status_mapping() -> Vec<StatusMapping> {
    vec![
        StatusMapping {
            external: "New".to_string(),
            tracked: "open".to_string(),
        },
        StatusMapping {
            external: "Closed".to_string(),
            tracked: "closed".to_string(),
        },
    ]
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            instance_url: default_instance_url(),
            status_mapping: default_status_mapping(),
        }
    }
}

/// Event-trigger behavior
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default)]
    pub on_pr_merge: MergeTrigger,
}

/// What to do when a linked pull request is merged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeTrigger {
    /// Close the linked case as soon as the merge notification arrives
    #[serde(default = "default_true")]
    pub immediate_close: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MergeTrigger {
    fn default() -> Self {
        Self {
            immediate_close: default_true(),
        }
    }
}

/// Failure notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Comment template; `{error}` and `{timestamp}` are substituted
    #[serde(default = "default_failure_template")]
    pub failure_template: String,
}

fn default_failure_template() -> String {
    "⚠️ Sync failed at {timestamp}: {error}".to_string()
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            failure_template: default_failure_template(),
        }
    }
}

/// Audit trail settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Allow-list of event kinds to record
    #[serde(default = "default_log_events")]
    pub log_events: Vec<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_events() -> Vec<String> {
    ["creation", "comment", "statusChange", "closure", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            log_events: default_log_events(),
            log_level: default_log_level(),
        }
    }
}

/// CaseBridge configuration
///
/// Represents the complete ~/.config/casebridge/config.yaml file. Loaded
/// once and handed to the orchestrator by value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub github: TrackedConfig,

    #[serde(default)]
    pub salesforce: ExternalConfig,

    #[serde(default)]
    pub triggers: TriggerConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub audit: AuditConfig,
}

impl BridgeConfig {
    /// Create a configuration with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the default path (~/.config/casebridge/config.yaml)
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        Self::load(&path)
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::BridgeError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading CaseBridge configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            default_repo = %config.github.default_repo,
            mappings = config.salesforce.status_mapping.len(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving CaseBridge configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/casebridge/config.yaml)
    pub fn default_path() -> PathBuf {
        // Always use ~/.config for consistency across platforms (macOS, Linux)
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("casebridge");
        path.push("config.yaml");
        path
    }
}
