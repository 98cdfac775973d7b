//! Configuration specification types for the sync tool.
//!
//! These types map to `controld-sync.yaml`. Credentials may be left out of
//! the file and supplied through the environment instead.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result, SyncError};

/// Environment variable holding the Tailscale API key.
pub const ENV_TAILSCALE_API_KEY: &str = "TAILSCALE_API_KEY";

/// Environment variable holding the ControlD API token.
pub const ENV_CONTROLD_API_TOKEN: &str = "CONTROLD_API_TOKEN";

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    /// Tailscale inventory source.
    #[serde(default)]
    pub tailscale: TailscaleConfig,
    /// ControlD rule destination.
    pub controld: ControlDConfig,
    /// Hostname expansion settings.
    #[serde(default)]
    pub dns: DnsConfig,
    /// Backup location.
    #[serde(default)]
    pub backup: BackupConfig,
}

/// Tailscale API settings.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TailscaleConfig {
    /// API access token.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Tailnet identifier; `-` is the default tailnet of the token.
    #[serde(default = "default_tailnet")]
    pub tailnet: String,
}

/// ControlD API settings.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlDConfig {
    /// API token.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Profile holding the managed rules.
    pub profile_id: String,
    /// Folder that holds every rule this tool manages.
    #[serde(default = "default_folder_name")]
    pub folder_name: String,
}

/// Hostname expansion settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DnsConfig {
    /// Domain suffixes appended to every inventory name.
    #[serde(default)]
    pub suffixes: Vec<String>,
    /// Also emit the unqualified inventory name.
    #[serde(default)]
    pub include_bare: bool,
}

/// Backup settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupConfig {
    /// Directory the pre-change snapshots are written to.
    #[serde(default = "default_backup_dir")]
    pub dir: PathBuf,
}

fn default_tailnet() -> String {
    String::from("-")
}

fn default_folder_name() -> String {
    String::from("Tailscale")
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for TailscaleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            tailnet: default_tailnet(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
        }
    }
}

impl TailscaleConfig {
    /// Returns the API key.
    ///
    /// # Errors
    ///
    /// Returns an error if no key is configured.
    pub fn api_key(&self) -> Result<&str> {
        credential(self.api_key.as_deref(), "tailscale.api_key", ENV_TAILSCALE_API_KEY)
    }
}

impl ControlDConfig {
    /// Returns the API token.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured.
    pub fn api_token(&self) -> Result<&str> {
        credential(self.api_token.as_deref(), "controld.api_token", ENV_CONTROLD_API_TOKEN)
    }
}

fn credential<'a>(value: Option<&'a str>, name: &str, env: &str) -> Result<&'a str> {
    value.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
        SyncError::Config(ConfigError::MissingCredential {
            name: name.to_string(),
            env: env.to_string(),
        })
    })
}

impl DnsConfig {
    /// Returns the configured suffixes, trimmed, with empty entries and
    /// leading/trailing dots removed.
    #[must_use]
    pub fn normalized_suffixes(&self) -> Vec<String> {
        self.suffixes
            .iter()
            .map(|s| s.trim().trim_matches('.').to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

// Tokens never reach logs through Debug.
impl std::fmt::Debug for TailscaleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TailscaleConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<REDACTED>"))
            .field("tailnet", &self.tailnet)
            .finish()
    }
}

impl std::fmt::Debug for ControlDConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlDConfig")
            .field("api_token", &self.api_token.as_ref().map(|_| "<REDACTED>"))
            .field("profile_id", &self.profile_id)
            .field("folder_name", &self.folder_name)
            .finish()
    }
}
