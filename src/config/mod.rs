//! Configuration module for the sync tool.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `controld-sync.yaml`
//! - Environment and `.env` overrides for credentials
//! - Validation of configuration values before any network call

mod spec;
mod parser;
mod validator;

pub use spec::{
    BackupConfig, ControlDConfig, DnsConfig, ENV_CONTROLD_API_TOKEN, ENV_TAILSCALE_API_KEY,
    SyncConfig, TailscaleConfig,
};
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
