//! Configuration validation.
//!
//! Runs before any network call so that missing credentials or malformed
//! settings are reported with an actionable message up front.

use crate::error::{ConfigError, Result, SyncError};
use tracing::debug;

use super::spec::{ENV_CONTROLD_API_TOKEN, ENV_TAILSCALE_API_KEY, SyncConfig};

/// Prefixes of the values shipped in the example configuration.
const PLACEHOLDER_PREFIXES: &[&str] = &["your-", "tskey-api-xxxxx"];

/// Validator for sync configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all problems found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a sync configuration.
    ///
    /// # Errors
    ///
    /// Returns the first problem found. Missing credentials are reported
    /// as [`ConfigError::MissingCredential`] so the message names the
    /// environment variable to set.
    pub fn validate(&self, config: &SyncConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_credential(
            config.tailscale.api_key.as_deref(),
            "tailscale.api_key",
            ENV_TAILSCALE_API_KEY,
        )?;
        Self::validate_credential(
            config.controld.api_token.as_deref(),
            "controld.api_token",
            ENV_CONTROLD_API_TOKEN,
        )?;

        Self::validate_identifiers(config, &mut result);
        Self::validate_dns(config, &mut result);

        if let Some(first_error) = result.errors.first() {
            return Err(SyncError::Config(ConfigError::validation(
                first_error.message.clone(),
                first_error.field.clone(),
            )));
        }

        debug!("Configuration validation passed");
        Ok(result)
    }

    fn validate_credential(value: Option<&str>, name: &str, env: &str) -> Result<()> {
        let usable = value
            .map(str::trim)
            .is_some_and(|v| !v.is_empty() && !is_placeholder(v));

        if usable {
            Ok(())
        } else {
            Err(SyncError::Config(ConfigError::MissingCredential {
                name: name.to_string(),
                env: env.to_string(),
            }))
        }
    }

    fn validate_identifiers(config: &SyncConfig, result: &mut ValidationResult) {
        if config.tailscale.tailnet.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("tailscale.tailnet"),
                message: String::from("Tailnet cannot be empty (use '-' for the token's default tailnet)"),
            });
        }

        let profile = config.controld.profile_id.trim();
        if profile.is_empty() || is_placeholder(profile) {
            result.errors.push(ValidationError {
                field: String::from("controld.profile_id"),
                message: String::from("ControlD profile ID is not configured"),
            });
        }

        if config.controld.folder_name.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("controld.folder_name"),
                message: String::from("ControlD folder name cannot be empty"),
            });
        }
    }

    fn validate_dns(config: &SyncConfig, result: &mut ValidationResult) {
        for (i, suffix) in config.dns.suffixes.iter().enumerate() {
            let trimmed = suffix.trim().trim_matches('.');
            if trimmed.is_empty() {
                result
                    .warnings
                    .push(format!("dns.suffixes[{i}] is empty and will be ignored"));
                continue;
            }

            if !is_valid_suffix(trimmed) {
                result.errors.push(ValidationError {
                    field: format!("dns.suffixes[{i}]"),
                    message: format!(
                        "Suffix '{suffix}' is invalid. Must be dot-separated labels of letters, digits and hyphens."
                    ),
                });
            }
        }

        if config.dns.normalized_suffixes().is_empty() && !config.dns.include_bare {
            result.errors.push(ValidationError {
                field: String::from("dns"),
                message: String::from(
                    "No hostnames would be generated: configure at least one suffix or enable include_bare",
                ),
            });
        }
    }
}

fn is_placeholder(value: &str) -> bool {
    PLACEHOLDER_PREFIXES.iter().any(|p| value.starts_with(p))
}

/// Checks that a suffix is a sequence of valid DNS labels.
fn is_valid_suffix(suffix: &str) -> bool {
    suffix.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
