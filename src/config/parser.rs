//! Configuration parser for loading the sync configuration.
//!
//! Settings come from a YAML file; credentials and identifiers can be
//! overridden from the environment (optionally seeded from a `.env` file
//! next to the config).

use crate::error::{ConfigError, Result, SyncError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::{ENV_CONTROLD_API_TOKEN, ENV_TAILSCALE_API_KEY, SyncConfig};

/// Environment variable overriding the Tailscale tailnet.
pub const ENV_TAILSCALE_TAILNET: &str = "TAILSCALE_TAILNET";

/// Environment variable overriding the ControlD profile.
pub const ENV_CONTROLD_PROFILE_ID: &str = "CONTROLD_PROFILE_ID";

/// Environment variable overriding the ControlD folder name.
pub const ENV_CONTROLD_FOLDER_NAME: &str = "CONTROLD_FOLDER_NAME";

/// Configuration parser for loading sync configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving the `.env` file.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<SyncConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(SyncError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<SyncConfig> {
        debug!("Parsing YAML configuration");

        let config: SyncConfig = serde_yaml::from_str(content).map_err(|e| {
            SyncError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })?;

        debug!(
            "Parsed configuration for profile {} folder '{}'",
            config.controld.profile_id, config.controld.folder_name
        );
        Ok(config)
    }

    /// Loads configuration and applies process environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<SyncConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config, |name| std::env::var(name).ok());
        Ok(config)
    }

    /// Applies environment overrides using the given variable lookup.
    pub fn apply_env_overrides<F>(config: &mut SyncConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = value(ENV_TAILSCALE_API_KEY) {
            debug!("Overriding tailscale.api_key from environment");
            config.tailscale.api_key = Some(key);
        }

        if let Some(tailnet) = value(ENV_TAILSCALE_TAILNET) {
            debug!("Overriding tailscale.tailnet from environment");
            config.tailscale.tailnet = tailnet;
        }

        if let Some(token) = value(ENV_CONTROLD_API_TOKEN) {
            debug!("Overriding controld.api_token from environment");
            config.controld.api_token = Some(token);
        }

        if let Some(profile) = value(ENV_CONTROLD_PROFILE_ID) {
            debug!("Overriding controld.profile_id from environment");
            config.controld.profile_id = profile;
        }

        if let Some(folder) = value(ENV_CONTROLD_FOLDER_NAME) {
            debug!("Overriding controld.folder_name from environment");
            config.controld.folder_name = folder;
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                SyncError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["controld-sync.yaml", "controld-sync.yml"];

/// Finds the configuration file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                debug!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(SyncError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r"
controld:
  profile_id: abc123
dns:
  suffixes: [ts]
";
        let parser = ConfigParser::new();
        let config = parser.parse_yaml(yaml, None).unwrap();

        assert_eq!(config.controld.profile_id, "abc123");
        assert_eq!(config.controld.folder_name, "Tailscale");
        assert_eq!(config.tailscale.tailnet, "-");
        assert!(config.tailscale.api_key.is_none());
        assert!(!config.dns.include_bare);
        assert_eq!(config.backup.dir, PathBuf::from("."));
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
tailscale:
  api_key: tskey-api-real
  tailnet: example.com
controld:
  api_token: api.token
  profile_id: abc123
  folder_name: Tailnet Hosts
dns:
  suffixes:
    - ts
    - "funny-name.ts.net"
  include_bare: true
backup:
  dir: /var/backups/controld
"#;
        let parser = ConfigParser::new();
        let config = parser.parse_yaml(yaml, None).unwrap();

        assert_eq!(config.tailscale.tailnet, "example.com");
        assert_eq!(config.controld.folder_name, "Tailnet Hosts");
        assert_eq!(config.dns.suffixes.len(), 2);
        assert!(config.dns.include_bare);
        assert_eq!(config.backup.dir, PathBuf::from("/var/backups/controld"));
    }

    #[test]
    fn test_parse_missing_profile_fails() {
        let yaml = "dns:\n  suffixes: [ts]\n";
        let result = ConfigParser::new().parse_yaml(yaml, None);
        assert!(matches!(
            result,
            Err(SyncError::Config(ConfigError::ParseError { .. }))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let yaml = r"
tailscale:
  api_key: from-file
controld:
  profile_id: file-profile
";
        let mut config = ConfigParser::new().parse_yaml(yaml, None).unwrap();

        let env: HashMap<&str, &str> = [
            (ENV_TAILSCALE_API_KEY, "from-env"),
            (ENV_CONTROLD_API_TOKEN, "token-env"),
            (ENV_CONTROLD_PROFILE_ID, "   "),
        ]
        .into_iter()
        .collect();

        ConfigParser::apply_env_overrides(&mut config, |name| {
            env.get(name).map(|v| (*v).to_string())
        });

        assert_eq!(config.tailscale.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.controld.api_token.as_deref(), Some("token-env"));
        // Blank values do not override.
        assert_eq!(config.controld.profile_id, "file-profile");
    }

    #[test]
    fn test_find_config_file_in_parent() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("controld-sync.yaml"), "controld: {profile_id: x}\n").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join("controld-sync.yaml"));
    }

    #[test]
    fn test_load_file_not_found() {
        let result = ConfigParser::new().load_file("/nonexistent/controld-sync.yaml");
        assert!(matches!(
            result,
            Err(SyncError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
