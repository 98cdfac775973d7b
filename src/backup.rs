//! Pre-change backup of the managed rule listing.
//!
//! A backup is written once per applied run, before the first mutating
//! call. Artifacts are never overwritten.

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{BackupError, Result};

/// Backup file name prefix.
const BACKUP_PREFIX: &str = "controld_backup_";

/// Timestamp format used in backup file names.
const BACKUP_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Where the backed up rules came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupContext {
    /// ControlD profile.
    pub profile_id: String,
    /// Folder identifier, if the folder existed.
    pub folder_id: Option<String>,
    /// Folder name.
    pub folder_name: String,
}

/// On-disk backup contents.
#[derive(Debug, Serialize)]
struct BackupSnapshot<'a> {
    timestamp: String,
    #[serde(flatten)]
    context: &'a BackupContext,
    rules: &'a [Value],
}

/// Writes timestamped backup artifacts into a directory.
#[derive(Debug, Clone)]
pub struct BackupWriter {
    dir: PathBuf,
}

impl BackupWriter {
    /// Creates a writer targeting `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the artifact path for a given instant.
    #[must_use]
    pub fn path_for(&self, at: &DateTime<Local>) -> PathBuf {
        self.dir
            .join(format!("{BACKUP_PREFIX}{}.json", at.format(BACKUP_TIME_FORMAT)))
    }

    /// Writes the rule listing, verbatim, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact already exists or cannot be written.
    pub async fn write_backup(&self, context: &BackupContext, rules: &[Value]) -> Result<PathBuf> {
        self.write_backup_at(context, rules, Local::now()).await
    }

    /// Writes the rule listing stamped with `at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact already exists or cannot be written.
    pub async fn write_backup_at(
        &self,
        context: &BackupContext,
        rules: &[Value],
        at: DateTime<Local>,
    ) -> Result<PathBuf> {
        let path = self.path_for(&at);

        let snapshot = BackupSnapshot {
            timestamp: at.to_rfc3339(),
            context,
            rules,
        };
        let content = serde_json::to_string_pretty(&snapshot).map_err(|e| BackupError::Serialization {
            message: e.to_string(),
        })?;

        if !self.dir.exists() {
            debug!("Creating backup directory: {}", self.dir.display());
            fs::create_dir_all(&self.dir)
                .await
                .map_err(|source| BackupError::Write {
                    path: self.dir.clone(),
                    source,
                })?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::AlreadyExists {
                    BackupError::AlreadyExists { path: path.clone() }
                } else {
                    BackupError::Write {
                        path: path.clone(),
                        source,
                    }
                }
            })?;

        write_or_discard(&path, async move {
            file.write_all(content.as_bytes()).await?;
            file.sync_all().await
        })
        .await?;

        info!("Backed up {} rules to {}", rules.len(), path.display());
        Ok(path)
    }
}

/// Awaits a write into the freshly created `path`, removing the file if the
/// write fails so no truncated backup is left behind.
async fn write_or_discard(
    path: &Path,
    write: impl Future<Output = std::io::Result<()>>,
) -> Result<()> {
    if let Err(source) = write.await {
        if let Err(e) = fs::remove_file(path).await {
            warn!("Failed to remove partial backup {}: {e}", path.display());
        }
        return Err(BackupError::Write {
            path: path.to_path_buf(),
            source,
        }
        .into());
    }
    Ok(())
}
