//! One synchronization run.
//!
//! The synchronizer resolves the managed ControlD folder, builds the
//! desired state from the Tailscale inventory, lists and reconciles the
//! folder's rules, then hands the plan to the executor. Failing to read
//! either side aborts the run before any mutation.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backup::{BackupContext, BackupWriter};
use crate::config::SyncConfig;
use crate::controld::{ControlDClient, FolderId, FolderRules, RuleListing, RuleRepository};
use crate::error::Result;
use crate::planner::{ExecutionReport, PlanExecutor, Reconciler};
use crate::tailscale::{InventoryCollector, TailscaleClient};

/// State of the managed folder at the start of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderStatus {
    /// The folder already existed.
    Existing,
    /// The folder was created by this run.
    Created,
    /// Dry-run: the folder is missing and would be created.
    WouldCreate,
}

/// Result of a synchronization run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// ControlD profile.
    pub profile_id: String,
    /// Managed folder name.
    pub folder_name: String,
    /// Managed folder identifier, when it exists.
    pub folder_id: Option<FolderId>,
    /// Folder state at the start of the run.
    pub folder_status: FolderStatus,
    /// Number of desired hostnames.
    pub desired: usize,
    /// Number of rules listed in the folder.
    pub existing: usize,
    /// Plan execution outcome.
    pub execution: ExecutionReport,
}

/// Runs the Tailscale to ControlD synchronization.
pub struct Synchronizer<'a> {
    /// Configuration.
    config: &'a SyncConfig,
    /// Tailscale inventory source.
    tailscale: &'a TailscaleClient,
    /// ControlD API client.
    controld: &'a ControlDClient,
    /// Inventory collector.
    collector: InventoryCollector,
    /// Reconciler.
    reconciler: Reconciler,
    /// Backup writer.
    backup: BackupWriter,
}

impl<'a> Synchronizer<'a> {
    /// Creates a new synchronizer.
    #[must_use]
    pub fn new(
        config: &'a SyncConfig,
        tailscale: &'a TailscaleClient,
        controld: &'a ControlDClient,
    ) -> Self {
        Self {
            config,
            tailscale,
            controld,
            collector: InventoryCollector::new(&config.dns),
            reconciler: Reconciler::new(),
            backup: BackupWriter::new(&config.backup.dir),
        }
    }

    /// Performs one run. With `apply` unset, no mutating call is issued.
    ///
    /// # Errors
    ///
    /// Returns an error if either inventory cannot be read, the folder
    /// cannot be resolved, or the backup cannot be written.
    pub async fn run(&self, apply: bool) -> Result<SyncReport> {
        let folder_name = &self.config.controld.folder_name;
        info!(
            "Starting {} for folder '{folder_name}' in profile {}",
            if apply { "sync" } else { "dry run" },
            self.controld.profile_id()
        );

        let (folder, folder_status) = self.resolve_folder(apply).await?;

        let devices = self.tailscale.list_devices().await?;
        let services = self.tailscale.list_services().await?;
        let desired = self.collector.collect(&devices, &services);

        let context = BackupContext {
            profile_id: self.controld.profile_id().to_string(),
            folder_id: folder.as_ref().map(ToString::to_string),
            folder_name: folder_name.clone(),
        };

        let (raw, execution) = if let Some(folder) = &folder {
            let repository = FolderRules::new(self.controld.clone(), folder.clone());
            let raw = repository.list_rules().await?;
            info!("Found {} existing rules in folder '{folder_name}'", raw.len());

            let listing = RuleListing::parse(&raw);
            let plan = self.reconciler.reconcile_listing(&desired, &listing);
            debug!("{plan}");

            let executor = PlanExecutor::new(&repository, &self.backup, &context);
            let execution = executor.execute(&plan, &raw, apply).await?;
            (raw, execution)
        } else {
            let plan = self
                .reconciler
                .reconcile_listing(&desired, &RuleListing::default());
            (Vec::new(), ExecutionReport::dry_run(&plan))
        };

        info!("{execution}");

        Ok(SyncReport {
            profile_id: context.profile_id,
            folder_name: folder_name.clone(),
            folder_id: folder,
            folder_status,
            desired: desired.len(),
            existing: raw.len(),
            execution,
        })
    }

    async fn resolve_folder(&self, apply: bool) -> Result<(Option<FolderId>, FolderStatus)> {
        let name = &self.config.controld.folder_name;

        if let Some(folder) = self.controld.find_folder(name).await? {
            debug!("Using folder '{name}' ({folder})");
            return Ok((Some(folder), FolderStatus::Existing));
        }

        if !apply {
            warn!("Folder '{name}' does not exist and would be created");
            return Ok((None, FolderStatus::WouldCreate));
        }

        let folder = self.controld.create_folder(name).await?;
        info!("Created folder '{name}' ({folder})");
        Ok((Some(folder), FolderStatus::Created))
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.folder_status {
            FolderStatus::Existing => {}
            FolderStatus::Created => writeln!(f, "Created folder '{}'", self.folder_name)?,
            FolderStatus::WouldCreate => {
                writeln!(f, "Folder '{}' would be created", self.folder_name)?;
            }
        }
        writeln!(
            f,
            "{} desired hostnames, {} existing rules",
            self.desired, self.existing
        )?;
        write!(f, "{}", self.execution)
    }
}
