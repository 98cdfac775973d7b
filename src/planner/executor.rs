//! Plan executor for applying change plans.
//!
//! Operations run sequentially: creates, then updates, then deletes. In
//! apply mode each operation's result is recorded on its own and a failure
//! never stops the remaining operations. In dry-run mode no mutating call
//! is issued at all.

use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{error, info};

use crate::backup::{BackupContext, BackupWriter};
use crate::controld::{RuleId, RuleRepository};
use crate::error::Result;

use super::plan::{ChangePlan, Operation, RenameCollision, UnmanagedRule};
use super::records::Hostname;

/// Whether mutations are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Report intended operations only.
    DryRun,
    /// Issue mutating calls.
    Apply,
}

/// Outcome of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationStatus {
    /// Dry-run: the operation would have been issued.
    Planned,
    /// The remote call succeeded.
    Applied,
    /// The remote call failed.
    Failed {
        /// Error message.
        error: String,
        /// Whether the remote service rejected our credentials.
        auth: bool,
    },
}

/// An operation together with its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    /// Operation attempted.
    #[serde(flatten)]
    pub operation: Operation,
    /// What happened.
    #[serde(flatten)]
    pub status: OperationStatus,
    /// Identifier of a created rule, when the API returned one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_id: Option<RuleId>,
}

/// Result of executing a change plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    /// Mode the plan ran in.
    pub mode: ExecutionMode,
    /// Outcomes in execution order.
    pub outcomes: Vec<OperationOutcome>,
    /// Backup written before the first mutation, if any.
    pub backup_path: Option<PathBuf>,
    /// Hostnames already converged.
    pub unchanged: Vec<Hostname>,
    /// Rules left untouched.
    pub unmanaged: Vec<UnmanagedRule>,
    /// Possible renames detected in the plan.
    pub collisions: Vec<RenameCollision>,
    /// Desired hostnames not created because an unmanaged rule carries them.
    pub withheld: Vec<Hostname>,
}

impl ExecutionReport {
    fn new(mode: ExecutionMode, plan: &ChangePlan) -> Self {
        Self {
            mode,
            outcomes: Vec::with_capacity(plan.change_count()),
            backup_path: None,
            unchanged: plan.unchanged.clone(),
            unmanaged: plan.unmanaged.clone(),
            collisions: plan.collisions.clone(),
            withheld: plan.withheld.clone(),
        }
    }

    /// Records every operation of a plan as planned, without touching any
    /// repository.
    #[must_use]
    pub fn dry_run(plan: &ChangePlan) -> Self {
        let mut report = Self::new(ExecutionMode::DryRun, plan);
        for operation in plan.operations() {
            info!("Would {}", operation.description());
            report.outcomes.push(OperationOutcome {
                operation,
                status: OperationStatus::Planned,
                created_id: None,
            });
        }
        report
    }

    /// Number of operations recorded as planned.
    #[must_use]
    pub fn planned(&self) -> usize {
        self.count(|s| matches!(s, OperationStatus::Planned))
    }

    /// Number of operations that succeeded.
    #[must_use]
    pub fn applied(&self) -> usize {
        self.count(|s| matches!(s, OperationStatus::Applied))
    }

    /// Number of operations that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, OperationStatus::Failed { .. }))
    }

    /// Returns true if any operation failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Returns true if any operation failed on authentication.
    #[must_use]
    pub fn has_auth_failure(&self) -> bool {
        self.count(|s| matches!(s, OperationStatus::Failed { auth: true, .. })) > 0
    }

    fn count(&self, predicate: impl Fn(&OperationStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }
}

/// Executor for change plans.
pub struct PlanExecutor<'a, R: RuleRepository + ?Sized> {
    /// Remote rule store.
    repository: &'a R,
    /// Writer for the pre-change backup.
    backup: &'a BackupWriter,
    /// Profile and folder the listing came from.
    context: &'a BackupContext,
}

impl<'a, R: RuleRepository + ?Sized> PlanExecutor<'a, R> {
    /// Creates a new plan executor.
    #[must_use]
    pub const fn new(repository: &'a R, backup: &'a BackupWriter, context: &'a BackupContext) -> Self {
        Self {
            repository,
            backup,
            context,
        }
    }

    /// Executes a change plan.
    ///
    /// `listing` is the raw rule listing the plan was computed from; it is
    /// backed up before the first mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup cannot be written. No mutation is
    /// issued in that case. Per-operation failures are recorded in the
    /// report instead.
    pub async fn execute(
        &self,
        plan: &ChangePlan,
        listing: &[Value],
        apply: bool,
    ) -> Result<ExecutionReport> {
        if !apply {
            return Ok(ExecutionReport::dry_run(plan));
        }

        let operations = plan.operations();
        let mut report = ExecutionReport::new(ExecutionMode::Apply, plan);
        if operations.is_empty() {
            info!("No changes to apply");
            return Ok(report);
        }

        report.backup_path = Some(self.backup.write_backup(self.context, listing).await?);

        info!("Applying {} operations", operations.len());
        for operation in operations {
            let outcome = self.execute_operation(operation).await;
            report.outcomes.push(outcome);
        }

        info!(
            "Applied {} operations, {} failed",
            report.applied(),
            report.failed()
        );

        Ok(report)
    }

    /// Executes a single operation.
    async fn execute_operation(&self, operation: Operation) -> OperationOutcome {
        let result = match &operation {
            Operation::Create { record } => self.repository.create_rule(record).await,
            Operation::Update(update) => self
                .repository
                .update_rule(&update.rule_id, &update.record)
                .await
                .map(|()| None),
            Operation::Delete(delete) => self
                .repository
                .delete_rule(&delete.rule_id)
                .await
                .map(|()| None),
        };

        match result {
            Ok(created_id) => {
                info!("Done: {}", operation.description());
                OperationOutcome {
                    operation,
                    status: OperationStatus::Applied,
                    created_id,
                }
            }
            Err(e) => {
                error!("Failed to {}: {e}", operation.description());
                OperationOutcome {
                    operation,
                    status: OperationStatus::Failed {
                        error: e.to_string(),
                        auth: e.is_auth_failure(),
                    },
                    created_id: None,
                }
            }
        }
    }
}

impl std::fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.mode {
            ExecutionMode::DryRun => write!(
                f,
                "Dry run: {} operations planned, {} unchanged",
                self.planned(),
                self.unchanged.len()
            ),
            ExecutionMode::Apply => write!(
                f,
                "Applied {} operations ({} failed), {} unchanged",
                self.applied(),
                self.failed(),
                self.unchanged.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, Service, SyncError};
    use crate::planner::{DesiredRecord, PlannedDelete, PlannedUpdate};
    use async_trait::async_trait;
    use mockall::mock;
    use serde_json::json;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    mock! {
        pub Repository {}

        #[async_trait]
        impl RuleRepository for Repository {
            async fn list_rules(&self) -> Result<Vec<Value>>;
            async fn create_rule(&self, record: &DesiredRecord) -> Result<Option<RuleId>>;
            async fn update_rule(&self, rule_id: &RuleId, record: &DesiredRecord) -> Result<()>;
            async fn delete_rule(&self, rule_id: &RuleId) -> Result<()>;
        }
    }

    /// Records every call and fails the hostnames it is told to.
    struct RecordingRepository {
        calls: Arc<Mutex<Vec<String>>>,
        fail_on: Vec<&'static str>,
        backup_dir: PathBuf,
        backup_seen: Arc<Mutex<Vec<bool>>>,
    }

    impl RecordingRepository {
        fn new(backup_dir: &Path, fail_on: Vec<&'static str>) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                fail_on,
                backup_dir: backup_dir.to_path_buf(),
                backup_seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn record(&self, call: String, hostname: &str, auth: bool) -> Result<()> {
            let has_backup = std::fs::read_dir(&self.backup_dir)
                .map(|entries| entries.count() > 0)
                .unwrap_or(false);
            self.backup_seen.lock().unwrap().push(has_backup);
            self.calls.lock().unwrap().push(call);

            if self.fail_on.contains(&hostname) {
                if auth {
                    return Err(SyncError::Api(ApiError::AuthenticationFailed {
                        service: Service::ControlD,
                        message: String::from("bad token"),
                    }));
                }
                return Err(SyncError::Api(ApiError::request_failed(
                    Service::ControlD,
                    500,
                    "boom",
                )));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RuleRepository for RecordingRepository {
        async fn list_rules(&self) -> Result<Vec<Value>> {
            Ok(Vec::new())
        }

        async fn create_rule(&self, record: &DesiredRecord) -> Result<Option<RuleId>> {
            let host = record.hostname.as_str();
            self.record(format!("create {host}"), host, false)?;
            Ok(Some(RuleId::new(format!("new-{host}"))))
        }

        async fn update_rule(&self, rule_id: &RuleId, record: &DesiredRecord) -> Result<()> {
            let host = record.hostname.as_str();
            self.record(format!("update {rule_id}"), host, true)
        }

        async fn delete_rule(&self, rule_id: &RuleId) -> Result<()> {
            self.record(format!("delete {rule_id}"), rule_id.as_str(), false)
        }
    }

    fn record(host: &str) -> DesiredRecord {
        DesiredRecord::new(Hostname::new(host).unwrap(), "100.64.0.1".parse().unwrap())
    }

    fn context() -> BackupContext {
        BackupContext {
            profile_id: String::from("p1"),
            folder_id: Some(String::from("f1")),
            folder_name: String::from("Tailscale"),
        }
    }

    fn sample_plan() -> ChangePlan {
        ChangePlan {
            creates: vec![record("a.ts"), record("b.ts")],
            updates: vec![PlannedUpdate {
                rule_id: RuleId::new("r1"),
                record: record("u.ts"),
                previous_target: Some(String::from("100.64.0.9")),
                dropped_hostnames: Vec::new(),
            }],
            deletes: vec![PlannedDelete {
                rule_id: RuleId::new("r2"),
                hostname: Hostname::new("gone.ts").unwrap(),
            }],
            ..ChangePlan::default()
        }
    }

    #[tokio::test]
    async fn test_dry_run_issues_no_mutation() {
        let temp = TempDir::new().unwrap();
        let backup = BackupWriter::new(temp.path());
        let context = context();

        let mut repository = MockRepository::new();
        repository.expect_create_rule().never();
        repository.expect_update_rule().never();
        repository.expect_delete_rule().never();

        let executor = PlanExecutor::new(&repository, &backup, &context);
        let report = executor.execute(&sample_plan(), &[], false).await.unwrap();

        assert_eq!(report.mode, ExecutionMode::DryRun);
        assert_eq!(report.planned(), 4);
        assert!(report.backup_path.is_none());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_apply_order_and_backup_first() {
        let temp = TempDir::new().unwrap();
        let backup = BackupWriter::new(temp.path());
        let context = context();
        let repository = RecordingRepository::new(temp.path(), vec![]);

        let executor = PlanExecutor::new(&repository, &backup, &context);
        let listing = vec![json!({ "PK": "r2", "hostnames": ["gone.ts"] })];
        let report = executor.execute(&sample_plan(), &listing, true).await.unwrap();

        assert_eq!(
            *repository.calls.lock().unwrap(),
            vec!["create a.ts", "create b.ts", "update r1", "delete r2"]
        );
        assert!(repository.backup_seen.lock().unwrap().iter().all(|seen| *seen));
        assert!(report.backup_path.as_ref().unwrap().exists());
        assert_eq!(report.applied(), 4);
        assert_eq!(report.outcomes[0].created_id, Some(RuleId::new("new-a.ts")));
        assert!(!report.has_failures());
    }

    #[tokio::test]
    async fn test_partial_failure_continues() {
        let temp = TempDir::new().unwrap();
        let backup = BackupWriter::new(temp.path());
        let context = context();
        let repository = RecordingRepository::new(temp.path(), vec!["a.ts"]);

        let executor = PlanExecutor::new(&repository, &backup, &context);
        let report = executor.execute(&sample_plan(), &[], true).await.unwrap();

        assert_eq!(repository.calls.lock().unwrap().len(), 4);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.applied(), 3);
        assert!(matches!(
            report.outcomes[0].status,
            OperationStatus::Failed { auth: false, .. }
        ));
        assert!(!report.has_auth_failure());
    }

    #[tokio::test]
    async fn test_auth_failure_flagged() {
        let temp = TempDir::new().unwrap();
        let backup = BackupWriter::new(temp.path());
        let context = context();
        let repository = RecordingRepository::new(temp.path(), vec!["u.ts"]);

        let executor = PlanExecutor::new(&repository, &backup, &context);
        let report = executor.execute(&sample_plan(), &[], true).await.unwrap();

        assert_eq!(report.failed(), 1);
        assert!(report.has_auth_failure());
    }

    #[tokio::test]
    async fn test_backup_failure_aborts_before_mutation() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let backup = BackupWriter::new(blocker.join("backups"));
        let context = context();

        let mut repository = MockRepository::new();
        repository.expect_create_rule().never();
        repository.expect_update_rule().never();
        repository.expect_delete_rule().never();

        let executor = PlanExecutor::new(&repository, &backup, &context);
        let result = executor.execute(&sample_plan(), &[], true).await;

        assert!(matches!(result, Err(SyncError::Backup(_))));
    }

    #[tokio::test]
    async fn test_empty_plan_apply_is_noop() {
        let temp = TempDir::new().unwrap();
        let backup = BackupWriter::new(temp.path());
        let context = context();

        let mut repository = MockRepository::new();
        repository.expect_create_rule().never();
        repository.expect_update_rule().never();
        repository.expect_delete_rule().never();

        let executor = PlanExecutor::new(&repository, &backup, &context);
        let plan = ChangePlan {
            unchanged: vec![Hostname::new("a.ts").unwrap()],
            ..ChangePlan::default()
        };
        let report = executor.execute(&plan, &[], true).await.unwrap();

        assert!(report.outcomes.is_empty());
        assert!(report.backup_path.is_none());
        assert_eq!(report.unchanged.len(), 1);
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }
}
