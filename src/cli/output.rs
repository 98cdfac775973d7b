//! Output formatting for the sync report.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::error::SyncError;
use crate::planner::{ActionType, ExecutionMode, Hostname, Operation, OperationStatus};
use crate::sync::{FolderStatus, SyncReport};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Operation row for table display.
#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Hostname")]
    hostname: String,
    #[tabled(rename = "Rule")]
    rule: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a sync report for display.
    #[must_use]
    pub fn format_report(&self, report: &SyncReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    /// Formats a fatal error for display.
    #[must_use]
    pub fn format_error(&self, error: &SyncError) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "error", "message": error.to_string() });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {error}", "✗".red()),
        }
    }

    fn format_report_text(report: &SyncReport) -> String {
        let execution = &report.execution;
        let mut output = String::new();

        let mode = match execution.mode {
            ExecutionMode::DryRun => "DRY RUN".yellow().bold().to_string(),
            ExecutionMode::Apply => "APPLY".green().bold().to_string(),
        };
        let _ = writeln!(
            output,
            "\n{mode} profile {} / folder '{}'",
            report.profile_id, report.folder_name
        );

        match report.folder_status {
            FolderStatus::Existing => {}
            FolderStatus::Created => {
                let _ = writeln!(output, "   {} created folder", "+".green());
            }
            FolderStatus::WouldCreate => {
                let _ = writeln!(output, "   {} folder would be created", "+".yellow());
            }
        }

        let _ = writeln!(
            output,
            "   {} desired hostnames, {} existing rules, {} unchanged\n",
            report.desired,
            report.existing,
            execution.unchanged.len()
        );

        if execution.outcomes.is_empty() {
            let _ = writeln!(output, "{} No changes required.", "✓".green());
        } else {
            let rows: Vec<OperationRow> = execution
                .outcomes
                .iter()
                .enumerate()
                .map(|(i, outcome)| OperationRow {
                    index: i + 1,
                    action: Self::format_action_type(outcome.operation.action_type()),
                    hostname: outcome.operation.hostname().to_string(),
                    rule: outcome
                        .operation
                        .rule_id()
                        .or(outcome.created_id.as_ref())
                        .map_or_else(|| String::from("-"), ToString::to_string),
                    target: Self::target(&outcome.operation),
                    status: Self::format_status(&outcome.status),
                })
                .collect();

            output.push_str(&Table::new(rows).to_string());
            output.push('\n');

            for outcome in &execution.outcomes {
                if let Operation::Update(update) = &outcome.operation
                    && !update.dropped_hostnames.is_empty()
                {
                    let dropped: Vec<&str> =
                        update.dropped_hostnames.iter().map(Hostname::as_str).collect();
                    let _ = writeln!(
                        output,
                        "   {} rule {} loses secondary hostnames: {}",
                        "⚠".yellow(),
                        update.rule_id,
                        dropped.join(", ")
                    );
                }
                if let OperationStatus::Failed { error, .. } = &outcome.status {
                    let _ = writeln!(
                        output,
                        "   {} {}: {error}",
                        "✗".red(),
                        outcome.operation.description()
                    );
                }
            }
        }

        if !execution.unmanaged.is_empty() {
            let _ = writeln!(output, "\n{} Unmanaged rules (left untouched):", "⚠".yellow());
            for rule in &execution.unmanaged {
                let id = rule
                    .rule_id
                    .as_ref()
                    .map_or_else(|| String::from("?"), ToString::to_string);
                match &rule.hostname {
                    Some(hostname) => {
                        let _ = writeln!(output, "   - {id} ({hostname}): {}", rule.reason);
                    }
                    None => {
                        let _ = writeln!(output, "   - {id}: {}", rule.reason);
                    }
                }
            }
        }

        if !execution.withheld.is_empty() {
            let _ = writeln!(
                output,
                "\n{} Not created (held by an unmanaged rule):",
                "⚠".yellow()
            );
            for hostname in &execution.withheld {
                let _ = writeln!(output, "   - {hostname}");
            }
        }

        if !execution.collisions.is_empty() {
            let _ = writeln!(output, "\n{} Possible renames:", "⚠".yellow());
            for collision in &execution.collisions {
                let _ = writeln!(
                    output,
                    "   - rule {} is deleted while {} is created",
                    collision.rule_id, collision.hostname
                );
            }
        }

        if let Some(path) = &execution.backup_path {
            let _ = writeln!(output, "\nBackup: {}", path.display());
        }

        let _ = writeln!(output, "\n{execution}");

        if execution.mode == ExecutionMode::DryRun && !execution.outcomes.is_empty() {
            let _ = writeln!(output, "Run with --apply to make these changes.");
        }

        output
    }

    /// Formats an action type with color.
    fn format_action_type(action_type: ActionType) -> String {
        match action_type {
            ActionType::Create => "+create".green().to_string(),
            ActionType::Update => "~update".yellow().to_string(),
            ActionType::Delete => "-delete".red().to_string(),
        }
    }

    fn format_status(status: &OperationStatus) -> String {
        match status {
            OperationStatus::Planned => "planned".dimmed().to_string(),
            OperationStatus::Applied => "ok".green().to_string(),
            OperationStatus::Failed { auth: true, .. } => "auth failed".red().to_string(),
            OperationStatus::Failed { .. } => "failed".red().to_string(),
        }
    }

    fn target(operation: &Operation) -> String {
        match operation {
            Operation::Create { record } => record.target.to_string(),
            Operation::Update(update) => format!(
                "{} -> {}",
                update.previous_target.as_deref().unwrap_or("unset"),
                update.record.target
            ),
            Operation::Delete(_) => String::from("-"),
        }
    }
}
