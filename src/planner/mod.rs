//! Planning module for rule reconciliation.
//!
//! This module holds the desired-state records, computes the change plan
//! between desired and existing rules, and executes it.

mod diff;
mod executor;
mod plan;
mod records;

pub use diff::Reconciler;
pub use executor::{ExecutionMode, ExecutionReport, OperationOutcome, OperationStatus, PlanExecutor};
pub use plan::{
    ActionType, ChangePlan, Operation, PlannedDelete, PlannedUpdate, RenameCollision,
    UnmanagedReason, UnmanagedRule,
};
pub use records::{DesiredRecord, DesiredState, Hostname};
