//! Change plan types.
//!
//! A [`ChangePlan`] is computed once per run by the reconciler and consumed
//! once by the executor. Updates and deletes always carry the [`RuleId`] of
//! the rule they target.

use serde::Serialize;

use crate::controld::RuleId;

use super::records::{DesiredRecord, Hostname};

/// An update of an existing rule to a new target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedUpdate {
    /// Rule being rewritten.
    pub rule_id: RuleId,
    /// Desired record the rule should match afterwards.
    pub record: DesiredRecord,
    /// Target currently held by the rule.
    pub previous_target: Option<String>,
    /// Secondary hostnames of the rule; the rewrite keeps only the primary.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped_hostnames: Vec<Hostname>,
}

/// Removal of a rule whose primary hostname is no longer desired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedDelete {
    /// Rule being removed.
    pub rule_id: RuleId,
    /// Primary hostname of the rule, for display only.
    pub hostname: Hostname,
}

/// Why an existing rule is left out of automatic reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnmanagedReason {
    /// The rule has an empty or missing hostname list.
    MissingHostnames,
    /// The payload carries no usable identifier.
    MissingRuleId {
        /// Parser rejection message.
        detail: String,
    },
    /// Another rule earlier in the listing has the same primary hostname.
    DuplicateHostname {
        /// Rule that owns the hostname in the index.
        indexed: RuleId,
    },
}

/// An existing rule the plan will not touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmanagedRule {
    /// Identifier, when the payload had one.
    pub rule_id: Option<RuleId>,
    /// Primary hostname, when the payload had one.
    pub hostname: Option<Hostname>,
    /// Why the rule is unmanaged.
    pub reason: UnmanagedReason,
}

/// A hostname that is created while a rule carrying it is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameCollision {
    /// Rule scheduled for deletion.
    pub rule_id: RuleId,
    /// Hostname the deleted rule shares with a create.
    pub hostname: Hostname,
}

/// One remote mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Operation {
    /// Create a rule.
    Create {
        /// Record to create.
        record: DesiredRecord,
    },
    /// Rewrite an existing rule.
    Update(PlannedUpdate),
    /// Remove an existing rule.
    Delete(PlannedDelete),
}

/// Kind of an [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a rule.
    Create,
    /// Update a rule.
    Update,
    /// Delete a rule.
    Delete,
}

/// The diff between desired and existing state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangePlan {
    /// Records with no rule, in hostname order.
    pub creates: Vec<DesiredRecord>,
    /// Rules whose target differs from the desired target.
    pub updates: Vec<PlannedUpdate>,
    /// Rules whose primary hostname is not desired.
    pub deletes: Vec<PlannedDelete>,
    /// Desired hostnames already converged.
    pub unchanged: Vec<Hostname>,
    /// Rules left out of reconciliation.
    pub unmanaged: Vec<UnmanagedRule>,
    /// Deletes that share a hostname with a create.
    pub collisions: Vec<RenameCollision>,
    /// Desired hostnames not created because an unmanaged rule carries them.
    pub withheld: Vec<Hostname>,
}

impl ChangePlan {
    /// Returns true if the plan holds no mutation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.change_count() == 0
    }

    /// Total number of mutations.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }

    /// Returns every mutation in execution order: creates, then updates,
    /// then deletes.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        let creates = self
            .creates
            .iter()
            .map(|record| Operation::Create {
                record: record.clone(),
            });
        let updates = self.updates.iter().cloned().map(Operation::Update);
        let deletes = self.deletes.iter().cloned().map(Operation::Delete);

        creates.chain(updates).chain(deletes).collect()
    }
}

impl Operation {
    /// Returns the kind of this operation.
    #[must_use]
    pub const fn action_type(&self) -> ActionType {
        match self {
            Self::Create { .. } => ActionType::Create,
            Self::Update(_) => ActionType::Update,
            Self::Delete(_) => ActionType::Delete,
        }
    }

    /// Hostname the operation concerns.
    #[must_use]
    pub const fn hostname(&self) -> &Hostname {
        match self {
            Self::Create { record } => &record.hostname,
            Self::Update(update) => &update.record.hostname,
            Self::Delete(delete) => &delete.hostname,
        }
    }

    /// Rule the operation targets; creates have none yet.
    #[must_use]
    pub const fn rule_id(&self) -> Option<&RuleId> {
        match self {
            Self::Create { .. } => None,
            Self::Update(update) => Some(&update.rule_id),
            Self::Delete(delete) => Some(&delete.rule_id),
        }
    }

    /// Returns a human-readable description of the operation.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Create { record } => format!("create {} -> {}", record.hostname, record.target),
            Self::Update(update) => format!(
                "update rule {} ({} -> {}, was {})",
                update.rule_id,
                update.record.hostname,
                update.record.target,
                update.previous_target.as_deref().unwrap_or("unset")
            ),
            Self::Delete(delete) => format!("delete rule {} ({})", delete.rule_id, delete.hostname),
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for UnmanagedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingHostnames => write!(f, "rule has no hostnames"),
            Self::MissingRuleId { detail } => write!(f, "rule has no identifier ({detail})"),
            Self::DuplicateHostname { indexed } => {
                write!(f, "primary hostname already owned by rule {indexed}")
            }
        }
    }
}

impl std::fmt::Display for ChangePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(f, "Change plan ({} operations):", self.change_count())?;
        for (i, operation) in self.operations().iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, operation.description())?;
        }
        Ok(())
    }
}
