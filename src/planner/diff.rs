//! Reconciler: diff between desired hostnames and existing rules.
//!
//! Existing rules are indexed by their primary (first) hostname. That index
//! is the only lookup used to match desired records; updates and deletes are
//! then emitted with the matched rule's [`RuleId`](crate::controld::RuleId).
//!
//! Update policy: a matched rule is updated when its target, parsed as an
//! IP address, differs from the desired target. A missing or unparseable
//! target counts as different.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use tracing::{debug, warn};

use crate::controld::{ExistingRule, RuleListing};

use super::plan::{
    ChangePlan, PlannedDelete, PlannedUpdate, RenameCollision, UnmanagedReason, UnmanagedRule,
};
use super::records::{DesiredRecord, DesiredState, Hostname};

/// Computes change plans. Stateless: the same inputs always give the same
/// plan.
#[derive(Debug, Default)]
pub struct Reconciler;

impl Reconciler {
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the plan converging `existing` onto `desired`.
    #[must_use]
    pub fn reconcile(&self, desired: &DesiredState, existing: &[ExistingRule]) -> ChangePlan {
        let mut plan = ChangePlan::default();

        // Primary hostname -> rule, in listing order.
        let mut index: HashMap<&Hostname, &ExistingRule> = HashMap::new();
        let mut indexed: Vec<(&Hostname, &ExistingRule)> = Vec::new();

        for rule in existing {
            let Some(primary) = rule.primary_hostname() else {
                warn!(
                    "Rule {} has no hostnames; it cannot be reconciled and is left untouched",
                    rule.rule_id
                );
                plan.unmanaged.push(UnmanagedRule {
                    rule_id: Some(rule.rule_id.clone()),
                    hostname: None,
                    reason: UnmanagedReason::MissingHostnames,
                });
                continue;
            };

            match index.entry(primary) {
                Entry::Occupied(owner) => {
                    warn!(
                        "Rule {} duplicates hostname {primary} of rule {}; it is left untouched",
                        rule.rule_id,
                        owner.get().rule_id
                    );
                    plan.unmanaged.push(UnmanagedRule {
                        rule_id: Some(rule.rule_id.clone()),
                        hostname: Some(primary.clone()),
                        reason: UnmanagedReason::DuplicateHostname {
                            indexed: owner.get().rule_id.clone(),
                        },
                    });
                }
                Entry::Vacant(slot) => {
                    debug!(
                        "Existing rule {} -> {primary} ({})",
                        rule.rule_id,
                        rule.target.as_deref().unwrap_or("no target")
                    );
                    slot.insert(rule);
                    indexed.push((primary, rule));
                }
            }
        }

        for record in desired.iter() {
            match index.get(&record.hostname) {
                Some(rule) if target_matches(rule, record) => {
                    plan.unchanged.push(record.hostname.clone());
                }
                Some(rule) => {
                    let dropped_hostnames = rule.hostnames[1..].to_vec();
                    if !dropped_hostnames.is_empty() {
                        warn!(
                            "Updating rule {} keeps only {}; secondary hostnames {} will be dropped",
                            rule.rule_id,
                            record.hostname,
                            join_hostnames(&dropped_hostnames)
                        );
                    }
                    plan.updates.push(PlannedUpdate {
                        rule_id: rule.rule_id.clone(),
                        record: record.clone(),
                        previous_target: rule.target.clone(),
                        dropped_hostnames,
                    });
                }
                None => plan.creates.push(record.clone()),
            }
        }

        let created: HashSet<&Hostname> = plan.creates.iter().map(|r| &r.hostname).collect();

        for (primary, rule) in indexed {
            if desired.contains(primary) {
                continue;
            }

            plan.deletes.push(PlannedDelete {
                rule_id: rule.rule_id.clone(),
                hostname: primary.clone(),
            });

            for hostname in rule.hostnames.iter().filter(|h| created.contains(h)) {
                warn!(
                    "Rule {} is deleted while {hostname} is created; this looks like a rename",
                    rule.rule_id
                );
                plan.collisions.push(RenameCollision {
                    rule_id: rule.rule_id.clone(),
                    hostname: hostname.clone(),
                });
            }
        }

        debug!(
            "Plan: {} creates, {} updates, {} deletes, {} unchanged, {} unmanaged",
            plan.creates.len(),
            plan.updates.len(),
            plan.deletes.len(),
            plan.unchanged.len(),
            plan.unmanaged.len()
        );

        plan
    }

    /// Reconciles a parsed listing. Payloads that carried no identifier are
    /// reported as unmanaged.
    #[must_use]
    pub fn reconcile_listing(&self, desired: &DesiredState, listing: &RuleListing) -> ChangePlan {
        let mut plan = self.reconcile(desired, &listing.rules);
        let mut carried: HashSet<&Hostname> = HashSet::new();

        for unparsed in &listing.unparsed {
            warn!(
                "Ignoring rule payload for {}: {}",
                unparsed
                    .hostnames
                    .first()
                    .map_or("no hostname", Hostname::as_str),
                unparsed.reason
            );
            carried.extend(&unparsed.hostnames);
            plan.unmanaged.push(UnmanagedRule {
                rule_id: None,
                hostname: unparsed.hostnames.first().cloned(),
                reason: UnmanagedReason::MissingRuleId {
                    detail: unparsed.reason.clone(),
                },
            });
        }

        // A rule without an identifier cannot be updated or deleted, so a
        // create for one of its hostnames would leave two rules behind.
        let (withheld, creates): (Vec<DesiredRecord>, Vec<DesiredRecord>) = plan
            .creates
            .into_iter()
            .partition(|record| carried.contains(&record.hostname));
        plan.creates = creates;

        for record in withheld {
            warn!(
                "Not creating {}: an unmanaged rule already carries it",
                record.hostname
            );
            plan.collisions
                .retain(|collision| collision.hostname != record.hostname);
            plan.withheld.push(record.hostname);
        }

        plan
    }
}

fn join_hostnames(hostnames: &[Hostname]) -> String {
    hostnames
        .iter()
        .map(Hostname::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn target_matches(rule: &ExistingRule, record: &DesiredRecord) -> bool {
    rule.target
        .as_deref()
        .and_then(|t| t.parse::<IpAddr>().ok())
        .is_some_and(|current| current == record.target)
}
