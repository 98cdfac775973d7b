//! ControlD API integration module.
//!
//! This module provides the REST client for the ControlD profile API, the
//! typed rule records parsed from its listings, and the [`RuleRepository`]
//! seam the executor mutates through.

mod client;
mod repository;
mod types;

pub use client::{CONTROLD_API_URL, ControlDClient};
pub use repository::{FolderRules, RuleRepository};
pub use types::{
    ExistingRule, FIELD_HOSTNAMES, FIELD_RULE_ID, FIELD_TARGET, FolderId, RuleId, RuleListing,
    UnparsedRule, id_from_value,
};
