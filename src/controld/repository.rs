//! Rule repository trait definition.
//!
//! The executor talks to the remote rule store only through this trait.
//! Updates and deletes are addressed by [`RuleId`]; there is no way to pass
//! a hostname where an identifier is expected.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::planner::DesiredRecord;

use super::client::ControlDClient;
use super::types::{FolderId, RuleId};

/// Remote store of DNS rules.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Lists every managed rule, verbatim.
    async fn list_rules(&self) -> Result<Vec<Value>>;

    /// Creates a rule for a record. Returns the new identifier if known.
    async fn create_rule(&self, record: &DesiredRecord) -> Result<Option<RuleId>>;

    /// Rewrites the rule identified by `rule_id` to match a record.
    async fn update_rule(&self, rule_id: &RuleId, record: &DesiredRecord) -> Result<()>;

    /// Deletes the rule identified by `rule_id`.
    async fn delete_rule(&self, rule_id: &RuleId) -> Result<()>;
}

/// The rules of one ControlD folder.
#[derive(Debug, Clone)]
pub struct FolderRules {
    /// API client bound to the profile.
    client: ControlDClient,
    /// Folder holding the managed rules.
    folder: FolderId,
}

impl FolderRules {
    /// Binds a client to a folder.
    #[must_use]
    pub const fn new(client: ControlDClient, folder: FolderId) -> Self {
        Self { client, folder }
    }
}

#[async_trait]
impl RuleRepository for FolderRules {
    async fn list_rules(&self) -> Result<Vec<Value>> {
        self.client.list_rules(&self.folder).await
    }

    async fn create_rule(&self, record: &DesiredRecord) -> Result<Option<RuleId>> {
        self.client.create_rule(&self.folder, record).await
    }

    async fn update_rule(&self, rule_id: &RuleId, record: &DesiredRecord) -> Result<()> {
        self.client.update_rule(&self.folder, rule_id, record).await
    }

    async fn delete_rule(&self, rule_id: &RuleId) -> Result<()> {
        self.client.delete_rule(rule_id).await
    }
}
