//! ControlD API types.
//!
//! [`ExistingRule::from_raw`] is the only place a raw rule payload is read.
//! The identifier comes from `PK` and the hostnames from `hostnames`; the
//! two are never derived from each other.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::planner::Hostname;

/// Payload field holding the rule identifier.
pub const FIELD_RULE_ID: &str = "PK";

/// Payload field holding the ordered hostnames.
pub const FIELD_HOSTNAMES: &str = "hostnames";

/// Payload field holding the spoof target.
pub const FIELD_TARGET: &str = "via";

/// Rule action `do` value for spoofing to an address.
pub const ACTION_SPOOF: u8 = 2;

/// Rule `status` value for an enabled rule.
pub const STATUS_ENABLED: u8 = 1;

/// Opaque identifier of a remote rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    /// Wraps a rule identifier received from the API.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a ControlD folder (rule group).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FolderId(String);

impl FolderId {
    /// Wraps a folder identifier received from the API.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A rule as currently held by ControlD.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingRule {
    /// Remote identifier, used for every update and delete.
    pub rule_id: RuleId,
    /// Ordered hostnames; the first is the primary hostname.
    pub hostnames: Vec<Hostname>,
    /// Current spoof target, if any.
    pub target: Option<String>,
    /// The payload as received.
    pub raw: Value,
}

/// A listed payload that could not be turned into an [`ExistingRule`].
#[derive(Debug, Clone, PartialEq)]
pub struct UnparsedRule {
    /// Why the payload was rejected.
    pub reason: String,
    /// Hostnames the payload carries, in order.
    pub hostnames: Vec<Hostname>,
    /// The payload as received.
    pub raw: Value,
}

/// Parsed form of a full rule listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleListing {
    /// Rules with a usable identifier.
    pub rules: Vec<ExistingRule>,
    /// Payloads without a usable identifier.
    pub unparsed: Vec<UnparsedRule>,
}

impl ExistingRule {
    /// Parses a raw rule payload.
    ///
    /// Blank or non-string hostname entries are dropped; a rule may end up
    /// with no hostnames at all, which the reconciler treats as unmanaged.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason if the payload has no identifier.
    pub fn from_raw(raw: Value) -> std::result::Result<Self, UnparsedRule> {
        let hostnames = hostnames_from_payload(&raw);

        let Some(rule_id) = raw.get(FIELD_RULE_ID).and_then(id_from_value) else {
            return Err(UnparsedRule {
                reason: format!("missing or empty '{FIELD_RULE_ID}' field"),
                hostnames,
                raw,
            });
        };

        let target = raw
            .get(FIELD_TARGET)
            .or_else(|| raw.get("action").and_then(|a| a.get(FIELD_TARGET)))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        Ok(Self {
            rule_id: RuleId::new(rule_id),
            hostnames,
            target,
            raw,
        })
    }

    /// Returns the primary (first) hostname.
    #[must_use]
    pub fn primary_hostname(&self) -> Option<&Hostname> {
        self.hostnames.first()
    }
}

impl RuleListing {
    /// Parses every payload of a raw listing.
    #[must_use]
    pub fn parse(raw: &[Value]) -> Self {
        let mut listing = Self::default();
        for payload in raw {
            match ExistingRule::from_raw(payload.clone()) {
                Ok(rule) => listing.rules.push(rule),
                Err(unparsed) => listing.unparsed.push(unparsed),
            }
        }
        listing
    }
}

fn hostnames_from_payload(raw: &Value) -> Vec<Hostname> {
    raw.get(FIELD_HOSTNAMES)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .filter_map(Hostname::new)
                .collect()
        })
        .unwrap_or_default()
}

/// Reads an identifier that the API may send as a string or a number.
#[must_use]
pub fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Standard ControlD response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub success: Option<bool>,
    pub body: Option<T>,
    #[serde(default)]
    pub error: Option<EnvelopeError>,
}

/// Error object inside a failed envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct EnvelopeError {
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of the folder listing.
#[derive(Debug, Deserialize)]
pub(crate) struct FoldersBody {
    #[serde(default)]
    pub folders: Vec<Value>,
}

/// Body of a folder creation.
#[derive(Debug, Deserialize)]
pub(crate) struct FolderBody {
    #[serde(default)]
    pub folder: Option<Value>,
}

/// Body of a rule listing or rule creation.
#[derive(Debug, Deserialize)]
pub(crate) struct RulesBody {
    #[serde(default)]
    pub rules: Vec<Value>,
}

/// Request body for rule creation and update.
#[derive(Debug, Serialize)]
pub(crate) struct RuleRequest<'a> {
    pub group: &'a str,
    pub status: u8,
    #[serde(rename = "do")]
    pub action: u8,
    pub via: String,
    #[serde(rename = "hostnames[]")]
    pub hostnames: [&'a str; 1],
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_and_hostnames_read_from_distinct_fields() {
        let rule = ExistingRule::from_raw(json!({
            "PK": "r1",
            "hostnames": ["a.example.com", "alias.example.com"],
            "via": "100.64.0.1"
        }))
        .unwrap();

        assert_eq!(rule.rule_id.as_str(), "r1");
        assert_eq!(rule.primary_hostname().unwrap().as_str(), "a.example.com");
        assert_eq!(rule.hostnames.len(), 2);
        assert_eq!(rule.target.as_deref(), Some("100.64.0.1"));
    }

    #[test]
    fn test_numeric_id_and_nested_target() {
        let rule = ExistingRule::from_raw(json!({
            "PK": 42,
            "hostnames": ["B.Example.com"],
            "action": { "do": 2, "via": "100.64.0.2" }
        }))
        .unwrap();

        assert_eq!(rule.rule_id.as_str(), "42");
        assert_eq!(rule.primary_hostname().unwrap().as_str(), "b.example.com");
        assert_eq!(rule.target.as_deref(), Some("100.64.0.2"));
    }

    #[test]
    fn test_missing_hostnames_kept_as_rule() {
        let rule = ExistingRule::from_raw(json!({ "PK": "r9" })).unwrap();
        assert!(rule.hostnames.is_empty());
        assert!(rule.primary_hostname().is_none());

        let rule = ExistingRule::from_raw(json!({ "PK": "r10", "hostnames": ["", 5] })).unwrap();
        assert!(rule.hostnames.is_empty());
    }

    #[test]
    fn test_missing_id_rejected() {
        let raw = json!({ "hostnames": ["a.example.com"] });
        let err = ExistingRule::from_raw(raw.clone()).unwrap_err();
        assert_eq!(err.raw, raw);
        assert!(err.reason.contains("PK"));
        assert_eq!(err.hostnames, vec![Hostname::new("a.example.com").unwrap()]);
    }

    #[test]
    fn test_listing_parse_splits_unparsed() {
        let raw = vec![
            json!({ "PK": "r1", "hostnames": ["a.x.com"] }),
            json!({ "PK": "", "hostnames": ["b.x.com"] }),
        ];
        let listing = RuleListing::parse(&raw);
        assert_eq!(listing.rules.len(), 1);
        assert_eq!(listing.unparsed.len(), 1);
    }

    #[test]
    fn test_rule_request_shape() {
        let request = RuleRequest {
            group: "7",
            status: STATUS_ENABLED,
            action: ACTION_SPOOF,
            via: String::from("100.64.0.1"),
            hostnames: ["a.ts"],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({ "group": "7", "status": 1, "do": 2, "via": "100.64.0.1", "hostnames[]": ["a.ts"] })
        );
    }
}
