//! Desired-state record types.
//!
//! A [`Hostname`] is the identity key of desired state. It is normalized on
//! construction so comparisons are case-insensitive and ignore a trailing
//! root dot.

use serde::Serialize;
use std::collections::BTreeMap;
use std::net::IpAddr;

/// A normalized DNS hostname.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Hostname(String);

impl Hostname {
    /// Normalizes a raw hostname. Returns `None` for blank input.
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let normalized = raw.trim().trim_end_matches('.').to_ascii_lowercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    /// Appends a domain suffix: `host` + `ts.net` gives `host.ts.net`.
    #[must_use]
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self(format!("{}.{}", self.0, suffix.to_ascii_lowercase()))
    }

    /// Returns the hostname as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Hostname {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A hostname the remote rule set should resolve, and where to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesiredRecord {
    /// Identity key.
    pub hostname: Hostname,
    /// Address the hostname should resolve to.
    pub target: IpAddr,
}

impl DesiredRecord {
    /// Creates a new desired record.
    #[must_use]
    pub const fn new(hostname: Hostname, target: IpAddr) -> Self {
        Self { hostname, target }
    }
}

/// The full desired state: at most one record per hostname.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    records: BTreeMap<Hostname, DesiredRecord>,
}

impl DesiredState {
    /// Creates an empty desired state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    /// Inserts a record, replacing any record for the same hostname.
    /// Returns the replaced record.
    pub fn insert(&mut self, record: DesiredRecord) -> Option<DesiredRecord> {
        self.records.insert(record.hostname.clone(), record)
    }

    /// Looks up the record for a hostname.
    #[must_use]
    pub fn get(&self, hostname: &Hostname) -> Option<&DesiredRecord> {
        self.records.get(hostname)
    }

    /// Returns true if the hostname is desired.
    #[must_use]
    pub fn contains(&self, hostname: &Hostname) -> bool {
        self.records.contains_key(hostname)
    }

    /// Number of desired hostnames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing is desired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates records in hostname order.
    pub fn iter(&self) -> impl Iterator<Item = &DesiredRecord> {
        self.records.values()
    }
}

impl FromIterator<DesiredRecord> for DesiredState {
    fn from_iter<I: IntoIterator<Item = DesiredRecord>>(iter: I) -> Self {
        let mut state = Self::new();
        for record in iter {
            state.insert(record);
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_normalization() {
        let a = Hostname::new("  Server1.TS.net. ").unwrap();
        let b = Hostname::new("server1.ts.net").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "server1.ts.net");
    }

    #[test]
    fn test_hostname_blank() {
        assert!(Hostname::new("").is_none());
        assert!(Hostname::new("  . ").is_none());
    }

    #[test]
    fn test_with_suffix() {
        let host = Hostname::new("server1").unwrap();
        assert_eq!(host.with_suffix("Funny-Name.ts.net").as_str(), "server1.funny-name.ts.net");
    }

    #[test]
    fn test_desired_state_dedupes_by_hostname() {
        let ip1: IpAddr = "100.64.0.1".parse().unwrap();
        let ip2: IpAddr = "100.64.0.2".parse().unwrap();

        let state: DesiredState = [
            DesiredRecord::new(Hostname::new("A.ts").unwrap(), ip1),
            DesiredRecord::new(Hostname::new("a.ts").unwrap(), ip2),
        ]
        .into_iter()
        .collect();

        assert_eq!(state.len(), 1);
        let record = state.get(&Hostname::new("a.ts").unwrap()).unwrap();
        assert_eq!(record.target, ip2);
    }
}
