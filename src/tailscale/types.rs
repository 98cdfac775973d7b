//! Tailscale API types.

use serde::Deserialize;

/// A device of the tailnet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Device {
    /// MagicDNS name, e.g. `server1.tail1234.ts.net`.
    pub name: String,
    /// Tailscale addresses, IPv4 first in practice.
    pub addresses: Vec<String>,
}

/// A Tailscale service (VIP service).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Service {
    /// Service name, optionally prefixed with `svc:`.
    pub name: String,
    /// Primary service address.
    pub ip: Option<String>,
    /// All service addresses.
    pub addrs: Vec<String>,
}

/// Body of the device listing.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DevicesBody {
    pub devices: Vec<Device>,
}

/// Body of the service listing.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ServicesBody {
    pub services: Vec<Service>,
}
