//! Desired state from the Tailscale inventory.
//!
//! Every device and service name is expanded across the configured DNS
//! suffixes, plus the bare name when enabled. When two entries produce the
//! same hostname, the later one wins.

use std::net::IpAddr;
use tracing::{debug, info, warn};

use crate::config::DnsConfig;
use crate::planner::{DesiredRecord, DesiredState, Hostname};

use super::types::{Device, Service};

/// Prefix Tailscale puts on service names.
const SERVICE_PREFIX: &str = "svc:";

/// Builds the desired state from devices and services.
#[derive(Debug, Clone)]
pub struct InventoryCollector {
    suffixes: Vec<String>,
    include_bare: bool,
}

impl InventoryCollector {
    /// Creates a collector for the given DNS settings.
    #[must_use]
    pub fn new(dns: &DnsConfig) -> Self {
        Self {
            suffixes: dns.normalized_suffixes(),
            include_bare: dns.include_bare,
        }
    }

    /// Collects the desired state. Devices are processed before services.
    #[must_use]
    pub fn collect(&self, devices: &[Device], services: &[Service]) -> DesiredState {
        let mut state = DesiredState::new();

        for device in devices {
            match (device_name(device), device_target(device)) {
                (Some(name), Some(target)) => self.expand(&mut state, &name, target),
                _ => debug!("Skipping device {:?}: no usable name or address", device.name),
            }
        }

        for service in services {
            match (service_name(service), service_target(service)) {
                (Some(name), Some(target)) => self.expand(&mut state, &name, target),
                _ => debug!("Skipping service {:?}: no usable name or address", service.name),
            }
        }

        info!("Generated {} desired DNS records", state.len());
        state
    }

    fn expand(&self, state: &mut DesiredState, name: &Hostname, target: IpAddr) {
        let bare = self.include_bare.then(|| name.clone());
        let suffixed = self.suffixes.iter().map(|suffix| name.with_suffix(suffix));

        for hostname in bare.into_iter().chain(suffixed) {
            if let Some(previous) = state.insert(DesiredRecord::new(hostname, target))
                && previous.target != target
            {
                warn!(
                    "Hostname {} maps to both {} and {target}; using {target}",
                    previous.hostname, previous.target
                );
            }
        }
    }
}

/// First DNS label of the MagicDNS name.
fn device_name(device: &Device) -> Option<Hostname> {
    device.name.split('.').next().and_then(Hostname::new)
}

/// First IPv4 address, else the first parseable one.
fn device_target(device: &Device) -> Option<IpAddr> {
    let parsed: Vec<IpAddr> = device
        .addresses
        .iter()
        .filter_map(|a| parse_address(a))
        .collect();

    parsed
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| parsed.first())
        .copied()
}

fn service_name(service: &Service) -> Option<Hostname> {
    let name = service.name.trim();
    Hostname::new(name.strip_prefix(SERVICE_PREFIX).unwrap_or(name))
}

fn service_target(service: &Service) -> Option<IpAddr> {
    service
        .ip
        .as_deref()
        .and_then(parse_address)
        .or_else(|| service.addrs.iter().find_map(|a| parse_address(a)))
}

/// Parses an address, tolerating a CIDR suffix.
fn parse_address(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    raw.split('/').next().unwrap_or(raw).parse().ok()
}
