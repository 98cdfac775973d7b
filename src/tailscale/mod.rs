//! Tailscale API integration module.
//!
//! This module reads the tailnet's devices and services and turns them
//! into the desired DNS state.

mod client;
mod inventory;
mod types;

pub use client::{TAILSCALE_API_URL, TailscaleClient};
pub use inventory::InventoryCollector;
pub use types::{Device, Service};
