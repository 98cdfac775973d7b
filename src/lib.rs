// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # ControlD Sync
//!
//! Keeps the DNS spoof rules of one ControlD folder in line with the
//! devices and services of a Tailscale tailnet.
//!
//! ## Overview
//!
//! Each run is idempotent and dry-run by default:
//!
//! - Every device and service name becomes one hostname per configured DNS
//!   suffix, optionally plus the bare name
//! - Existing rules are matched by their primary hostname and always
//!   mutated through their rule identifier
//! - Rules with no hostname are reported and never touched
//! - The rule listing is backed up before the first change is applied
//!
//! ## Architecture
//!
//! 1. **Desired State**: collected from the Tailscale API
//! 2. **Existing State**: listed from the managed ControlD folder
//! 3. **Reconciler**: computes a change plan, which the executor previews
//!    or applies
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`tailscale`]: Tailscale API client and inventory collection
//! - [`controld`]: ControlD API client and rule repository
//! - [`planner`]: Desired records, change plans, and plan execution
//! - [`backup`]: Pre-change backup of the rule listing
//! - [`sync`]: One end-to-end synchronization run
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! tailscale:
//!   tailnet: "-"
//! controld:
//!   profile_id: abc123
//!   folder_name: Tailscale
//! dns:
//!   suffixes: ["ts.example.com"]
//!   include_bare: false
//! backup:
//!   dir: ./backups
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod backup;
pub mod cli;
pub mod config;
pub mod controld;
pub mod error;
pub mod planner;
pub mod sync;
pub mod tailscale;

// ============================================================================
// Re-exports
// ============================================================================

pub use backup::{BackupContext, BackupWriter};
pub use cli::{Cli, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, SyncConfig};
pub use controld::{ControlDClient, FolderRules, RuleRepository};
pub use error::{Result, SyncError};
pub use planner::{ChangePlan, ExecutionReport, PlanExecutor, Reconciler};
pub use sync::{SyncReport, Synchronizer};
pub use tailscale::{InventoryCollector, TailscaleClient};
