//! GhostScan Core Library
//!
//! This crate provides the console-side logic of the GhostScan recon console:
//! - Target expression parsing (CIDR range or comma-separated addresses)
//! - A typed client for the remote discovery service (status, devices, scan)
//! - The scan lifecycle controller (Idle / Armed with timed release)
//! - The telemetry synchronizer (periodic whole-replacement polling)
//! - A console session tying the above to one activate/deactivate lifetime
//!
//! Probing hosts, detecting ports and resolving locations all happen inside
//! the discovery service; this crate only talks to it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ghostscan_core::{config, console::Console, discovery::DiscoveryClient};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = config::load_console_settings();
//!     let client = Arc::new(DiscoveryClient::new(&settings)?);
//!
//!     let session = Console::activate(client, &settings);
//!     session.set_target_text("10.0.0.1,10.0.0.2");
//!     let outcome = session.start_scan().await;
//!     println!("{:?}", outcome);
//!
//!     session.deactivate().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod console;
pub mod discovery;
pub mod lifecycle;
pub mod targets;
pub mod telemetry;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{load_console_settings, ConfigSource, ConsoleSettings};
pub use console::{Console, ConsoleSession, ConsoleView, ScanCommandOutcome};
pub use discovery::{
    DeviceId, DeviceRecord, DiscoveryClient, DiscoveryService, OpenPorts, ScanRequest,
    SystemStatus, TransportError,
};
pub use lifecycle::{FixedDelayRelease, ReleaseSignal, ScanController, ScanLifecycleState};
pub use targets::parse_targets;
pub use telemetry::{PollHandle, TelemetryStore, TelemetrySync};
