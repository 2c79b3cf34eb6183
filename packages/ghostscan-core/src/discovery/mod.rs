//! Remote discovery service boundary.
//!
//! The discovery service probes hosts, detects open ports and resolves
//! locations. The console only queries its status, lists what it found and
//! hands it scan requests.

mod client;
mod error;
mod types;

pub use client::DiscoveryClient;
pub use error::TransportError;
pub use types::{DeviceId, DeviceRecord, OpenPorts, ScanRequest, SystemStatus, DEFAULT_ENGINE_LABEL};

use async_trait::async_trait;

/// The three exchanges the console performs against the discovery service.
///
/// Each call is a single request/response with no retry; any failure is a
/// [`TransportError`].
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    async fn fetch_status(&self) -> Result<SystemStatus, TransportError>;

    async fn fetch_devices(&self) -> Result<Vec<DeviceRecord>, TransportError>;

    /// Fire-and-forget submission. The acknowledgement body is not interpreted.
    async fn submit_scan(&self, request: ScanRequest) -> Result<(), TransportError>;
}
