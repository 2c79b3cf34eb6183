//! In-memory discovery service for unit tests.

use crate::discovery::{
    DeviceId, DeviceRecord, DiscoveryService, OpenPorts, ScanRequest, SystemStatus, TransportError,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub(crate) fn unavailable() -> TransportError {
    TransportError::Status {
        status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        body: "down".to_string(),
    }
}

pub(crate) fn device(id: i64, ip: &str) -> DeviceRecord {
    DeviceRecord {
        id: DeviceId::Number(id),
        ip: ip.to_string(),
        ports: OpenPorts::Text("22,80".to_string()),
        location: "Simulated City, World".to_string(),
        services: None,
        last_seen: None,
        source: Some("scanner".to_string()),
    }
}

pub(crate) fn status(device_count: u64) -> SystemStatus {
    SystemStatus {
        device_count,
        engine_label: "GhostScan v1.0".to_string(),
        extra: Default::default(),
    }
}

/// Answers from queues; an empty status/devices queue answers 503.
#[derive(Default)]
pub(crate) struct ScriptedService {
    statuses: Mutex<VecDeque<Result<SystemStatus, TransportError>>>,
    devices: Mutex<VecDeque<Result<Vec<DeviceRecord>, TransportError>>>,
    submits: Mutex<VecDeque<Result<(), TransportError>>>,
    submitted: Mutex<Vec<ScanRequest>>,
    device_delay: Mutex<Option<Duration>>,
    submit_delay: Mutex<Option<Duration>>,
    status_calls: AtomicUsize,
    device_calls: AtomicUsize,
}

impl ScriptedService {
    pub(crate) fn push_status(&self, result: Result<SystemStatus, TransportError>) {
        self.statuses.lock().unwrap().push_back(result);
    }

    pub(crate) fn push_devices(&self, result: Result<Vec<DeviceRecord>, TransportError>) {
        self.devices.lock().unwrap().push_back(result);
    }

    pub(crate) fn push_submit(&self, result: Result<(), TransportError>) {
        self.submits.lock().unwrap().push_back(result);
    }

    /// Make every device fetch take this long before answering.
    pub(crate) fn delay_devices(&self, delay: Duration) {
        *self.device_delay.lock().unwrap() = Some(delay);
    }

    /// Make every submission take this long before answering.
    pub(crate) fn delay_submit(&self, delay: Duration) {
        *self.submit_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn submitted(&self) -> Vec<ScanRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub(crate) fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn device_calls(&self) -> usize {
        self.device_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiscoveryService for ScriptedService {
    async fn fetch_status(&self) -> Result<SystemStatus, TransportError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(unavailable()))
    }

    async fn fetch_devices(&self) -> Result<Vec<DeviceRecord>, TransportError> {
        self.device_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.devices.lock().unwrap().pop_front();
        let delay = *self.device_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        next.unwrap_or_else(|| Err(unavailable()))
    }

    async fn submit_scan(&self, request: ScanRequest) -> Result<(), TransportError> {
        self.submitted.lock().unwrap().push(request);
        let delay = *self.submit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.submits.lock().unwrap().pop_front();
        next.unwrap_or(Ok(()))
    }
}
