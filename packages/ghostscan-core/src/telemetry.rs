//! Telemetry synchronizer.
//!
//! Keeps the held status and device list in step with the discovery service
//! by re-fetching both on a fixed cadence. Every successful fetch replaces
//! the held value wholesale; a failed fetch leaves it as it was.

use crate::discovery::{DeviceRecord, DiscoveryService, SystemStatus};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// A held value and when it was last replaced by a successful fetch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Held<T> {
    pub value: T,
    /// `None` until the first successful fetch
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// The locally held view of the service.
#[derive(Debug)]
pub struct TelemetryStore {
    status: watch::Sender<Held<SystemStatus>>,
    devices: watch::Sender<Held<Vec<DeviceRecord>>>,
    cycles: AtomicU64,
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryStore {
    pub fn new() -> Self {
        let (status, _) = watch::channel(Held::default());
        let (devices, _) = watch::channel(Held::default());
        Self {
            status,
            devices,
            cycles: AtomicU64::new(0),
        }
    }

    pub fn status(&self) -> SystemStatus {
        self.status.borrow().value.clone()
    }

    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.devices.borrow().value.clone()
    }

    pub fn status_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.status.borrow().refreshed_at
    }

    pub fn devices_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.devices.borrow().refreshed_at
    }

    /// Number of poll cycles started so far
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Held<SystemStatus>> {
        self.status.subscribe()
    }

    pub fn subscribe_devices(&self) -> watch::Receiver<Held<Vec<DeviceRecord>>> {
        self.devices.subscribe()
    }

    /// Replace the held status unless `cancel` has fired.
    ///
    /// The cancellation check runs under the channel lock, so once
    /// [`TelemetryStore::settle`] returns after a cancel no replacement lands.
    pub fn replace_status(&self, status: SystemStatus, cancel: &CancellationToken) -> bool {
        self.status.send_if_modified(|held| {
            if cancel.is_cancelled() {
                return false;
            }
            *held = Held {
                value: status,
                refreshed_at: Some(Utc::now()),
            };
            true
        })
    }

    /// Replace the held device list unless `cancel` has fired.
    pub fn replace_devices(&self, devices: Vec<DeviceRecord>, cancel: &CancellationToken) -> bool {
        self.devices.send_if_modified(|held| {
            if cancel.is_cancelled() {
                return false;
            }
            *held = Held {
                value: devices,
                refreshed_at: Some(Utc::now()),
            };
            true
        })
    }

    /// Wait out any replacement that already passed its cancellation check.
    pub fn settle(&self) {
        self.status.send_if_modified(|_| false);
        self.devices.send_if_modified(|_| false);
    }

    fn begin_cycle(&self) -> u64 {
        self.cycles.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Recurring poll of status and devices.
pub struct TelemetrySync;

impl TelemetrySync {
    /// Start polling: one cycle right away, then one every `period`.
    ///
    /// Polling runs until the returned handle is stopped or dropped, or until
    /// `parent` is cancelled.
    pub fn start(
        service: Arc<dyn DiscoveryService>,
        store: Arc<TelemetryStore>,
        period: Duration,
        parent: &CancellationToken,
    ) -> PollHandle {
        let cancel = parent.child_token();
        let task_cancel = cancel.clone();

        let task_store = store.clone();
        let task = tokio::spawn(async move {
            let store = task_store;
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let cycle = store.begin_cycle();
                tracing::debug!("Telemetry poll cycle {}", cycle);

                // Status and devices are fetched independently and may
                // complete in any order, also relative to earlier cycles
                tokio::spawn(refresh_status(
                    service.clone(),
                    store.clone(),
                    task_cancel.clone(),
                ));
                tokio::spawn(refresh_devices(
                    service.clone(),
                    store.clone(),
                    task_cancel.clone(),
                ));
            }

            tracing::debug!("Telemetry polling stopped");
        });

        tracing::info!("Telemetry polling every {:?}", period);
        PollHandle {
            cancel,
            store,
            task: Some(task),
        }
    }
}

async fn refresh_status(
    service: Arc<dyn DiscoveryService>,
    store: Arc<TelemetryStore>,
    cancel: CancellationToken,
) {
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = service.fetch_status() => result,
    };

    match result {
        Ok(status) => {
            let count = status.device_count;
            if store.replace_status(status, &cancel) {
                tracing::debug!("Status refreshed: {} devices", count);
            }
        }
        Err(e) => tracing::warn!("Status poll failed, keeping last status: {}", e),
    }
}

async fn refresh_devices(
    service: Arc<dyn DiscoveryService>,
    store: Arc<TelemetryStore>,
    cancel: CancellationToken,
) {
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = service.fetch_devices() => result,
    };

    match result {
        Ok(devices) => {
            let count = devices.len();
            if store.replace_devices(devices, &cancel) {
                tracing::debug!("Device list refreshed: {} devices", count);
            }
        }
        Err(e) => tracing::warn!("Device poll failed, keeping last device list: {}", e),
    }
}

/// Running poll schedule. Stopping or dropping it ends polling for good.
#[derive(Debug)]
pub struct PollHandle {
    cancel: CancellationToken,
    store: Arc<TelemetryStore>,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop polling and wait for the schedule task to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        self.store.settle();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Telemetry task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.store.settle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{device, status, unavailable, ScriptedService};
    use tokio::time::sleep;

    const PERIOD: Duration = Duration::from_secs(5);

    fn start(service: &Arc<ScriptedService>, store: &Arc<TelemetryStore>) -> PollHandle {
        TelemetrySync::start(
            service.clone(),
            store.clone(),
            PERIOD,
            &CancellationToken::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_immediately_then_on_interval() {
        let service = Arc::new(ScriptedService::default());
        let store = Arc::new(TelemetryStore::new());
        let _handle = start(&service, &store);

        sleep(Duration::from_millis(1)).await;
        assert_eq!(service.status_calls(), 1);
        assert_eq!(service.device_calls(), 1);

        sleep(Duration::from_millis(4998)).await;
        assert_eq!(service.status_calls(), 1);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(service.status_calls(), 2);
        assert_eq!(service.device_calls(), 2);
        assert_eq!(store.cycles(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_keeps_previous_snapshot() {
        let service = Arc::new(ScriptedService::default());
        service.push_status(Ok(status(2)));
        service.push_devices(Ok(vec![device(1, "10.0.0.1")]));
        service.push_status(Err(unavailable()));
        service.push_devices(Err(unavailable()));
        service.push_status(Ok(status(9)));
        service.push_devices(Ok(vec![device(4, "10.0.0.4"), device(5, "10.0.0.5")]));

        let store = Arc::new(TelemetryStore::new());
        assert_eq!(store.status(), SystemStatus::default());
        let _handle = start(&service, &store);

        sleep(Duration::from_millis(1)).await;
        let status_after_first = store.status();
        let devices_after_first = store.devices();
        let refreshed_at = store.status_refreshed_at();
        assert_eq!(status_after_first.device_count, 2);
        assert!(refreshed_at.is_some());

        sleep(PERIOD).await;
        assert_eq!(store.status(), status_after_first);
        assert_eq!(store.devices(), devices_after_first);
        assert_eq!(store.status_refreshed_at(), refreshed_at);

        sleep(PERIOD).await;
        assert_eq!(store.status().device_count, 9);
        assert_eq!(store.devices().len(), 2);
        assert_eq!(store.devices()[0].ip, "10.0.0.4");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_device_list_replaces_not_accumulates() {
        let service = Arc::new(ScriptedService::default());
        service.push_devices(Ok(vec![device(1, "10.0.0.1"), device(2, "10.0.0.2")]));
        service.push_devices(Ok(vec![]));

        let store = Arc::new(TelemetryStore::new());
        let _handle = start(&service, &store);

        sleep(Duration::from_millis(1)).await;
        assert_eq!(store.devices().len(), 2);

        sleep(PERIOD).await;
        assert!(store.devices().is_empty());
        assert!(store.devices_refreshed_at().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_fail_independently() {
        let service = Arc::new(ScriptedService::default());
        service.push_status(Err(unavailable()));
        service.push_devices(Ok(vec![device(1, "10.0.0.1")]));

        let store = Arc::new(TelemetryStore::new());
        let _handle = start(&service, &store);

        sleep(Duration::from_millis(1)).await;
        assert_eq!(store.status(), SystemStatus::default());
        assert!(store.status_refreshed_at().is_none());
        assert_eq!(store.devices().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_polling_and_drops_in_flight_results() {
        let service = Arc::new(ScriptedService::default());
        service.delay_devices(Duration::from_secs(2));
        service.push_devices(Ok(vec![device(1, "10.0.0.1")]));

        let store = Arc::new(TelemetryStore::new());
        let handle = start(&service, &store);
        let mut devices_rx = store.subscribe_devices();

        sleep(Duration::from_secs(1)).await;
        assert!(handle.is_running());
        handle.stop().await;

        sleep(Duration::from_secs(30)).await;
        assert_eq!(service.device_calls(), 1);
        assert_eq!(service.status_calls(), 1);
        assert!(store.devices().is_empty());
        assert!(!devices_rx.has_changed().unwrap());
    }

    #[test]
    fn test_replacement_after_cancel_is_ignored() {
        let store = TelemetryStore::new();
        let cancel = CancellationToken::new();
        let mut devices_rx = store.subscribe_devices();

        assert!(store.replace_devices(vec![device(1, "10.0.0.1")], &cancel));
        devices_rx.borrow_and_update();

        cancel.cancel();
        store.settle();
        assert!(!store.replace_status(status(3), &cancel));
        assert!(!store.replace_devices(vec![], &cancel));

        assert_eq!(store.status(), SystemStatus::default());
        assert!(store.status_refreshed_at().is_none());
        assert_eq!(store.devices().len(), 1);
        assert!(!devices_rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_polling() {
        let service = Arc::new(ScriptedService::default());
        let store = Arc::new(TelemetryStore::new());
        let handle = start(&service, &store);

        sleep(Duration::from_millis(1)).await;
        drop(handle);

        sleep(PERIOD * 3).await;
        assert_eq!(service.status_calls(), 1);
        assert_eq!(store.cycles(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancellation_stops_polling() {
        let service = Arc::new(ScriptedService::default());
        let store = Arc::new(TelemetryStore::new());
        let parent = CancellationToken::new();
        let handle = TelemetrySync::start(service.clone(), store.clone(), PERIOD, &parent);

        sleep(Duration::from_millis(1)).await;
        parent.cancel();
        assert!(!handle.is_running());

        sleep(PERIOD * 2).await;
        assert_eq!(service.status_calls(), 1);
    }
}
