//! Scan lifecycle controller.
//!
//! A submission that the service accepted puts the console in the Armed
//! state. Armed only means "a scan was just sent": the service gives no
//! completion signal, so a [`ReleaseSignal`] decides when the console goes
//! back to Idle. The shipped signal is a fixed delay.

use crate::discovery::{DiscoveryService, ScanRequest, TransportError};
use crate::targets::parse_targets;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanLifecycleState {
    #[default]
    Idle,
    Armed,
}

impl ScanLifecycleState {
    /// The presentation layer's "busy" flag
    pub fn is_busy(self) -> bool {
        self == ScanLifecycleState::Armed
    }
}

/// Decides when an Armed console is released back to Idle.
pub trait ReleaseSignal: Send + Sync {
    /// Future resolving when the Armed state for `request` should end.
    /// Called at the moment the console becomes Armed.
    fn released(&self, request: &ScanRequest) -> BoxFuture<'static, ()>;
}

/// Releases a fixed time after arming, whatever the remote scan is doing.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelayRelease {
    delay: Duration,
}

impl FixedDelayRelease {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl ReleaseSignal for FixedDelayRelease {
    fn released(&self, _request: &ScanRequest) -> BoxFuture<'static, ()> {
        tokio::time::sleep(self.delay).boxed()
    }
}

/// Owns the lifecycle state and drives its two transitions.
///
/// The controller never refuses a start while Armed; callers are expected to
/// check [`ScanController::state`] first. A second arm supersedes the pending
/// release of the first one.
pub struct ScanController {
    service: Arc<dyn DiscoveryService>,
    release: Arc<dyn ReleaseSignal>,
    ports: Vec<u16>,
    state: Arc<watch::Sender<ScanLifecycleState>>,
    // Bumped on every transition so stale release timers do nothing
    epoch: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl ScanController {
    pub fn new(
        service: Arc<dyn DiscoveryService>,
        release: Arc<dyn ReleaseSignal>,
        ports: Vec<u16>,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(ScanLifecycleState::Idle);
        Self {
            service,
            release,
            ports,
            state: Arc::new(state),
            epoch: Arc::new(AtomicU64::new(0)),
            cancel,
        }
    }

    pub fn state(&self) -> ScanLifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanLifecycleState> {
        self.state.subscribe()
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    /// Parse `raw`, submit it with the configured port set and arm on success.
    ///
    /// Returns the request that was sent. A failed submission leaves the
    /// state Idle and hands the error back; nothing is retried.
    pub async fn start(&self, raw: &str) -> Result<ScanRequest, TransportError> {
        let request = ScanRequest::new(parse_targets(raw), self.ports.clone());

        tracing::info!(
            "Starting scan of {} target(s) on ports {:?}",
            request.targets().len(),
            request.ports()
        );

        match self.service.submit_scan(request.clone()).await {
            Ok(()) => {
                self.arm(&request);
                Ok(request)
            }
            Err(e) => {
                tracing::warn!("Scan submission failed: {}", e);
                self.release_now();
                Err(e)
            }
        }
    }

    // Every mutation checks the token under the state lock, so nothing
    // changes once `settle` has returned after a cancel.
    fn arm(&self, request: &ScanRequest) {
        let mut armed_epoch = None;
        self.state.send_if_modified(|state| {
            if self.cancel.is_cancelled() {
                return false;
            }
            armed_epoch = Some(self.epoch.fetch_add(1, Ordering::SeqCst) + 1);
            *state = ScanLifecycleState::Armed;
            true
        });
        let Some(armed_epoch) = armed_epoch else {
            tracing::debug!("Scan accepted after deactivation, not arming");
            return;
        };
        tracing::info!("Scan armed");

        let released = self.release.released(request);
        let state = self.state.clone();
        let epoch = self.epoch.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Release timer cancelled");
                }
                _ = released => {
                    let changed = state.send_if_modified(|state| {
                        if !cancel.is_cancelled()
                            && epoch.load(Ordering::SeqCst) == armed_epoch
                            && *state == ScanLifecycleState::Armed
                        {
                            *state = ScanLifecycleState::Idle;
                            true
                        } else {
                            false
                        }
                    });
                    if changed {
                        tracing::info!("Scan released");
                    }
                }
            }
        });
    }

    fn release_now(&self) {
        self.state.send_if_modified(|state| {
            if self.cancel.is_cancelled() {
                return false;
            }
            self.epoch.fetch_add(1, Ordering::SeqCst);
            if *state == ScanLifecycleState::Idle {
                false
            } else {
                *state = ScanLifecycleState::Idle;
                true
            }
        });
    }

    /// Wait out any transition that already passed its cancellation check.
    pub fn settle(&self) {
        self.state.send_if_modified(|_| false);
    }
}

impl std::fmt::Debug for ScanController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanController")
            .field("state", &self.state())
            .field("ports", &self.ports)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SCAN_PORTS;
    use crate::test_support::{unavailable, ScriptedService};
    use tokio::time::sleep;

    fn controller(service: Arc<ScriptedService>, cancel: CancellationToken) -> ScanController {
        ScanController::new(
            service,
            Arc::new(FixedDelayRelease::new(Duration::from_secs(3))),
            DEFAULT_SCAN_PORTS.to_vec(),
            cancel,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_cidr_scan_arms_then_releases_after_delay() {
        let service = Arc::new(ScriptedService::default());
        let controller = controller(service.clone(), CancellationToken::new());

        let request = controller.start("192.168.1.1/24").await.unwrap();
        assert_eq!(request.targets(), ["192.168.1.1/24".to_string()]);
        assert_eq!(request.ports(), [80, 443, 22, 3306, 8080]);
        assert_eq!(service.submitted(), vec![request]);
        assert_eq!(controller.state(), ScanLifecycleState::Armed);

        sleep(Duration::from_millis(2999)).await;
        assert_eq!(controller.state(), ScanLifecycleState::Armed);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(controller.state(), ScanLifecycleState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_address_list_payload() {
        let service = Arc::new(ScriptedService::default());
        let controller = controller(service.clone(), CancellationToken::new());

        controller.start("10.0.0.1,10.0.0.2").await.unwrap();
        let sent = service.submitted();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].targets(), ["10.0.0.1".to_string(), "10.0.0.2".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_submission_never_arms() {
        let service = Arc::new(ScriptedService::default());
        service.push_submit(Err(unavailable()));
        let controller = controller(service.clone(), CancellationToken::new());
        let mut rx = controller.subscribe();

        assert!(controller.start("10.0.0.1").await.is_err());
        assert_eq!(controller.state(), ScanLifecycleState::Idle);
        assert!(!rx.has_changed().unwrap());

        // The next attempt is not affected
        controller.start("10.0.0.1").await.unwrap();
        assert_eq!(controller.state(), ScanLifecycleState::Armed);
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_while_armed_releases_immediately() {
        let service = Arc::new(ScriptedService::default());
        let controller = controller(service.clone(), CancellationToken::new());

        controller.start("10.0.0.1").await.unwrap();
        service.push_submit(Err(unavailable()));
        assert!(controller.start("10.0.0.2").await.is_err());
        assert_eq!(controller.state(), ScanLifecycleState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_supersedes_pending_release() {
        let service = Arc::new(ScriptedService::default());
        let controller = controller(service.clone(), CancellationToken::new());

        controller.start("10.0.0.1").await.unwrap();
        sleep(Duration::from_secs(2)).await;
        controller.start("10.0.0.2").await.unwrap();

        // First timer fires at 3s and must not release the second arm
        sleep(Duration::from_secs(2)).await;
        assert_eq!(controller.state(), ScanLifecycleState::Armed);

        sleep(Duration::from_millis(1001)).await;
        assert_eq!(controller.state(), ScanLifecycleState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_pending_release() {
        let service = Arc::new(ScriptedService::default());
        let cancel = CancellationToken::new();
        let controller = controller(service.clone(), cancel.clone());

        controller.start("10.0.0.1").await.unwrap();
        let mut rx = controller.subscribe();
        cancel.cancel();

        sleep(Duration::from_secs(10)).await;
        assert_eq!(controller.state(), ScanLifecycleState::Armed);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_resolving_after_cancel_changes_nothing() {
        let service = Arc::new(ScriptedService::default());
        service.delay_submit(Duration::from_millis(500));
        let cancel = CancellationToken::new();
        let controller = controller(service.clone(), cancel.clone());
        let mut rx = controller.subscribe();

        let (result, ()) = tokio::join!(controller.start("10.0.0.1"), async {
            sleep(Duration::from_millis(100)).await;
            cancel.cancel();
            controller.settle();
        });

        // The service accepted it, but the console no longer reacts
        assert!(result.is_ok());
        assert_eq!(controller.state(), ScanLifecycleState::Idle);
        assert!(!rx.has_changed().unwrap());
    }
}
