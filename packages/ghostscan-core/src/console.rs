//! Console session: the presentation contract over the core.
//!
//! A session lives from activation to deactivation. Activation starts the
//! telemetry schedule; deactivation (explicit or by drop) cancels it together
//! with any pending Armed release, after which no held state changes.

use crate::config::ConsoleSettings;
use crate::discovery::{DeviceRecord, DiscoveryService, ScanRequest, SystemStatus};
use crate::lifecycle::{FixedDelayRelease, ReleaseSignal, ScanController, ScanLifecycleState};
use crate::telemetry::{Held, PollHandle, TelemetryStore, TelemetrySync};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Target text shown when the console opens.
pub const DEFAULT_TARGET_TEXT: &str = "192.168.1.1/24";

pub struct Console;

impl Console {
    /// Activate a console with the fixed-delay release from `settings`.
    pub fn activate(
        service: Arc<dyn DiscoveryService>,
        settings: &ConsoleSettings,
    ) -> ConsoleSession {
        let release = Arc::new(FixedDelayRelease::new(settings.release_delay));
        Self::activate_with_release(service, settings, release)
    }

    pub fn activate_with_release(
        service: Arc<dyn DiscoveryService>,
        settings: &ConsoleSettings,
        release: Arc<dyn ReleaseSignal>,
    ) -> ConsoleSession {
        let cancel = CancellationToken::new();
        let store = Arc::new(TelemetryStore::new());

        let poll = TelemetrySync::start(
            service.clone(),
            store.clone(),
            settings.poll_interval,
            &cancel,
        );
        let controller =
            ScanController::new(service, release, settings.scan_ports.clone(), cancel.clone());
        let (target_text, _) = watch::channel(DEFAULT_TARGET_TEXT.to_string());
        let (submitting, _) = watch::channel(false);

        tracing::info!("Console activated against {}", settings.api_url);

        ConsoleSession {
            store,
            controller,
            target_text,
            submitting,
            poll: Some(poll),
            cancel,
        }
    }
}

/// Result of the "start scan with current text" command.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanCommandOutcome {
    /// The service accepted this request; the console is Armed
    Submitted(ScanRequest),
    /// A scan is already Armed or being submitted; nothing was sent
    Busy,
    /// The submission failed; the console stayed Idle
    Failed(String),
}

/// Everything the presentation layer renders, at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct ConsoleView {
    pub status: SystemStatus,
    pub devices: Vec<DeviceRecord>,
    pub lifecycle: ScanLifecycleState,
    pub busy: bool,
    /// A submission is awaiting the service's answer
    pub submitting: bool,
    pub target_text: String,
    pub status_refreshed_at: Option<DateTime<Utc>>,
    pub devices_refreshed_at: Option<DateTime<Utc>>,
    pub poll_cycles: u64,
}

/// One active console.
pub struct ConsoleSession {
    store: Arc<TelemetryStore>,
    controller: ScanController,
    target_text: watch::Sender<String>,
    submitting: watch::Sender<bool>,
    poll: Option<PollHandle>,
    cancel: CancellationToken,
}

impl ConsoleSession {
    pub fn status(&self) -> SystemStatus {
        self.store.status()
    }

    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.store.devices()
    }

    pub fn lifecycle(&self) -> ScanLifecycleState {
        self.controller.state()
    }

    /// Armed, or a submission is still outstanding.
    pub fn is_busy(&self) -> bool {
        self.lifecycle().is_busy() || self.is_submitting()
    }

    pub fn is_submitting(&self) -> bool {
        *self.submitting.borrow()
    }

    pub fn target_text(&self) -> String {
        self.target_text.borrow().clone()
    }

    pub fn set_target_text(&self, text: impl Into<String>) {
        self.target_text.send_replace(text.into());
    }

    pub fn view(&self) -> ConsoleView {
        let lifecycle = self.lifecycle();
        let submitting = self.is_submitting();
        ConsoleView {
            status: self.store.status(),
            devices: self.store.devices(),
            lifecycle,
            busy: lifecycle.is_busy() || submitting,
            submitting,
            target_text: self.target_text(),
            status_refreshed_at: self.store.status_refreshed_at(),
            devices_refreshed_at: self.store.devices_refreshed_at(),
            poll_cycles: self.store.cycles(),
        }
    }

    /// Notifications for any change of held state.
    pub fn changes(&self) -> ConsoleChanges {
        ConsoleChanges {
            status: self.store.subscribe_status(),
            devices: self.store.subscribe_devices(),
            lifecycle: self.controller.subscribe(),
            target_text: self.target_text.subscribe(),
            submitting: self.submitting.subscribe(),
        }
    }

    /// Start a scan with the current target text, unless one is Armed or
    /// still being submitted.
    pub async fn start_scan(&self) -> ScanCommandOutcome {
        if self.lifecycle().is_busy() {
            tracing::debug!("Scan already armed, ignoring start");
            return ScanCommandOutcome::Busy;
        }
        let Some(_submission) = SubmissionGuard::acquire(&self.submitting) else {
            tracing::debug!("Scan submission in flight, ignoring start");
            return ScanCommandOutcome::Busy;
        };

        let text = self.target_text();
        match self.controller.start(&text).await {
            Ok(request) => ScanCommandOutcome::Submitted(request),
            Err(e) => ScanCommandOutcome::Failed(e.to_string()),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Cancel polling and any pending release, then wait for the poll task.
    pub async fn deactivate(mut self) {
        self.cancel.cancel();
        self.controller.settle();
        if let Some(poll) = self.poll.take() {
            poll.stop().await;
        }
        tracing::info!("Console deactivated");
    }
}

impl Drop for ConsoleSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.controller.settle();
    }
}

/// Holds the session's submitting flag for one submission.
struct SubmissionGuard<'a> {
    flag: &'a watch::Sender<bool>,
}

impl<'a> SubmissionGuard<'a> {
    /// `None` if another submission already holds the flag.
    fn acquire(flag: &'a watch::Sender<bool>) -> Option<Self> {
        let acquired = flag.send_if_modified(|submitting| {
            if *submitting {
                false
            } else {
                *submitting = true;
                true
            }
        });
        acquired.then_some(Self { flag })
    }
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        self.flag.send_replace(false);
    }
}

impl std::fmt::Debug for ConsoleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleSession")
            .field("lifecycle", &self.lifecycle())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// Receivers over every piece of held state of a session.
#[derive(Debug)]
pub struct ConsoleChanges {
    status: watch::Receiver<Held<SystemStatus>>,
    devices: watch::Receiver<Held<Vec<DeviceRecord>>>,
    lifecycle: watch::Receiver<ScanLifecycleState>,
    target_text: watch::Receiver<String>,
    submitting: watch::Receiver<bool>,
}

impl ConsoleChanges {
    /// Wait until something changes. Returns `false` once the session is gone.
    pub async fn changed(&mut self) -> bool {
        let result = tokio::select! {
            r = self.status.changed() => r,
            r = self.devices.changed() => r,
            r = self.lifecycle.changed() => r,
            r = self.target_text.changed() => r,
            r = self.submitting.changed() => r,
        };
        result.is_ok()
    }

    pub fn lifecycle(&self) -> ScanLifecycleState {
        *self.lifecycle.borrow()
    }
}
