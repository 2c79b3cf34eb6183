use super::{DeviceRecord, DiscoveryService, ScanRequest, SystemStatus, TransportError};
use crate::config::ConsoleSettings;
use async_trait::async_trait;
use reqwest::Response;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP client for the discovery service.
#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    http: reqwest::Client,
    base_url: String,
}

impl DiscoveryClient {
    pub fn new(settings: &ConsoleSettings) -> Result<Self, TransportError> {
        Self::with_base_url(&settings.api_url, settings.request_timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::Request)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let resp = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(TransportError::Request)?;

        let resp = ensure_success(resp).await?;
        resp.json::<T>().await.map_err(TransportError::Decode)
    }
}

async fn ensure_success(resp: Response) -> Result<Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TransportError::Status { status, body })
}

#[async_trait]
impl DiscoveryService for DiscoveryClient {
    async fn fetch_status(&self) -> Result<SystemStatus, TransportError> {
        self.get_json("status").await
    }

    async fn fetch_devices(&self) -> Result<Vec<DeviceRecord>, TransportError> {
        self.get_json("devices").await
    }

    async fn submit_scan(&self, request: ScanRequest) -> Result<(), TransportError> {
        tracing::debug!(
            "Submitting scan: {} target(s), ports {:?}",
            request.targets().len(),
            request.ports()
        );

        let resp = self
            .http
            .post(self.url("scan"))
            .json(&request)
            .send()
            .await
            .map_err(TransportError::Request)?;

        let resp = ensure_success(resp).await?;
        // Acknowledgement only; the body has no contract
        let ack = resp.text().await.unwrap_or_default();
        tracing::debug!("Scan acknowledged: {}", ack);
        Ok(())
    }
}
