use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Engine label shown before the first successful status poll.
pub const DEFAULT_ENGINE_LABEL: &str = "GhostScan v1.0";

/// Aggregate status reported by the discovery service.
///
/// Replaced as a whole on every successful poll, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    #[serde(default)]
    pub device_count: u64,
    #[serde(default, rename = "engine")]
    pub engine_label: String,
    /// Any further fields the service reports
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for SystemStatus {
    fn default() -> Self {
        Self {
            device_count: 0,
            engine_label: DEFAULT_ENGINE_LABEL.to_string(),
            extra: Map::new(),
        }
    }
}

/// Opaque device identifier as assigned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceId {
    Number(i64),
    Text(String),
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceId::Number(n) => write!(f, "{}", n),
            DeviceId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Open ports exactly as the service reports them.
///
/// The reference service stores them comma-joined (`"22,80"`); a list of
/// integers is accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpenPorts {
    Text(String),
    List(Vec<u16>),
}

impl Default for OpenPorts {
    fn default() -> Self {
        OpenPorts::Text(String::new())
    }
}

impl fmt::Display for OpenPorts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenPorts::Text(s) => write!(f, "{}", s),
            OpenPorts::List(ports) => {
                let joined = ports
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "{}", joined)
            }
        }
    }
}

/// One discovered device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub ip: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ports: OpenPorts,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    /// Service fingerprint data attached by the discovery service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
    /// Which collector produced the record ("scanner", "api", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// A scan submission: the parsed targets plus the configured port set.
///
/// Built once per submission and consumed by the send. The service knows the
/// target list as `ips`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    #[serde(rename = "ips", alias = "targets")]
    targets: Vec<String>,
    ports: Vec<u16>,
}

impl ScanRequest {
    pub fn new(targets: Vec<String>, ports: Vec<u16>) -> Self {
        Self { targets, ports }
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
