use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default discovery service URL
const DEFAULT_API_URL: &str = "http://localhost:8002";

/// Environment variable name for the service URL override
const ENV_API_URL: &str = "GHOSTSCAN_API_URL";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_RELEASE_DELAY_SECS: u64 = 3;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Ports submitted with every scan unless the config file says otherwise.
pub const DEFAULT_SCAN_PORTS: [u16; 5] = [80, 443, 22, 3306, 8080];

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    service: Option<ServiceConfig>,
    console: Option<ConsoleSection>,
}

#[derive(Debug, Deserialize, Default)]
struct ServiceConfig {
    /// Discovery service base URL (e.g., "http://10.0.0.2:8002")
    api_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ConsoleSection {
    poll_interval_secs: Option<u64>,
    release_delay_secs: Option<u64>,
    ports: Option<Vec<u16>>,
}

/// Runtime console configuration
#[derive(Debug, Clone)]
pub struct ConsoleSettings {
    /// Base URL of the discovery service
    pub api_url: String,
    /// Upper bound for one exchange with the service
    pub request_timeout: Duration,
    /// Telemetry poll cadence
    pub poll_interval: Duration,
    /// How long the console stays Armed after a submission
    pub release_delay: Duration,
    /// Port set sent with every scan
    pub scan_ports: Vec<u16>,
    /// Where the service URL came from (for logging)
    pub source: ConfigSource,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            release_delay: Duration::from_secs(DEFAULT_RELEASE_DELAY_SECS),
            scan_ports: DEFAULT_SCAN_PORTS.to_vec(),
            source: ConfigSource::Default,
        }
    }
}

/// Where the configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Using default hardcoded values
    Default,
    /// Loaded from environment variable
    Environment,
    /// Loaded from config file
    ConfigFile,
    /// Given on the command line
    CommandLine,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigFile => write!(f, "config file"),
            ConfigSource::CommandLine => write!(f, "command line"),
        }
    }
}

/// Get the path to the configuration file
fn get_config_file_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("ghostscan").join("config.toml"))
}

/// Load configuration from a file, logging and ignoring anything unusable
pub fn load_config_file_from(path: &Path) -> Option<ConfigFile> {
    if !path.exists() {
        return None;
    }

    match fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config file {:?}: {}", path, e);
            None
        }
    }
}

fn normalize_url(url: &str) -> Option<String> {
    let url = url.trim().trim_end_matches('/');
    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}

/// Combine the environment override, the config file and the defaults.
///
/// URL priority:
/// 1. Environment variable (GHOSTSCAN_API_URL)
/// 2. Config file
/// 3. Default value
///
/// Timing and port settings come from the config file or the defaults.
pub fn resolve_settings(env_url: Option<&str>, file: Option<ConfigFile>) -> ConsoleSettings {
    let mut settings = ConsoleSettings::default();
    let file = file.unwrap_or_default();

    if let Some(service) = file.service {
        if let Some(api) = service.api_url.as_deref().and_then(normalize_url) {
            tracing::info!("Using discovery service URL from config file: {}", api);
            settings.api_url = api;
            settings.source = ConfigSource::ConfigFile;
        }
        if let Some(secs) = service.request_timeout_secs.filter(|s| *s > 0) {
            settings.request_timeout = Duration::from_secs(secs);
        }
    }

    if let Some(console) = file.console {
        match console.poll_interval_secs {
            Some(0) => tracing::warn!(
                "poll_interval_secs must be positive, keeping {}s",
                DEFAULT_POLL_INTERVAL_SECS
            ),
            Some(secs) => settings.poll_interval = Duration::from_secs(secs),
            None => {}
        }
        if let Some(secs) = console.release_delay_secs {
            settings.release_delay = Duration::from_secs(secs);
        }
        match console.ports {
            Some(ports) if ports.is_empty() => {
                tracing::warn!("Empty port list in config file, using defaults")
            }
            Some(ports) => settings.scan_ports = ports,
            None => {}
        }
    }

    if let Some(url) = env_url.and_then(normalize_url) {
        tracing::info!("Using discovery service URL from environment variable: {}", url);
        settings.api_url = url;
        settings.source = ConfigSource::Environment;
    }

    if settings.source == ConfigSource::Default {
        tracing::debug!("Using default discovery service URL: {}", DEFAULT_API_URL);
    }

    settings
}

/// Load console settings from the environment, the user config file and defaults
pub fn load_console_settings() -> ConsoleSettings {
    let env_url = std::env::var(ENV_API_URL).ok();
    let file = get_config_file_path().and_then(|p| load_config_file_from(&p));
    resolve_settings(env_url.as_deref(), file)
}

/// Get the path to the config file for documentation purposes
pub fn get_config_file_path_string() -> String {
    get_config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/ghostscan/config.toml".to_string())
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    r#"# GhostScan Console Configuration
# Place this file at: ~/.config/ghostscan/config.toml

[service]
# Discovery service base URL
# Default: http://localhost:8002
# api_url = "http://10.0.0.2:8002"
# request_timeout_secs = 10

[console]
# poll_interval_secs = 5
# release_delay_secs = 3
# ports = [80, 443, 22, 3306, 8080]
"#
    .to_string()
}
