use crate::cli::OutputFormat;
use crate::render;
use anyhow::{Context, Result};
use ghostscan_core::config::{
    generate_example_config, get_config_file_path_string, ConsoleSettings,
};
use ghostscan_core::targets::estimated_hosts;
use ghostscan_core::{parse_targets, DiscoveryClient, DiscoveryService, ScanRequest};

fn client(settings: &ConsoleSettings) -> Result<DiscoveryClient> {
    DiscoveryClient::new(settings).context("Failed to build discovery client")
}

pub async fn cmd_status(settings: &ConsoleSettings, format: OutputFormat) -> Result<()> {
    let status = client(settings)?
        .fetch_status()
        .await
        .context("Failed to fetch service status")?;

    match format {
        OutputFormat::Text => render::print_status(&status),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
    }
    Ok(())
}

pub async fn cmd_devices(settings: &ConsoleSettings, format: OutputFormat) -> Result<()> {
    let devices = client(settings)?
        .fetch_devices()
        .await
        .context("Failed to fetch device list")?;

    match format {
        OutputFormat::Text => render::print_devices(&devices),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&devices)?),
    }
    Ok(())
}

pub async fn cmd_scan(
    settings: &ConsoleSettings,
    targets: &str,
    format: OutputFormat,
) -> Result<()> {
    let request = ScanRequest::new(parse_targets(targets), settings.scan_ports.clone());
    let hosts = estimated_hosts(request.targets());

    client(settings)?
        .submit_scan(request.clone())
        .await
        .context("Failed to submit scan")?;

    match format {
        OutputFormat::Text => {
            println!("✓ Scan submitted");
            render::print_request(&request, hosts);
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "status": "submitted",
                    "request": request,
                    "estimated_hosts": hosts,
                })
            );
        }
    }
    Ok(())
}

pub fn cmd_config(settings: &ConsoleSettings, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("Config file:      {}", get_config_file_path_string());
            println!("Service URL:      {} ({})", settings.api_url, settings.source);
            println!("Request timeout:  {:?}", settings.request_timeout);
            println!("Poll interval:    {:?}", settings.poll_interval);
            println!("Release delay:    {:?}", settings.release_delay);
            println!("Scan ports:       {:?}", settings.scan_ports);
            println!();
            println!("Example config:");
            println!("{}", generate_example_config());
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "config_file": get_config_file_path_string(),
                    "api_url": settings.api_url,
                    "source": settings.source.to_string(),
                    "request_timeout_secs": settings.request_timeout.as_secs(),
                    "poll_interval_secs": settings.poll_interval.as_secs(),
                    "release_delay_secs": settings.release_delay.as_secs(),
                    "scan_ports": settings.scan_ports,
                })
            );
        }
    }
    Ok(())
}
