//! Text rendering of console state. Pure formatting, no decisions.

use chrono::{DateTime, Utc};
use ghostscan_core::{ConsoleView, DeviceRecord, ScanRequest, SystemStatus};
use std::fmt::Write;

const HEADERS: [&str; 3] = ["IP ADDRESS", "OPEN PORTS", "LOCATION"];

pub fn format_devices_table(devices: &[DeviceRecord]) -> String {
    if devices.is_empty() {
        return "No active discoveries. Start a scan to map the network.\n".to_string();
    }

    let rows: Vec<[String; 3]> = devices
        .iter()
        .map(|d| [d.ip.clone(), d.ports.to_string(), d.location.clone()])
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<w0$}  {:<w1$}  {}",
        HEADERS[0],
        HEADERS[1],
        HEADERS[2],
        w0 = widths[0],
        w1 = widths[1]
    );
    let _ = writeln!(
        out,
        "{:-<w0$}  {:-<w1$}  {:-<w2$}",
        "",
        "",
        "",
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2]
    );
    for [ip, ports, location] in &rows {
        let _ = writeln!(
            out,
            "{:<w0$}  {:<w1$}  {}",
            ip,
            ports,
            location,
            w0 = widths[0],
            w1 = widths[1]
        );
    }
    out
}

pub fn format_age(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match at {
        None => "never".to_string(),
        Some(at) => {
            let secs = (now - at).num_seconds().max(0);
            format!("{}s ago", secs)
        }
    }
}

pub fn format_view(view: &ConsoleView, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== GhostScan Recon Console ({}) ==", view.status.engine_label);
    let _ = writeln!(
        out,
        "Devices mapped: {}   status {}   devices {}   poll cycles: {}",
        view.status.device_count,
        format_age(view.status_refreshed_at, now),
        format_age(view.devices_refreshed_at, now),
        view.poll_cycles
    );
    let _ = writeln!(
        out,
        "Targets: {}   [{}]",
        view.target_text,
        if view.busy { "Probing..." } else { "Ready" }
    );
    out.push('\n');
    out.push_str(&format_devices_table(&view.devices));
    out
}

pub fn print_status(status: &SystemStatus) {
    println!("Engine:         {}", status.engine_label);
    println!("Devices mapped: {}", status.device_count);
    for (key, value) in &status.extra {
        println!("{:<15} {}", format!("{}:", key), value);
    }
}

pub fn print_devices(devices: &[DeviceRecord]) {
    print!("{}", format_devices_table(devices));
}

pub fn print_request(request: &ScanRequest, estimated_hosts: Option<u128>) {
    println!("  targets: {:?}", request.targets());
    println!("  ports:   {:?}", request.ports());
    if let Some(hosts) = estimated_hosts {
        println!("  ~{} host(s)", hosts);
    }
}

pub fn print_view(view: &ConsoleView) {
    println!("{}", format_view(view, Utc::now()));
}
