//! Target expression parsing.
//!
//! The operator types either one CIDR-style range or a comma-separated list of
//! addresses. Nothing here validates address syntax; the discovery service
//! decides what a token means.

use ipnetwork::IpNetwork;
use std::net::IpAddr;

/// Split a raw target expression into the tokens submitted to the service.
///
/// - Any `/` in the input makes the whole string a single range token.
/// - Otherwise the input is split on `,` and every piece is kept verbatim,
///   whitespace and empty pieces included.
///
/// Total over all inputs: `""` yields `[""]`.
pub fn parse_targets(raw: &str) -> Vec<String> {
    if raw.contains('/') {
        return vec![raw.to_string()];
    }
    raw.split(',').map(str::to_string).collect()
}

/// Rough shape of a target token, for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// CIDR-style range (`10.0.0.0/24`)
    Cidr,
    /// Single address (or anything without a `/`)
    Address,
}

impl TargetKind {
    pub fn classify(token: &str) -> Self {
        if token.contains('/') {
            TargetKind::Cidr
        } else {
            TargetKind::Address
        }
    }
}

/// Estimate how many hosts the tokens cover.
///
/// Returns `None` as soon as one token does not parse as a network or
/// address. The tokens themselves are never altered or rejected here.
pub fn estimated_hosts(tokens: &[String]) -> Option<u128> {
    let mut total: u128 = 0;
    for token in tokens {
        let hosts = match TargetKind::classify(token) {
            TargetKind::Cidr => network_hosts(token.parse::<IpNetwork>().ok()?),
            TargetKind::Address => {
                token.parse::<IpAddr>().ok()?;
                1
            }
        };
        total = total.saturating_add(hosts);
    }
    Some(total)
}

// `IpNetwork::size` overflows for `/0`, so count from the prefix instead.
// `::/0` has 2^128 addresses and saturates at `u128::MAX`.
fn network_hosts(net: IpNetwork) -> u128 {
    let width: u32 = match net {
        IpNetwork::V4(_) => 32,
        IpNetwork::V6(_) => 128,
    };
    let host_bits = width - u32::from(net.prefix());
    1u128.checked_shl(host_bits).unwrap_or(u128::MAX)
}
