//! Parser for `VBoxManage list natnets` output.
//!
//! The output is a sequence of `Key: Value` blocks, one per network, each
//! terminated by a blank line:
//!
//! ```text
//! NetworkName:    NatNetwork
//! IP:             10.0.2.1
//! Network:        10.0.2.0/24
//! IPv6 Enabled:   No
//! IPv6 Prefix:    fd17:625c:f037:2::/64
//! DHCP Enabled:   Yes
//! Enabled:        Yes
//!
//! ```
//!
//! A block is only committed when its blank line is seen, so a last block
//! without one is dropped.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::net::Ipv4Addr;

use ipnet::{Ipv4Net, Ipv6Net};

use crate::error::{NatNetError, Result};
use crate::natnet::NatNet;

/// Split a `Key: Value` line.
///
/// The key extends to the last colon that is followed by whitespace, so
/// values such as IPv6 prefixes may contain colons. Returns `None` for lines
/// without such a separator.
///
/// Trailing whitespace is stripped from the value, so `Enabled: Yes ` reads as `Yes`.
pub fn parse_colon_line(line: &str) -> Option<(&str, &str)> {
    let (idx, _) = line.match_indices(':').rev().find(|(idx, _)| {
        *idx > 0
            && line[idx + 1..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_whitespace())
    })?;

    let value = line[idx + 1..].trim_matches(|c: char| c.is_ascii_whitespace());
    Some((&line[..idx], value))
}

/// Parse a complete `list natnets` output into networks keyed by name.
///
/// Invalid UTF-8 is replaced rather than rejected; VBoxManage prints rule
/// names and other user text in the console encoding.
pub fn parse_natnets(output: &[u8]) -> Result<BTreeMap<String, NatNet>> {
    let text = String::from_utf8_lossy(output);
    let mut nets = BTreeMap::new();
    let mut net = NatNet::default();

    for line in text.as_bytes().lines() {
        let line = line?;
        if line.is_empty() {
            let done = std::mem::take(&mut net);
            if !done.name.is_empty() {
                nets.insert(done.name.clone(), done);
            }
            continue;
        }

        if let Some((key, value)) = parse_colon_line(&line) {
            apply_field(&mut net, key, value)?;
        }
    }

    Ok(nets)
}

fn apply_field(net: &mut NatNet, key: &str, value: &str) -> Result<()> {
    match key {
        "NetworkName" => net.name = value.to_string(),
        "IP" => net.ipv4_address = value.parse::<Ipv4Addr>().ok(),
        "Network" => {
            let cidr: Ipv4Net = value.parse().map_err(|e| NatNetError::Parse {
                value: value.to_string(),
                source: e,
            })?;
            net.ipv4_network = Some(cidr.trunc());
        }
        "IPv6 Prefix" => {
            if value.is_empty() {
                return Ok(());
            }
            let cidr: Ipv6Net = value.parse().map_err(|e| NatNetError::Parse {
                value: value.to_string(),
                source: e,
            })?;
            net.ipv6_network = Some(cidr.trunc());
        }
        "IPv6 Enabled" => net.ipv6_enabled = value == "Yes",
        "DHCP Enabled" => net.dhcp_enabled = value == "Yes",
        "Enabled" => net.enabled = value == "Yes",
        _ => {}
    }
    Ok(())
}
