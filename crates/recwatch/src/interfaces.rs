//! Local network interface enumeration

use regex::Regex;
use std::net::{IpAddr, Ipv4Addr};
use sysinfo::Networks;

/// A local interface that discovery can search through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    pub ipv4: Option<Ipv4Addr>,
}

/// List local interfaces whose name matches `pattern`, sorted by name.
pub fn matching(pattern: &Regex) -> Vec<NetworkInterface> {
    let networks = Networks::new_with_refreshed_list();
    let mut interfaces: Vec<NetworkInterface> = networks
        .iter()
        .filter(|(name, _)| pattern.is_match(name))
        .map(|(name, data)| NetworkInterface {
            name: name.clone(),
            ipv4: data.ip_networks().iter().find_map(|net| match net.addr {
                IpAddr::V4(v4) if !v4.is_loopback() => Some(v4),
                _ => None,
            }),
        })
        .collect();
    interfaces.sort_by(|a, b| a.name.cmp(&b.name));
    interfaces
}
