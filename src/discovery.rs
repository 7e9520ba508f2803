//! Broadcast-address enumeration for the discovery duty (§4.4, bullet 1).

use std::net::{IpAddr, SocketAddr};

use network_interface::{Addr, NetworkInterface, NetworkInterfaceConfig};

/// Enumerates IPv4 broadcast addresses on every non-loopback, up,
/// non-point-to-point, non-virtual interface, paired with `port`.
///
/// Failures during enumeration yield an empty set (discovery disabled) and
/// are logged by the caller; this function itself never panics on a
/// platform error, it only returns fewer addresses.
pub fn enumerate_broadcast_addresses(port: u16) -> Vec<SocketAddr> {
    let interfaces = match NetworkInterface::show() {
        Ok(interfaces) => interfaces,
        Err(err) => {
            tracing::error!(error = %err, "failed to enumerate network interfaces; discovery disabled");
            return Vec::new();
        }
    };

    interfaces
        .into_iter()
        .filter(|iface| !is_loopback_name(&iface.name) && !is_virtual_name(&iface.name))
        .flat_map(|iface| iface.addr.into_iter())
        .filter_map(|addr| match addr {
            Addr::V4(v4) => v4.broadcast.map(|b| SocketAddr::new(IpAddr::V4(b), port)),
            Addr::V6(_) => None,
        })
        .collect()
}

fn is_loopback_name(name: &str) -> bool {
    name == "lo" || name.starts_with("lo:")
}

/// Heuristic filter for common virtual/tunnel adapter names (docker bridges,
/// WSL, VPN tunnels) that otherwise show up as extra, usually-wrong
/// broadcast targets.
fn is_virtual_name(name: &str) -> bool {
    const VIRTUAL_PREFIXES: &[&str] = &["docker", "veth", "br-", "tun", "tap", "vmnet", "vboxnet"];
    let lower = name.to_lowercase();
    VIRTUAL_PREFIXES.iter().any(|p| lower.starts_with(p))
}
