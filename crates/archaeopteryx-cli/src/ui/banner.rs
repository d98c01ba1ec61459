//! Start banner.

use super::colors_enabled;
use archaeopteryx::ServerConfig;
use owo_colors::OwoColorize;
use std::net::{Ipv4Addr, SocketAddr};

/// `http(s)://host:port`
pub fn server_url(secure: bool, host: &str, port: u16) -> String {
    let scheme = if secure { "https" } else { "http" };
    format!("{}://{}:{}", scheme, host, port)
}

/// IPv4 addresses of every non-loopback interface.
pub fn network_addresses() -> Vec<Ipv4Addr> {
    match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces
            .into_iter()
            .filter(|iface| !iface.is_loopback())
            .filter_map(|iface| match iface.addr {
                if_addrs::IfAddr::V4(addr) => Some(addr.ip),
                if_addrs::IfAddr::V6(_) => None,
            })
            .collect(),
        Err(e) => {
            tracing::debug!("Failed to list network interfaces: {}", e);
            Vec::new()
        }
    }
}

/// Print where the server is reachable.
pub fn print_start(config: &ServerConfig, addr: SocketAddr) {
    let local = server_url(config.secure, "localhost", addr.port());
    let root = config
        .root
        .canonicalize()
        .unwrap_or_else(|_| config.root.clone());

    eprintln!();
    if colors_enabled() {
        eprintln!(
            "  {} {}",
            "archaeopteryx".bold(),
            concat!("v", env!("CARGO_PKG_VERSION")).dimmed()
        );
    } else {
        eprintln!("  archaeopteryx v{}", env!("CARGO_PKG_VERSION"));
    }
    eprintln!();
    super::success(&format!("Serving {}", root.display()));
    line("Local:  ", &local);
    let network = network_addresses();
    if network.is_empty() {
        super::warning("Could not resolve network address");
    }
    for ip in network {
        line("Network:", &server_url(config.secure, &ip.to_string(), addr.port()));
    }
    if config.live_reload() {
        super::info("Live reload enabled");
    }
    eprintln!();
}

fn line(label: &str, value: &str) {
    if colors_enabled() {
        eprintln!("  {} {} {}", "➜".green(), label.bold(), value.cyan());
    } else {
        eprintln!("  ➜ {} {}", label, value);
    }
}
