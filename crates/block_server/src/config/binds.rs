//! Parsing of the `binds` setting.
//!
//! The value is a `;`-separated list. Each entry may name an address, a
//! trailing `:port`, or both:
//!
//! * `10.0.0.1:25565` - that address and port
//! * `:25566` - the IPv4 wildcard on port 25566
//! * `10.0.0.1` - that address on the default port
//! * `::1` or `[::1]:25565` - IPv6 forms; `::` never counts as a port separator
//!
//! Entries yielding neither an address nor a port are skipped with a
//! warning. If nothing usable remains the server binds the IPv4 and IPv6
//! wildcards on the default port.

use super::DEFAULT_PORT;
use crate::logging::{LogSink, Severity};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tracing::debug;

/// The endpoints used when no usable bind is configured.
pub fn default_binds() -> Vec<SocketAddr> {
    vec![
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
        SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), DEFAULT_PORT),
    ]
}

/// Parses the `binds` setting, warning through `log` about every entry that
/// had to be skipped.
pub fn parse_binds(value: Option<&str>, log: &dyn LogSink) -> Vec<SocketAddr> {
    let Some(value) = value else {
        return default_binds();
    };

    let mut binds = Vec::new();
    for entry in value.split(';') {
        match parse_bind(entry) {
            Some(addr) => binds.push(addr),
            None => {
                let message = format!("Could not parse bind \"{}\"", entry);
                if let Err(e) = log.write(&message, Severity::Warning) {
                    debug!("Discarding failed bind warning: {}", e);
                }
            }
        }
    }

    if binds.is_empty() {
        default_binds()
    } else {
        binds
    }
}

/// Parses one bind entry. Returns `None` when the entry contributes neither
/// an address nor a port.
pub fn parse_bind(entry: &str) -> Option<SocketAddr> {
    let (host, port) = match split_port(entry) {
        Some((host, port)) => (host, port),
        None => (entry, None),
    };

    let ip = parse_ip(host);
    if ip.is_none() && port.is_none() {
        return None;
    }

    Some(SocketAddr::new(
        ip.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        port.unwrap_or(DEFAULT_PORT),
    ))
}

/// Splits a trailing `:<digits>` off `entry`.
///
/// Returns `None` if there is no port suffix. A suffix whose digits do not
/// fit a port is still split off, with `None` for the port, so the host part
/// can be parsed on its own.
fn split_port(entry: &str) -> Option<(&str, Option<u16>)> {
    let trimmed = entry.trim_end();
    let without_digits = trimmed.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &trimmed[without_digits.len()..];
    if digits.is_empty() {
        return None;
    }

    let host = without_digits.trim_end().strip_suffix(':')?;
    // `::1` ends in a colon followed by digits but is an address, not a port.
    if host.ends_with(':') {
        return None;
    }

    Some((host, digits.parse().ok()))
}

fn parse_ip(text: &str) -> Option<IpAddr> {
    let text = text.trim();
    let text = text
        .strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .unwrap_or(text);
    text.parse().ok()
}

/// Human-readable list of endpoints, e.g. `0.0.0.0:25565, [::]:25565`.
pub fn describe_binds(binds: &[SocketAddr]) -> String {
    binds
        .iter()
        .map(SocketAddr::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
