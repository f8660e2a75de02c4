//! Nameserver selection for the chroot phase.
//!
//! A host running a local stub resolver lists `127.0.0.53` (or similar) in
//! its resolver config. That address means nothing inside the chroot, so
//! the first routable entry is used instead, with a public fallback.

use std::net::IpAddr;
use std::path::Path;

use ctforge_common::constants::FALLBACK_NAMESERVER;

/// Extracts `nameserver` entries from resolver config content, in file
/// order.
#[must_use]
pub fn parse_nameservers(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some("nameserver"), Some(addr)) => Some(addr.to_string()),
                _ => None,
            }
        })
        .collect()
}

/// Whether `entry` is a loopback address (`127.0.0.0/8` or `::1`).
///
/// An IPv6 zone suffix (`%eth0`) is ignored.
#[must_use]
pub fn is_loopback(entry: &str) -> bool {
    let addr = entry.split('%').next().unwrap_or(entry);
    addr.parse::<IpAddr>()
        .map_or_else(|_| addr.starts_with("127."), |ip| ip.is_loopback())
}

/// Picks the nameserver to use from the host's entries.
///
/// First non-loopback entry, otherwise [`FALLBACK_NAMESERVER`]. When no
/// entry is routable the first one is loopback too, so it is never used.
#[must_use]
pub fn select_nameserver(entries: &[String]) -> String {
    entries
        .iter()
        .find(|entry| !is_loopback(entry))
        .map_or_else(|| FALLBACK_NAMESERVER.to_string(), Clone::clone)
}

/// Resolves the nameserver: `explicit` verbatim, else detected from
/// `resolv_conf`.
#[must_use]
pub fn resolve(explicit: Option<&str>, resolv_conf: &Path) -> String {
    if let Some(explicit) = explicit {
        return explicit.to_string();
    }
    let entries = match std::fs::read_to_string(resolv_conf) {
        Ok(content) => parse_nameservers(&content),
        Err(e) => {
            tracing::warn!(path = %resolv_conf.display(), error = %e, "cannot read resolver config");
            Vec::new()
        }
    };
    let selected = select_nameserver(&entries);
    tracing::info!(nameserver = %selected, candidates = ?entries, "resolved nameserver");
    selected
}
