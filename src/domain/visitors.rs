//! Client address classification for visitor tracking.

use std::net::{IpAddr, SocketAddr};

/// Outcome of inspecting a request's origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitDecision {
    Track(IpAddr),
    Bypassed,
    Untrackable,
}

/// Pick the client address: first `X-Forwarded-For` entry, else the peer.
///
/// A present but unparseable forwarded entry makes the request untrackable;
/// the peer address is not consulted in that case since it belongs to the proxy.
pub fn client_ip(forwarded_for: Option<&str>, peer: Option<IpAddr>) -> Option<IpAddr> {
    match forwarded_for.and_then(first_forwarded_entry) {
        Some(entry) => parse_address(entry),
        None => peer,
    }
}

pub fn classify(
    forwarded_for: Option<&str>,
    peer: Option<IpAddr>,
    bypass: Option<IpAddr>,
) -> VisitDecision {
    match client_ip(forwarded_for, peer) {
        None => VisitDecision::Untrackable,
        Some(ip) if Some(ip) == bypass => VisitDecision::Bypassed,
        Some(ip) => VisitDecision::Track(ip),
    }
}

fn first_forwarded_entry(header: &str) -> Option<&str> {
    header
        .split(',')
        .next()
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
}

fn parse_address(entry: &str) -> Option<IpAddr> {
    entry
        .parse::<IpAddr>()
        .ok()
        .or_else(|| entry.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}
