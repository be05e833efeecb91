use std::collections::HashSet;

use crate::types::{PeerAddress, PeerWithApp};

/// Zero-based position of the connection-state column in a raw listing line.
/// `lsof -i` prints COMMAND PID USER FD TYPE DEVICE SIZE/OFF NODE NAME, so
/// the NAME column (`local->remote` or `local (LISTEN)`) is the ninth field.
const STATE_FIELD: usize = 8;

/// Separator between the local and remote endpoint in an established line.
const REMOTE_SEPARATOR: &str = "->";

/// One established connection from one listing line. Borrowed from the raw
/// text and discarded as soon as the cycle's batch is built.
struct ConnectionRecord<'a> {
    application: &'a str,
    endpoint_pair: &'a str,
}

/// Extract `(application, peer address)` pairs from a raw connection listing.
///
/// Keeps only established lines (state column contains `->`), normalizes the
/// remote endpoint per [`peer_addresses`], and drops every repeat of an
/// `(application, address)` pair while preserving first-seen order.
pub fn peers_with_app(listing: &str) -> Vec<PeerWithApp> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for record in established_records(listing) {
        let Some(remote) = remote_part(record.endpoint_pair) else {
            continue;
        };
        let peer = PeerWithApp {
            application: record.application.to_string(),
            address: normalize_endpoint(remote),
        };
        if seen.insert(peer.clone()) {
            out.push(peer);
        }
    }
    out
}

/// Extract the peer addresses from a raw connection listing.
///
/// Same pipeline as [`peers_with_app`] minus the application column; the
/// dedup key is the address alone, first-seen order preserved.
pub fn peer_addresses(listing: &str) -> Vec<PeerAddress> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for record in established_records(listing) {
        let Some(remote) = remote_part(record.endpoint_pair) else {
            continue;
        };
        let address = normalize_endpoint(remote);
        if seen.insert(address.clone()) {
            out.push(address);
        }
    }
    out
}

/// Select the established-connection records out of the raw listing.
///
/// A line qualifies when it has a state column at all (at least nine
/// whitespace-separated fields) and that column contains the `->` marker.
/// Blank lines, the header line, and listening/idle sockets all fall out
/// here.
fn established_records(listing: &str) -> Vec<ConnectionRecord<'_>> {
    let mut records = Vec::new();
    for line in listing.lines() {
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (Some(&application), Some(&endpoint_pair)) =
            (fields.first(), fields.get(STATE_FIELD))
        else {
            continue;
        };
        if !endpoint_pair.contains(REMOTE_SEPARATOR) {
            continue;
        }
        records.push(ConnectionRecord {
            application,
            endpoint_pair,
        });
    }
    records
}

/// Remote half of a `local->remote` endpoint pair.
fn remote_part(endpoint_pair: &str) -> Option<&str> {
    endpoint_pair
        .split_once(REMOTE_SEPARATOR)
        .map(|(_, remote)| remote)
}

/// Reduce a remote endpoint to its peer address: drop exactly the trailing
/// `:port` segment (IPv6 colons inside the address survive) and delete the
/// surrounding IPv6 brackets. A remote with no `:` at all is kept whole.
fn normalize_endpoint(remote: &str) -> PeerAddress {
    let host = match remote.rfind(':') {
        Some(idx) => &remote[..idx],
        None => remote,
    };
    PeerAddress::new(host.replace(['[', ']'], ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A full raw line with `state` sitting in the ninth column, as the
    /// listing tool prints it.
    fn line(app: &str, state: &str) -> String {
        format!("{app} 100 user 10u IPv4 0xdead 0t0 TCP {state} (ESTABLISHED)\n")
    }

    #[test]
    fn header_line_is_ignored() {
        let listing = "COMMAND     PID   USER   FD   TYPE  DEVICE SIZE/OFF NODE NAME\n";
        assert!(peer_addresses(listing).is_empty());
        assert!(peers_with_app(listing).is_empty());
    }

    #[test]
    fn short_lines_are_ignored() {
        let listing = "garbage with too few columns\n\n   \n";
        assert!(peer_addresses(listing).is_empty());
    }

    #[test]
    fn ipv4_port_is_stripped() {
        let listing = line("chrome", "192.168.1.5:54321->93.184.216.34:443");
        assert_eq!(
            peer_addresses(&listing),
            vec![PeerAddress::new("93.184.216.34")]
        );
    }

    #[test]
    fn ipv6_brackets_and_port_are_stripped() {
        let listing = line("chrome", "[::1]:54321->[2001:db8::1]:443");
        assert_eq!(
            peer_addresses(&listing),
            vec![PeerAddress::new("2001:db8::1")]
        );
    }

    #[test]
    fn service_name_suffix_is_stripped_like_a_port() {
        let listing = line("ssh", "10.0.0.4:55110->server.example.net:ssh");
        assert_eq!(
            peer_addresses(&listing),
            vec![PeerAddress::new("server.example.net")]
        );
    }

    #[test]
    fn remote_without_port_is_kept_whole() {
        let listing = line("ssh", "10.0.0.4:55110->server.example.net");
        assert_eq!(
            peer_addresses(&listing),
            vec![PeerAddress::new("server.example.net")]
        );
    }

    #[test]
    fn listening_socket_contributes_nothing() {
        let listing = line("postgres", "192.168.1.5:5432")
            .replace(" (ESTABLISHED)", " (LISTEN)");
        assert!(peer_addresses(&listing).is_empty());
    }

    #[test]
    fn application_rides_along_in_the_attributed_variant() {
        let listing = line("firefox", "10.0.0.4:50000->93.184.216.34:443");
        assert_eq!(
            peers_with_app(&listing),
            vec![PeerWithApp {
                application: "firefox".to_string(),
                address: PeerAddress::new("93.184.216.34"),
            }]
        );
    }

    #[test]
    fn same_peer_on_two_local_ports_collapses() {
        let mut listing = line("firefox", "10.0.0.4:50000->93.184.216.34:443");
        listing.push_str(&line("firefox", "10.0.0.4:50001->93.184.216.34:443"));
        assert_eq!(peer_addresses(&listing).len(), 1);
        assert_eq!(peers_with_app(&listing).len(), 1);
    }

    #[test]
    fn two_applications_to_one_peer_stay_distinct_when_attributed() {
        let mut listing = line("firefox", "10.0.0.4:50000->93.184.216.34:443");
        listing.push_str(&line("curl", "10.0.0.4:50001->93.184.216.34:443"));
        // Address-only view collapses them, attributed view does not.
        assert_eq!(peer_addresses(&listing).len(), 1);
        assert_eq!(peers_with_app(&listing).len(), 2);
    }

    #[test]
    fn first_seen_order_is_preserved() {
        let mut listing = line("a", "l:1->9.9.9.9:443");
        listing.push_str(&line("b", "l:2->1.1.1.1:443"));
        listing.push_str(&line("c", "l:3->9.9.9.9:53"));
        assert_eq!(
            peer_addresses(&listing),
            vec![PeerAddress::new("9.9.9.9"), PeerAddress::new("1.1.1.1")]
        );
    }
}
