//! Private-network guard for outbound fetches.
//!
//! Everything here is a pure predicate over parsed hosts/addresses so the initial URL and
//! every redirect target go through the same checks before any socket is opened.

use kwpipe_core::{parse_http_url, Error, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

const BLOCKED_SUFFIXES: [&str; 4] = [".internal", ".local", ".test", ".localhost"];

pub fn is_blocked_ipv4(addr: Ipv4Addr) -> bool {
    let o = addr.octets();
    o[0] == 10
        || (o[0] == 172 && (16..=31).contains(&o[1]))
        || (o[0] == 192 && o[1] == 168)
        || o[0] == 127
        || (o[0] == 169 && o[1] == 254)
        || o[0] == 0
}

pub fn is_blocked_ipv6(addr: Ipv6Addr) -> bool {
    if let Some(v4) = addr.to_ipv4_mapped() {
        return is_blocked_ipv4(v4);
    }
    let first = addr.segments()[0];
    addr.is_loopback()
        || addr.is_unspecified()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
}

pub fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(a) => is_blocked_ipv4(a),
        IpAddr::V6(a) => is_blocked_ipv6(a),
    }
}

pub fn is_blocked_domain(domain: &str) -> bool {
    let d = domain.trim_end_matches('.').to_ascii_lowercase();
    d == "localhost" || BLOCKED_SUFFIXES.iter().any(|s| d.ends_with(s))
}

/// True when `host` names a loopback, private, link-local or internal-only destination.
///
/// Operates on the literal host. Names that only resolve to private space are not caught here.
pub fn is_blocked_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(d) => is_blocked_domain(d),
        Host::Ipv4(a) => is_blocked_ipv4(*a),
        Host::Ipv6(a) => is_blocked_ipv6(*a),
    }
}

/// Validate an already-parsed URL: http(s) only, and (unless `allow_private`) a public host.
pub fn check_parsed(u: &Url, allow_private: bool) -> Result<()> {
    match u.scheme() {
        "http" | "https" => {}
        other => return Err(Error::InvalidScheme(other.to_string())),
    }
    let Some(host) = u.host() else {
        return Err(Error::InvalidUrl(format!("{u}: missing host")));
    };
    if !allow_private && is_blocked_host(&host) {
        return Err(Error::PrivateAddressBlocked(host.to_string()));
    }
    Ok(())
}

/// Parse and validate a raw URL string.
pub fn check_url(raw: &str, allow_private: bool) -> Result<Url> {
    let u = parse_http_url(raw)?;
    check_parsed(&u, allow_private)?;
    Ok(u)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn blocked(raw: &str) -> bool {
        matches!(check_url(raw, false), Err(Error::PrivateAddressBlocked(_)))
    }

    #[test]
    fn public_hosts_pass() {
        assert!(check_url("https://example.com/page", false).is_ok());
        assert!(check_url("http://bbc.com/news", false).is_ok());
        assert!(check_url("http://8.8.8.8/", false).is_ok());
        assert!(check_url("http://172.32.0.1/", false).is_ok());
        assert!(check_url("http://192.169.1.1/", false).is_ok());
        assert!(check_url("http://[2606:4700::1111]/", false).is_ok());
    }

    #[test]
    fn loopback_and_private_ranges_are_blocked() {
        assert!(blocked("http://127.0.0.1/anything"));
        assert!(blocked("http://127.8.9.10:8080/"));
        assert!(blocked("http://10.0.0.5/x"));
        assert!(blocked("http://172.16.0.1/private"));
        assert!(blocked("http://172.31.255.255/"));
        assert!(blocked("http://192.168.1.1/router"));
        assert!(blocked("http://169.254.169.254/latest/meta-data"));
        assert!(blocked("http://0.0.0.0/"));
    }

    #[test]
    fn internal_hostnames_are_blocked() {
        assert!(blocked("http://localhost/admin"));
        assert!(blocked("https://LOCALHOST:8443/"));
        assert!(blocked("http://localhost./"));
        assert!(blocked("http://api.localhost/"));
        assert!(blocked("http://db.internal/"));
        assert!(blocked("http://printer.local/"));
        assert!(blocked("http://site.test/"));
        assert!(!blocked("http://internal.example.com/"));
        assert!(!blocked("http://localhost-tools.com/"));
    }

    #[test]
    fn ipv6_loopback_private_and_mapped_are_blocked() {
        assert!(blocked("http://[::1]/"));
        assert!(blocked("http://[::]/"));
        assert!(blocked("http://[fd00::1]/"));
        assert!(blocked("http://[fe80::1]/"));
        assert!(blocked("http://[::ffff:127.0.0.1]/"));
        assert!(blocked("http://[::ffff:10.1.2.3]/"));
    }

    #[test]
    fn numeric_ipv4_spellings_are_normalized_before_checking() {
        // The URL parser canonicalizes these to 127.0.0.1.
        assert!(blocked("http://2130706433/"));
        assert!(blocked("http://0x7f.0.0.1/"));
    }

    #[test]
    fn scheme_is_checked_before_host() {
        assert!(matches!(
            check_url("ftp://127.0.0.1/", false),
            Err(Error::InvalidScheme(_))
        ));
        assert!(matches!(
            check_url("javascript:alert(1)", false),
            Err(Error::InvalidScheme(_))
        ));
    }

    #[test]
    fn allow_private_skips_only_the_host_guard() {
        assert!(check_url("http://127.0.0.1:3000/", true).is_ok());
        assert!(matches!(
            check_url("file:///etc/passwd", true),
            Err(Error::InvalidScheme(_))
        ));
    }

    proptest! {
        #[test]
        fn every_ten_slash_eight_address_is_blocked(b in any::<u8>(), c in any::<u8>(), d in any::<u8>()) {
            prop_assert!(is_blocked_ipv4(Ipv4Addr::new(10, b, c, d)));
            prop_assert!(is_blocked_ipv4(Ipv4Addr::new(127, b, c, d)));
        }

        #[test]
        fn ranges_172_follow_the_slash_twelve_boundary(b in any::<u8>(), c in any::<u8>(), d in any::<u8>()) {
            let ip = Ipv4Addr::new(172, b, c, d);
            prop_assert_eq!(is_blocked_ipv4(ip), (16..=31).contains(&b));
        }
    }
}
