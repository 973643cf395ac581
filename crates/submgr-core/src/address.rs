//! Endpoint validation and formatting.
//!
//! Every encoder embeds its endpoint through [`resolve`] so all share
//! links spell `host:port` the same way.

use std::fmt;

use crate::error::LinkError;

/// Validate a host and port and return the canonical `host:port` string.
///
/// IPv6 literals are bracketed (`[::1]:443`). A host that is already
/// bracketed is accepted as-is.
pub fn resolve(host: &str, port: u32) -> Result<String, LinkError> {
    if host.trim().is_empty() {
        return Err(LinkError::EmptyHost);
    }
    if !(1..=65535).contains(&port) {
        return Err(LinkError::InvalidPort(port));
    }
    let bare = strip_brackets(host);
    if bare.contains(':') {
        Ok(format!("[{bare}]:{port}"))
    } else {
        Ok(format!("{bare}:{port}"))
    }
}

/// A parsed `host:port` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Parse the output of [`resolve`] back into its parts.
    pub fn parse(s: &str) -> Option<Self> {
        let (host, port) = s.rsplit_once(':')?;
        let host = strip_brackets(host);
        let port = port.parse::<u16>().ok()?;
        if host.trim().is_empty() || port == 0 {
            return None;
        }
        Some(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_host_and_port() {
        assert_eq!(resolve("example.com", 443).unwrap(), "example.com:443");
        assert_eq!(resolve("10.0.0.1", 1).unwrap(), "10.0.0.1:1");
        assert_eq!(resolve("a.b", 65535).unwrap(), "a.b:65535");
    }

    #[test]
    fn brackets_ipv6() {
        assert_eq!(resolve("::1", 8443).unwrap(), "[::1]:8443");
        assert_eq!(resolve("[2001:db8::1]", 443).unwrap(), "[2001:db8::1]:443");
    }

    #[test]
    fn rejects_empty_host() {
        for host in ["", " ", "\t"] {
            assert_eq!(resolve(host, 443), Err(LinkError::EmptyHost));
        }
    }

    #[test]
    fn rejects_out_of_range_ports() {
        for port in [0, 65536, 70000, u32::MAX] {
            assert_eq!(resolve("example.com", port), Err(LinkError::InvalidPort(port)));
        }
    }

    #[test]
    fn empty_host_wins_over_bad_port() {
        assert_eq!(resolve("", 0), Err(LinkError::EmptyHost));
    }

    #[test]
    fn round_trips_through_parse() {
        let cases = [
            ("example.com", 443u16),
            ("node-1.fleet.internal", 8443),
            ("192.168.1.20", 1),
            ("2001:db8::7", 65535),
            ("::1", 80),
        ];
        for (host, port) in cases {
            let s = resolve(host, port as u32).unwrap();
            let parsed = Endpoint::parse(&s).unwrap();
            assert_eq!(parsed.host, host);
            assert_eq!(parsed.port, port);
            assert_eq!(parsed.to_string(), s);
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Endpoint::parse("no-port").is_none());
        assert!(Endpoint::parse(":443").is_none());
        assert!(Endpoint::parse("host:0").is_none());
        assert!(Endpoint::parse("host:99999").is_none());
    }
}
