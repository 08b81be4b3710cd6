//! Endpoint address parsing (`opc.tcp://host:port/path`).

use std::fmt;

use crate::client::ConnectionFault;

/// Structured view of a device address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    /// Everything after the authority, without the leading `/`.
    pub path: String,
}

impl Endpoint {
    pub fn parse(address: &str) -> Result<Self, ConnectionFault> {
        let invalid = |reason: &str| ConnectionFault::InvalidAddress {
            address: address.to_owned(),
            reason: reason.to_owned(),
        };

        let (scheme, rest) = address
            .trim()
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme (expected e.g. opc.tcp://host:port)"))?;
        if scheme.is_empty() {
            return Err(invalid("empty scheme"));
        }

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, path),
            None => (rest, ""),
        };

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            // IPv6 literal: [::1]:4840
            let (host, after) = bracketed
                .split_once(']')
                .ok_or_else(|| invalid("unterminated IPv6 literal"))?;
            let port = match after.strip_prefix(':') {
                Some(p) => Some(p),
                None if after.is_empty() => None,
                None => return Err(invalid("unexpected characters after IPv6 literal")),
            };
            (host, port)
        } else {
            match authority.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            }
        };

        if host.is_empty() {
            return Err(invalid("empty host"));
        }
        let port = match port {
            Some(p) => Some(p.parse::<u16>().map_err(|_| invalid("port is not a number in 0-65535"))?),
            None => None,
        };

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_owned(),
            port,
            path: path.to_owned(),
        })
    }

    /// Host portion of `address` for display, or the raw address when it
    /// does not parse.
    pub fn display_host(address: &str) -> String {
        Self::parse(address)
            .map(|e| e.host)
            .unwrap_or_else(|_| address.to_owned())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if self.host.contains(':') {
            write!(f, "[{}]", self.host)?;
        } else {
            f.write_str(&self.host)?;
        }
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        if !self.path.is_empty() {
            write!(f, "/{}", self.path)?;
        }
        Ok(())
    }
}
