//! Address of the broker the local UI server subscribes through.

use anyhow::{anyhow, Context, Result};
use rumqttc::Transport;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl BrokerAddress {
    /// Accepts `host:port`, `mqtt://host:port` or `mqtts://host:port`.
    /// `mqtts` or `force_tls` selects TLS.
    pub fn parse(addr: &str, force_tls: bool) -> Result<Self> {
        let addr = addr.trim();
        let (tls, rest) = match addr.split_once("://") {
            None => (force_tls, addr),
            Some(("mqtt", rest)) => (force_tls, rest),
            Some(("mqtts", rest)) => (true, rest),
            Some((scheme, _)) => return Err(anyhow!("unsupported UI broker scheme: {}", scheme)),
        };
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("missing UI broker port in {}", addr))?;
        if host.is_empty() {
            return Err(anyhow!("missing UI broker host in {}", addr));
        }
        let port = port
            .parse()
            .with_context(|| format!("invalid UI broker port in {}", addr))?;
        Ok(Self {
            host: host.to_string(),
            port,
            tls,
        })
    }

    pub fn is_local(&self) -> bool {
        self.host == "localhost"
            || self
                .host
                .parse::<std::net::IpAddr>()
                .map(|ip| ip.is_loopback())
                .unwrap_or(false)
    }

    /// rumqttc transport for this broker. A PEM `ca` replaces the default
    /// roots and only makes sense with TLS.
    pub fn transport(&self, ca: Option<Vec<u8>>) -> Result<Transport> {
        match (self.tls, ca) {
            (false, None) => Ok(Transport::tcp()),
            (false, Some(_)) => Err(anyhow!("UI TLS CA given but {} is not a TLS broker", self)),
            (true, None) => Ok(Transport::tls_with_default_config()),
            (true, Some(ca)) => Ok(Transport::tls(ca, None, None)),
        }
    }
}

impl std::fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = if self.tls { "mqtts" } else { "mqtt" };
        write!(f, "{}://{}:{}", scheme, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_address_is_plain_tcp() {
        let broker = BrokerAddress::parse("127.0.0.1:1883", false).unwrap();
        assert_eq!(broker.host, "127.0.0.1");
        assert_eq!(broker.port, 1883);
        assert!(!broker.tls);
        assert!(broker.is_local());
    }

    #[test]
    fn mqtts_scheme_selects_tls() {
        let broker = BrokerAddress::parse("mqtts://ui.local:8883", false).unwrap();
        assert!(broker.tls);
        assert!(!broker.is_local());
        assert_eq!(broker.to_string(), "mqtts://ui.local:8883");

        let forced = BrokerAddress::parse("mqtt://localhost:1883", true).unwrap();
        assert!(forced.tls);
        assert!(forced.is_local());
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!(BrokerAddress::parse("http://127.0.0.1:3001", false).is_err());
        assert!(BrokerAddress::parse("127.0.0.1", false).is_err());
        assert!(BrokerAddress::parse("127.0.0.1:port", false).is_err());
        assert!(BrokerAddress::parse(":1883", false).is_err());
    }

    #[test]
    fn ca_requires_tls() {
        let plain = BrokerAddress::parse("127.0.0.1:1883", false).unwrap();
        assert!(plain.transport(Some(b"pem".to_vec())).is_err());
        assert!(plain.transport(None).is_ok());

        let secure = BrokerAddress::parse("mqtts://127.0.0.1:8883", false).unwrap();
        assert!(secure.transport(Some(b"pem".to_vec())).is_ok());
    }
}
