use std::{net::SocketAddr, time::Duration};

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::error::{Error, Result};

/// Transport used between this tool and the relay itself.
///
/// Only the stream transports are implemented; the relayed allocation can
/// still be UDP, that is what REQUESTED-TRANSPORT is for.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[value(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

#[derive(Parser, Debug)]
#[command(
    name = "turnpike",
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// raise the log filter from info to debug.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// run a local SOCKS5 listener that tunnels CONNECT requests through
    /// the relay into its network.
    Socks(SocksOptions),

    /// sweep internal addresses for SNMP and DNS services through UDP
    /// allocations.
    Scan(ScanOptions),
}

#[derive(Args, Debug, Clone)]
pub struct RelayOptions {
    /// relay to abuse, as host:port.
    #[arg(short = 's', long, env = "TURNPIKE_SERVER")]
    pub turn_server: String,

    /// transport toward the relay.
    #[arg(long, env = "TURNPIKE_PROTOCOL", default_value = "tcp")]
    pub protocol: Protocol,

    /// long-term credential username.
    #[arg(short, long, env = "TURNPIKE_USERNAME")]
    pub username: String,

    /// long-term credential password.
    #[arg(short, long, env = "TURNPIKE_PASSWORD")]
    pub password: String,

    /// wrap the relay connection in TLS.
    #[arg(long)]
    pub tls: bool,

    /// verify the relay certificate chain. Off by default: audited
    /// deployments usually run on self-signed certificates.
    #[arg(long)]
    pub tls_verify: bool,

    /// per-operation network deadline in seconds.
    #[arg(long, env = "TURNPIKE_TIMEOUT", default_value_t = 1)]
    pub timeout: u64,
}

impl RelayOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn validate(&self) -> Result<()> {
        if self.turn_server.is_empty() {
            return Err(Error::Config("need a turn server".to_string()));
        }

        if !self.turn_server.contains(':') {
            return Err(Error::Config("turn server needs a port".to_string()));
        }

        if self.protocol == Protocol::Udp {
            return Err(Error::Config(
                "udp transport toward the relay is not implemented, use tcp".to_string(),
            ));
        }

        if self.username.is_empty() {
            return Err(Error::Config("need a username".to_string()));
        }

        if self.password.is_empty() {
            return Err(Error::Config("need a password".to_string()));
        }

        if self.timeout == 0 {
            return Err(Error::Config("timeout must be positive".to_string()));
        }

        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct SocksOptions {
    #[command(flatten)]
    pub relay: RelayOptions,

    /// address the SOCKS5 server binds to.
    #[arg(short, long, env = "TURNPIKE_LISTEN", default_value = "127.0.0.1:1080")]
    pub listen: SocketAddr,

    /// refuse CONNECT targets outside the private ranges, so nothing
    /// leaks back out through the relay.
    #[arg(long)]
    pub drop_public: bool,
}

impl SocksOptions {
    pub fn validate(&self) -> Result<()> {
        self.relay.validate()
    }
}

#[derive(Args, Debug, Clone)]
pub struct ScanOptions {
    #[command(flatten)]
    pub relay: RelayOptions,

    /// SNMP community string to probe with.
    #[arg(long, default_value = "public")]
    pub community: String,

    /// domain name the DNS probe asks an A record for.
    #[arg(long)]
    pub domain: String,

    /// target IPs or CIDR ranges; defaults to the private ranges.
    #[arg(long = "target")]
    pub targets: Vec<String>,
}

impl ScanOptions {
    pub fn validate(&self) -> Result<()> {
        self.relay.validate()?;

        if self.community.is_empty() {
            return Err(Error::Config("need an SNMP community string".to_string()));
        }

        // single-byte ASN.1 length form in the probe template.
        if self.community.len() > 127 {
            return Err(Error::Config(
                "community string must be at most 127 bytes".to_string(),
            ));
        }

        if self.domain.is_empty() {
            return Err(Error::Config("need a domain name".to_string()));
        }

        for label in self.domain.split('.') {
            if label.is_empty() {
                return Err(Error::Config(format!(
                    "domain name {:?} has an empty label",
                    self.domain
                )));
            }

            if label.len() > 63 {
                return Err(Error::Config(format!(
                    "domain label {label:?} is longer than 63 bytes"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay() -> RelayOptions {
        RelayOptions {
            turn_server: "relay.example.org:3478".to_string(),
            protocol: Protocol::Tcp,
            username: "user".to_string(),
            password: "pass".to_string(),
            tls: false,
            tls_verify: false,
            timeout: 1,
        }
    }

    #[test]
    fn relay_validation() {
        assert!(relay().validate().is_ok());

        let mut options = relay();
        options.turn_server = "relay.example.org".to_string();
        assert!(matches!(options.validate(), Err(Error::Config(_))));

        let mut options = relay();
        options.protocol = Protocol::Udp;
        assert!(matches!(options.validate(), Err(Error::Config(_))));

        let mut options = relay();
        options.password = String::new();
        assert!(matches!(options.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn scan_validation() {
        let mut options = ScanOptions {
            relay: relay(),
            community: "public".to_string(),
            domain: "a.b".to_string(),
            targets: vec![],
        };
        assert!(options.validate().is_ok());

        options.community = "x".repeat(128);
        assert!(matches!(options.validate(), Err(Error::Config(_))));

        options.community = "public".to_string();
        options.domain = "a..b".to_string();
        assert!(matches!(options.validate(), Err(Error::Config(_))));

        options.domain = "x".repeat(64) + ".com";
        assert!(matches!(options.validate(), Err(Error::Config(_))));
    }
}
