use std::net::{IpAddr, Ipv4Addr};

use crate::error::{Error, Result};

/// The address space worth sweeping from inside somebody's relay: the
/// RFC1918 blocks, carrier-grade NAT and link-local.
pub const PRIVATE_RANGES: &[&str] = &[
    "192.168.0.0/16",
    "10.0.0.0/8",
    "172.16.0.0/12",
    "100.64.0.0/10",
    "169.254.0.0/16",
];

/// whether a connect target stays inside the private address space.
pub fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => {
            ip.is_loopback()
                || PRIVATE_RANGES
                    .iter()
                    .filter_map(|range| parse_cidr(range).ok())
                    .any(|(network, prefix)| in_cidr(ip, network, prefix))
        }
        IpAddr::V6(ip) => {
            // unique-local fc00::/7 and link-local fe80::/10.
            ip.is_loopback() || (ip.segments()[0] & 0xfe00) == 0xfc00 || (ip.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Iterate the target list, one IPv4 address at a time.
///
/// Each input is a plain address or a CIDR block; a malformed entry
/// yields a single error in place of its addresses so the sweep can go
/// on without it.
pub fn ip_iter(inputs: &[String]) -> impl Iterator<Item = Result<Ipv4Addr>> + '_ {
    inputs.iter().flat_map(|input| expand(input))
}

fn expand(input: &str) -> Box<dyn Iterator<Item = Result<Ipv4Addr>> + '_> {
    if !input.contains('/') {
        return match input.parse::<Ipv4Addr>() {
            Ok(ip) => Box::new(std::iter::once(Ok(ip))),
            Err(_) => Box::new(std::iter::once(Err(Error::Config(format!(
                "{input:?} is not an IPv4 address"
            ))))),
        };
    }

    match parse_cidr(input) {
        Err(e) => Box::new(std::iter::once(Err(e))),
        Ok((network, prefix)) => {
            let base = u32::from(network) & mask(prefix);
            let count = 1u64 << (32 - prefix);
            Box::new((0..count).map(move |offset| Ok(Ipv4Addr::from(base + offset as u32))))
        }
    }
}

fn parse_cidr(input: &str) -> Result<(Ipv4Addr, u8)> {
    let (address, prefix) = input
        .split_once('/')
        .ok_or_else(|| Error::Config(format!("{input:?} is not a CIDR block")))?;

    let network = address
        .parse::<Ipv4Addr>()
        .map_err(|_| Error::Config(format!("{address:?} is not an IPv4 address")))?;

    let prefix = prefix
        .parse::<u8>()
        .ok()
        .filter(|prefix| *prefix <= 32)
        .ok_or_else(|| Error::Config(format!("{input:?} has an invalid prefix length")))?;

    Ok((network, prefix))
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    }
}

fn in_cidr(ip: Ipv4Addr, network: Ipv4Addr, prefix: u8) -> bool {
    (u32::from(ip) & mask(prefix)) == (u32::from(network) & mask(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_small_blocks() {
        let ips = ip_iter(&["192.168.1.0/30".to_string()])
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(
            ips,
            [
                "192.168.1.0".parse::<Ipv4Addr>().unwrap(),
                "192.168.1.1".parse().unwrap(),
                "192.168.1.2".parse().unwrap(),
                "192.168.1.3".parse().unwrap(),
            ]
        );
    }

    #[test]
    fn single_addresses_pass_through() {
        let ips = ip_iter(&["10.1.2.3".to_string()])
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(ips, ["10.1.2.3".parse::<Ipv4Addr>().unwrap()]);
    }

    #[test]
    fn bad_entries_become_errors_not_aborts() {
        let results = ip_iter(&["not-an-ip".to_string(), "10.0.0.1".to_string()])
            .collect::<Vec<_>>();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        assert!(results[1].is_ok());
    }

    #[test]
    fn private_membership() {
        assert!(is_private("10.0.0.1".parse().unwrap()));
        assert!(is_private("172.31.255.1".parse().unwrap()));
        assert!(is_private("192.168.0.1".parse().unwrap()));
        assert!(is_private("100.64.1.1".parse().unwrap()));
        assert!(is_private("169.254.0.1".parse().unwrap()));
        assert!(is_private("127.0.0.1".parse().unwrap()));
        assert!(!is_private("93.184.216.34".parse().unwrap()));
        assert!(is_private("fd00::1".parse().unwrap()));
        assert!(!is_private("2001:db8::1".parse().unwrap()));
    }
}
