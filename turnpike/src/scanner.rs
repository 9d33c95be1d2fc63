use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use stun::Transport;

use crate::{
    config::ScanOptions,
    error::Result,
    probe, ranges,
    transport::ConnectOptions,
    turn::{random_channel, Credentials, TurnClient},
};

/// Sweep the target space for UDP services reachable through the relay.
///
/// One allocation per IP and probe, strictly sequential: the point is a
/// quiet, low-and-slow look around the inside, not a fast portscan.
pub async fn run(options: ScanOptions) -> anyhow::Result<()> {
    options.validate()?;

    let targets = if options.targets.is_empty() {
        ranges::PRIVATE_RANGES
            .iter()
            .map(|range| range.to_string())
            .collect()
    } else {
        options.targets.clone()
    };

    for ip in ranges::ip_iter(&targets) {
        let ip = match ip {
            Ok(ip) => ip,
            Err(e) => {
                log::error!("{e}");
                continue;
            }
        };

        log::debug!("scanning {ip}");

        let snmp = probe::snmp_get_next(&options.community, probe::random_request_id())?;
        if let Err(e) = probe_one(&options, ip, 161, &snmp).await {
            log::error!("snmp scan failed for {ip}: {e}");
        }

        let dns = probe::dns_a_query(&options.domain, probe::random_transaction_id())?;
        if let Err(e) = probe_one(&options, ip, 53, &dns).await {
            log::error!("dns scan failed for {ip}: {e}");
        }
    }

    Ok(())
}

/// Push one payload at `ip:port` through a fresh UDP allocation and wait
/// for at most one answer.
///
/// A silent peer is a valid outcome: every timeout is swallowed and the
/// sweep moves on.
async fn probe_one(options: &ScanOptions, ip: Ipv4Addr, port: u16, payload: &[u8]) -> Result<()> {
    let peer = SocketAddr::new(IpAddr::V4(ip), port);

    let connect = ConnectOptions {
        server: options.relay.turn_server.clone(),
        tls: options.relay.tls,
        tls_verify: options.relay.tls_verify,
        timeout: options.relay.timeout(),
    };

    let credentials = Credentials {
        username: options.relay.username.clone(),
        password: options.relay.password.clone(),
    };

    let result: Result<()> = async {
        let mut client = TurnClient::connect(connect, credentials).await?;
        client.allocate(Transport::UDP).await?;
        client.create_permission(peer).await?;

        let channel = random_channel();
        client.channel_bind(peer, channel).await?;
        client.send_channel_data(channel, payload).await?;

        let (number, data) = client.recv_channel_data().await?;
        log::info!(
            "received {} bytes on channel {:#06x} for ip {}",
            data.len(),
            number,
            ip
        );
        log::info!("udp response: {}", String::from_utf8_lossy(&data));

        Ok(())
    }
    .await;

    match result {
        Err(e) if e.is_timeout() => Ok(()),
        other => other,
    }
}
