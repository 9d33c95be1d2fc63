use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use stun::Transport;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::SocksOptions,
    error::{Error, Result},
    ranges, resolver,
    transport::ConnectOptions,
    turn::{Credentials, TurnClient},
};

const VERSION: u8 = 0x05;

const METHOD_NO_AUTH: u8 = 0x00;
const METHOD_UNACCEPTABLE: u8 = 0xFF;

const COMMAND_CONNECT: u8 = 0x01;

const ATYP_V4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_V6: u8 = 0x04;

const REPLY_SUCCEEDED: u8 = 0x00;
const REPLY_GENERAL_FAILURE: u8 = 0x01;
const REPLY_HOST_UNREACHABLE: u8 = 0x04;
const REPLY_ADDRESS_TYPE_NOT_SUPPORTED: u8 = 0x08;

/// how often the control channel refreshes a tunnelled allocation.
const REFRESH_INTERVAL: Duration = Duration::from_secs(120);

/// Run the SOCKS5 listener until Ctrl-C.
///
/// Every accepted client gets its own task and its own allocation; the
/// shared cancellation token tears all live sessions down together.
pub async fn run(options: SocksOptions) -> anyhow::Result<()> {
    options.validate()?;

    let listener = TcpListener::bind(options.listen).await?;
    log::info!("socks5 server listening: addr={}", options.listen);

    let options = Arc::new(options);
    let cancel = CancellationToken::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("shutting down");
                cancel.cancel();
                return Ok(());
            }
            accepted = listener.accept() => {
                let (socket, address) = accepted?;
                log::debug!("socks client accepted: addr={address}");

                let options = options.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if let Err(e) = session(socket, &options, cancel).await {
                        log::error!("socks session failed: addr={address}, err={e}");
                    }
                });
            }
        }
    }
}

/// a parsed CONNECT destination.
enum Target {
    Ip(SocketAddr),
    Name(String, u16),
}

/// One SOCKS session end to end: negotiate, map the request onto a TCP
/// allocation, then shuttle bytes until either side quits or the session
/// is cancelled.
pub async fn session<S>(
    mut client: S,
    options: &SocksOptions,
    cancel: CancellationToken,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    negotiate(&mut client).await?;

    let target = match request(&mut client).await? {
        Ok(target) => target,
        Err(code) => {
            reply(&mut client, code).await?;
            return Ok(());
        }
    };

    let target = match target {
        Target::Ip(address) => address,
        Target::Name(name, port) => match resolver::resolve(&name).await {
            Ok(addresses) if !addresses.is_empty() => SocketAddr::new(addresses[0], port),
            Ok(_) => {
                log::debug!("{name:?} resolved to nothing");
                reply(&mut client, REPLY_HOST_UNREACHABLE).await?;
                return Ok(());
            }
            Err(e) => {
                log::debug!("resolving {name:?} failed: {e}");
                reply(&mut client, REPLY_HOST_UNREACHABLE).await?;
                return Ok(());
            }
        },
    };

    if options.drop_public && !ranges::is_private(target.ip()) {
        log::debug!("dropping non private connection to {target}");
        reply(&mut client, REPLY_HOST_UNREACHABLE).await?;
        return Ok(());
    }

    // relay leg: allocation on the control connection, Connect toward the
    // target, ConnectionBind on a second connection.
    let (mut control, data) = match tunnel(options, target).await {
        Ok(pair) => pair,
        Err(e) => {
            log::error!("turn setup for {target} failed: {e}");
            let code = match e {
                Error::Io(_) => REPLY_GENERAL_FAILURE,
                _ => REPLY_HOST_UNREACHABLE,
            };
            reply(&mut client, code).await?;
            return Ok(());
        }
    };

    reply(&mut client, REPLY_SUCCEEDED).await?;

    // the data stream may already hold peer bytes that raced the
    // ConnectionBind response; hand them to the client before splicing.
    let (remote, residual) = data.into_parts();
    let (mut remote_read, mut remote_write) = tokio::io::split(remote);
    let (mut client_read, mut client_write) = tokio::io::split(client);

    if !residual.is_empty() {
        client_write.write_all(&residual).await?;
    }

    tokio::select! {
        result = tokio::io::copy(&mut client_read, &mut remote_write) => match result {
            Ok(bytes) => log::debug!("wrote {bytes} bytes to remote"),
            Err(e) => log::debug!("client to remote copy ended: {e}"),
        },
        result = tokio::io::copy(&mut remote_read, &mut client_write) => match result {
            Ok(bytes) => log::debug!("wrote {bytes} bytes to client"),
            Err(e) => log::debug!("remote to client copy ended: {e}"),
        },
        e = refresh_loop(&mut control) => {
            log::error!("refresh failed, ending session: {e}");
        }
        _ = cancel.cancelled() => {
            log::debug!("session cancelled");
        }
    }

    // teardown order matters: data pipe first, control channel second;
    // either half failing to close cleanly is not worth surfacing.
    let mut remote = remote_read.unsplit(remote_write);
    if let Err(e) = remote.shutdown().await {
        log::debug!("data connection close failed: {e}");
    }

    if let Err(e) = control.close().await {
        log::debug!("control connection close failed: {e}");
    }

    Ok(())
}

/// build the relay leg for one CONNECT.
async fn tunnel(
    options: &SocksOptions,
    target: SocketAddr,
) -> Result<(TurnClient, crate::transport::Stream)> {
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

    let mut control = TurnClient::connect(connect, credentials).await?;
    control.allocate(Transport::TCP).await?;
    let id = control.connect_peer(target).await?;
    let data = control.connection_bind(id).await?;

    Ok((control, data))
}

/// keep the allocation alive for as long as the splice runs.
///
/// Only returns on failure; a stale nonce inside `refresh` is absorbed by
/// the client without the copies ever noticing.
async fn refresh_loop(control: &mut TurnClient) -> Error {
    let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
    // the first tick completes immediately; the allocation is fresh.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        log::debug!("refreshing allocation");
        if let Err(e) = control.refresh().await {
            return e;
        }
    }
}

/// RFC1928 method negotiation: no-auth or nothing.
async fn negotiate<S>(client: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut header = [0u8; 2];
    client.read_exact(&mut header).await?;

    if header[0] != VERSION {
        return Err(Error::Protocol("not a socks5 client"));
    }

    let mut methods = vec![0u8; header[1] as usize];
    client.read_exact(&mut methods).await?;

    if !methods.contains(&METHOD_NO_AUTH) {
        client.write_all(&[VERSION, METHOD_UNACCEPTABLE]).await?;
        return Err(Error::Protocol("client refused the no-auth method"));
    }

    client.write_all(&[VERSION, METHOD_NO_AUTH]).await?;
    Ok(())
}

/// read one CONNECT request; protocol-shaped rejections come back as the
/// reply code to send instead of killing the session.
async fn request<S>(client: &mut S) -> Result<std::result::Result<Target, u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut header = [0u8; 4];
    client.read_exact(&mut header).await?;

    if header[0] != VERSION {
        return Err(Error::Protocol("not a socks5 request"));
    }

    if header[1] != COMMAND_CONNECT {
        return Ok(Err(REPLY_GENERAL_FAILURE));
    }

    let target = match header[3] {
        ATYP_V4 => {
            let mut address = [0u8; 4];
            client.read_exact(&mut address).await?;
            Target::Ip(SocketAddr::new(
                IpAddr::from(address),
                read_port(client).await?,
            ))
        }
        ATYP_V6 => {
            let mut address = [0u8; 16];
            client.read_exact(&mut address).await?;
            Target::Ip(SocketAddr::new(
                IpAddr::from(address),
                read_port(client).await?,
            ))
        }
        ATYP_DOMAIN => {
            let mut size = [0u8; 1];
            client.read_exact(&mut size).await?;

            let mut name = vec![0u8; size[0] as usize];
            client.read_exact(&mut name).await?;

            let name = String::from_utf8_lossy(&name).into_owned();
            Target::Name(name, read_port(client).await?)
        }
        _ => return Ok(Err(REPLY_ADDRESS_TYPE_NOT_SUPPORTED)),
    };

    Ok(Ok(target))
}

async fn read_port<S>(client: &mut S) -> Result<u16>
where
    S: AsyncRead + Unpin,
{
    let mut port = [0u8; 2];
    client.read_exact(&mut port).await?;
    Ok(u16::from_be_bytes(port))
}

/// send a reply with a zeroed BND address; clients only look at the code.
async fn reply<S>(client: &mut S, code: u8) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut packet = [0u8; 10];
    packet[0] = VERSION;
    packet[1] = code;
    packet[3] = ATYP_V4;
    client.write_all(&packet).await?;

    Ok(())
}
