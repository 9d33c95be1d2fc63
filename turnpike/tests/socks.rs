//! SOCKS5 front-end behaviour over in-memory streams.
//!
//! Most tests never bring the relay up: everything asserted must be
//! decided before any TURN traffic would leave the process. The last one
//! scripts a full relay and splices bytes end to end.

mod common;

use bytes::BytesMut;
use stun::{attribute as attr, method, MessageReader, MessageWriter};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use turnpike::{
    config::{Protocol, RelayOptions, SocksOptions},
    error::Result,
    socks,
};

fn options(drop_public: bool) -> SocksOptions {
    SocksOptions {
        relay: RelayOptions {
            // a reserved TEST-NET address: if the session ever tried to
            // reach the relay the test would hang on the timeout instead
            // of returning instantly.
            turn_server: "192.0.2.1:3478".to_string(),
            protocol: Protocol::Tcp,
            username: "user1".to_string(),
            password: "pass1".to_string(),
            tls: false,
            tls_verify: false,
            timeout: 1,
        },
        listen: "127.0.0.1:1080".parse().unwrap(),
        drop_public,
    }
}

async fn handshake(client: &mut DuplexStream) {
    client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();

    let mut choice = [0u8; 2];
    client.read_exact(&mut choice).await.unwrap();
    assert_eq!(choice, [0x05, 0x00]);
}

async fn read_reply(client: &mut DuplexStream) -> u8 {
    let mut reply = [0u8; 10];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply[0], 0x05);
    reply[1]
}

async fn run_session(
    server: DuplexStream,
    options: &SocksOptions,
    exchange: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let (result, ()) = tokio::join!(
        socks::session(server, options, CancellationToken::new()),
        exchange,
    );

    result
}

#[tokio::test]
async fn public_targets_are_dropped_before_any_relay_traffic() {
    let (mut client, server) = tokio::io::duplex(256);
    let options = options(true);

    run_session(server, &options, async {
        handshake(&mut client).await;

        // CONNECT 93.184.216.34:80
        client
            .write_all(&[0x05, 0x01, 0x00, 0x01, 93, 184, 216, 34, 0x00, 0x50])
            .await
            .unwrap();

        assert_eq!(read_reply(&mut client).await, 0x04);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn unknown_address_types_are_refused() {
    let (mut client, server) = tokio::io::duplex(256);
    let options = options(false);

    run_session(server, &options, async {
        handshake(&mut client).await;

        client
            .write_all(&[0x05, 0x01, 0x00, 0x02, 0x00, 0x50])
            .await
            .unwrap();

        assert_eq!(read_reply(&mut client).await, 0x08);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn non_connect_commands_are_refused() {
    let (mut client, server) = tokio::io::duplex(256);
    let options = options(false);

    run_session(server, &options, async {
        handshake(&mut client).await;

        // BIND is not on the menu.
        client
            .write_all(&[0x05, 0x02, 0x00, 0x01, 10, 0, 0, 1, 0x00, 0x50])
            .await
            .unwrap();

        assert_eq!(read_reply(&mut client).await, 0x01);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn no_auth_must_be_offered() {
    let (mut client, server) = tokio::io::duplex(256);
    let options = options(false);

    let result = run_session(server, &options, async {
        // only username/password on offer.
        client.write_all(&[0x05, 0x01, 0x02]).await.unwrap();

        let mut choice = [0u8; 2];
        client.read_exact(&mut choice).await.unwrap();
        assert_eq!(choice, [0x05, 0xFF]);
    })
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn wrong_protocol_version_ends_the_session() {
    let (mut client, server) = tokio::io::duplex(256);
    let options = options(false);

    let result = run_session(server, &options, async {
        client.write_all(&[0x04, 0x01, 0x00]).await.unwrap();
    })
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn connect_is_spliced_through_the_relay() {
    use common::{key, read_frame, REALM, USERNAME};

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = listener.local_addr().unwrap();

    let relay = tokio::spawn(async move {
        let (mut control, _) = listener.accept().await.unwrap();
        let mut buf = BytesMut::new();

        // unauthenticated Allocate, 401, authenticated Allocate.
        let frame = read_frame(&mut control, &mut buf).await;
        let token: [u8; 12] = frame[8..20].try_into().unwrap();
        let mut out = BytesMut::new();
        let mut message = MessageWriter::new(method::ALLOCATE_ERROR, &token, &mut out);
        message.append::<attr::ErrorCode>(attr::Error::from(attr::ErrorKind::Unauthorized));
        message.append::<attr::Realm>(REALM);
        message.append::<attr::Nonce>("n1");
        message.flush(None).unwrap();
        control.write_all(&out).await.unwrap();

        let frame = read_frame(&mut control, &mut buf).await;
        let token: [u8; 12] = frame[8..20].try_into().unwrap();
        {
            let mut attributes = Vec::new();
            let reader = MessageReader::decode(&frame, &mut attributes).unwrap();
            assert_eq!(reader.method, method::ALLOCATE_REQUEST);
            assert_eq!(reader.get::<attr::UserName>(), Some(USERNAME));
            assert_eq!(
                reader.get::<attr::RequestedTransport>(),
                Some(stun::Transport::TCP)
            );
            reader.integrity(&key(REALM)).unwrap();
        }
        let mut out = BytesMut::new();
        let mut message = MessageWriter::new(method::ALLOCATE_RESPONSE, &token, &mut out);
        message.append::<attr::XorRelayedAddress>("203.0.113.5:49152".parse().unwrap());
        message.append::<attr::Lifetime>(600);
        message.flush(Some(&key(REALM))).unwrap();
        control.write_all(&out).await.unwrap();

        // Connect toward the CONNECT target.
        let frame = read_frame(&mut control, &mut buf).await;
        let token: [u8; 12] = frame[8..20].try_into().unwrap();
        {
            let mut attributes = Vec::new();
            let reader = MessageReader::decode(&frame, &mut attributes).unwrap();
            assert_eq!(reader.method, method::CONNECT_REQUEST);
            assert_eq!(
                reader.get::<attr::XorPeerAddress>(),
                Some("10.1.2.3:80".parse().unwrap())
            );
        }
        let mut out = BytesMut::new();
        let mut message = MessageWriter::new(method::CONNECT_RESPONSE, &token, &mut out);
        message.append::<attr::ConnectionId>(7);
        message.flush(Some(&key(REALM))).unwrap();
        control.write_all(&out).await.unwrap();

        // ConnectionBind on the data connection; peer bytes ride in the
        // same flight as the success response.
        let (mut data, _) = listener.accept().await.unwrap();
        let mut data_buf = BytesMut::new();
        let frame = read_frame(&mut data, &mut data_buf).await;
        let token: [u8; 12] = frame[8..20].try_into().unwrap();
        {
            let mut attributes = Vec::new();
            let reader = MessageReader::decode(&frame, &mut attributes).unwrap();
            assert_eq!(reader.method, method::CONNECTION_BIND_REQUEST);
            assert_eq!(reader.get::<attr::ConnectionId>(), Some(7));
        }
        let mut out = BytesMut::new();
        let mut message = MessageWriter::new(method::CONNECTION_BIND_RESPONSE, &token, &mut out);
        message.flush(Some(&key(REALM))).unwrap();
        out.extend_from_slice(b"hi!");
        data.write_all(&out).await.unwrap();

        // raw pipe from here on.
        let mut ping = [0u8; 4];
        data.read_exact(&mut ping).await.unwrap();
        assert_eq!(&ping, b"ping");
        data.write_all(b"pong").await.unwrap();
    });

    let (mut client, session_end) = tokio::io::duplex(4096);
    let mut options = options(false);
    options.relay.turn_server = server.to_string();

    run_session(session_end, &options, async {
        handshake(&mut client).await;

        // CONNECT 10.1.2.3:80
        client
            .write_all(&[0x05, 0x01, 0x00, 0x01, 10, 1, 2, 3, 0x00, 0x50])
            .await
            .unwrap();
        assert_eq!(read_reply(&mut client).await, 0x00);

        // bytes that raced the ConnectionBind response come through first.
        let mut early = [0u8; 3];
        client.read_exact(&mut early).await.unwrap();
        assert_eq!(&early, b"hi!");

        client.write_all(b"ping").await.unwrap();
        let mut pong = [0u8; 4];
        client.read_exact(&mut pong).await.unwrap();
        assert_eq!(&pong, b"pong");

        // closing our side ends the splice and the session. The session
        // may already be tearing down if the relay side won the race.
        let _ = client.shutdown().await;
    })
    .await
    .unwrap();

    relay.await.unwrap();
}
