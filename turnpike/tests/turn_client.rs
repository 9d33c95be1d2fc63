//! Client state machine against a scripted relay.

mod common;

use std::{net::SocketAddr, time::Duration};

use bytes::BytesMut;
use stun::{attribute as attr, method, ChannelData, MessageReader, MessageWriter, Transport};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use turnpike::{
    error::Error,
    transport::ConnectOptions,
    turn::{random_channel, Credentials, TurnClient},
};

use common::{key, read_frame, PASSWORD, REALM, USERNAME};

const RELAYED: &str = "203.0.113.5:49152";

async fn client(server: SocketAddr) -> TurnClient {
    TurnClient::connect(
        ConnectOptions {
            server: server.to_string(),
            tls: false,
            tls_verify: false,
            timeout: Duration::from_secs(2),
        },
        Credentials {
            username: USERNAME.to_string(),
            password: PASSWORD.to_string(),
        },
    )
    .await
    .expect("connect to mock relay")
}

fn token_of(frame: &[u8]) -> [u8; 12] {
    frame[8..20].try_into().unwrap()
}

/// answer the unauthenticated Allocate with a 401 challenge, then the
/// authenticated retry with a success carrying the relayed address.
async fn serve_allocate(socket: &mut TcpStream, buf: &mut BytesMut, nonce: &str) {
    let frame = read_frame(socket, buf).await;
    let token = token_of(&frame);
    {
        let mut attributes = Vec::new();
        let reader = MessageReader::decode(&frame, &mut attributes).unwrap();
        assert_eq!(reader.method, method::ALLOCATE_REQUEST);
        assert!(reader.get::<attr::UserName>().is_none());
    }

    let mut out = BytesMut::new();
    let mut message = MessageWriter::new(method::ALLOCATE_ERROR, &token, &mut out);
    message.append::<attr::ErrorCode>(attr::Error::from(attr::ErrorKind::Unauthorized));
    message.append::<attr::Realm>(REALM);
    message.append::<attr::Nonce>(nonce);
    message.flush(None).unwrap();
    socket.write_all(&out).await.unwrap();

    let frame = read_frame(socket, buf).await;
    let token = token_of(&frame);
    {
        let mut attributes = Vec::new();
        let reader = MessageReader::decode(&frame, &mut attributes).unwrap();
        assert_eq!(reader.method, method::ALLOCATE_REQUEST);
        assert_eq!(reader.get::<attr::UserName>(), Some(USERNAME));
        assert_eq!(reader.get::<attr::Realm>(), Some(REALM));
        assert_eq!(reader.get::<attr::Nonce>(), Some(nonce));
        reader.integrity(&key(REALM)).expect("valid message integrity");
    }

    let mut out = BytesMut::new();
    let mut message = MessageWriter::new(method::ALLOCATE_RESPONSE, &token, &mut out);
    message.append::<attr::XorRelayedAddress>(RELAYED.parse().unwrap());
    message.append::<attr::Lifetime>(600);
    message.flush(Some(&key(REALM))).unwrap();
    socket.write_all(&out).await.unwrap();
}

/// answer one authenticated request with an empty success response after
/// checking the nonce and the integrity.
async fn serve_success(
    socket: &mut TcpStream,
    buf: &mut BytesMut,
    method: stun::Method,
    nonce: &str,
) -> BytesMut {
    let frame = read_frame(socket, buf).await;
    let token = token_of(&frame);
    {
        let mut attributes = Vec::new();
        let reader = MessageReader::decode(&frame, &mut attributes).unwrap();
        assert_eq!(reader.method, method);
        assert_eq!(reader.get::<attr::Nonce>(), Some(nonce));
        reader.integrity(&key(REALM)).expect("valid message integrity");
    }

    let response = stun::Method::try_from(u16::from(method) | 0x0100).unwrap();
    let mut out = BytesMut::new();
    let mut message = MessageWriter::new(response, &token, &mut out);
    message.flush(Some(&key(REALM))).unwrap();
    socket.write_all(&out).await.unwrap();

    frame
}

/// answer one authenticated request with a 438 carrying a fresh nonce.
async fn serve_stale_nonce(socket: &mut TcpStream, buf: &mut BytesMut, fresh: &str) {
    let frame = read_frame(socket, buf).await;
    let token = token_of(&frame);
    let error = stun::Method::try_from(u16::from({
        let mut attributes = Vec::new();
        let reader = MessageReader::decode(&frame, &mut attributes).unwrap();
        reader.method
    }) | 0x0110)
    .unwrap();

    let mut out = BytesMut::new();
    let mut message = MessageWriter::new(error, &token, &mut out);
    message.append::<attr::ErrorCode>(attr::Error::from(attr::ErrorKind::StaleNonce));
    message.append::<attr::Realm>(REALM);
    message.append::<attr::Nonce>(fresh);
    message.flush(None).unwrap();
    socket.write_all(&out).await.unwrap();
}

#[tokio::test]
async fn allocate_answers_the_challenge() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = listener.local_addr().unwrap();

    let relay = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = BytesMut::new();
        serve_allocate(&mut socket, &mut buf, "n1").await;
    });

    let mut client = client(server).await;
    let relayed = client.allocate(Transport::UDP).await.unwrap();

    assert_eq!(relayed, RELAYED.parse::<SocketAddr>().unwrap());
    assert_eq!(client.relayed(), Some(relayed));
    assert_eq!(client.lifetime(), 600);

    relay.await.unwrap();
}

#[tokio::test]
async fn refresh_recovers_from_one_stale_nonce() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = listener.local_addr().unwrap();

    let relay = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = BytesMut::new();
        serve_allocate(&mut socket, &mut buf, "n1").await;

        // first refresh is told the nonce went stale; the retry must
        // carry the fresh one.
        serve_stale_nonce(&mut socket, &mut buf, "n2").await;
        serve_success(&mut socket, &mut buf, method::REFRESH_REQUEST, "n2").await;
    });

    let mut client = client(server).await;
    client.allocate(Transport::UDP).await.unwrap();
    client.refresh().await.unwrap();

    relay.await.unwrap();
}

#[tokio::test]
async fn second_stale_nonce_surfaces_as_auth_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = listener.local_addr().unwrap();

    let relay = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = BytesMut::new();
        serve_allocate(&mut socket, &mut buf, "n1").await;

        serve_stale_nonce(&mut socket, &mut buf, "n2").await;
        serve_stale_nonce(&mut socket, &mut buf, "n3").await;
    });

    let mut client = client(server).await;
    client.allocate(Transport::UDP).await.unwrap();

    assert!(matches!(client.refresh().await, Err(Error::AuthRequired)));
    relay.await.unwrap();
}

#[tokio::test]
async fn channel_bound_probe_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = listener.local_addr().unwrap();

    let peer: SocketAddr = "10.0.0.7:161".parse().unwrap();
    let payload = b"\x30\x05probe".to_vec();

    let relay = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = BytesMut::new();
        serve_allocate(&mut socket, &mut buf, "n1").await;

        let permission =
            serve_success(&mut socket, &mut buf, method::CREATE_PERMISSION_REQUEST, "n1").await;
        {
            let mut attributes = Vec::new();
            let reader = MessageReader::decode(&permission, &mut attributes).unwrap();
            assert_eq!(reader.get::<attr::XorPeerAddress>(), Some(peer));
        }

        let bind = serve_success(&mut socket, &mut buf, method::CHANNEL_BIND_REQUEST, "n1").await;
        let number = {
            let mut attributes = Vec::new();
            let reader = MessageReader::decode(&bind, &mut attributes).unwrap();
            assert_eq!(reader.get::<attr::XorPeerAddress>(), Some(peer));
            reader.get::<attr::ChannelNumber>().unwrap()
        };
        assert!((0x4000..=0x7FFF).contains(&number));

        // the probe itself: one ChannelData in, one out.
        let frame = read_frame(&mut socket, &mut buf).await;
        assert_eq!(frame.len() % 4, 0);
        let data = ChannelData::try_from(&frame[..]).unwrap();
        assert_eq!(data.number, number);
        assert_eq!(data.payload, b"\x30\x05probe");

        let mut out = BytesMut::new();
        ChannelData::encode(number, b"answer", &mut out);
        socket.write_all(&out).await.unwrap();
    });

    let mut client = client(server).await;
    client.allocate(Transport::UDP).await.unwrap();
    client.create_permission(peer).await.unwrap();

    let number = random_channel();
    client.channel_bind(peer, number).await.unwrap();
    client.send_channel_data(number, &payload).await.unwrap();

    let (channel, answer) = client.recv_channel_data().await.unwrap();
    assert_eq!(channel, number);
    assert_eq!(answer, b"answer");

    relay.await.unwrap();
}

#[tokio::test]
async fn tcp_allocation_binds_a_data_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = listener.local_addr().unwrap();

    let peer: SocketAddr = "192.168.13.37:80".parse().unwrap();

    let relay = tokio::spawn(async move {
        let (mut control, _) = listener.accept().await.unwrap();
        let mut buf = BytesMut::new();
        serve_allocate(&mut control, &mut buf, "n1").await;

        // Connect on the control connection hands out the CONNECTION-ID.
        let frame = read_frame(&mut control, &mut buf).await;
        let token = token_of(&frame);
        {
            let mut attributes = Vec::new();
            let reader = MessageReader::decode(&frame, &mut attributes).unwrap();
            assert_eq!(reader.method, method::CONNECT_REQUEST);
            assert_eq!(reader.get::<attr::XorPeerAddress>(), Some(peer));
            reader.integrity(&key(REALM)).unwrap();
        }

        let mut out = BytesMut::new();
        let mut message = MessageWriter::new(method::CONNECT_RESPONSE, &token, &mut out);
        message.append::<attr::ConnectionId>(0x42);
        message.flush(Some(&key(REALM))).unwrap();
        control.write_all(&out).await.unwrap();

        // ConnectionBind arrives on a second connection.
        let (mut data, _) = listener.accept().await.unwrap();
        let mut data_buf = BytesMut::new();
        let frame = read_frame(&mut data, &mut data_buf).await;
        let token = token_of(&frame);
        {
            let mut attributes = Vec::new();
            let reader = MessageReader::decode(&frame, &mut attributes).unwrap();
            assert_eq!(reader.method, method::CONNECTION_BIND_REQUEST);
            assert_eq!(reader.get::<attr::ConnectionId>(), Some(0x42));
            reader.integrity(&key(REALM)).unwrap();
        }

        let mut out = BytesMut::new();
        let mut message = MessageWriter::new(method::CONNECTION_BIND_RESPONSE, &token, &mut out);
        message.flush(Some(&key(REALM))).unwrap();
        data.write_all(&out).await.unwrap();

        // from here the data connection is a raw pipe to the peer.
        data.write_all(b"hello").await.unwrap();
    });

    let mut client = client(server).await;
    client.allocate(Transport::TCP).await.unwrap();

    let id = client.connect_peer(peer).await.unwrap();
    assert_eq!(id, 0x42);

    let data = client.connection_bind(id).await.unwrap();
    let (mut connection, residual) = data.into_parts();

    let mut received = residual.to_vec();
    while received.len() < 5 {
        let mut tmp = [0u8; 16];
        let size = connection.read(&mut tmp).await.unwrap();
        assert!(size > 0);
        received.extend_from_slice(&tmp[..size]);
    }
    assert_eq!(&received, b"hello");

    relay.await.unwrap();
}
