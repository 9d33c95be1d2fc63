use std::net::SocketAddr;

use bytes::BytesMut;
use rand::{thread_rng, Rng};
use stun::{
    attribute::{
        ChannelNumber, ConnectionId, ErrorCode, Lifetime, Nonce, Realm, RequestedTransport,
        UserName, XorPeerAddress, XorRelayedAddress,
    },
    method::{self, Kind, Method},
    util, ChannelData, MessageReader, MessageWriter, Transport,
};

use crate::{
    error::{Error, Result},
    transport::{ConnectOptions, Connection, Stream},
};

/// pick a channel number from the client range.
pub fn random_channel() -> u16 {
    thread_rng().gen_range(0x4000..=0x7FFF)
}

/// What one relay session authenticates as.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// A client-side allocation on one relay.
///
/// Owns the control connection. Every operation is a strict
/// request/response pair: requests never pipeline, responses are matched
/// on the transaction id, and a stale nonce is absorbed exactly once per
/// operation before it surfaces as an authentication failure.
pub struct TurnClient {
    stream: Stream,
    options: ConnectOptions,
    credentials: Credentials,
    realm: Option<String>,
    nonce: Option<String>,
    key: Option<[u8; 16]>,
    relayed: Option<SocketAddr>,
    lifetime: u32,
    /// data frames that arrived while a transaction was outstanding.
    pending_data: Vec<(u16, Vec<u8>)>,
}

impl TurnClient {
    /// open the control connection. No TURN traffic happens yet.
    pub async fn connect(options: ConnectOptions, credentials: Credentials) -> Result<Self> {
        let connection = Connection::connect(&options).await?;

        Ok(Self {
            stream: Stream::new(connection, options.timeout),
            options,
            credentials,
            realm: None,
            nonce: None,
            key: None,
            relayed: None,
            lifetime: 0,
            pending_data: Vec::new(),
        })
    }

    /// the relayed transport address the server allocated, once
    /// `allocate` has succeeded.
    pub fn relayed(&self) -> Option<SocketAddr> {
        self.relayed
    }

    pub fn lifetime(&self) -> u32 {
        self.lifetime
    }

    /// close the control connection.
    ///
    /// No zero-lifetime Refresh goes out; the allocation expires on its
    /// own.
    pub async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await
    }

    /// obtain an allocation for the given relayed transport.
    ///
    /// The first Allocate goes out bare to solicit the 401 challenge
    /// carrying REALM and NONCE; the second goes out authenticated. Any
    /// first answer other than 401 is a failure: an open relay would be
    /// nice but is not a state this client knows how to hold.
    pub async fn allocate(&mut self, transport: Transport) -> Result<SocketAddr> {
        self.challenge(transport)
            .await
            .map_err(|e| Error::AllocationFailed(Box::new(e)))?;

        let frame = self
            .request(method::ALLOCATE_REQUEST, |message| {
                message.append::<RequestedTransport>(transport);
            })
            .await
            .map_err(|e| Error::AllocationFailed(Box::new(e)))?;

        let mut attributes = Vec::new();
        let reader = MessageReader::decode(&frame, &mut attributes)?;
        let relayed = reader.get::<XorRelayedAddress>().ok_or(Error::Protocol(
            "allocate response carries no XOR-RELAYED-ADDRESS",
        ))?;

        self.lifetime = reader.get::<Lifetime>().unwrap_or(600);
        self.relayed = Some(relayed);

        Ok(relayed)
    }

    /// extend the allocation, keeping the previously granted lifetime.
    pub async fn refresh(&mut self) -> Result<()> {
        if self.relayed.is_none() {
            return Err(Error::Protocol("refresh without an allocation"));
        }

        let lifetime = self.lifetime;
        let frame = self
            .request(method::REFRESH_REQUEST, |message| {
                message.append::<Lifetime>(lifetime);
            })
            .await?;

        let mut attributes = Vec::new();
        let reader = MessageReader::decode(&frame, &mut attributes)?;
        if let Some(lifetime) = reader.get::<Lifetime>() {
            self.lifetime = lifetime;
        }

        Ok(())
    }

    /// install a permission toward the peer.
    pub async fn create_permission(&mut self, peer: SocketAddr) -> Result<()> {
        if self.relayed.is_none() {
            return Err(Error::Protocol("create permission without an allocation"));
        }

        self.request(method::CREATE_PERMISSION_REQUEST, |message| {
            message.append::<XorPeerAddress>(peer);
        })
        .await?;

        Ok(())
    }

    /// bind a channel number to the peer.
    ///
    /// The server confirms with an empty success response; from then on
    /// ChannelData frames carrying that number map to the peer.
    pub async fn channel_bind(&mut self, peer: SocketAddr, number: u16) -> Result<()> {
        if self.relayed.is_none() {
            return Err(Error::Protocol("channel bind without an allocation"));
        }

        self.request(method::CHANNEL_BIND_REQUEST, |message| {
            message.append::<ChannelNumber>(number);
            message.append::<XorPeerAddress>(peer);
        })
        .await
        .map_err(|e| Error::ChannelBindFailed(Box::new(e)))?;

        Ok(())
    }

    /// ask the server to open a TCP connection to the peer.
    ///
    /// Only meaningful on a TCP allocation. Returns the CONNECTION-ID to
    /// hand to [`TurnClient::connection_bind`].
    pub async fn connect_peer(&mut self, peer: SocketAddr) -> Result<u32> {
        if self.relayed.is_none() {
            return Err(Error::Protocol("connect without an allocation"));
        }

        let frame = self
            .request(method::CONNECT_REQUEST, |message| {
                message.append::<XorPeerAddress>(peer);
            })
            .await
            .map_err(|e| Error::ConnectFailed(Box::new(e)))?;

        let mut attributes = Vec::new();
        let reader = MessageReader::decode(&frame, &mut attributes)?;
        reader
            .get::<ConnectionId>()
            .ok_or(Error::Protocol("connect response carries no CONNECTION-ID"))
    }

    /// open the data connection for a previously issued Connect.
    ///
    /// A second connection to the same server is opened and a
    /// ConnectionBind with the CONNECTION-ID is sent on it; after the
    /// success response that connection is a raw pipe to the peer while
    /// this client stays behind as the refresh control channel.
    pub async fn connection_bind(&mut self, id: u32) -> Result<Stream> {
        let connection = Connection::connect(&self.options)
            .await
            .map_err(|e| Error::ConnectionBindFailed(Box::new(e)))?;
        let mut data = Stream::new(connection, self.options.timeout);

        let mut retried = false;
        loop {
            let token = new_token();
            let mut buf = BytesMut::with_capacity(256);
            let mut message = MessageWriter::new(method::CONNECTION_BIND_REQUEST, &token, &mut buf);
            message.append::<ConnectionId>(id);
            self.flush_auth(message)?;

            data.send(&buf)
                .await
                .map_err(|e| Error::ConnectionBindFailed(Box::new(e)))?;

            let frame = data
                .recv()
                .await
                .map_err(|e| Error::ConnectionBindFailed(Box::new(e)))?;

            match self.digest(&token, &frame)? {
                Reply::Success => return Ok(data),
                Reply::StaleNonce if !retried => retried = true,
                Reply::StaleNonce => return Err(Error::AuthRequired),
                Reply::Failed(e) => return Err(Error::ConnectionBindFailed(Box::new(e))),
            }
        }
    }

    /// send application bytes down a bound channel.
    pub async fn send_channel_data(&mut self, number: u16, payload: &[u8]) -> Result<()> {
        let mut buf = BytesMut::with_capacity(4 + payload.len() + 3);
        ChannelData::encode(number, payload, &mut buf);
        self.stream.send(&buf).await
    }

    /// receive one data frame from any bound channel.
    ///
    /// Frames that arrived while a transaction was in flight are drained
    /// first; unsolicited STUN traffic (Data or ConnectionAttempt
    /// indications) is skipped.
    pub async fn recv_channel_data(&mut self) -> Result<(u16, Vec<u8>)> {
        if !self.pending_data.is_empty() {
            return Ok(self.pending_data.remove(0));
        }

        loop {
            let frame = self.stream.recv().await?;
            if frame[0] >> 6 == 1 {
                let data = ChannelData::try_from(&frame[..])?;
                return Ok((data.number, data.payload.to_vec()));
            }

            log::debug!("skipping {} byte stun message while waiting for data", frame.len());
        }
    }

    /// solicit the authentication challenge with a bare Allocate.
    async fn challenge(&mut self, transport: Transport) -> Result<()> {
        let token = new_token();
        let mut buf = BytesMut::with_capacity(64);
        let mut message = MessageWriter::new(method::ALLOCATE_REQUEST, &token, &mut buf);
        message.append::<RequestedTransport>(transport);
        message.flush(None)?;

        self.stream.send(&buf).await?;
        let frame = self.recv_stun().await?;

        let mut attributes = Vec::new();
        let reader = MessageReader::decode(&frame, &mut attributes)?;
        if reader.token != token {
            return Err(Error::Protocol("transaction id mismatch"));
        }

        let error = check_class(&reader)?;
        match error {
            Some(error) if error.code == 401 => {}
            Some(error) => {
                return Err(Error::Server {
                    code: error.code,
                    reason: error.message.to_string(),
                })
            }
            // a success on the very first unauthenticated Allocate means
            // the server skipped the long-term credential handshake; the
            // state machine has no key to sign followups with.
            None => return Err(Error::Protocol("server skipped the 401 challenge")),
        }

        let realm = reader
            .get::<Realm>()
            .ok_or(Error::Protocol("401 without REALM"))?;
        let nonce = reader
            .get::<Nonce>()
            .ok_or(Error::Protocol("401 without NONCE"))?;

        self.update_credentials(realm, nonce);
        Ok(())
    }

    /// run one authenticated transaction, absorbing a single 438.
    async fn request<F>(&mut self, method: Method, append: F) -> Result<BytesMut>
    where
        F: Fn(&mut MessageWriter),
    {
        let mut retried = false;
        loop {
            let token = new_token();
            let mut buf = BytesMut::with_capacity(256);
            let mut message = MessageWriter::new(method, &token, &mut buf);
            append(&mut message);
            self.flush_auth(message)?;

            self.stream.send(&buf).await?;
            let frame = self.recv_stun().await?;

            match self.digest(&token, &frame)? {
                Reply::Success => return Ok(frame),
                Reply::StaleNonce if !retried => retried = true,
                Reply::StaleNonce => return Err(Error::AuthRequired),
                Reply::Failed(e) => return Err(e),
            }
        }
    }

    /// append USERNAME/REALM/NONCE and sign the message.
    fn flush_auth<'a>(&'a self, mut message: MessageWriter<'a>) -> Result<()> {
        let realm = self.realm.as_deref().ok_or(Error::AuthRequired)?;
        let nonce = self.nonce.as_deref().ok_or(Error::AuthRequired)?;
        let key = self.key.as_ref().ok_or(Error::AuthRequired)?;

        message.append::<UserName>(&self.credentials.username);
        message.append::<Realm>(realm);
        message.append::<Nonce>(nonce);
        message.flush(Some(key))?;

        Ok(())
    }

    /// classify a response frame and fold any fresh nonce into the
    /// credential state.
    fn digest(&mut self, token: &[u8; 12], frame: &[u8]) -> Result<Reply> {
        let mut attributes = Vec::new();
        let reader = MessageReader::decode(frame, &mut attributes)?;
        if reader.token != token {
            return Err(Error::Protocol("transaction id mismatch"));
        }

        let error = check_class(&reader)?;
        let reply = match error {
            None => Reply::Success,
            Some(error) if error.code == 438 => Reply::StaleNonce,
            Some(error) if error.code == 401 => Reply::Failed(Error::AuthRequired),
            Some(error) => Reply::Failed(Error::Server {
                code: error.code,
                reason: error.message.to_string(),
            }),
        };

        // 401 and 438 responses carry the nonce to continue with.
        if let (Some(realm), Some(nonce)) = (reader.get::<Realm>(), reader.get::<Nonce>()) {
            if !matches!(reply, Reply::Success) {
                self.update_credentials(realm, nonce);
            }
        }

        Ok(reply)
    }

    fn update_credentials(&mut self, realm: &str, nonce: &str) {
        // the key derives from the realm, so it follows every change.
        self.key = Some(util::long_term_credential_digest(
            &self.credentials.username,
            realm,
            &self.credentials.password,
        ));
        self.realm = Some(realm.to_string());
        self.nonce = Some(nonce.to_string());
    }

    /// read frames until a response shows up.
    ///
    /// Data frames are parked for [`TurnClient::recv_channel_data`];
    /// unsolicited indications (Data, ConnectionAttempt) never answer a
    /// request and are dropped.
    async fn recv_stun(&mut self) -> Result<BytesMut> {
        loop {
            let frame = self.stream.recv().await?;
            if frame[0] >> 6 == 1 {
                let data = ChannelData::try_from(&frame[..])?;
                self.pending_data
                    .push((data.number, data.payload.to_vec()));
                continue;
            }

            if let Ok(method) = Method::try_from(u16::from_be_bytes([frame[0], frame[1]])) {
                if method.kind().is_none() {
                    log::debug!("ignoring {method:?} indication");
                    continue;
                }
            }

            return Ok(frame);
        }
    }
}

enum Reply {
    Success,
    StaleNonce,
    Failed(Error),
}

/// Check the response class against the attributes it carries.
///
/// An error-class response must carry ERROR-CODE, and ERROR-CODE wins
/// over any success-shaped attributes beside it; ERROR-CODE inside a
/// success-class response is malformed, as is a request or indication
/// where a response belongs.
fn check_class<'a>(
    reader: &MessageReader<'a, '_>,
) -> Result<Option<stun::attribute::Error<'a>>> {
    let kind = reader
        .method
        .kind()
        .ok_or(Error::Protocol("indication where a response belongs"))?;

    match (kind, reader.get::<ErrorCode>()) {
        (Kind::Error, Some(error)) => Ok(Some(error)),
        (Kind::Error, None) => Err(Error::Protocol("error response without ERROR-CODE")),
        (Kind::Response, Some(_)) => Err(Error::Protocol("ERROR-CODE in a success response")),
        (Kind::Response, None) => Ok(None),
        (Kind::Request, _) => Err(Error::Protocol("request where a response belongs")),
    }
}

fn new_token() -> [u8; 12] {
    let mut token = [0u8; 12];
    thread_rng().fill(&mut token[..]);
    token
}
