use std::{
    fmt::Debug,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
};

use bytes::{BufMut, BytesMut};
use num_enum::TryFromPrimitive;

use crate::StunError;

/// Relayed transport protocol codepoints, taken from the IPv4 Protocol /
/// IPv6 NextHeader numbers, left-aligned in the 4-byte attribute value.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
pub enum Transport {
    TCP = 0x06000000,
    UDP = 0x11000000,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpFamily {
    V4 = 0x01,
    V6 = 0x02,
}

impl TryFrom<u8> for IpFamily {
    type Error = StunError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x01 => Self::V4,
            0x02 => Self::V6,
            _ => return Err(StunError::UnknownAddressFamily),
        })
    }
}

/// transport address codec shared by the *-ADDRESS attributes.
///
/// The value consists of an 8-bit zero pad, an 8-bit address family and a
/// 16-bit port, followed by 32 or 128 bits of address:
///
/// ```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |0 0 0 0 0 0 0 0|    Family     |           Port                |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// |                 Address (32 bits or 128 bits)                 |
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// In the XOR variants the port is XORed with the most significant 16 bits
/// of the magic cookie; an IPv4 address is XORed with the cookie, an IPv6
/// address with the concatenation of the cookie and the 96-bit transaction
/// id, all in network byte order.
pub struct Addr;

impl Addr {
    /// encoder SocketAddr as Bytes.
    ///
    /// # Test
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use stun::attribute::*;
    ///
    /// let xor_addr_bytes: [u8; 8] =
    ///     [0x00, 0x01, 0xfc, 0xbe, 0xe1, 0xba, 0xa4, 0x29];
    ///
    /// let addr_bytes: [u8; 8] = [0x00, 0x01, 0xdd, 0xac, 0xc0, 0xa8, 0x00, 0x6b];
    ///
    /// let token: [u8; 12] = [
    ///     0x6c, 0x46, 0x62, 0x54, 0x75, 0x4b, 0x44, 0x51, 0x46, 0x48, 0x4c, 0x71,
    /// ];
    ///
    /// let source = "192.168.0.107:56748".parse().unwrap();
    ///
    /// let mut buffer = BytesMut::with_capacity(1280);
    /// Addr::encode(&source, &token, &mut buffer, true);
    /// assert_eq!(&xor_addr_bytes, &buffer[..]);
    ///
    /// let mut buffer = BytesMut::with_capacity(1280);
    /// Addr::encode(&source, &token, &mut buffer, false);
    /// assert_eq!(&addr_bytes, &buffer[..]);
    /// ```
    pub fn encode(addr: &SocketAddr, token: &[u8], bytes: &mut BytesMut, is_xor: bool) {
        bytes.put_u8(0);
        let addr = if is_xor { xor(addr, token) } else { *addr };

        bytes.put_u8(if addr.is_ipv4() {
            IpFamily::V4
        } else {
            IpFamily::V6
        } as u8);

        bytes.put_u16(addr.port());
        match addr.ip() {
            IpAddr::V4(ip) => bytes.put(&ip.octets()[..]),
            IpAddr::V6(ip) => bytes.put(&ip.octets()[..]),
        }
    }

    /// decoder Bytes as SocketAddr.
    ///
    /// # Test
    ///
    /// ```
    /// use stun::attribute::*;
    ///
    /// let xor_addr_bytes: [u8; 8] =
    ///     [0x00, 0x01, 0xfc, 0xbe, 0xe1, 0xba, 0xa4, 0x29];
    ///
    /// let addr_bytes: [u8; 8] = [0x00, 0x01, 0xdd, 0xac, 0xc0, 0xa8, 0x00, 0x6b];
    ///
    /// let token: [u8; 12] = [
    ///     0x6c, 0x46, 0x62, 0x54, 0x75, 0x4b, 0x44, 0x51, 0x46, 0x48, 0x4c, 0x71,
    /// ];
    ///
    /// let source: std::net::SocketAddr = "192.168.0.107:56748".parse().unwrap();
    ///
    /// let addr = Addr::decode(&xor_addr_bytes, &token, true).unwrap();
    /// assert_eq!(addr, source);
    ///
    /// let addr = Addr::decode(&addr_bytes, &token, false).unwrap();
    /// assert_eq!(addr, source);
    /// ```
    pub fn decode(packet: &[u8], token: &[u8], is_xor: bool) -> Result<SocketAddr, StunError> {
        if packet.len() < 4 {
            return Err(StunError::InvalidInput);
        }

        let port = u16::from_be_bytes([packet[2], packet[3]]);
        let ip_addr = match IpFamily::try_from(packet[1])? {
            IpFamily::V4 => from_bytes_v4(packet)?,
            IpFamily::V6 => from_bytes_v6(packet)?,
        };

        let addr = SocketAddr::new(ip_addr, port);
        Ok(if is_xor { xor(&addr, token) } else { addr })
    }
}

fn from_bytes_v4(packet: &[u8]) -> Result<IpAddr, StunError> {
    if packet.len() != 8 {
        return Err(StunError::InvalidInput);
    }

    let bytes: [u8; 4] = packet[4..8].try_into()?;
    Ok(IpAddr::V4(bytes.into()))
}

fn from_bytes_v6(packet: &[u8]) -> Result<IpAddr, StunError> {
    if packet.len() != 20 {
        return Err(StunError::InvalidInput);
    }

    let bytes: [u8; 16] = packet[4..20].try_into()?;
    Ok(IpAddr::V6(bytes.into()))
}

/// XOR a transport address with the magic cookie and transaction id.
///
/// The operation is an involution: applying it twice with the same
/// transaction id yields the original address.
pub fn xor(addr: &SocketAddr, token: &[u8]) -> SocketAddr {
    let port = addr.port() ^ (0x2112A442u32 >> 16) as u16;
    let ip_addr = match addr.ip() {
        IpAddr::V4(x) => xor_v4(x),
        IpAddr::V6(x) => xor_v6(x, token),
    };

    SocketAddr::new(ip_addr, port)
}

fn xor_v4(addr: Ipv4Addr) -> IpAddr {
    let mut octets = addr.octets();
    for (i, b) in octets.iter_mut().enumerate() {
        *b ^= (0x2112A442u32 >> (24 - i * 8)) as u8;
    }

    IpAddr::V4(From::from(octets))
}

fn xor_v6(addr: Ipv6Addr, token: &[u8]) -> IpAddr {
    let mut octets = addr.octets();
    for (i, b) in octets.iter_mut().enumerate().take(4) {
        *b ^= (0x2112A442u32 >> (24 - i * 8)) as u8;
    }

    for (i, b) in octets.iter_mut().enumerate().take(16).skip(4) {
        *b ^= token[i - 4];
    }

    IpAddr::V6(From::from(octets))
}

/// STUN Attributes Registry
///
/// [RFC5389]: https://datatracker.ietf.org/doc/html/rfc5389
/// [RFC5766]: https://datatracker.ietf.org/doc/html/rfc5766
/// [RFC6062]: https://datatracker.ietf.org/doc/html/rfc6062
///
/// Attribute types in the range 0x0000-0x7FFF are comprehension-required;
/// types in the range 0x8000-0xFFFF are comprehension-optional. A client
/// skips unknown comprehension-optional attributes and, because it only
/// ever consumes responses it solicited, unknown comprehension-required
/// attributes as well.
#[repr(u16)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, TryFromPrimitive)]
pub enum AttrKind {
    MappedAddress = 0x0001,
    UserName = 0x0006,
    MessageIntegrity = 0x0008,
    ErrorCode = 0x0009,
    UnknownAttributes = 0x000A,
    ChannelNumber = 0x000C,
    Lifetime = 0x000D,
    XorPeerAddress = 0x0012,
    Data = 0x0013,
    Realm = 0x0014,
    Nonce = 0x0015,
    XorRelayedAddress = 0x0016,
    RequestedAddressFamily = 0x0017,
    EvenPort = 0x0018,
    RequestedTransport = 0x0019,
    DontFragment = 0x001A,
    XorMappedAddress = 0x0020,
    ReservationToken = 0x0022,
    ConnectionId = 0x002A,
    Software = 0x8022,
    Fingerprint = 0x8028,
}

/// dyn stun/turn message attribute.
pub trait Attribute<'a> {
    type Error: Debug;

    /// current attribute inner type.
    type Item;

    /// current attribute type.
    const KIND: AttrKind;

    /// write the current attribute to the buffer.
    #[allow(unused_variables)]
    fn encode(value: Self::Item, bytes: &mut BytesMut, token: &'a [u8]) {}

    /// convert buffer to current attribute.
    fn decode(bytes: &'a [u8], token: &'a [u8]) -> Result<Self::Item, Self::Error>;
}

/// The USERNAME attribute is used for message integrity.  It identifies
/// the username and password combination used in the message-integrity
/// check.
pub struct UserName;

impl<'a> Attribute<'a> for UserName {
    type Error = StunError;
    type Item = &'a str;

    const KIND: AttrKind = AttrKind::UserName;

    fn encode(value: Self::Item, bytes: &mut BytesMut, _: &'a [u8]) {
        bytes.put(value.as_bytes());
    }

    fn decode(bytes: &'a [u8], _: &'a [u8]) -> Result<Self::Item, Self::Error> {
        Ok(std::str::from_utf8(bytes)?)
    }
}

/// The DATA attribute is present in all Send and Data indications.  The
/// value portion of this attribute is variable length and consists of
/// the application data.
pub struct Data;

impl<'a> Attribute<'a> for Data {
    type Error = StunError;
    type Item = &'a [u8];

    const KIND: AttrKind = AttrKind::Data;

    fn encode(value: Self::Item, bytes: &mut BytesMut, _: &'a [u8]) {
        bytes.put(value);
    }

    fn decode(bytes: &'a [u8], _: &'a [u8]) -> Result<Self::Item, Self::Error> {
        Ok(bytes)
    }
}

/// The REALM attribute may be present in requests and responses.
///
/// Presence of the REALM attribute in a request indicates that long-term
/// credentials are being used for authentication.  Presence in certain
/// error responses indicates that the server wishes the client to use a
/// long-term credential in that realm for authentication.
pub struct Realm;

impl<'a> Attribute<'a> for Realm {
    type Error = StunError;
    type Item = &'a str;

    const KIND: AttrKind = AttrKind::Realm;

    fn encode(value: Self::Item, bytes: &mut BytesMut, _: &'a [u8]) {
        bytes.put(value.as_bytes());
    }

    fn decode(bytes: &'a [u8], _: &'a [u8]) -> Result<Self::Item, Self::Error> {
        Ok(std::str::from_utf8(bytes)?)
    }
}

/// The NONCE attribute may be present in requests and responses. The
/// server hands a fresh one out with every 401 and 438; the client echoes
/// the latest value verbatim.
pub struct Nonce;

impl<'a> Attribute<'a> for Nonce {
    type Error = StunError;
    type Item = &'a str;

    const KIND: AttrKind = AttrKind::Nonce;

    fn encode(value: Self::Item, bytes: &mut BytesMut, _: &'a [u8]) {
        bytes.put(value.as_bytes());
    }

    fn decode(bytes: &'a [u8], _: &'a [u8]) -> Result<Self::Item, Self::Error> {
        Ok(std::str::from_utf8(bytes)?)
    }
}

/// The SOFTWARE attribute contains a textual description of the software
/// being used by the agent sending the message. It has no impact on the
/// operation of the protocol.
pub struct Software;

impl<'a> Attribute<'a> for Software {
    type Error = StunError;
    type Item = &'a str;

    const KIND: AttrKind = AttrKind::Software;

    fn encode(value: Self::Item, bytes: &mut BytesMut, _: &'a [u8]) {
        bytes.put(value.as_bytes());
    }

    fn decode(bytes: &'a [u8], _: &'a [u8]) -> Result<Self::Item, Self::Error> {
        Ok(std::str::from_utf8(bytes)?)
    }
}

/// The MESSAGE-INTEGRITY attribute contains an HMAC-SHA1 of the STUN
/// message, keyed with the long-term credential. Since it uses the SHA-1
/// hash, the HMAC will be 20 bytes.
///
/// The text used as input to HMAC is the STUN message, up to and
/// including the attribute preceding the MESSAGE-INTEGRITY attribute,
/// with the header length field adjusted to point past the
/// MESSAGE-INTEGRITY attribute itself.
pub struct MessageIntegrity;

impl<'a> Attribute<'a> for MessageIntegrity {
    type Error = StunError;
    type Item = &'a [u8];

    const KIND: AttrKind = AttrKind::MessageIntegrity;

    fn encode(value: Self::Item, bytes: &mut BytesMut, _: &'a [u8]) {
        bytes.put(value);
    }

    fn decode(bytes: &'a [u8], _: &'a [u8]) -> Result<Self::Item, Self::Error> {
        Ok(bytes)
    }
}

/// The XOR-PEER-ADDRESS specifies the address and port of the peer as
/// seen from the TURN server. It is encoded in the same way as
/// XOR-MAPPED-ADDRESS.
pub struct XorPeerAddress;

impl<'a> Attribute<'a> for XorPeerAddress {
    type Error = StunError;
    type Item = SocketAddr;

    const KIND: AttrKind = AttrKind::XorPeerAddress;

    fn encode(value: Self::Item, bytes: &mut BytesMut, token: &'a [u8]) {
        Addr::encode(&value, token, bytes, true)
    }

    fn decode(bytes: &'a [u8], token: &'a [u8]) -> Result<Self::Item, Self::Error> {
        Addr::decode(bytes, token, true)
    }
}

/// The XOR-RELAYED-ADDRESS is present in Allocate responses. It
/// specifies the address and port that the server allocated to the
/// client. It is encoded in the same way as XOR-MAPPED-ADDRESS.
pub struct XorRelayedAddress;

impl<'a> Attribute<'a> for XorRelayedAddress {
    type Error = StunError;
    type Item = SocketAddr;

    const KIND: AttrKind = AttrKind::XorRelayedAddress;

    fn encode(value: Self::Item, bytes: &mut BytesMut, token: &'a [u8]) {
        Addr::encode(&value, token, bytes, true)
    }

    fn decode(bytes: &'a [u8], token: &'a [u8]) -> Result<Self::Item, Self::Error> {
        Addr::decode(bytes, token, true)
    }
}

/// The XOR-MAPPED-ADDRESS attribute is identical to the MAPPED-ADDRESS
/// attribute, except that the reflexive transport address is obfuscated
/// through the XOR function, which keeps well-meaning NAT ALGs from
/// rewriting it in flight.
pub struct XorMappedAddress;

impl<'a> Attribute<'a> for XorMappedAddress {
    type Error = StunError;
    type Item = SocketAddr;

    const KIND: AttrKind = AttrKind::XorMappedAddress;

    fn encode(value: Self::Item, bytes: &mut BytesMut, token: &'a [u8]) {
        Addr::encode(&value, token, bytes, true)
    }

    fn decode(bytes: &'a [u8], token: &'a [u8]) -> Result<Self::Item, Self::Error> {
        Addr::decode(bytes, token, true)
    }
}

/// The MAPPED-ADDRESS attribute indicates a reflexive transport address
/// of the client, stored directly in binary. Only used by servers for
/// backwards compatibility with RFC3489 clients.
pub struct MappedAddress;

impl<'a> Attribute<'a> for MappedAddress {
    type Error = StunError;
    type Item = SocketAddr;

    const KIND: AttrKind = AttrKind::MappedAddress;

    fn encode(value: Self::Item, bytes: &mut BytesMut, token: &'a [u8]) {
        Addr::encode(&value, token, bytes, false)
    }

    fn decode(bytes: &'a [u8], token: &'a [u8]) -> Result<Self::Item, Self::Error> {
        Addr::decode(bytes, token, false)
    }
}

const fn errno(code: u16) -> u16 {
    ((code / 100) << 8) | (code % 100)
}

/// The following error codes, along with their recommended reason
/// phrases, are defined:
///
/// 401  Unauthenticated: The request did not contain the correct
///      credentials to proceed.  The client should retry the request
///      with proper credentials.
///
/// 438  Stale Nonce: The NONCE used by the client was no longer valid.
///      The client should retry, using the NONCE provided in the
///      response.
///
/// 446  Connection Already Exists, 447 Connection Timeout or Failure:
///      Connect processing results for TCP allocations.
#[repr(u16)]
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash, TryFromPrimitive)]
pub enum ErrorKind {
    TryAlternate = 300,
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    UnknownAttribute = 420,
    AllocationMismatch = 437,
    StaleNonce = 438,
    AddressFamilyNotSupported = 440,
    WrongCredentials = 441,
    UnsupportedTransportAddress = 442,
    PeerAddressFamilyMismatch = 443,
    ConnectionAlreadyExists = 446,
    ConnectionTimeoutOrFailure = 447,
    AllocationQuotaReached = 486,
    ServerError = 500,
    InsufficientCapacity = 508,
}

/// The ERROR-CODE attribute is used in error response messages. It
/// contains a numeric error code value in the range of 300 to 699 plus a
/// textual reason phrase encoded in UTF-8.
///
/// ```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |           Reserved, should be 0         |Class|     Number    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |      Reason Phrase (variable)                                ..
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// The class is the hundreds digit of the error code, encoded separately
/// from the number (the code modulo 100); `code` here carries the decimal
/// code the way callers think about it.
#[derive(Clone, Debug)]
pub struct Error<'a> {
    pub code: u16,
    pub message: &'a str,
}

impl From<ErrorKind> for Error<'_> {
    fn from(value: ErrorKind) -> Self {
        Self {
            code: value as u16,
            message: value.into(),
        }
    }
}

impl Error<'_> {
    /// encode the error type as bytes.
    ///
    /// # Test
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use stun::attribute::*;
    ///
    /// let buffer = [
    ///     0x00u8, 0x00, 0x04, 0x01, 0x55, 0x6e, 0x61, 0x75, 0x74, 0x68, 0x6f,
    ///     0x72, 0x69, 0x7a, 0x65, 0x64,
    /// ];
    ///
    /// let mut buf = BytesMut::with_capacity(1280);
    /// let error = Error::from(ErrorKind::Unauthorized);
    /// error.encode(&mut buf);
    /// assert_eq!(&buf[..], &buffer);
    /// ```
    pub fn encode(self, bytes: &mut BytesMut) {
        bytes.put_u16(0x0000);
        bytes.put_u16(errno(self.code));
        bytes.put(self.message.as_bytes());
    }
}

impl<'a> TryFrom<&'a [u8]> for Error<'a> {
    type Error = StunError;

    fn try_from(packet: &'a [u8]) -> Result<Self, StunError> {
        if packet.len() < 4 {
            return Err(StunError::InvalidInput);
        }

        if u16::from_be_bytes(packet[..2].try_into()?) != 0x0000 {
            return Err(StunError::InvalidInput);
        }

        let packed = u16::from_be_bytes(packet[2..4].try_into()?);
        Ok(Self {
            code: (packed >> 8) * 100 + (packed & 0xFF),
            message: std::str::from_utf8(&packet[4..])?,
        })
    }
}

impl From<ErrorKind> for &'static str {
    #[rustfmt::skip]
    fn from(val: ErrorKind) -> Self {
        match val {
            ErrorKind::TryAlternate => "Try Alternate",
            ErrorKind::BadRequest => "Bad Request",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::UnknownAttribute => "Unknown Attribute",
            ErrorKind::AllocationMismatch => "Allocation Mismatch",
            ErrorKind::StaleNonce => "Stale Nonce",
            ErrorKind::AddressFamilyNotSupported => "Address Family not Supported",
            ErrorKind::WrongCredentials => "Wrong Credentials",
            ErrorKind::UnsupportedTransportAddress => "Unsupported Transport Address",
            ErrorKind::PeerAddressFamilyMismatch => "Peer Address Family Mismatch",
            ErrorKind::ConnectionAlreadyExists => "Connection Already Exists",
            ErrorKind::ConnectionTimeoutOrFailure => "Connection Timeout or Failure",
            ErrorKind::AllocationQuotaReached => "Allocation Quota Reached",
            ErrorKind::ServerError => "Server Error",
            ErrorKind::InsufficientCapacity => "Insufficient Capacity",
        }
    }
}

impl Eq for Error<'_> {}
impl PartialEq for Error<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

pub struct ErrorCode;

impl<'a> Attribute<'a> for ErrorCode {
    type Error = StunError;
    type Item = Error<'a>;

    const KIND: AttrKind = AttrKind::ErrorCode;

    fn encode(value: Self::Item, bytes: &mut BytesMut, _: &'a [u8]) {
        value.encode(bytes)
    }

    fn decode(bytes: &'a [u8], _: &'a [u8]) -> Result<Self::Item, Self::Error> {
        Error::try_from(bytes)
    }
}

/// The UNKNOWN-ATTRIBUTES attribute is present only in an error response
/// with error code 420. It contains the 16-bit types of the
/// comprehension-required attributes the server did not understand.
pub struct UnknownAttributes;

impl<'a> Attribute<'a> for UnknownAttributes {
    type Error = StunError;
    type Item = Vec<u16>;

    const KIND: AttrKind = AttrKind::UnknownAttributes;

    fn encode(value: Self::Item, bytes: &mut BytesMut, _: &'a [u8]) {
        for kind in value {
            bytes.put_u16(kind);
        }
    }

    fn decode(bytes: &'a [u8], _: &'a [u8]) -> Result<Self::Item, Self::Error> {
        if bytes.len() % 2 != 0 {
            return Err(StunError::InvalidInput);
        }

        Ok(bytes
            .chunks_exact(2)
            .map(|it| u16::from_be_bytes([it[0], it[1]]))
            .collect())
    }
}

/// The LIFETIME attribute represents the duration for which the server
/// will maintain an allocation in the absence of a refresh.  The value
/// portion of this attribute is 4-bytes long and consists of a 32-bit
/// unsigned integral value representing the number of seconds remaining
/// until expiration.
pub struct Lifetime;

impl<'a> Attribute<'a> for Lifetime {
    type Error = StunError;
    type Item = u32;

    const KIND: AttrKind = AttrKind::Lifetime;

    fn encode(value: Self::Item, bytes: &mut BytesMut, _: &'a [u8]) {
        bytes.put_u32(value)
    }

    fn decode(bytes: &'a [u8], _: &'a [u8]) -> Result<Self::Item, Self::Error> {
        Ok(u32::from_be_bytes(bytes.try_into()?))
    }
}

/// This attribute is used by the client to request a specific transport
/// protocol for the allocated transport address. RFC5766 only allows
/// codepoint 17 (UDP); RFC6062 adds 6 (TCP).
pub struct RequestedTransport;

impl<'a> Attribute<'a> for RequestedTransport {
    type Error = StunError;
    type Item = Transport;

    const KIND: AttrKind = AttrKind::RequestedTransport;

    fn encode(value: Self::Item, bytes: &mut BytesMut, _: &'a [u8]) {
        bytes.put_u32(value as u32)
    }

    fn decode(bytes: &'a [u8], _: &'a [u8]) -> Result<Self::Item, Self::Error> {
        let value = u32::from_be_bytes(bytes.try_into()?);
        Transport::try_from(value).map_err(|_| StunError::InvalidInput)
    }
}

/// The FINGERPRINT attribute MAY be present in all STUN messages.
///
/// The value of the attribute is computed as the CRC-32 of the STUN
/// message up to (but excluding) the FINGERPRINT attribute itself,
/// XOR'ed with the 32-bit value 0x5354554e. When present it MUST be the
/// last attribute in the message.
pub struct Fingerprint;

impl<'a> Attribute<'a> for Fingerprint {
    type Error = StunError;
    type Item = u32;

    const KIND: AttrKind = AttrKind::Fingerprint;

    fn encode(value: Self::Item, bytes: &mut BytesMut, _: &'a [u8]) {
        bytes.put_u32(value)
    }

    fn decode(bytes: &'a [u8], _: &'a [u8]) -> Result<Self::Item, Self::Error> {
        Ok(u32::from_be_bytes(bytes.try_into()?))
    }
}

/// The CHANNEL-NUMBER attribute contains the number of the channel.  The
/// value portion of this attribute is 4 bytes long and consists of a
/// 16-bit unsigned integer followed by a two-octet RFFU (Reserved For
/// Future Use) field, which MUST be set to 0 on transmission and MUST be
/// ignored on reception.
pub struct ChannelNumber;

impl<'a> Attribute<'a> for ChannelNumber {
    type Error = StunError;
    type Item = u16;

    const KIND: AttrKind = AttrKind::ChannelNumber;

    fn encode(value: Self::Item, bytes: &mut BytesMut, _: &'a [u8]) {
        bytes.put_u16(value);
        bytes.put_u16(0);
    }

    fn decode(bytes: &'a [u8], _: &'a [u8]) -> Result<Self::Item, Self::Error> {
        if bytes.len() < 2 {
            return Err(StunError::InvalidInput);
        }

        Ok(u16::from_be_bytes(bytes[..2].try_into()?))
    }
}

/// The CONNECTION-ID attribute uniquely identifies a peer data
/// connection on a TCP allocation. The server hands it out in a Connect
/// success response or a ConnectionAttempt indication; the client echoes
/// it in the ConnectionBind request on the data connection.
pub struct ConnectionId;

impl<'a> Attribute<'a> for ConnectionId {
    type Error = StunError;
    type Item = u32;

    const KIND: AttrKind = AttrKind::ConnectionId;

    fn encode(value: Self::Item, bytes: &mut BytesMut, _: &'a [u8]) {
        bytes.put_u32(value)
    }

    fn decode(bytes: &'a [u8], _: &'a [u8]) -> Result<Self::Item, Self::Error> {
        Ok(u32::from_be_bytes(bytes.try_into()?))
    }
}

/// The RESERVATION-TOKEN attribute contains a token that uniquely
/// identifies a relayed transport address being held in reserve by the
/// server. The attribute value is 8 bytes.
pub struct ReservationToken;

impl<'a> Attribute<'a> for ReservationToken {
    type Error = StunError;
    type Item = u64;

    const KIND: AttrKind = AttrKind::ReservationToken;

    fn encode(value: Self::Item, bytes: &mut BytesMut, _: &'a [u8]) {
        bytes.put_u64(value)
    }

    fn decode(bytes: &'a [u8], _: &'a [u8]) -> Result<Self::Item, Self::Error> {
        Ok(u64::from_be_bytes(bytes.try_into()?))
    }
}

/// This attribute allows the client to request that the port in the
/// relayed transport address be even, and (optionally) that the server
/// reserve the next-higher port number. The value portion of this
/// attribute is 1 byte long.
pub struct EvenPort;

impl<'a> Attribute<'a> for EvenPort {
    type Error = StunError;
    type Item = bool;

    const KIND: AttrKind = AttrKind::EvenPort;

    fn encode(value: Self::Item, bytes: &mut BytesMut, _: &'a [u8]) {
        bytes.put_u8(if value { 0b10000000 } else { 0b00000000 })
    }

    fn decode(bytes: &'a [u8], _: &'a [u8]) -> Result<Self::Item, Self::Error> {
        if bytes.is_empty() {
            return Err(StunError::InvalidInput);
        }

        Ok(bytes[0] == 0b10000000)
    }
}

/// The REQUESTED-ADDRESS-FAMILY attribute is used by clients to request
/// the allocation of a specific address type from a server.
pub struct RequestedAddressFamily;

impl<'a> Attribute<'a> for RequestedAddressFamily {
    type Error = StunError;
    type Item = IpFamily;

    const KIND: AttrKind = AttrKind::RequestedAddressFamily;

    fn encode(value: Self::Item, bytes: &mut BytesMut, _: &'a [u8]) {
        bytes.put_u8(value as u8);
        bytes.put(&[0u8; 3][..]);
    }

    fn decode(bytes: &'a [u8], _: &'a [u8]) -> Result<Self::Item, Self::Error> {
        if bytes.is_empty() {
            return Err(StunError::InvalidInput);
        }

        IpFamily::try_from(bytes[0])
    }
}

/// This attribute is used by the client to request that the server set
/// the DF (Don't Fragment) bit in the IP header when relaying the
/// application data onward to the peer. This attribute has no value
/// part, and thus, the attribute length field is 0.
pub struct DontFragment;

impl<'a> Attribute<'a> for DontFragment {
    type Error = StunError;
    type Item = ();

    const KIND: AttrKind = AttrKind::DontFragment;

    fn decode(_: &'a [u8], _: &'a [u8]) -> Result<Self::Item, Self::Error> {
        Ok(())
    }
}
