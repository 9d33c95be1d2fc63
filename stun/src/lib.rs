//! ## Session Traversal Utilities for NAT (STUN)
//!
//! Client-side codec for the STUN framing shared by TURN ([RFC5766],
//! [RFC8656]) and its TCP allocation extension ([RFC6062]).
//!
//! [RFC5766]: https://datatracker.ietf.org/doc/html/rfc5766
//! [RFC8656]: https://datatracker.ietf.org/doc/html/rfc8656
//! [RFC6062]: https://datatracker.ietf.org/doc/html/rfc6062
//!
//! ### STUN Message Structure
//!
//! ```text
//! 0                   1                   2                   3
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |0 0|     STUN Message Type     |         Message Length        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Magic Cookie                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                               |
//! |                     Transaction ID (96 bits)                  |
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! ### STUN Attributes
//!
//! ```text
//! 0                   1                   2                   3
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Type                  |            Length             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Value (variable)                ....
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

pub mod attribute;
pub mod channel;
pub mod message;
pub mod util;

pub use self::{
    attribute::{AttrKind, Transport},
    channel::ChannelData,
    message::{MessageReader, MessageWriter},
    method::{Kind, Method},
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StunError {
    #[error("InvalidInput")]
    InvalidInput,
    #[error("InvalidCookie")]
    InvalidCookie,
    #[error("TruncatedAttribute")]
    TruncatedAttribute,
    #[error("UnknownAddressFamily")]
    UnknownAddressFamily,
    #[error("BadChannelPrefix")]
    BadChannelPrefix,
    #[error("UnknownMethod")]
    UnknownMethod,
    #[error("SummaryFailed")]
    SummaryFailed,
    #[error("NotFoundIntegrity")]
    NotFoundIntegrity,
    #[error("IntegrityFailed")]
    IntegrityFailed,
    #[error("Utf8Error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),
    #[error("TryFromSliceError: {0}")]
    TryFromSliceError(#[from] std::array::TryFromSliceError),
}

pub mod method {
    use super::StunError;

    pub const BINDING_REQUEST: Method = Method::Binding(Kind::Request);
    pub const BINDING_RESPONSE: Method = Method::Binding(Kind::Response);
    pub const BINDING_ERROR: Method = Method::Binding(Kind::Error);
    pub const ALLOCATE_REQUEST: Method = Method::Allocate(Kind::Request);
    pub const ALLOCATE_RESPONSE: Method = Method::Allocate(Kind::Response);
    pub const ALLOCATE_ERROR: Method = Method::Allocate(Kind::Error);
    pub const REFRESH_REQUEST: Method = Method::Refresh(Kind::Request);
    pub const REFRESH_RESPONSE: Method = Method::Refresh(Kind::Response);
    pub const REFRESH_ERROR: Method = Method::Refresh(Kind::Error);
    pub const CREATE_PERMISSION_REQUEST: Method = Method::CreatePermission(Kind::Request);
    pub const CREATE_PERMISSION_RESPONSE: Method = Method::CreatePermission(Kind::Response);
    pub const CREATE_PERMISSION_ERROR: Method = Method::CreatePermission(Kind::Error);
    pub const CHANNEL_BIND_REQUEST: Method = Method::ChannelBind(Kind::Request);
    pub const CHANNEL_BIND_RESPONSE: Method = Method::ChannelBind(Kind::Response);
    pub const CHANNEL_BIND_ERROR: Method = Method::ChannelBind(Kind::Error);
    pub const CONNECT_REQUEST: Method = Method::Connect(Kind::Request);
    pub const CONNECT_RESPONSE: Method = Method::Connect(Kind::Response);
    pub const CONNECT_ERROR: Method = Method::Connect(Kind::Error);
    pub const CONNECTION_BIND_REQUEST: Method = Method::ConnectionBind(Kind::Request);
    pub const CONNECTION_BIND_RESPONSE: Method = Method::ConnectionBind(Kind::Response);
    pub const CONNECTION_BIND_ERROR: Method = Method::ConnectionBind(Kind::Error);
    pub const CONNECTION_ATTEMPT: Method = Method::ConnectionAttempt;
    pub const SEND_INDICATION: Method = Method::SendIndication;
    pub const DATA_INDICATION: Method = Method::DataIndication;

    /// message class.
    ///
    /// Indications are modelled as standalone methods because neither side
    /// ever answers them, so they carry no class.
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
    pub enum Kind {
        Request,
        Response,
        Error,
    }

    /// STUN Methods Registry
    ///
    /// [RFC5766]: https://datatracker.ietf.org/doc/html/rfc5766
    /// [RFC6062]: https://datatracker.ietf.org/doc/html/rfc6062
    ///
    /// 0x001: Binding
    /// 0x003: Allocate
    /// 0x004: Refresh
    /// 0x006: Send
    /// 0x007: Data
    /// 0x008: CreatePermission
    /// 0x009: ChannelBind
    /// 0x00A: Connect           [RFC6062]
    /// 0x00B: ConnectionBind    [RFC6062]
    /// 0x00C: ConnectionAttempt [RFC6062]
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
    pub enum Method {
        Binding(Kind),
        Allocate(Kind),
        Refresh(Kind),
        CreatePermission(Kind),
        ChannelBind(Kind),
        Connect(Kind),
        ConnectionBind(Kind),
        ConnectionAttempt,
        SendIndication,
        DataIndication,
    }

    impl Method {
        pub fn kind(&self) -> Option<Kind> {
            match self {
                Self::Binding(kind)
                | Self::Allocate(kind)
                | Self::Refresh(kind)
                | Self::CreatePermission(kind)
                | Self::ChannelBind(kind)
                | Self::Connect(kind)
                | Self::ConnectionBind(kind) => Some(*kind),
                _ => None,
            }
        }

        pub fn is_error(&self) -> bool {
            self.kind() == Some(Kind::Error)
        }
    }

    impl TryFrom<u16> for Method {
        type Error = StunError;

        /// # Test
        ///
        /// ```
        /// use stun::method::*;
        ///
        /// assert_eq!(Method::try_from(0x0003).unwrap(), ALLOCATE_REQUEST);
        /// assert_eq!(Method::try_from(0x0103).unwrap(), ALLOCATE_RESPONSE);
        /// assert_eq!(Method::try_from(0x0113).unwrap(), ALLOCATE_ERROR);
        /// assert_eq!(Method::try_from(0x000A).unwrap(), CONNECT_REQUEST);
        /// assert_eq!(Method::try_from(0x010B).unwrap(), CONNECTION_BIND_RESPONSE);
        /// assert_eq!(Method::try_from(0x001C).unwrap(), CONNECTION_ATTEMPT);
        /// assert!(Method::try_from(0x0002).is_err());
        /// ```
        fn try_from(value: u16) -> Result<Self, StunError> {
            Ok(match value {
                0x0001 => Self::Binding(Kind::Request),
                0x0101 => Self::Binding(Kind::Response),
                0x0111 => Self::Binding(Kind::Error),
                0x0003 => Self::Allocate(Kind::Request),
                0x0103 => Self::Allocate(Kind::Response),
                0x0113 => Self::Allocate(Kind::Error),
                0x0004 => Self::Refresh(Kind::Request),
                0x0104 => Self::Refresh(Kind::Response),
                0x0114 => Self::Refresh(Kind::Error),
                0x0008 => Self::CreatePermission(Kind::Request),
                0x0108 => Self::CreatePermission(Kind::Response),
                0x0118 => Self::CreatePermission(Kind::Error),
                0x0009 => Self::ChannelBind(Kind::Request),
                0x0109 => Self::ChannelBind(Kind::Response),
                0x0119 => Self::ChannelBind(Kind::Error),
                0x000A => Self::Connect(Kind::Request),
                0x010A => Self::Connect(Kind::Response),
                0x011A => Self::Connect(Kind::Error),
                0x000B => Self::ConnectionBind(Kind::Request),
                0x010B => Self::ConnectionBind(Kind::Response),
                0x011B => Self::ConnectionBind(Kind::Error),
                0x001C => Self::ConnectionAttempt,
                0x0016 => Self::SendIndication,
                0x0017 => Self::DataIndication,
                _ => return Err(StunError::UnknownMethod),
            })
        }
    }

    impl From<Method> for u16 {
        fn from(value: Method) -> Self {
            match value {
                Method::Binding(Kind::Request) => 0x0001,
                Method::Binding(Kind::Response) => 0x0101,
                Method::Binding(Kind::Error) => 0x0111,
                Method::Allocate(Kind::Request) => 0x0003,
                Method::Allocate(Kind::Response) => 0x0103,
                Method::Allocate(Kind::Error) => 0x0113,
                Method::Refresh(Kind::Request) => 0x0004,
                Method::Refresh(Kind::Response) => 0x0104,
                Method::Refresh(Kind::Error) => 0x0114,
                Method::CreatePermission(Kind::Request) => 0x0008,
                Method::CreatePermission(Kind::Response) => 0x0108,
                Method::CreatePermission(Kind::Error) => 0x0118,
                Method::ChannelBind(Kind::Request) => 0x0009,
                Method::ChannelBind(Kind::Response) => 0x0109,
                Method::ChannelBind(Kind::Error) => 0x0119,
                Method::Connect(Kind::Request) => 0x000A,
                Method::Connect(Kind::Response) => 0x010A,
                Method::Connect(Kind::Error) => 0x011A,
                Method::ConnectionBind(Kind::Request) => 0x000B,
                Method::ConnectionBind(Kind::Response) => 0x010B,
                Method::ConnectionBind(Kind::Error) => 0x011B,
                Method::ConnectionAttempt => 0x001C,
                Method::SendIndication => 0x0016,
                Method::DataIndication => 0x0017,
            }
        }
    }
}

/// payload split out of a byte stream.
///
/// Once an allocation has bound channels, STUN messages and ChannelData
/// frames interleave on the same connection; the top two bits of the first
/// byte tell them apart.
#[derive(Debug)]
pub enum Payload<'a, 'b> {
    Message(MessageReader<'a, 'b>),
    ChannelData(ChannelData<'a>),
}

/// stun decoder.
///
/// Owns the scratch attribute list so that decoding a steady stream of
/// messages does not allocate per message.
pub struct Decoder<'a> {
    attrs: Vec<(AttrKind, &'a [u8])>,
}

impl Default for Decoder<'_> {
    fn default() -> Self {
        Self {
            attrs: Vec::with_capacity(10),
        }
    }
}

impl<'a> Decoder<'a> {
    /// # Test
    ///
    /// ```
    /// use stun::*;
    /// use stun::attribute::*;
    ///
    /// let buffer = [
    ///     0x00u8, 0x01, 0x00, 0x00, 0x21, 0x12, 0xa4, 0x42, 0x72, 0x6d, 0x49,
    ///     0x42, 0x72, 0x52, 0x64, 0x48, 0x57, 0x62, 0x4b, 0x2b,
    /// ];
    ///
    /// let mut decoder = Decoder::default();
    /// let payload = decoder.decode(&buffer).unwrap();
    /// if let Payload::Message(reader) = payload {
    ///     assert_eq!(reader.method, method::BINDING_REQUEST);
    ///     assert!(reader.get::<UserName>().is_none());
    /// }
    /// ```
    pub fn decode(&mut self, buf: &'a [u8]) -> Result<Payload<'a, '_>, StunError> {
        if buf.len() < 4 {
            return Err(StunError::InvalidInput);
        }

        self.attrs.clear();
        Ok(match buf[0] >> 6 {
            0 => Payload::Message(MessageReader::decode(buf, &mut self.attrs)?),
            1 => Payload::ChannelData(ChannelData::try_from(buf)?),
            _ => return Err(StunError::BadChannelPrefix),
        })
    }

    /// the full on-the-wire size of the frame starting at `buf`.
    ///
    /// Works for both STUN messages and ChannelData, so a stream reader can
    /// carve frames off a TCP byte stream without decoding them.
    pub fn message_size(buf: &[u8], is_tcp: bool) -> Result<usize, StunError> {
        if buf.len() < 4 {
            return Err(StunError::InvalidInput);
        }

        match buf[0] >> 6 {
            0 => MessageReader::message_size(buf),
            1 => ChannelData::message_size(buf, is_tcp),
            _ => Err(StunError::BadChannelPrefix),
        }
    }
}
