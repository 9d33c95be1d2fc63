use stun::StunError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between the operator and the relay.
///
/// The nested variants keep the failing TURN operation visible while
/// preserving the underlying cause, so the drivers can decide between
/// "host is silent" and "stop scanning".
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("codec error: {0}")]
    Codec(#[from] StunError),
    #[error("server rejected the credentials")]
    AuthRequired,
    #[error("stale nonce")]
    StaleNonce,
    #[error("server error {code}: {reason}")]
    Server { code: u16, reason: String },
    #[error("operation timed out")]
    Timeout,
    #[error("connection closed by peer")]
    Closed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol violation: {0}")]
    Protocol(&'static str),
    #[error("allocation failed: {0}")]
    AllocationFailed(Box<Error>),
    #[error("channel bind failed: {0}")]
    ChannelBindFailed(Box<Error>),
    #[error("connect failed: {0}")]
    ConnectFailed(Box<Error>),
    #[error("connection bind failed: {0}")]
    ConnectionBindFailed(Box<Error>),
}

impl Error {
    /// whether the root cause is a deadline that passed.
    ///
    /// The scanner treats these as "no host answered" and keeps sweeping.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::AllocationFailed(inner)
            | Self::ChannelBindFailed(inner)
            | Self::ConnectFailed(inner)
            | Self::ConnectionBindFailed(inner) => inner.is_timeout(),
            _ => false,
        }
    }
}
