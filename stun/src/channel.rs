use bytes::{BufMut, BytesMut};

use crate::{util, StunError};

const ZERO_BUF: [u8; 4] = [0u8; 4];

/// The ChannelData Message
///
/// The ChannelData message is used to carry application data between the
/// client and the server.
/// It has the following format:
///
/// ```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |         Channel Number        |            Length             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// /                       Application Data                        /
/// /                                                               /
/// |                                                               |
/// |                               +-------------------------------+
/// |                               |
/// +-------------------------------+
/// ```
///
/// The Length field specifies the length in bytes of the application
/// data field, not including the 4-byte header. 0 is a valid length.
///
/// Over TCP the frame is padded to a multiple of 4; the pad bytes are not
/// counted by the Length field.
#[derive(Debug, PartialEq, Eq)]
pub struct ChannelData<'a> {
    /// channel number.
    pub number: u16,
    /// application data.
    pub payload: &'a [u8],
}

impl ChannelData<'_> {
    /// encode a frame into the buffer.
    ///
    /// The emitted frame is always padded to a 4-byte boundary so it can go
    /// straight onto a TCP connection; the length field still counts the
    /// payload only.
    ///
    /// # Test
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use stun::ChannelData;
    ///
    /// let mut buf = BytesMut::new();
    /// ChannelData::encode(0x4000, &[0x01, 0x02, 0x03], &mut buf);
    /// assert_eq!(&buf[..], &[0x40, 0x00, 0x00, 0x03, 0x01, 0x02, 0x03, 0x00]);
    /// ```
    pub fn encode(number: u16, payload: &[u8], buf: &mut BytesMut) {
        buf.put_u16(number);
        buf.put_u16(payload.len() as u16);
        buf.put(payload);

        let pad = util::pad_size(payload.len());
        if pad > 0 {
            buf.put(&ZERO_BUF[..pad]);
        }
    }

    /// the full frame size starting at `bytes`, header included.
    ///
    /// # Test
    ///
    /// ```
    /// use stun::ChannelData;
    ///
    /// let buffer: [u8; 4] = [0x40, 0x00, 0x00, 0x3d];
    ///
    /// assert_eq!(ChannelData::message_size(&buffer, false).unwrap(), 65);
    /// assert_eq!(ChannelData::message_size(&buffer, true).unwrap(), 68);
    /// ```
    pub fn message_size(bytes: &[u8], is_tcp: bool) -> Result<usize, StunError> {
        if bytes.len() < 4 {
            return Err(StunError::InvalidInput);
        }

        if bytes[0] >> 6 != 1 {
            return Err(StunError::BadChannelPrefix);
        }

        let mut size = u16::from_be_bytes(bytes[2..4].try_into()?) as usize + 4;
        if is_tcp {
            size += util::pad_size(size);
        }

        Ok(size)
    }
}

impl<'a> TryFrom<&'a [u8]> for ChannelData<'a> {
    type Error = StunError;

    /// # Test
    ///
    /// ```
    /// use stun::ChannelData;
    ///
    /// let buffer = [0x40u8, 0x00, 0x00, 0x02, 0xaa, 0xbb, 0x00, 0x00];
    ///
    /// let data = ChannelData::try_from(&buffer[..]).unwrap();
    /// assert_eq!(data.number, 0x4000);
    /// assert_eq!(data.payload, &[0xaa, 0xbb]);
    /// ```
    fn try_from(bytes: &'a [u8]) -> Result<Self, Self::Error> {
        if bytes.len() < 4 {
            return Err(StunError::InvalidInput);
        }

        if bytes[0] >> 6 != 1 {
            return Err(StunError::BadChannelPrefix);
        }

        let number = u16::from_be_bytes(bytes[..2].try_into()?);
        if !(0x4000..=0x7FFF).contains(&number) {
            return Err(StunError::InvalidInput);
        }

        let size = u16::from_be_bytes(bytes[2..4].try_into()?) as usize;
        if size > bytes.len() - 4 {
            return Err(StunError::TruncatedAttribute);
        }

        Ok(Self {
            number,
            payload: &bytes[4..4 + size],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_aligned() {
        for len in 0..9usize {
            let payload = vec![0xffu8; len];
            let mut buf = BytesMut::new();
            ChannelData::encode(0x7fff, &payload, &mut buf);
            assert_eq!(buf.len() % 4, 0);
            assert_eq!(&buf[2..4], (len as u16).to_be_bytes());
        }
    }

    #[test]
    fn decode_rejects_overflow() {
        // declared length runs past the end of the buffer.
        let buffer = [0x40u8, 0x00, 0x00, 0x05, 0x01, 0x02];
        assert!(ChannelData::try_from(&buffer[..]).is_err());
    }

    #[test]
    fn decode_rejects_stun_prefix() {
        let buffer = [0x00u8, 0x01, 0x00, 0x00];
        assert!(matches!(
            ChannelData::try_from(&buffer[..]),
            Err(StunError::BadChannelPrefix)
        ));
    }
}
