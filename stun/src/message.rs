use bytes::{BufMut, BytesMut};

use crate::{
    attribute::{AttrKind, Attribute, MessageIntegrity},
    util, Method, StunError,
};

const ZERO_BUF: [u8; 4] = [0u8; 4];
const COOKIE: [u8; 4] = 0x2112A442u32.to_be_bytes();

/// long term credential key, MD5(username ":" realm ":" password).
pub type Auth = [u8; 16];

/// stun message writer.
///
/// Borrows the caller's buffer so request encoding in a steady state does
/// not allocate.
pub struct MessageWriter<'a> {
    token: &'a [u8],
    raw: &'a mut BytesMut,
}

impl<'a> MessageWriter<'a> {
    /// create a new message with the given transaction id.
    ///
    /// # Test
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use stun::*;
    ///
    /// let token = [
    ///     0x72u8, 0x6d, 0x49, 0x42, 0x72, 0x52, 0x64, 0x48, 0x57, 0x62, 0x4b,
    ///     0x2b,
    /// ];
    ///
    /// let buffer = [
    ///     0x00u8, 0x01, 0x00, 0x00, 0x21, 0x12, 0xa4, 0x42, 0x72, 0x6d, 0x49,
    ///     0x42, 0x72, 0x52, 0x64, 0x48, 0x57, 0x62, 0x4b, 0x2b,
    /// ];
    ///
    /// let mut buf = BytesMut::new();
    /// let mut message = MessageWriter::new(method::BINDING_REQUEST, &token, &mut buf);
    /// message.flush(None).unwrap();
    /// assert_eq!(&buf[..], &buffer);
    /// ```
    pub fn new(method: Method, token: &'a [u8; 12], buf: &'a mut BytesMut) -> Self {
        buf.clear();
        buf.put_u16(method.into());
        buf.put_u16(0);
        buf.put(&COOKIE[..]);
        buf.put(token.as_slice());
        Self { raw: buf, token }
    }

    /// append attribute.
    ///
    /// The attribute value is padded to a 4-byte boundary with zero bytes;
    /// the pad is not counted by the attribute length field.
    pub fn append<T: Attribute<'a>>(&mut self, value: T::Item) {
        self.raw.put_u16(T::KIND as u16);

        // reserve the length field, write the value, then patch the
        // length in.
        let os = self.raw.len();
        self.raw.put_u16(0);
        T::encode(value, self.raw, self.token);

        let size = self.raw.len() - os - 2;
        let size_buf = (size as u16).to_be_bytes();
        self.raw[os] = size_buf[0];
        self.raw[os + 1] = size_buf[1];

        let pad = util::pad_size(size);
        if pad > 0 {
            self.raw.put(&ZERO_BUF[..pad]);
        }
    }

    /// finish the message.
    ///
    /// Writes the header length field; with `auth` given, additionally
    /// appends MESSAGE-INTEGRITY and FINGERPRINT, in that order, as the
    /// final attributes.
    pub fn flush(&mut self, auth: Option<&Auth>) -> Result<(), StunError> {
        let size = (self.raw.len() - 20) as u16;
        let size_buf = size.to_be_bytes();
        self.raw[2] = size_buf[0];
        self.raw[3] = size_buf[1];

        if let Some(auth) = auth {
            self.integrity(auth)?;
        }

        Ok(())
    }

    /// append MESSAGE-INTEGRITY and FINGERPRINT.
    ///
    /// The HMAC covers the message with the header length pre-adjusted as
    /// if the integrity attribute were already present; the CRC covers the
    /// message including the integrity attribute with the length adjusted
    /// once more for the fingerprint attribute.
    fn integrity(&mut self, auth: &Auth) -> Result<(), StunError> {
        // length field as if MESSAGE-INTEGRITY (4 + 20 bytes) were
        // already appended.
        let mut size = (self.raw.len() + 4) as u16;
        let size_buf = size.to_be_bytes();
        self.raw[2] = size_buf[0];
        self.raw[3] = size_buf[1];

        let hmac_output = util::hmac_sha1(auth, &[self.raw])?.into_bytes();
        self.raw.put_u16(AttrKind::MessageIntegrity as u16);
        self.raw.put_u16(20);
        self.raw.put(hmac_output.as_slice());

        // length field adjusted again for FINGERPRINT (4 + 4 bytes).
        size += 8;
        let size_buf = size.to_be_bytes();
        self.raw[2] = size_buf[0];
        self.raw[3] = size_buf[1];

        let crc = util::fingerprint(self.raw);
        self.raw.put_u16(AttrKind::Fingerprint as u16);
        self.raw.put_u16(4);
        self.raw.put_u32(crc);

        Ok(())
    }
}

/// stun message reader.
#[derive(Debug)]
pub struct MessageReader<'a, 'b> {
    /// message method and class.
    pub method: Method,
    /// message transaction id.
    pub token: &'a [u8],
    /// message source bytes.
    buf: &'a [u8],
    /// offset of the MESSAGE-INTEGRITY attribute, if any.
    integrity_offset: usize,
    /// message attribute list.
    attributes: &'b [(AttrKind, &'a [u8])],
}

impl<'a, 'b> MessageReader<'a, 'b> {
    /// get attribute.
    ///
    /// Returns the first attribute of the requested kind that decodes.
    pub fn get<T: Attribute<'a>>(&self) -> Option<T::Item> {
        self.attributes
            .iter()
            .find(|(kind, _)| kind == &T::KIND)
            .and_then(|(_, value)| T::decode(value, self.token).ok())
    }

    /// the decoded attribute list, in wire order.
    pub fn attributes(&self) -> &'b [(AttrKind, &'a [u8])] {
        self.attributes
    }

    /// check the MESSAGE-INTEGRITY attribute.
    ///
    /// The HMAC input is the message up to the integrity attribute with
    /// the header length adjusted to point past it, so a trailing
    /// FINGERPRINT does not disturb the check.
    pub fn integrity(&self, auth: &Auth) -> Result<(), StunError> {
        if self.integrity_offset == 0 {
            return Err(StunError::NotFoundIntegrity);
        }

        let integrity = self
            .get::<MessageIntegrity>()
            .ok_or(StunError::NotFoundIntegrity)?;

        let size_buf = ((self.integrity_offset + 4) as u16).to_be_bytes();
        let body = [
            &self.buf[0..2],
            &size_buf[..],
            &self.buf[4..self.integrity_offset],
        ];

        let hmac_output = util::hmac_sha1(auth, &body)?.into_bytes();
        if integrity != hmac_output.as_slice() {
            return Err(StunError::IntegrityFailed);
        }

        Ok(())
    }

    /// decode a single message.
    ///
    /// `attributes` is the caller's scratch list; it is filled with the
    /// recognised attributes in wire order. Unknown attribute codes are
    /// skipped.
    pub fn decode(
        buf: &'a [u8],
        attributes: &'b mut Vec<(AttrKind, &'a [u8])>,
    ) -> Result<MessageReader<'a, 'b>, StunError> {
        if buf.len() < 20 {
            return Err(StunError::InvalidInput);
        }

        if buf[4..8] != COOKIE[..] {
            return Err(StunError::InvalidCookie);
        }

        let method = Method::try_from(u16::from_be_bytes([buf[0], buf[1]]))?;
        let size = u16::from_be_bytes([buf[2], buf[3]]) as usize + 20;
        if size % 4 != 0 || buf.len() < size {
            return Err(StunError::InvalidInput);
        }

        let token = &buf[8..20];
        let mut integrity_offset = 0;
        let mut offset = 20;

        while offset + 4 <= size {
            let key = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
            let len = u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]) as usize;

            if key == AttrKind::MessageIntegrity as u16 && integrity_offset == 0 {
                integrity_offset = offset;
            }

            offset += 4;
            if offset + len > size {
                return Err(StunError::TruncatedAttribute);
            }

            let range = offset..(offset + len);
            offset += len + util::pad_size(len);

            // unknown attributes are skipped, not refused: the client only
            // ever decodes responses to its own requests.
            if let Ok(kind) = AttrKind::try_from(key) {
                attributes.push((kind, &buf[range]));
            }
        }

        Ok(Self {
            buf,
            token,
            method,
            attributes,
            integrity_offset,
        })
    }

    /// the full on-the-wire message size, header included.
    ///
    /// # Test
    ///
    /// ```
    /// use stun::MessageReader;
    ///
    /// let buffer: [u8; 20] = [
    ///     0x00, 0x01, 0x00, 0x00, 0x21, 0x12, 0xa4, 0x42, 0x72, 0x6d, 0x49,
    ///     0x42, 0x72, 0x52, 0x64, 0x48, 0x57, 0x62, 0x4b, 0x2b,
    /// ];
    ///
    /// assert_eq!(MessageReader::message_size(&buffer[..]).unwrap(), 20);
    /// ```
    pub fn message_size(buf: &[u8]) -> Result<usize, StunError> {
        if buf.len() < 20 {
            return Err(StunError::InvalidInput);
        }

        if buf[0] >> 6 != 0 {
            return Err(StunError::BadChannelPrefix);
        }

        Ok(u16::from_be_bytes([buf[2], buf[3]]) as usize + 20)
    }
}

impl<'a> AsRef<[u8]> for MessageReader<'a, '_> {
    fn as_ref(&self) -> &'a [u8] {
        self.buf
    }
}
