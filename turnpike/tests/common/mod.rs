//! Scripted relay plumbing shared by the integration tests.

use bytes::BytesMut;
use stun::util;
use tokio::{io::AsyncReadExt, net::TcpStream};

pub const USERNAME: &str = "user1";
pub const PASSWORD: &str = "pass1";
pub const REALM: &str = "localhost";

pub fn key(realm: &str) -> [u8; 16] {
    util::long_term_credential_digest(USERNAME, realm, PASSWORD)
}

/// read one full STUN message or ChannelData frame off the socket.
pub async fn read_frame(socket: &mut TcpStream, buf: &mut BytesMut) -> BytesMut {
    loop {
        if buf.len() >= 4 && !(buf[0] >> 6 == 0 && buf.len() < 20) {
            let size = stun::Decoder::message_size(buf, true).expect("valid frame header");
            if buf.len() >= size {
                return buf.split_to(size);
            }
        }

        let size = socket.read_buf(buf).await.expect("read from client");
        assert!(size > 0, "client closed the connection mid-frame");
    }
}
