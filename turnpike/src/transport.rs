use std::{
    io,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use bytes::BytesMut;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf},
    net::TcpStream,
    time::{timeout_at, Instant},
};
use tokio_rustls::{
    client::TlsStream,
    rustls::{self, pki_types::ServerName, ClientConfig, RootCertStore},
    TlsConnector,
};

use crate::error::{Error, Result};

/// How to reach the relay.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// host:port of the relay.
    pub server: String,
    pub tls: bool,
    pub tls_verify: bool,
    /// per-operation deadline, also bounds the connect itself.
    pub timeout: Duration,
}

/// A duplex byte stream to the relay, plain or wrapped in TLS.
pub enum Connection {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Connection {
    pub async fn connect(options: &ConnectOptions) -> Result<Self> {
        let deadline = Instant::now() + options.timeout;
        let socket = timeout_at(deadline, TcpStream::connect(&options.server))
            .await
            .map_err(|_| Error::Timeout)??;

        // Disable the Nagle algorithm: the control channel is a strict
        // request/response ping-pong and every message should leave
        // immediately.
        if let Err(e) = socket.set_nodelay(true) {
            log::error!("socket set nodelay failed: server={}, err={}", options.server, e);
        }

        if !options.tls {
            return Ok(Self::Tcp(socket));
        }

        let host = options
            .server
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(options.server.as_str());

        let name = ServerName::try_from(host.to_string())
            .map_err(|_| Error::Config(format!("{host:?} is not a valid TLS server name")))?;

        let connector = TlsConnector::from(Arc::new(tls_config(options.tls_verify)));
        let socket = timeout_at(deadline, connector.connect(name, socket))
            .await
            .map_err(|_| Error::Timeout)??;

        Ok(Self::Tls(Box::new(socket)))
    }
}

fn tls_config(verify: bool) -> ClientConfig {
    if verify {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    } else {
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(danger::NoCertificateVerification::new(
                rustls::crypto::aws_lc_rs::default_provider(),
            )))
            .with_no_client_auth()
    }
}

mod danger {
    use tokio_rustls::rustls;

    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::DigitallySignedStruct;

    /// Accepts whatever certificate the relay presents. Deliberate: the
    /// targets of an audit are usually self-signed.
    #[derive(Debug)]
    pub struct NoCertificateVerification(CryptoProvider);

    impl NoCertificateVerification {
        pub fn new(provider: CryptoProvider) -> Self {
            Self(provider)
        }
    }

    impl ServerCertVerifier for NoCertificateVerification {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            verify_tls12_signature(
                message,
                cert,
                dss,
                &self.0.signature_verification_algorithms,
            )
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            verify_tls13_signature(
                message,
                cert,
                dss,
                &self.0.signature_verification_algorithms,
            )
        }

        fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
            self.0.signature_verification_algorithms.supported_schemes()
        }
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(socket) => Pin::new(socket).poll_read(cx, buf),
            Self::Tls(socket) => Pin::new(socket).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(socket) => Pin::new(socket).poll_write(cx, buf),
            Self::Tls(socket) => Pin::new(socket).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(socket) => Pin::new(socket).poll_flush(cx),
            Self::Tls(socket) => Pin::new(socket).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(socket) => Pin::new(socket).poll_shutdown(cx),
            Self::Tls(socket) => Pin::new(socket).poll_shutdown(cx),
        }
    }
}

/// A framed view over a [`Connection`].
///
/// STUN messages and ChannelData frames arrive back to back on the same
/// byte stream; `recv` reassembles exactly one frame per call, tolerating
/// short reads, and leaves any trailing bytes buffered for the next call.
pub struct Stream {
    connection: Connection,
    buf: BytesMut,
    timeout: Duration,
}

impl Stream {
    pub fn new(connection: Connection, timeout: Duration) -> Self {
        Self {
            connection,
            buf: BytesMut::with_capacity(2048),
            timeout,
        }
    }

    /// write the whole buffer within the deadline.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        timeout_at(deadline, self.connection.write_all(bytes))
            .await
            .map_err(|_| Error::Timeout)??;

        Ok(())
    }

    /// read one complete frame within the deadline.
    ///
    /// On TCP, ChannelData frames are aligned to 4 bytes; the returned
    /// frame includes the alignment so the codec sees exactly what was on
    /// the wire.
    pub async fn recv(&mut self) -> Result<BytesMut> {
        let deadline = Instant::now() + self.timeout;

        loop {
            if let Some(size) = frame_size(&self.buf)? {
                if self.buf.len() >= size {
                    return Ok(self.buf.split_to(size));
                }
            }

            let size = timeout_at(deadline, self.connection.read_buf(&mut self.buf))
                .await
                .map_err(|_| Error::Timeout)??;

            // a read of zero means the peer closed the connection.
            if size == 0 {
                return Err(Error::Closed);
            }
        }
    }

    /// the connection plus whatever bytes were buffered past the last
    /// frame; the caller must not lose them.
    pub fn into_parts(self) -> (Connection, BytesMut) {
        (self.connection, self.buf)
    }

    /// close the write side of the connection.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.connection.shutdown().await?;
        Ok(())
    }
}

fn frame_size(buf: &[u8]) -> Result<Option<usize>> {
    if buf.len() < 4 {
        return Ok(None);
    }

    // a STUN header needs 20 bytes before the length field is meaningful.
    if buf[0] >> 6 == 0 && buf.len() < 20 {
        return Ok(None);
    }

    Ok(Some(stun::Decoder::message_size(buf, true)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_waits_for_headers() {
        assert!(frame_size(&[0x00, 0x01]).unwrap().is_none());
        assert!(frame_size(&[0x00u8, 0x01, 0x00, 0x00, 0x21, 0x12]).unwrap().is_none());

        // channel data headers are complete at 4 bytes.
        assert_eq!(frame_size(&[0x40, 0x00, 0x00, 0x03]).unwrap(), Some(8));
    }

    #[test]
    fn frame_size_rejects_garbage() {
        assert!(frame_size(&[0xc0, 0x00, 0x00, 0x00]).is_err());
    }
}
