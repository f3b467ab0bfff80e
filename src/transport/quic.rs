//! quinn-backed perf transport.
//!
//! Each session is one QUIC connection with one bidirectional stream: the
//! client writes an 8-byte big-endian request for the byte volume the server
//! should send (`u64::MAX` = unbounded), finishes its send side, then reads
//! until stream end. Server certificates are not verified; perf servers run
//! on self-signed certs.

use super::{Connector, PerfSession, TransportError};
use crate::model::ProbeConfig;
use async_trait::async_trait;
use bytes::Bytes;
use quinn::crypto::rustls::QuicClientConfig;
use quinn::{ClientConfig, Connection, Endpoint, RecvStream};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

/// Maximum bytes pulled from the stream per read.
const RECV_CHUNK: usize = 64 * 1024;

pub struct QuicConnector {
    server_addr: SocketAddr,
    server_name: String,
    alpn: Vec<u8>,
    request_bytes: u64,
    endpoint: Option<Endpoint>,
}

impl QuicConnector {
    pub fn new(cfg: &ProbeConfig) -> Self {
        Self {
            server_addr: cfg.server_addr,
            server_name: cfg.server_name.clone(),
            alpn: cfg.alpn.as_bytes().to_vec(),
            request_bytes: cfg.request_bytes,
            endpoint: None,
        }
    }

    fn client_config(&self) -> Result<ClientConfig, TransportError> {
        let mut crypto = rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(SkipServerVerification::new())
            .with_no_client_auth();
        crypto.alpn_protocols = vec![self.alpn.clone()];
        let quic = QuicClientConfig::try_from(crypto)
            .map_err(|e| TransportError::Config(e.to_string()))?;
        Ok(ClientConfig::new(Arc::new(quic)))
    }
}

#[async_trait]
impl Connector for QuicConnector {
    type Session = QuicSession;

    async fn initialize(&mut self) -> Result<(), TransportError> {
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
        let mut endpoint = Endpoint::client(bind_addr)?;
        endpoint.set_default_client_config(self.client_config()?);
        self.endpoint = Some(endpoint);
        Ok(())
    }

    async fn open_session(&mut self) -> Result<QuicSession, TransportError> {
        let endpoint = self.endpoint.as_ref().ok_or(TransportError::NotReady)?;
        let connecting = endpoint
            .connect(self.server_addr, &self.server_name)
            .map_err(|e| TransportError::Connect {
                addr: self.server_addr,
                reason: e.to_string(),
            })?;
        let connection = connecting.await.map_err(|e| TransportError::Connect {
            addr: self.server_addr,
            reason: e.to_string(),
        })?;

        let (mut send, recv) = connection
            .open_bi()
            .await
            .map_err(|e| TransportError::Stream(e.to_string()))?;
        send.write_all(&self.request_bytes.to_be_bytes())
            .await
            .map_err(|e| TransportError::Stream(e.to_string()))?;
        send.finish()
            .map_err(|e| TransportError::Stream(e.to_string()))?;

        Ok(QuicSession { connection, recv })
    }

    async fn shutdown(&mut self) {
        if let Some(endpoint) = self.endpoint.take() {
            endpoint.close(0u32.into(), b"probe uninitialized");
            endpoint.wait_idle().await;
        }
    }
}

pub struct QuicSession {
    connection: Connection,
    recv: RecvStream,
}

#[async_trait]
impl PerfSession for QuicSession {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self.recv.read_chunk(RECV_CHUNK, true).await {
            Ok(Some(chunk)) => Ok(Some(chunk.bytes)),
            Ok(None) => Ok(None),
            // A close initiated by either side ends the session cleanly.
            Err(quinn::ReadError::ConnectionLost(quinn::ConnectionError::ApplicationClosed(_)))
            | Err(quinn::ReadError::ConnectionLost(quinn::ConnectionError::LocallyClosed)) => {
                Ok(None)
            }
            Err(e) => Err(TransportError::Stream(e.to_string())),
        }
    }

    async fn close(&mut self) {
        self.connection.close(0u32.into(), b"done");
    }
}

/// Accepts any server certificate. The perf exchange carries no sensitive
/// payload and perf servers present self-signed certs.
#[derive(Debug)]
struct SkipServerVerification(Arc<rustls::crypto::CryptoProvider>);

impl SkipServerVerification {
    fn new() -> Arc<Self> {
        Arc::new(Self(Arc::new(rustls::crypto::ring::default_provider())))
    }
}

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
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
        rustls::crypto::verify_tls12_signature(
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
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
