// WebSocket transport: TLS negotiation, channel setup and frame I/O.
//
// Both the connection test and the long-lived session open their channel
// through this module so TLS policy lives in one place.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use tracing::trace;
use url::Url;

use crate::config::Endpoint;
use crate::error::Error;
use crate::messages::Outbound;

/// An open channel to the hub.
pub type HubStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How the channel is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Unencrypted `ws://`.
    Plain,
    /// Full WebPKI validation (cloud relay endpoints).
    Verified,
    /// Accept any certificate and skip host-name checks (self-signed local hubs).
    DangerAcceptInvalid,
}

impl TlsMode {
    /// Pick a mode for an endpoint.
    ///
    /// Encryption is used when the URL is `wss` or the cloud relay is in
    /// play. Only cloud relay connections validate certificates.
    pub fn negotiate(endpoint: &Endpoint, use_cloud_relay: bool) -> Self {
        if use_cloud_relay {
            Self::Verified
        } else if endpoint.is_secure() {
            Self::DangerAcceptInvalid
        } else {
            Self::Plain
        }
    }

    /// Build the tungstenite connector for this mode.
    ///
    /// `None` lets tungstenite open a plain TCP stream.
    pub fn connector(self) -> Result<Option<Connector>, Error> {
        let config = match self {
            Self::Plain => return Ok(None),
            Self::Verified => verified_config()?,
            Self::DangerAcceptInvalid => accept_any_config()?,
        };
        Ok(Some(Connector::Rustls(Arc::new(config))))
    }
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn verified_config() -> Result<ClientConfig, Error> {
    let roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(format!("unsupported protocol versions: {e}")))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(config)
}

fn accept_any_config() -> Result<ClientConfig, Error> {
    let provider = provider();
    let verifier = AcceptAnyCertificate {
        algorithms: provider.signature_verification_algorithms,
    };
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(format!("unsupported protocol versions: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();
    Ok(config)
}

/// Certificate verifier for self-signed local hubs.
///
/// Chain and host name are not checked; handshake signatures still are, so
/// the peer must hold the key for the certificate it presents.
#[derive(Debug)]
struct AcceptAnyCertificate {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for AcceptAnyCertificate {
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
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

// ── Channel I/O ──────────────────────────────────────────────────────

/// Open a WebSocket to `url` secured according to `tls`.
pub async fn open(url: &Url, tls: TlsMode) -> Result<HubStream, Error> {
    let connector = tls.connector()?;
    let (stream, _response) =
        tokio_tungstenite::connect_async_tls_with_config(url.as_str(), None, false, connector)
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
    Ok(stream)
}

/// Encode and send one outbound message.
pub async fn send(stream: &mut HubStream, message: &Outbound<'_>) -> Result<(), Error> {
    let frame = message.to_frame()?;
    stream
        .send(frame)
        .await
        .map_err(|e| Error::WebSocket(e.to_string()))
}

/// Wait for the next text frame.
///
/// Control and binary frames are skipped (tungstenite answers pings on its
/// own). A close frame or end of stream is [`Error::ConnectionClosed`].
pub async fn read_text(stream: &mut HubStream) -> Result<String, Error> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
            Some(Ok(Message::Close(frame))) => {
                if let Some(ref cf) = frame {
                    trace!(code = %cf.code, reason = %cf.reason, "close frame received");
                }
                return Err(Error::ConnectionClosed);
            }
            Some(Ok(other)) => {
                trace!(kind = frame_kind(&other), "skipping non-text frame");
            }
            Some(Err(e)) => return Err(Error::WebSocket(e.to_string())),
            None => return Err(Error::ConnectionClosed),
        }
    }
}

fn frame_kind(message: &Message) -> &'static str {
    match message {
        Message::Text(_) => "text",
        Message::Binary(_) => "binary",
        Message::Ping(_) => "ping",
        Message::Pong(_) => "pong",
        Message::Close(_) => "close",
        Message::Frame(_) => "frame",
    }
}
