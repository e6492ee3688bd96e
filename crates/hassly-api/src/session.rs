// Connection lifecycle: reachability, connection test, connect/disconnect
// and reconfiguration.

use secrecy::{ExposeSecret, SecretString};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::client::HubClient;
use crate::config::Endpoint;
use crate::error::{ConnectionTestFailure, Error};
use crate::messages::{HandshakeFrame, Outbound};
use crate::probe::{self, Unreachable};
use crate::transport::{self, HubStream, TlsMode};

impl HubClient {
    /// Pre-flight reachability check: ICMP echo, then TCP connect.
    ///
    /// Always succeeds when connecting through the cloud relay, whose
    /// endpoints are not on the local network.
    #[instrument(parent = &self.span, skip_all)]
    pub async fn check_connectivity(&self) -> Result<(), Unreachable> {
        if self.config.use_cloud_relay {
            debug!("cloud relay in use, skipping reachability probe");
            return Ok(());
        }
        let Some(endpoint) = self.config.endpoint.as_ref() else {
            return Err(Unreachable::NotConfigured);
        };
        probe::check(
            &endpoint.host,
            endpoint.port,
            self.echo.as_ref(),
            self.config.timeouts.probe,
        )
        .await
    }

    /// Probe the hub, open a throwaway channel and run the auth handshake.
    ///
    /// Each handshake wait is bounded by `timeouts.handshake`. The test
    /// channel is closed before returning; the client's own connection is
    /// untouched.
    #[instrument(parent = &self.span, skip_all)]
    pub async fn test_connection(&self) -> Result<(), ConnectionTestFailure> {
        self.check_connectivity().await?;

        let endpoint = self.endpoint()?;
        let tls = TlsMode::negotiate(endpoint, self.config.use_cloud_relay);
        debug!(url = %endpoint.websocket_url, ?tls, "attempting WebSocket connection");

        let mut stream = transport::open(&endpoint.websocket_url, tls).await?;
        debug!("WebSocket connection established");

        let outcome = self.handshake_probe(&mut stream).await;

        match timeout(self.config.timeouts.close, stream.close(None)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "closing test channel failed"),
            Err(_) => debug!("closing test channel timed out"),
        }

        if let Err(ref failure) = outcome {
            error!(%failure, "Connection test failed");
        }
        outcome
    }

    async fn handshake_probe(&self, stream: &mut HubStream) -> Result<(), ConnectionTestFailure> {
        let wait = self.config.timeouts.handshake;

        let greeting = timeout(wait, transport::read_text(stream))
            .await
            .map_err(|_| ConnectionTestFailure::TimedOut)??;
        debug!(%greeting, "received initial message");

        if !matches!(
            HandshakeFrame::parse(&greeting),
            Some(HandshakeFrame::AuthRequired { .. })
        ) {
            return Err(ConnectionTestFailure::UnexpectedResponse);
        }

        let auth = Outbound::Auth {
            access_token: self.config.token(),
        };
        transport::send(stream, &auth).await?;
        debug!("sent authentication message");

        let reply = timeout(wait, transport::read_text(stream))
            .await
            .map_err(|_| ConnectionTestFailure::TimedOut)??;

        match HandshakeFrame::parse(&reply) {
            Some(HandshakeFrame::AuthOk { ha_version }) => {
                debug!(?ha_version, "authentication accepted");
                Ok(())
            }
            Some(HandshakeFrame::AuthInvalid { message }) => {
                debug!(?message, "authentication rejected");
                Err(ConnectionTestFailure::InvalidToken)
            }
            _ => Err(ConnectionTestFailure::UnexpectedAuthResponse),
        }
    }

    /// Blocking wrapper around [`test_connection`](Self::test_connection).
    ///
    /// Runs the test to completion on a dedicated current-thread runtime.
    /// Must not be called from inside an async runtime; doing so returns a
    /// failure instead of panicking.
    pub fn test_connection_blocking(&self) -> Result<(), ConnectionTestFailure> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(ConnectionTestFailure::Other(
                "test_connection_blocking called from inside an async runtime; \
                 await test_connection instead"
                    .into(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                error!(error = %e, "Connection test failed");
                ConnectionTestFailure::Other(e.to_string())
            })?;
        runtime.block_on(self.test_connection())
    }

    /// Open and authenticate the client's connection.
    ///
    /// An existing connection is closed first. The greeting frame is read
    /// but not inspected; anything other than `auth_ok` in reply to our
    /// token is [`Error::AuthenticationFailed`]. No retry.
    #[instrument(parent = &self.span, skip_all)]
    pub async fn connect(&mut self) -> Result<(), Error> {
        if self.connection.is_some() {
            self.disconnect().await;
        }

        let endpoint = self.endpoint()?;
        let tls = TlsMode::negotiate(endpoint, self.config.use_cloud_relay);
        debug!(url = %endpoint.websocket_url, ?tls, "connecting");

        let mut stream = transport::open(&endpoint.websocket_url, tls).await?;
        let greeting = transport::read_text(&mut stream).await?;
        debug!(%greeting, "received initial message");

        let auth = Outbound::Auth {
            access_token: self.config.token(),
        };
        transport::send(&mut stream, &auth).await?;
        let reply = transport::read_text(&mut stream).await?;

        self.connection = Some(stream);

        if let Some(HandshakeFrame::AuthOk { ha_version }) = HandshakeFrame::parse(&reply) {
            info!(?ha_version, "connected to Home Assistant");
            Ok(())
        } else {
            warn!(%reply, "authentication rejected");
            self.disconnect().await;
            Err(Error::AuthenticationFailed)
        }
    }

    /// Close the connection if there is one.
    ///
    /// Close errors are logged, never returned. The connection is released
    /// either way.
    #[instrument(parent = &self.span, skip_all)]
    pub async fn disconnect(&mut self) {
        let Some(mut stream) = self.connection.take() else {
            return;
        };
        match timeout(self.config.timeouts.close, stream.close(None)).await {
            Ok(Ok(())) => debug!("disconnected"),
            Ok(Err(e)) => error!(error = %e, "Error disconnecting"),
            Err(_) => error!("Error disconnecting: close timed out"),
        }
    }

    /// Swap in a new base URL and/or token, then run the connection test.
    ///
    /// On failure the previous settings are restored and the test's
    /// diagnostic is returned inside [`Error::Reconfigure`]. Any live
    /// connection is released, since it belongs to the old settings.
    #[instrument(parent = &self.span, skip_all)]
    pub async fn update_config(
        &mut self,
        new_url: Option<&str>,
        new_token: Option<SecretString>,
    ) -> Result<(), Error> {
        let previous = self.config.clone();

        if let Some(url) = new_url.filter(|u| !u.is_empty()) {
            let endpoint = Endpoint::for_hub(url, self.config.use_cloud_relay)?;
            self.config.endpoint = Some(endpoint);
        }
        if let Some(token) = new_token.filter(|t| !t.expose_secret().is_empty()) {
            self.config.access_token = Some(token);
        }

        self.disconnect().await;

        if let Err(failure) = self.test_connection().await {
            warn!("new configuration rejected, restoring previous settings");
            self.config = previous;
            return Err(Error::Reconfigure(failure));
        }

        info!("configuration updated");
        Ok(())
    }
}
