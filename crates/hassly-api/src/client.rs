// Hub client: connection ownership and request/reply plumbing.
//
// Operations are implemented as inherent methods in separate files
// (`session.rs`, `states.rs`, `calendar.rs`) to keep this module focused on
// channel mechanics.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{Span, trace, warn};

use crate::config::{ClientConfig, Endpoint, Timeouts};
use crate::error::Error;
use crate::messages::{Outbound, Reply};
use crate::probe::{EchoProbe, IcmpEcho};
use crate::transport::{self, HubStream};

/// Client for a single Home Assistant instance.
///
/// Owns at most one authenticated WebSocket. Every operation takes
/// `&mut self`, so one request is in flight at a time and replies are
/// read in the order requests were sent.
///
/// Read operations (`get_entities`, `get_entity_states`,
/// `validate_entities`, `get_calendar_events`) connect on demand if no
/// connection is open. [`send_command`](Self::send_command) never does.
pub struct HubClient {
    pub(crate) config: ClientConfig,
    pub(crate) echo: Arc<dyn EchoProbe>,
    pub(crate) span: Span,
    pub(crate) connection: Option<HubStream>,
    next_id: u64,
}

impl HubClient {
    /// Create a client from an optional base URL, token and cloud relay flag.
    ///
    /// No network activity happens here.
    pub fn new(
        base_url: Option<&str>,
        access_token: Option<SecretString>,
        use_cloud_relay: bool,
    ) -> Result<Self, Error> {
        let config = ClientConfig::new(base_url, access_token, use_cloud_relay)?;
        Ok(Self::from_config(config))
    }

    /// Create a client from a pre-built config.
    pub fn from_config(config: ClientConfig) -> Self {
        let span = default_span(&config);
        Self {
            config,
            echo: Arc::new(IcmpEcho),
            span,
            connection: None,
            next_id: 1,
        }
    }

    /// Parent span for every operation this client runs.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Replace the echo stage of the reachability probe.
    pub fn with_echo_probe(mut self, echo: Arc<dyn EchoProbe>) -> Self {
        self.echo = echo;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub(crate) fn endpoint(&self) -> Result<&Endpoint, Error> {
        self.config.endpoint.as_ref().ok_or(Error::NotConfigured)
    }

    /// Draw the next request id.
    pub(crate) fn next_request_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Open and authenticate a connection unless one is already live.
    pub(crate) async fn ensure_connected(&mut self) -> Result<(), Error> {
        if self.connection.is_none() {
            self.connect().await?;
        }
        Ok(())
    }

    /// Send a message on the live connection without waiting for a reply.
    pub(crate) async fn send(&mut self, message: &Outbound<'_>) -> Result<(), Error> {
        let stream = self.connection.as_mut().ok_or(Error::NotConnected)?;
        trace!(id = ?message.id(), "sending request");
        transport::send(stream, message).await
    }

    /// Send a message and read exactly one reply.
    ///
    /// The reply's id is not used to match it to the request; a mismatch is
    /// logged and the reply is returned anyway.
    pub(crate) async fn request(&mut self, message: &Outbound<'_>) -> Result<Reply, Error> {
        self.send(message).await?;
        let stream = self.connection.as_mut().ok_or(Error::NotConnected)?;
        let text = transport::read_text(stream).await?;
        let reply = Reply::parse(&text)?;

        if let (Some(sent), Some(received)) = (message.id(), reply.id()) {
            if sent != received {
                warn!(sent, received, "reply id does not match request id");
            }
        }
        Ok(reply)
    }
}

impl std::fmt::Debug for HubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubClient")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

fn default_span(config: &ClientConfig) -> Span {
    match config.endpoint.as_ref() {
        Some(endpoint) => tracing::info_span!("hub_client", url = %endpoint.websocket_url),
        None => tracing::info_span!("hub_client"),
    }
}
