use thiserror::Error;

use crate::probe::Unreachable;

/// Top-level error type for the `hassly-api` crate.
///
/// Raised by the steady-state operations (`connect`, `get_entities`,
/// `get_calendar_events`, ...). Reachability and connection-test failures
/// have their own value types ([`Unreachable`], [`ConnectionTestFailure`])
/// because those paths report rather than raise.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The hub answered the handshake with anything other than `auth_ok`.
    #[error("Authentication failed")]
    AuthenticationFailed,

    // ── Configuration ───────────────────────────────────────────────
    /// No hub URL has been configured on this client.
    #[error("Home Assistant URL is not configured")]
    NotConfigured,

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The base URL uses a scheme the WebSocket transport cannot speak.
    #[error("Unsupported URL scheme '{scheme}' (expected ws, wss, http or https)")]
    UnsupportedScheme { scheme: String },

    /// A reconfiguration was rejected by the connection test. The previous
    /// settings have been restored.
    #[error("Failed to connect with new configuration: {0}")]
    Reconfigure(#[source] ConnectionTestFailure),

    // ── Transport ───────────────────────────────────────────────────
    /// TLS client configuration could not be built.
    #[error("TLS error: {0}")]
    Tls(String),

    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// A frame could not be sent or received on an open connection.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The hub closed the channel while a reply was expected.
    #[error("WebSocket closed by Home Assistant")]
    ConnectionClosed,

    /// An operation that never connects implicitly found no live connection.
    #[error("Not connected to Home Assistant")]
    NotConnected,

    // ── Hub ─────────────────────────────────────────────────────────
    /// The hub reported `success: false` for a state query.
    #[error("Failed to get states: {message}")]
    States { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// An outbound message could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if the hub rejected our credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::Reconfigure(ConnectionTestFailure::InvalidToken)
        )
    }

    /// Returns `true` if the failure happened below the protocol layer
    /// (socket, TLS, closed channel).
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::WebSocketConnect(_)
                | Self::WebSocket(_)
                | Self::ConnectionClosed
                | Self::NotConnected
                | Self::Tls(_)
        )
    }
}

/// Why a connection test did not succeed.
///
/// Returned, never raised: every failure on the test path (including
/// unexpected transport errors) is folded into one of these variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionTestFailure {
    /// The reachability probe failed before a channel was opened.
    #[error(transparent)]
    Unreachable(#[from] Unreachable),

    /// The first frame from the hub was not `auth_required`.
    #[error("Unexpected response from Home Assistant")]
    UnexpectedResponse,

    /// The hub answered the handshake with `auth_invalid`.
    #[error("Invalid access token")]
    InvalidToken,

    /// The hub answered the handshake with something other than
    /// `auth_ok` / `auth_invalid`.
    #[error("Unexpected authentication response")]
    UnexpectedAuthResponse,

    /// One of the bounded handshake waits elapsed.
    #[error(
        "Connection timed out. Please check your Home Assistant URL and network connection."
    )]
    TimedOut,

    /// Anything else, carrying the underlying error text.
    #[error("{0}")]
    Other(String),
}

impl From<Error> for ConnectionTestFailure {
    fn from(err: Error) -> Self {
        Self::Other(err.to_string())
    }
}
