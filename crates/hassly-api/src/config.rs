// Runtime connection configuration.
//
// These types describe *where* the hub lives and *how* to reach it. They
// carry the access token but never touch disk; `hassly-config` builds a
// `ClientConfig` from profiles and hands it in.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use url::{Host, Url};

use crate::error::Error;

/// Port assumed when the base URL does not name one.
pub const DEFAULT_PORT: u16 = 8123;

const WEBSOCKET_PATH: &str = "/api/websocket";

/// Host, port and WebSocket URL derived from a hub base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Bare host name or IP address (IPv6 without brackets).
    pub host: String,
    /// Explicit port from the base URL, or [`DEFAULT_PORT`].
    pub port: u16,
    /// `<base-url>/api/websocket`, with `http(s)` mapped to `ws(s)`.
    pub websocket_url: Url,
}

impl Endpoint {
    /// Derive an endpoint from a base URL such as `http://homeassistant.local:8123`.
    pub fn parse(base_url: &str) -> Result<Self, Error> {
        let base = Url::parse(base_url)?;

        let host = match base.host() {
            Some(Host::Domain(domain)) => domain.to_owned(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => return Err(Error::InvalidUrl(url::ParseError::EmptyHost)),
        };
        // `Url::port` hides a port equal to the scheme default, e.g. `:443`.
        let port = match base.port() {
            Some(port) => Some(port),
            None if has_explicit_port(base_url) => base.port_or_known_default(),
            None => None,
        }
        .unwrap_or(DEFAULT_PORT);

        let joined = format!("{}{WEBSOCKET_PATH}", base.as_str().trim_end_matches('/'));
        let mut websocket_url = Url::parse(&joined)?;

        let ws_scheme = match websocket_url.scheme() {
            "ws" | "http" => "ws",
            "wss" | "https" => "wss",
            other => {
                return Err(Error::UnsupportedScheme {
                    scheme: other.to_owned(),
                });
            }
        };
        if websocket_url.scheme() != ws_scheme {
            websocket_url
                .set_scheme(ws_scheme)
                .map_err(|()| Error::UnsupportedScheme {
                    scheme: base.scheme().to_owned(),
                })?;
        }

        Ok(Self {
            host,
            port,
            websocket_url,
        })
    }

    /// Like [`Endpoint::parse`], but a cloud relay connection always uses `wss`.
    pub fn for_hub(base_url: &str, use_cloud_relay: bool) -> Result<Self, Error> {
        let mut endpoint = Self::parse(base_url)?;
        if use_cloud_relay && !endpoint.is_secure() {
            endpoint
                .websocket_url
                .set_scheme("wss")
                .map_err(|()| Error::UnsupportedScheme {
                    scheme: "ws".to_owned(),
                })?;
        }
        Ok(endpoint)
    }

    /// Whether the URL itself asks for an encrypted channel.
    pub fn is_secure(&self) -> bool {
        self.websocket_url.scheme() == "wss"
    }
}

/// Whether the authority of `base_url` spells out a port.
fn has_explicit_port(base_url: &str) -> bool {
    let Some((_, rest)) = base_url.split_once("://") else {
        return false;
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    let port = match host_port.rsplit_once(']') {
        Some((_, after_v6)) => after_v6.strip_prefix(':'),
        None => host_port.rsplit_once(':').map(|(_, p)| p),
    };
    port.is_some_and(|p| !p.is_empty())
}

/// Bounded waits used by the probe and the connection test.
///
/// Steady-state requests deliberately have no timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// ICMP echo and TCP connect probes. Default: 5s.
    pub probe: Duration,
    /// Each handshake wait on the connection-test path. Default: 5s.
    pub handshake: Duration,
    /// Closing a channel. Default: 5s.
    pub close: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            probe: Duration::from_secs(5),
            handshake: Duration::from_secs(5),
            close: Duration::from_secs(5),
        }
    }
}

/// Everything a [`HubClient`](crate::HubClient) needs to reach and
/// authenticate with a hub.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// `None` until a base URL is supplied.
    pub endpoint: Option<Endpoint>,
    /// Long-lived access token sent in the `auth` message.
    pub access_token: Option<SecretString>,
    /// Connecting through the cloud relay: skips local reachability checks
    /// and enforces full certificate validation.
    pub use_cloud_relay: bool,
    pub timeouts: Timeouts,
}

impl ClientConfig {
    /// Build a config from an optional base URL, token and relay flag.
    pub fn new(
        base_url: Option<&str>,
        access_token: Option<SecretString>,
        use_cloud_relay: bool,
    ) -> Result<Self, Error> {
        let endpoint = base_url
            .map(|url| Endpoint::for_hub(url, use_cloud_relay))
            .transpose()?;
        Ok(Self {
            endpoint,
            access_token,
            use_cloud_relay,
            timeouts: Timeouts::default(),
        })
    }

    pub(crate) fn token(&self) -> Option<&str> {
        self.access_token.as_ref().map(ExposeSecret::expose_secret)
    }
}
