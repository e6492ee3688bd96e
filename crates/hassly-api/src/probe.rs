//! Pre-flight reachability diagnostics.
//!
//! Two stages, each bounded by a timeout: an ICMP echo to the hub's address,
//! then a raw TCP connect to `host:port`. Failures are returned as
//! [`Unreachable`] values whose `Display` text is meant for end users.
//!
//! The echo stage sits behind the [`EchoProbe`] trait so callers that cannot
//! open ICMP sockets (or tests) can swap it out.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use futures_util::future::BoxFuture;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence, SurgeError};
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, error, warn};

const ECHO_IDENTIFIER: u16 = 0x4841;
const ECHO_PAYLOAD: [u8; 8] = *b"hassly\0\0";

// ── Diagnostics ──────────────────────────────────────────────────────

/// Why the hub could not be reached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unreachable {
    #[error("No Home Assistant URL configured")]
    NotConfigured,

    #[error(
        "Cannot ping {host}. Please verify:\n\
         1. The IP address/hostname is correct\n\
         2. Home Assistant is running\n\
         3. You are on the same network (for local connections)\n\
         4. No firewall is blocking the connection"
    )]
    CannotPing { host: String },

    #[error("Could not resolve hostname {host}. Please check the URL.")]
    Unresolvable { host: String },

    #[error("Connection to {host}:{port} timed out.")]
    TimedOut { host: String, port: u16 },

    #[error("Connection refused on {host}:{port}. Please verify Home Assistant is running.")]
    Refused { host: String, port: u16 },

    #[error(
        "Network error connecting to {host}:{port}\n\
         Error: {reason}\n\
         Please verify:\n\
         1. The URL is correct\n\
         2. Home Assistant is running\n\
         3. You are on the same network (for local connections)\n\
         4. No firewall is blocking the connection"
    )]
    Network {
        host: String,
        port: u16,
        reason: String,
    },
}

// ── Echo stage ───────────────────────────────────────────────────────

/// Outcome of a failed echo attempt.
#[derive(Debug, Error)]
pub enum EchoError {
    /// The OS refused to open an ICMP socket. The echo stage is skipped.
    #[error("ICMP echo unavailable: {0}")]
    Unavailable(#[source] io::Error),

    #[error("no echo reply within {0:?}")]
    Timeout(Duration),

    #[error("echo failed: {0}")]
    Failed(String),
}

/// Sends one echo request and waits for the reply.
pub trait EchoProbe: Send + Sync + std::fmt::Debug {
    fn echo(&self, addr: IpAddr, timeout: Duration) -> BoxFuture<'_, Result<(), EchoError>>;
}

/// ICMP echo over an unprivileged datagram socket (raw socket fallback).
#[derive(Debug, Clone, Copy, Default)]
pub struct IcmpEcho;

impl EchoProbe for IcmpEcho {
    fn echo(&self, addr: IpAddr, timeout: Duration) -> BoxFuture<'_, Result<(), EchoError>> {
        Box::pin(async move {
            let config = match addr {
                IpAddr::V4(_) => Config::default(),
                IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
            };
            let client = Client::new(&config).map_err(EchoError::Unavailable)?;
            let mut pinger = client.pinger(addr, PingIdentifier(ECHO_IDENTIFIER)).await;
            pinger.timeout(timeout);

            match pinger.ping(PingSequence(0), &ECHO_PAYLOAD).await {
                Ok((_packet, rtt)) => {
                    debug!(%addr, ?rtt, "echo reply");
                    Ok(())
                }
                Err(SurgeError::Timeout { .. }) => Err(EchoError::Timeout(timeout)),
                Err(e) => Err(EchoError::Failed(e.to_string())),
            }
        })
    }
}

/// Skips the echo stage entirely; only the TCP probe runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEcho;

impl EchoProbe for NoEcho {
    fn echo(&self, _addr: IpAddr, _timeout: Duration) -> BoxFuture<'_, Result<(), EchoError>> {
        Box::pin(async { Ok(()) })
    }
}

// ── Probe ────────────────────────────────────────────────────────────

/// Run both reachability stages against `host:port`.
///
/// A host that does not resolve skips the echo stage so the TCP stage can
/// report the resolution failure.
pub async fn check(
    host: &str,
    port: u16,
    echo: &dyn EchoProbe,
    timeout: Duration,
) -> Result<(), Unreachable> {
    let resolved = bounded_lookup(host, resolve(host, port), timeout).await?;

    match resolved.as_ref().ok().and_then(|addrs| addrs.first()) {
        Some(addr) => {
            debug!(host, addr = %addr.ip(), "sending echo request");
            match echo.echo(addr.ip(), timeout).await {
                Ok(()) => {}
                Err(EchoError::Unavailable(e)) => {
                    warn!(error = %e, "ICMP sockets unavailable, skipping echo probe");
                }
                Err(e) => {
                    error!(host, error = %e, "Ping failed");
                    return Err(Unreachable::CannotPing {
                        host: host.to_owned(),
                    });
                }
            }
        }
        None => debug!(host, "skipping echo probe, host did not resolve"),
    }

    let addrs = match resolved {
        Ok(addrs) if !addrs.is_empty() => addrs,
        Ok(_) | Err(_) => {
            let diagnostic = Unreachable::Unresolvable {
                host: host.to_owned(),
            };
            error!("{diagnostic}");
            return Err(diagnostic);
        }
    };

    debug!(host, port, "attempting TCP connection");
    match tokio::time::timeout(timeout, TcpStream::connect(&addrs[..])).await {
        Ok(Ok(_stream)) => {
            debug!("TCP connection successful");
            Ok(())
        }
        Ok(Err(e)) => {
            let diagnostic = classify_connect_error(host, port, &e);
            error!(error = %e, "TCP connection failed");
            Err(diagnostic)
        }
        Err(_elapsed) => {
            let diagnostic = Unreachable::TimedOut {
                host: host.to_owned(),
                port,
            };
            error!("{diagnostic}");
            Err(diagnostic)
        }
    }
}

async fn resolve(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    Ok(tokio::net::lookup_host((host, port)).await?.collect())
}

/// Run a name lookup under the probe timeout. A stalled resolver counts as
/// an unresolvable host.
async fn bounded_lookup<F>(
    host: &str,
    lookup: F,
    timeout: Duration,
) -> Result<io::Result<Vec<SocketAddr>>, Unreachable>
where
    F: Future<Output = io::Result<Vec<SocketAddr>>>,
{
    tokio::time::timeout(timeout, lookup).await.map_err(|_| {
        error!(host, "name resolution timed out");
        Unreachable::Unresolvable {
            host: host.to_owned(),
        }
    })
}

fn classify_connect_error(host: &str, port: u16, err: &io::Error) -> Unreachable {
    let host = host.to_owned();
    match err.kind() {
        io::ErrorKind::ConnectionRefused => Unreachable::Refused { host, port },
        io::ErrorKind::TimedOut => Unreachable::TimedOut { host, port },
        _ => Unreachable::Network {
            host,
            port,
            reason: err.to_string(),
        },
    }
}
