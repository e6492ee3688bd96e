// hassly-api: Async Rust client for the Home Assistant WebSocket API
//
// ```rust,ignore
// let mut client = HubClient::new(Some("http://homeassistant.local:8123"), Some(token), false)?;
// client.test_connection().await?;
// for entity in client.get_entities().await? {
//     println!("{} ({})", entity.name, entity.entity_id);
// }
// client.disconnect().await;
// ```

mod calendar;
mod client;
mod session;
mod states;

pub mod config;
pub mod error;
pub mod messages;
pub mod models;
pub mod probe;
pub mod transport;

pub use client::HubClient;
pub use config::{ClientConfig, DEFAULT_PORT, Endpoint, Timeouts};
pub use error::{ConnectionTestFailure, Error};
pub use models::{CalendarEvent, CalendarQuery, EntityState, EntitySummary, EntityValidation};
pub use probe::{EchoError, EchoProbe, IcmpEcho, NoEcho, Unreachable};
pub use transport::TlsMode;
