//! Wire messages for the Home Assistant WebSocket API.
//!
//! Outbound messages are a single `type`-tagged enum. Inbound frames come in
//! two shapes: handshake frames (tagged on `type`) and request replies, which
//! are classified on their `success` flag into [`Reply`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_tungstenite::tungstenite::Message;

use crate::error::Error;

// ── Outbound ─────────────────────────────────────────────────────────

/// A message sent to the hub.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound<'a> {
    /// `{"type":"auth","access_token":...}`
    Auth { access_token: Option<&'a str> },

    /// `{"id":n,"type":"get_states"}`
    GetStates { id: u64 },

    /// `{"type":"call_service",...}`
    CallService {
        id: u64,
        domain: &'a str,
        service: &'a str,
        target: Target<'a>,
        service_data: &'a Map<String, Value>,
        return_response: bool,
    },
}

/// The `target` object of a service call.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Target<'a> {
    pub entity_id: &'a str,
}

impl Outbound<'_> {
    /// Request id carried by this message, if it has one.
    pub fn id(&self) -> Option<u64> {
        match self {
            Self::Auth { .. } => None,
            Self::GetStates { id } | Self::CallService { id, .. } => Some(*id),
        }
    }

    /// Encode as a JSON text frame.
    pub fn to_frame(&self) -> Result<Message, Error> {
        Ok(Message::text(serde_json::to_string(self)?))
    }
}

// ── Handshake ────────────────────────────────────────────────────────

/// A frame received during the authentication handshake.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandshakeFrame {
    AuthRequired {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthOk {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
    /// Any other `type`.
    #[serde(other)]
    Other,
}

impl HandshakeFrame {
    /// Parse a handshake frame. Malformed JSON or a missing `type` yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

// ── Replies ──────────────────────────────────────────────────────────

/// Error object attached to a failed reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HubError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl HubError {
    /// The hub's message, or `"Unknown error"` when it sent none.
    pub fn message_or_unknown(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "Unknown error".to_owned())
    }
}

/// Raw reply frame as it arrives on the wire.
///
/// The `type` field is not inspected: any object is treated as the reply to
/// the request that was just sent.
#[derive(Debug, Deserialize)]
pub struct ResultFrame {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<HubError>,
}

/// A reply, classified on its `success` flag (absent means success).
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Success { id: Option<u64>, result: Value },
    Failure { id: Option<u64>, error: HubError },
}

impl From<ResultFrame> for Reply {
    fn from(frame: ResultFrame) -> Self {
        if frame.success.unwrap_or(true) {
            Self::Success {
                id: frame.id,
                result: frame.result.unwrap_or(Value::Null),
            }
        } else {
            Self::Failure {
                id: frame.id,
                error: frame.error.unwrap_or_default(),
            }
        }
    }
}

impl Reply {
    /// Decode a reply text frame.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let frame: ResultFrame =
            serde_json::from_str(text).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: text.to_owned(),
            })?;
        Ok(frame.into())
    }

    pub fn id(&self) -> Option<u64> {
        match self {
            Self::Success { id, .. } | Self::Failure { id, .. } => *id,
        }
    }
}
