//! Bayeux message model
//!
//! A single [`BayeuxMessage`] struct carries every field any Bayeux
//! message can have; which fields are populated determines what kind of
//! message it is (see [`crate::factory`] for classification). Responses
//! are built from requests with [`BayeuxMessage::response_to`], which
//! copies the identifying fields and stamps a fresh timestamp.

use crate::channel::is_event_channel;
use crate::json::{self, quote};
use crate::time::current_timestamp;
use crate::value::BayeuxValue;

/// Protocol version this engine speaks
pub const BAYEUX_VERSION: &str = "1.0beta";
/// Oldest client version the engine accepts
pub const BAYEUX_MINIMUM_VERSION: &str = "1.0beta";

// ============================================================================
// Connection types
// ============================================================================

/// Transport flavors a client can advertise in a handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    LongPolling,
    LongPollingJsonEncoded,
    CallbackPolling,
    Iframe,
    Flash,
}

/// Transports this engine actually serves.
pub const SERVER_CONNECTION_TYPES: &[ConnectionType] =
    &[ConnectionType::LongPolling, ConnectionType::CallbackPolling];

impl ConnectionType {
    /// Wire name, e.g. `long-polling`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::LongPolling => "long-polling",
            ConnectionType::LongPollingJsonEncoded => "long-polling-json-encoded",
            ConnectionType::CallbackPolling => "callback-polling",
            ConnectionType::Iframe => "iframe",
            ConnectionType::Flash => "flash",
        }
    }

    /// Case-insensitive lookup from the wire name. Unknown names yield
    /// `None` and are dropped by the caller.
    pub fn from_value(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("long-polling") {
            Some(ConnectionType::LongPolling)
        } else if name.eq_ignore_ascii_case("long-polling-json-encoded") {
            Some(ConnectionType::LongPollingJsonEncoded)
        } else if name.eq_ignore_ascii_case("callback-polling") {
            Some(ConnectionType::CallbackPolling)
        } else if name.eq_ignore_ascii_case("iframe") {
            Some(ConnectionType::Iframe)
        } else if name.eq_ignore_ascii_case("flash") {
            Some(ConnectionType::Flash)
        } else {
            None
        }
    }
}

// ============================================================================
// Protocol errors
// ============================================================================

/// Protocol-level failure causes reported in the `error` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    NoClientId,
    UnknownClientId,
    DeniedSubscription,
    UnknownChannel,
    UnsupportedConnectionTypes,
    UnsupportedVersion,
    RepeatSubscribe,
    ConnectionLimitExceeded,
    Unknown,
}

impl ProtocolError {
    /// Render the `code:args:message` wire form, e.g.
    /// `402:abc123:Unknown Client ID`.
    pub fn format(&self, args: &str) -> String {
        match self {
            ProtocolError::NoClientId => "401::No Client ID".to_string(),
            ProtocolError::UnknownClientId => format!("402:{args}:Unknown Client ID"),
            ProtocolError::DeniedSubscription => format!("403:{args}:Subscription denied"),
            ProtocolError::UnknownChannel => format!("404:{args}:Unknown Channel"),
            ProtocolError::UnsupportedConnectionTypes => {
                format!("405:{args}:Unsupported Connection Types")
            }
            ProtocolError::UnsupportedVersion => format!("406:{args}:Unsupported version"),
            ProtocolError::RepeatSubscribe => format!("406:{args}:Repeat subscribe"),
            ProtocolError::ConnectionLimitExceeded => {
                format!("407::Exceed connections limit {args}")
            }
            ProtocolError::Unknown => "400::Unknown Error".to_string(),
        }
    }
}

/// Build the standard three-field advice object.
pub fn advice(reconnect: &str, interval: i64, multiple_clients: bool) -> BayeuxValue {
    BayeuxValue::Object(vec![
        ("reconnect".to_string(), reconnect.into()),
        ("interval".to_string(), interval.into()),
        ("multiple-clients".to_string(), multiple_clients.into()),
    ])
}

// ============================================================================
// Message
// ============================================================================

/// One Bayeux message, request or response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BayeuxMessage {
    pub channel: Option<String>,
    pub supported_connection_types: Vec<ConnectionType>,
    pub client_id: Option<String>,
    pub connection_id: Option<String>,
    pub minimum_version: Option<String>,
    pub successful: Option<bool>,
    pub version: Option<String>,
    pub subscription: Option<String>,
    pub error: Option<String>,
    pub connection_type: Option<ConnectionType>,
    pub id: Option<String>,
    pub timestamp: Option<String>,
    /// `ext` object, free-form client extension data
    pub ext: Option<BayeuxValue>,
    /// `advice` object
    pub advice: Option<BayeuxValue>,
    /// `data` object of publish and deliver messages
    pub data: Option<BayeuxValue>,
}

impl BayeuxMessage {
    /// Start a response: copy the fields that tie a response to its
    /// request and stamp the current time.
    pub fn response_to(request: &BayeuxMessage) -> BayeuxMessage {
        BayeuxMessage {
            channel: request.channel.clone(),
            client_id: request.client_id.clone(),
            connection_id: request.connection_id.clone(),
            id: request.id.clone(),
            ext: request.ext.clone(),
            timestamp: Some(current_timestamp()),
            ..BayeuxMessage::default()
        }
    }

    /// Turn a publish request into the event that fans out to
    /// subscribers. The caller overwrites `client_id` and `id` with the
    /// publisher connection's values before routing.
    pub fn deliver_from(request: &BayeuxMessage) -> BayeuxMessage {
        let mut event = BayeuxMessage::response_to(request);
        event.data = request.data.clone();
        event
    }

    /// True for a deliverable event: an application channel plus a
    /// `data` payload.
    pub fn is_valid_deliver(&self) -> bool {
        match &self.channel {
            Some(ch) => is_event_channel(ch) && self.data.is_some(),
            None => false,
        }
    }

    /// Serialize to wire JSON. Fields appear in a fixed order and absent
    /// or empty fields are skipped entirely.
    pub fn to_json(&self) -> String {
        let mut out = String::from("{");
        let mut first = true;

        push_str_field(&mut out, &mut first, "channel", &self.channel);
        if !self.supported_connection_types.is_empty() {
            sep(&mut out, &mut first);
            out.push_str("\"supportedConnectionTypes\":[");
            for (i, ty) in self.supported_connection_types.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&quote(ty.as_str()));
            }
            out.push(']');
        }
        push_str_field(&mut out, &mut first, "clientId", &self.client_id);
        push_str_field(&mut out, &mut first, "connectionId", &self.connection_id);
        push_str_field(&mut out, &mut first, "minimumVersion", &self.minimum_version);
        if let Some(successful) = self.successful {
            sep(&mut out, &mut first);
            out.push_str("\"successful\":");
            out.push_str(if successful { "true" } else { "false" });
        }
        push_str_field(&mut out, &mut first, "version", &self.version);
        push_str_field(&mut out, &mut first, "subscription", &self.subscription);
        push_str_field(&mut out, &mut first, "error", &self.error);
        if let Some(ty) = self.connection_type {
            sep(&mut out, &mut first);
            out.push_str("\"connectionType\":");
            out.push_str(&quote(ty.as_str()));
        }
        push_str_field(&mut out, &mut first, "id", &self.id);
        push_str_field(&mut out, &mut first, "timestamp", &self.timestamp);
        push_value_field(&mut out, &mut first, "ext", &self.ext);
        push_value_field(&mut out, &mut first, "advice", &self.advice);
        push_value_field(&mut out, &mut first, "data", &self.data);

        out.push('}');
        out
    }
}

/// Serialize a batch as a JSON array, the top-level frame of every
/// request and response body.
pub fn messages_to_json(messages: &[BayeuxMessage]) -> String {
    let mut out = String::from("[");
    for (i, msg) in messages.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&msg.to_json());
    }
    out.push(']');
    out
}

fn sep(out: &mut String, first: &mut bool) {
    if *first {
        *first = false;
    } else {
        out.push(',');
    }
}

fn push_str_field(out: &mut String, first: &mut bool, name: &str, value: &Option<String>) {
    if let Some(v) = value {
        if !v.is_empty() {
            sep(out, first);
            out.push_str(&quote(name));
            out.push(':');
            out.push_str(&quote(v));
        }
    }
}

fn push_value_field(out: &mut String, first: &mut bool, name: &str, value: &Option<BayeuxValue>) {
    if let Some(v) = value {
        sep(out, first);
        out.push_str(&quote(name));
        out.push(':');
        out.push_str(&json::to_json(v));
    }
}
