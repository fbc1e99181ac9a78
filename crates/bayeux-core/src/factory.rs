//! Building and classifying messages from parsed JSON
//!
//! [`create`] maps a parsed object onto a [`BayeuxMessage`], tolerating
//! loose field types the way deployed clients send them (a numeric `id`
//! is stringified, an unknown connection type is dropped). [`classify`]
//! then decides what kind of request the message is by testing the
//! per-kind validity predicates in a fixed order; a message that passes
//! none of them is not a request and gets silently ignored upstream.

use tracing::trace;

use crate::channel::{META_CONNECT, META_DISCONNECT, META_HANDSHAKE, META_SUBSCRIBE, META_UNSUBSCRIBE};
use crate::message::{BayeuxMessage, ConnectionType};
use crate::value::BayeuxValue;

/// The request kinds the engine processes, in classification order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Handshake,
    Connect,
    Disconnect,
    Subscribe,
    Unsubscribe,
    Publish,
}

/// Build a message from one parsed JSON object.
pub fn create(obj: &BayeuxValue) -> BayeuxMessage {
    let supported_connection_types = obj
        .get("supportedConnectionTypes")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .filter_map(ConnectionType::from_value)
                .collect()
        })
        .unwrap_or_default();

    BayeuxMessage {
        channel: field_str(obj, "channel"),
        supported_connection_types,
        client_id: field_display(obj, "clientId"),
        connection_id: field_display(obj, "connectionId"),
        minimum_version: field_display(obj, "minimumVersion"),
        successful: obj.get("successful").and_then(|v| v.as_bool()),
        version: field_display(obj, "version"),
        subscription: field_str(obj, "subscription"),
        error: field_str(obj, "error"),
        connection_type: field_str(obj, "connectionType")
            .and_then(|s| ConnectionType::from_value(&s)),
        id: field_display(obj, "id"),
        timestamp: field_display(obj, "timestamp"),
        ext: field_object(obj, "ext"),
        advice: field_object(obj, "advice"),
        data: field_object(obj, "data"),
    }
}

/// Decide what kind of request `msg` is. First matching predicate wins;
/// `None` means the message is not a recognizable request.
pub fn classify(msg: &BayeuxMessage) -> Option<MessageKind> {
    let kind = if is_handshake_request(msg) {
        Some(MessageKind::Handshake)
    } else if is_connect_request(msg) {
        Some(MessageKind::Connect)
    } else if is_disconnect_request(msg) {
        Some(MessageKind::Disconnect)
    } else if is_subscribe_request(msg) {
        Some(MessageKind::Subscribe)
    } else if is_unsubscribe_request(msg) {
        Some(MessageKind::Unsubscribe)
    } else if is_publish_request(msg) {
        Some(MessageKind::Publish)
    } else {
        None
    };
    if kind.is_none() {
        trace!(channel = msg.channel.as_deref(), "unclassifiable message");
    }
    kind
}

pub fn is_handshake_request(msg: &BayeuxMessage) -> bool {
    msg.channel.as_deref() == Some(META_HANDSHAKE)
        && msg.version.as_deref().is_some_and(|v| !v.is_empty())
        && !msg.supported_connection_types.is_empty()
}

pub fn is_connect_request(msg: &BayeuxMessage) -> bool {
    // Alone among the meta channels, connect tolerates surrounding
    // whitespace and mixed case in the channel name.
    msg.channel
        .as_deref()
        .is_some_and(|ch| ch.trim().eq_ignore_ascii_case(META_CONNECT))
        && msg
            .client_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
        && msg.connection_type.is_some()
}

pub fn is_disconnect_request(msg: &BayeuxMessage) -> bool {
    msg.channel.as_deref() == Some(META_DISCONNECT)
        && msg.client_id.as_deref().is_some_and(|id| !id.is_empty())
}

pub fn is_subscribe_request(msg: &BayeuxMessage) -> bool {
    msg.channel.as_deref() == Some(META_SUBSCRIBE)
        && msg.subscription.as_deref().is_some_and(|s| !s.is_empty())
        && msg.client_id.as_deref().is_some_and(|id| !id.is_empty())
}

pub fn is_unsubscribe_request(msg: &BayeuxMessage) -> bool {
    msg.channel.as_deref() == Some(META_UNSUBSCRIBE)
        && msg.subscription.as_deref().is_some_and(|s| !s.is_empty())
        && msg.client_id.as_deref().is_some_and(|id| !id.is_empty())
}

pub fn is_publish_request(msg: &BayeuxMessage) -> bool {
    msg.is_valid_deliver()
}

// Response predicates: the request shape plus a `successful` flag.
// The engine only emits responses; these exist for callers that feed
// server output back through the codec (tests, client harnesses).

pub fn is_handshake_response(msg: &BayeuxMessage) -> bool {
    msg.channel.as_deref() == Some(META_HANDSHAKE) && msg.successful.is_some()
}

pub fn is_connect_response(msg: &BayeuxMessage) -> bool {
    msg.channel.as_deref() == Some(META_CONNECT)
        && msg.client_id.as_deref().is_some_and(|id| !id.is_empty())
        && msg.successful.is_some()
}

pub fn is_disconnect_response(msg: &BayeuxMessage) -> bool {
    is_disconnect_request(msg) && msg.successful.is_some()
}

pub fn is_subscribe_response(msg: &BayeuxMessage) -> bool {
    is_subscribe_request(msg) && msg.successful.is_some()
}

pub fn is_unsubscribe_response(msg: &BayeuxMessage) -> bool {
    is_unsubscribe_request(msg) && msg.successful.is_some()
}

pub fn is_publish_response(msg: &BayeuxMessage) -> bool {
    msg.channel
        .as_deref()
        .is_some_and(crate::channel::is_event_channel)
        && msg.successful.is_some()
}

fn field_str(obj: &BayeuxValue, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn field_display(obj: &BayeuxValue, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.to_display_string())
}

fn field_object(obj: &BayeuxValue, key: &str) -> Option<BayeuxValue> {
    match obj.get(key) {
        Some(v @ BayeuxValue::Object(_)) => Some(v.clone()),
        _ => None,
    }
}
