//! Per-client connection state machine
//!
//! A [`Connection`] tracks one logical client across many short HTTP
//! requests. It owns the downstream queue that accumulates responses
//! and events until `flush` writes them to whichever transport the
//! client's latest poll bound, and it implements the protocol actions
//! (handshake, connect, disconnect, subscribe, unsubscribe, publish)
//! against an explicit [`Router`].
//!
//! Locking: actions never hold the connection lock while calling into
//! the router, so the registry lock always comes first. Fan-out can
//! therefore enqueue into this connection (including the publisher's
//! own queue) without deadlocking the action that triggered it.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use bayeux_core::{
    advice, messages_to_json, BayeuxMessage, ConnectionType, MessageKind, ProtocolError,
    BayeuxValue,
};

use crate::router::Router;
use crate::transport::TransportHandle;

/// Lifecycle of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Initial,
    Handshaked,
    Connected,
    Disconnected,
}

/// Request metadata captured when a connection is first seen.
#[derive(Debug, Clone, Default)]
pub struct PeerInfo {
    pub requested_uri: Option<String>,
    pub requested_host: Option<String>,
    pub client_addr: Option<SocketAddr>,
    pub server_addr: Option<SocketAddr>,
}

struct ConnectionInner {
    state: ConnectionState,
    connection_type: Option<ConnectionType>,
    /// Last message id seen from this client, echoed into events.
    last_id: Option<String>,
    /// JSONP callback name, set when the client polls via script tag.
    jsonp: Option<String>,
    /// Wrap responses in /*…*/ (json-comment-filtered handshake ext).
    commented: bool,
    subscriptions: Vec<String>,
    upstream: VecDeque<(MessageKind, BayeuxMessage)>,
    downstream: VecDeque<BayeuxMessage>,
    transport: Option<TransportHandle>,
}

/// One logical client
pub struct Connection {
    client_id: Mutex<Option<String>>,
    peer: PeerInfo,
    weak_self: Weak<Connection>,
    inner: Mutex<ConnectionInner>,
}

impl Connection {
    pub fn new(peer: PeerInfo) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            client_id: Mutex::new(None),
            peer,
            weak_self: weak_self.clone(),
            inner: Mutex::new(ConnectionInner {
                state: ConnectionState::Initial,
                connection_type: None,
                last_id: None,
                jsonp: None,
                commented: false,
                subscriptions: Vec::new(),
                upstream: VecDeque::new(),
                downstream: VecDeque::new(),
                transport: None,
            }),
        })
    }

    fn self_arc(&self) -> Arc<Connection> {
        // Always upgradeable: the only constructor hands out an Arc.
        self.weak_self.upgrade().expect("live connection")
    }

    // ========================================================================
    // Identity and state
    // ========================================================================

    pub fn client_id(&self) -> Option<String> {
        self.client_id.lock().clone()
    }

    pub(crate) fn set_client_id(&self, id: String) {
        *self.client_id.lock() = Some(id);
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn connection_type(&self) -> Option<ConnectionType> {
        self.inner.lock().connection_type
    }

    pub fn peer(&self) -> &PeerInfo {
        &self.peer
    }

    pub fn last_id(&self) -> Option<String> {
        self.inner.lock().last_id.clone()
    }

    pub fn set_last_id(&self, id: Option<String>) {
        self.inner.lock().last_id = id;
    }

    pub fn set_jsonp(&self, callback: String) {
        self.inner.lock().jsonp = Some(callback);
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.inner.lock().subscriptions.clone()
    }

    // ========================================================================
    // Transport binding
    // ========================================================================

    pub fn bind_transport(&self, transport: TransportHandle) {
        self.inner.lock().transport = Some(transport);
    }

    pub fn bound_transport(&self) -> Option<TransportHandle> {
        self.inner.lock().transport.clone()
    }

    /// True when `transport` is not the handle this connection is
    /// currently bound to.
    pub fn is_rebinding(&self, transport: &TransportHandle) -> bool {
        match &self.inner.lock().transport {
            Some(bound) => !Arc::ptr_eq(bound, transport),
            None => false,
        }
    }

    /// Close the bound transport, if any.
    pub fn close(&self) {
        if let Some(transport) = self.bound_transport() {
            transport.close();
        }
    }

    // ========================================================================
    // Queues
    // ========================================================================

    pub fn put_to_upstream(&self, kind: MessageKind, request: BayeuxMessage) {
        self.inner.lock().upstream.push_back((kind, request));
    }

    pub fn poll_upstream(&self) -> Option<(MessageKind, BayeuxMessage)> {
        self.inner.lock().upstream.pop_front()
    }

    pub fn put_to_downstream(&self, message: BayeuxMessage) {
        self.inner.lock().downstream.push_back(message);
    }

    /// Enqueue and flush in one step.
    pub fn send(&self, message: BayeuxMessage) {
        self.put_to_downstream(message);
        self.flush();
    }

    /// Drop everything queued in both directions.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.upstream.clear();
        inner.downstream.clear();
    }

    /// Write the downstream queue to the bound transport as one JSON
    /// array and close the transport, completing the client's poll.
    /// The queue is retained when there is nothing writable to flush
    /// to; the next poll picks it up.
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        if inner.downstream.is_empty() {
            return;
        }
        let messages: Vec<BayeuxMessage> = inner.downstream.iter().cloned().collect();
        let mut payload = messages_to_json(&messages);
        if inner.commented {
            payload = format!("/*{payload}*/");
        }
        if let Some(jsonp) = inner.jsonp.as_deref() {
            if !jsonp.is_empty() {
                payload = format!("{jsonp}({payload})");
            }
        }
        if let Some(transport) = inner.transport.clone() {
            if transport.is_writable() {
                trace!(count = messages.len(), "flushing downstream queue");
                transport.write(&payload);
                transport.close();
                inner.downstream.clear();
            }
        }
    }

    /// Write a raw payload to the bound transport and close it. Used
    /// when releasing a superseded poll.
    pub fn send_raw(&self, payload: &str) {
        if let Some(transport) = self.bound_transport() {
            if transport.is_writable() {
                transport.write(payload);
                transport.close();
            }
        }
    }

    // ========================================================================
    // Protocol actions
    // ========================================================================

    /// Run one classified request through the matching action.
    pub fn apply(&self, router: &Router, kind: MessageKind, request: &BayeuxMessage) {
        match kind {
            MessageKind::Handshake => self.handshake(router, request),
            MessageKind::Connect => self.connect(router, request),
            MessageKind::Disconnect => self.disconnect(router, request),
            MessageKind::Subscribe => self.subscribe(router, request),
            MessageKind::Unsubscribe => self.unsubscribe(router, request),
            MessageKind::Publish => self.publish(router, request),
        }
    }

    /// Negotiate connection types and protocol versions.
    pub fn handshake(&self, router: &Router, request: &BayeuxMessage) {
        if let Some(flag) = request
            .ext
            .as_ref()
            .and_then(|e| e.get("json-comment-filtered"))
            .and_then(|v| v.as_bool())
        {
            self.inner.lock().commented = flag;
        }

        let mut response = BayeuxMessage::response_to(request);
        response.client_id = self.client_id();

        let matched: Vec<ConnectionType> = request
            .supported_connection_types
            .iter()
            .copied()
            .filter(|t| router.config().connection_types.contains(t))
            .collect();

        if matched.is_empty() {
            let offered = BayeuxValue::Array(
                request
                    .supported_connection_types
                    .iter()
                    .map(|t| t.as_str().into())
                    .collect(),
            );
            response.successful = Some(false);
            response.error = Some(
                ProtocolError::UnsupportedConnectionTypes
                    .format(&bayeux_core::json::to_json(&offered)),
            );
            response.supported_connection_types = router.config().connection_types.clone();
            debug!(client_id = ?response.client_id, "handshake rejected: no usable connection type");
            self.put_to_downstream(response);
            router.remove_connection(self);
            return;
        }
        response.successful = Some(true);
        response.supported_connection_types = matched;

        let client_minimum = request.minimum_version.clone().unwrap_or_default();
        let client_version = request.version.clone().unwrap_or_default();
        let server_minimum = router.config().minimum_version.clone();
        let server_version = router.config().version.clone();

        if server_minimum.eq_ignore_ascii_case(&client_minimum) {
            response.minimum_version = Some(server_minimum.clone());
            response.successful = Some(true);
        } else if compare_version(&server_minimum, &client_minimum) {
            response.minimum_version = Some(server_minimum.clone());
            response.successful = Some(!compare_version(&server_minimum, &client_version));
        } else {
            response.minimum_version = Some(client_minimum.clone());
            response.successful = Some(!compare_version(&client_minimum, &server_version));
        }

        if response.successful == Some(true) {
            response.version = Some(if compare_version(&server_version, &client_version) {
                client_version
            } else {
                server_version
            });
            self.inner.lock().state = ConnectionState::Handshaked;
            debug!(client_id = ?response.client_id, "handshake accepted");
        } else {
            response.minimum_version = Some(server_minimum);
            response.version = Some(server_version);
            response.error = Some(
                ProtocolError::UnsupportedVersion
                    .format(&format!("{client_minimum},{client_version}")),
            );
            debug!(client_id = ?response.client_id, "handshake rejected: version mismatch");
            router.remove_connection(self);
        }
        self.put_to_downstream(response);
    }

    /// Open (or re-open) the long-poll cycle.
    pub fn connect(&self, router: &Router, request: &BayeuxMessage) {
        match self.state() {
            ConnectionState::Handshaked => {
                {
                    let mut inner = self.inner.lock();
                    inner.connection_type = request.connection_type;
                    inner.state = ConnectionState::Connected;
                }
                let mut response = BayeuxMessage::response_to(request);
                response.connection_type = request.connection_type;
                response.successful = Some(true);
                self.put_to_downstream(response);
            }
            // An established client polling again: nothing to say until
            // an event arrives or the dispatcher flushes.
            ConnectionState::Connected => {}
            state => {
                let mut response = BayeuxMessage::response_to(request);
                response.successful = Some(false);
                response.advice = Some(advice("handshake", 0, false));
                response.error = Some(ProtocolError::Unknown.format(""));
                debug!(?state, "connect in wrong state");
                self.put_to_downstream(response);
                self.inner.lock().state = ConnectionState::Disconnected;
                router.remove_connection(self);
            }
        }
    }

    /// Leave the router. Responds even when the client was unknown.
    pub fn disconnect(&self, router: &Router, request: &BayeuxMessage) {
        let successful = router.remove_connection(self);
        self.inner.lock().subscriptions.clear();
        let mut response = BayeuxMessage::response_to(request);
        response.successful = Some(successful);
        if !successful {
            let client_id = response.client_id.clone().unwrap_or_default();
            response.error = Some(ProtocolError::UnknownClientId.format(&client_id));
        }
        self.put_to_downstream(response);
    }

    pub fn subscribe(&self, router: &Router, request: &BayeuxMessage) {
        let subscription = request.subscription.clone().unwrap_or_default();
        let successful = router.add_listener(&subscription, &self.self_arc());
        let mut response = BayeuxMessage::response_to(request);
        response.subscription = Some(subscription.clone());
        response.successful = Some(successful);
        if successful {
            self.inner.lock().subscriptions.push(subscription);
        } else {
            response.advice = Some(advice("retry", 0, false));
            let client_id = request.client_id.clone().unwrap_or_default();
            response.error = Some(
                ProtocolError::RepeatSubscribe.format(&format!("{client_id},{subscription}")),
            );
        }
        self.put_to_downstream(response);
    }

    pub fn unsubscribe(&self, router: &Router, request: &BayeuxMessage) {
        let subscription = request.subscription.clone().unwrap_or_default();
        let successful = router.remove_listener(&subscription, self);
        let mut response = BayeuxMessage::response_to(request);
        response.subscription = Some(subscription.clone());
        response.successful = Some(successful);
        if successful {
            self.inner.lock().subscriptions.retain(|s| s != &subscription);
        } else {
            response.advice = Some(advice("retry", 0, false));
            let client_id = request.client_id.clone().unwrap_or_default();
            response.error = Some(
                ProtocolError::UnknownChannel.format(&format!("{client_id},{subscription}")),
            );
        }
        self.put_to_downstream(response);
    }

    /// Fan an event out to subscribers and answer the publisher.
    pub fn publish(&self, router: &Router, request: &BayeuxMessage) {
        let mut deliver = BayeuxMessage::deliver_from(request);
        deliver.client_id = self.client_id();
        deliver.id = self.last_id();
        let successful = router.publish(&self.self_arc(), deliver);
        let mut response = BayeuxMessage::response_to(request);
        response.successful = Some(successful);
        if !successful {
            let client_id = request.client_id.clone().unwrap_or_default();
            let channel = request.channel.clone().unwrap_or_default();
            response.error =
                Some(ProtocolError::UnknownChannel.format(&format!("{client_id},{channel}")));
        }
        self.put_to_downstream(response);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Connection")
            .field("client_id", &*self.client_id.lock())
            .field("state", &inner.state)
            .field("subscriptions", &inner.subscriptions)
            .field("downstream_len", &inner.downstream.len())
            .finish()
    }
}

/// True when `a` is newer than `b`: the first differing character
/// decides, and a shared prefix (or equality) is "not newer".
fn compare_version(a: &str, b: &str) -> bool {
    for (ca, cb) in a.chars().zip(b.chars()) {
        if ca != cb {
            return ca > cb;
        }
    }
    false
}
