//! Connection registry and publish fan-out
//!
//! The router owns two maps, connections by clientId and subscriber
//! lists by channel pattern, guarded together by one mutex so a
//! publish never sees a half-updated registry. Delivery happens after
//! the lock is released; a slow transport cannot wedge the registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace};
use uuid::Uuid;

use bayeux_core::channel::prefix_match;
use bayeux_core::{BayeuxMessage, ConnectionType, BAYEUX_MINIMUM_VERSION, BAYEUX_VERSION};

use crate::connection::Connection;
use crate::error::{Result, RouterError};

/// Router configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Server name, for logging only
    pub name: String,
    /// Protocol version the server speaks
    pub version: String,
    /// Oldest client version accepted
    pub minimum_version: String,
    /// Connection types the server serves
    pub connection_types: Vec<ConnectionType>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            name: "Bayeux Router".to_string(),
            version: BAYEUX_VERSION.to_string(),
            minimum_version: BAYEUX_MINIMUM_VERSION.to_string(),
            connection_types: bayeux_core::SERVER_CONNECTION_TYPES.to_vec(),
        }
    }
}

struct Registry {
    connections: HashMap<String, Arc<Connection>>,
    subscriptions: HashMap<String, Vec<Arc<Connection>>>,
}

/// The hub holding every connection and subscription.
pub struct Router {
    config: RouterConfig,
    registry: Mutex<Registry>,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        info!(name = %config.name, version = %config.version, "router created");
        Self {
            config,
            registry: Mutex::new(Registry {
                connections: HashMap::new(),
                subscriptions: HashMap::new(),
            }),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Look up a connection by clientId.
    pub fn connection(&self, client_id: &str) -> Option<Arc<Connection>> {
        self.registry.lock().connections.get(client_id).cloned()
    }

    /// Like [`Router::connection`] but an error when absent, for
    /// callers publishing from outside the protocol flow.
    pub fn require_connection(&self, client_id: &str) -> Result<Arc<Connection>> {
        self.connection(client_id)
            .ok_or_else(|| RouterError::ConnectionNotFound(client_id.to_string()))
    }

    /// Snapshot of all registered connections.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.registry.lock().connections.values().cloned().collect()
    }

    pub fn count_connections(&self) -> usize {
        self.registry.lock().connections.len()
    }

    pub fn count_subscriptions(&self) -> usize {
        self.registry.lock().subscriptions.len()
    }

    /// Register a connection under a freshly allocated clientId.
    pub fn add_connection(&self, connection: &Arc<Connection>) {
        let mut registry = self.registry.lock();
        let client_id = loop {
            let candidate = generate_client_id();
            if !registry.connections.contains_key(&candidate) {
                break candidate;
            }
        };
        connection.set_client_id(client_id.clone());
        registry
            .connections
            .insert(client_id.clone(), Arc::clone(connection));
        info!(client_id = %client_id, total = registry.connections.len(), "connection registered");
    }

    /// Unregister a connection and all its subscriptions. False when
    /// the clientId was never registered.
    pub fn remove_connection(&self, connection: &Connection) -> bool {
        let Some(client_id) = connection.client_id() else {
            return false;
        };
        let mut registry = self.registry.lock();
        if !registry.connections.contains_key(&client_id) {
            return false;
        }
        for subscription in connection.subscriptions() {
            remove_listener_locked(&mut registry, &subscription, connection);
        }
        registry.connections.remove(&client_id);
        info!(client_id = %client_id, total = registry.connections.len(), "connection removed");
        true
    }

    /// Subscribe a connection to a channel pattern. False on a
    /// duplicate subscription.
    pub fn add_listener(&self, subscription: &str, connection: &Arc<Connection>) -> bool {
        // One trailing slash is tolerated and normalized away.
        let key = subscription.strip_suffix('/').unwrap_or(subscription);
        let mut registry = self.registry.lock();
        let listeners = registry.subscriptions.entry(key.to_string()).or_default();
        if listeners
            .iter()
            .any(|c| std::ptr::eq(Arc::as_ptr(c), Arc::as_ptr(connection)))
        {
            return false;
        }
        listeners.push(Arc::clone(connection));
        debug!(subscription = %key, "listener added");
        true
    }

    /// Drop a connection from every entry the query matches. Always
    /// reports success, even for channels nobody subscribed to.
    pub fn remove_listener(&self, subscription: &str, connection: &Connection) -> bool {
        let mut registry = self.registry.lock();
        remove_listener_locked(&mut registry, subscription, connection);
        debug!(subscription = %subscription, "listener removed");
        true
    }

    /// Fan `deliver` out to every connection subscribed to a matching
    /// pattern. The publisher only gets the event queued; everyone
    /// else gets an immediate send, which completes their pending
    /// poll. Returns false without delivering when the event is not a
    /// valid deliverable.
    pub fn publish(&self, publisher: &Arc<Connection>, deliver: BayeuxMessage) -> bool {
        if !deliver.is_valid_deliver() {
            return false;
        }
        let channel = match deliver.channel.as_deref() {
            Some(ch) if !ch.is_empty() => ch.to_string(),
            _ => return false,
        };

        let targets: Vec<Arc<Connection>> = {
            let registry = self.registry.lock();
            let keys: Vec<&str> = registry.subscriptions.keys().map(String::as_str).collect();
            let mut matched: Vec<Arc<Connection>> = Vec::new();
            for key in prefix_match(&channel, keys) {
                if let Some(listeners) = registry.subscriptions.get(&key) {
                    for conn in listeners {
                        if !matched
                            .iter()
                            .any(|c| std::ptr::eq(Arc::as_ptr(c), Arc::as_ptr(conn)))
                        {
                            matched.push(Arc::clone(conn));
                        }
                    }
                }
            }
            matched
        };

        trace!(channel = %channel, targets = targets.len(), "publishing event");
        for target in &targets {
            if std::ptr::eq(Arc::as_ptr(target), Arc::as_ptr(publisher)) {
                target.put_to_downstream(deliver.clone());
            } else {
                target.send(deliver.clone());
            }
        }
        true
    }

    /// Drop every subscription and connection, closing each bound
    /// transport.
    pub fn clear(&self) {
        let connections: Vec<Arc<Connection>> = {
            let mut registry = self.registry.lock();
            registry.subscriptions.clear();
            let connections = registry.connections.values().cloned().collect();
            registry.connections.clear();
            connections
        };
        for connection in &connections {
            connection.close();
        }
        info!(closed = connections.len(), "router cleared");
    }
}

fn remove_listener_locked(registry: &mut Registry, query: &str, connection: &Connection) {
    let keys: Vec<&str> = registry.subscriptions.keys().map(String::as_str).collect();
    let matched = prefix_match(query, keys);
    let mut drop_query_key = false;
    for key in matched {
        if let Some(listeners) = registry.subscriptions.get_mut(&key) {
            let before = listeners.len();
            listeners.retain(|c| !std::ptr::eq(Arc::as_ptr(c), connection as *const Connection));
            if listeners.len() < before && listeners.is_empty() {
                // The emptiness cleanup keys on the original query, not
                // the matched entry, and only fires when this connection
                // was actually removed. A wildcard removal can leave
                // empty lists behind under other keys; they are harmless
                // and a stranger's later removal does not sweep them.
                drop_query_key = true;
            }
        }
    }
    if drop_query_key {
        registry.subscriptions.remove(query);
    }
}

/// 16 hex chars from the high half of a v4 uuid.
fn generate_client_id() -> String {
    format!("{:x}", Uuid::new_v4().as_u64_pair().0)
}
