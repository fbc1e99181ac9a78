//! Request dispatch
//!
//! The boundary between whatever parsed the HTTP request and the
//! protocol engine. The caller hands over the decoded payload, the
//! request metadata, and the reply transport; dispatch resolves the
//! connection each message belongs to, runs the classified requests
//! through the connection actions, and flushes the response.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, warn};

use bayeux_core::channel::META_CONNECT;
use bayeux_core::factory;
use bayeux_core::time::current_timestamp;
use bayeux_core::{json, messages_to_json, BayeuxMessage, BayeuxValue, MessageKind};

use crate::connection::{Connection, PeerInfo};
use crate::error::Result;
use crate::router::Router;
use crate::transport::TransportHandle;

/// Metadata of one inbound HTTP request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub requested_uri: Option<String>,
    /// Host header value, when the request carried one
    pub requested_host: Option<String>,
    pub client_addr: Option<SocketAddr>,
    pub server_addr: Option<SocketAddr>,
    /// JSONP callback name from the query string
    pub jsonp: Option<String>,
}

/// Parse a raw request body and process it. Blank bodies are ignored;
/// malformed JSON is a decode error for the caller to turn into an
/// HTTP-level failure.
pub fn process_payload(
    router: &Router,
    body: &str,
    ctx: &RequestContext,
    transport: &TransportHandle,
) -> Result<Option<Arc<Connection>>> {
    match json::parse(body)? {
        Some(value) => Ok(process(router, &value, ctx, transport)),
        None => Ok(None),
    }
}

/// Process one decoded request payload. Returns the connection the
/// batch resolved to, already flushed.
pub fn process(
    router: &Router,
    payload: &BayeuxValue,
    ctx: &RequestContext,
    transport: &TransportHandle,
) -> Option<Arc<Connection>> {
    let items = payload.as_array()?;
    if items.is_empty() {
        return None;
    }

    let mut connection: Option<Arc<Connection>> = None;
    for item in items {
        if item.as_object().is_none() {
            warn!("skipping non-object element in request batch");
            continue;
        }
        let bayeux = factory::create(item);

        let conn = match bayeux
            .client_id
            .as_deref()
            .and_then(|id| router.connection(id))
        {
            Some(existing) => {
                if existing.is_rebinding(transport) {
                    release_superseded_poll(&existing);
                }
                existing
            }
            // First sight of this client (handshake, or a clientId the
            // registry no longer knows): a fresh unregistered
            // connection carrying the request metadata.
            None => Connection::new(PeerInfo {
                requested_uri: ctx.requested_uri.clone(),
                requested_host: ctx
                    .requested_host
                    .clone()
                    .or_else(|| ctx.server_addr.map(|a| a.to_string())),
                client_addr: ctx.client_addr,
                server_addr: ctx.server_addr,
            }),
        };

        conn.bind_transport(Arc::clone(transport));
        conn.set_last_id(bayeux.id.clone());
        if let Some(jsonp) = ctx.jsonp.as_deref() {
            if !jsonp.is_empty() {
                conn.set_jsonp(jsonp.to_string());
            }
        }

        match factory::classify(&bayeux) {
            Some(kind) => {
                if kind == MessageKind::Handshake {
                    router.add_connection(&conn);
                }
                conn.put_to_upstream(kind, bayeux);
            }
            None => {
                debug!(channel = bayeux.channel.as_deref(), "dropping unclassifiable message");
            }
        }
        connection = Some(conn);
    }

    if let Some(conn) = &connection {
        while let Some((kind, request)) = conn.poll_upstream() {
            conn.apply(router, kind, &request);
        }
        conn.flush();
    }
    connection
}

/// The client polled again while an older transport was still bound:
/// answer the old poll with a successful connect response and close
/// it, so the client's previous request completes cleanly.
fn release_superseded_poll(connection: &Connection) {
    let release = BayeuxMessage {
        channel: Some(META_CONNECT.to_string()),
        client_id: connection.client_id(),
        successful: Some(true),
        id: connection.last_id(),
        timestamp: Some(current_timestamp()),
        ..BayeuxMessage::default()
    };
    debug!(client_id = ?connection.client_id(), "releasing superseded poll");
    connection.send_raw(&messages_to_json(&[release]));
}
