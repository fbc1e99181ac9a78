//! Router registry and fan-out tests

mod common;

use std::sync::Arc;

use common::{parse_batch, request, MockTransport};

use bayeux_core::BayeuxMessage;
use bayeux_router::{Connection, PeerInfo, Router, RouterConfig};

fn subscriber(router: &Router, pattern: &str) -> (Arc<Connection>, Arc<MockTransport>) {
    common::init_tracing();
    let conn = Connection::new(PeerInfo::default());
    router.add_connection(&conn);
    let client_id = conn.client_id().unwrap();
    conn.subscribe(
        router,
        &request(&format!(
            r#"{{"channel":"/meta/subscribe","clientId":"{client_id}","subscription":"{pattern}"}}"#
        )),
    );
    // Drain the subscribe response so later asserts see only events.
    let setup = MockTransport::new();
    conn.bind_transport(setup.handle());
    conn.flush();

    let transport = MockTransport::new();
    conn.bind_transport(transport.handle());
    (conn, transport)
}

#[test]
fn test_publish_reaches_exact_subscriber() {
    let router = Router::new(RouterConfig::default());
    let (_sub, sub_transport) = subscriber(&router, "/chat/demo");
    let (publisher, pub_transport) = subscriber(&router, "/other/place");
    let client_id = publisher.client_id().unwrap();

    publisher.publish(
        &router,
        &request(&format!(
            r#"{{"channel":"/chat/demo","clientId":"{client_id}","data":{{"text":"hi"}}}}"#
        )),
    );

    // Subscriber got the event immediately and its poll completed.
    let batch = parse_batch(&sub_transport.last_write().unwrap());
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].channel.as_deref(), Some("/chat/demo"));
    assert_eq!(
        batch[0].data.as_ref().and_then(|d| d.get("text")).and_then(|v| v.as_str()),
        Some("hi")
    );
    // Event carries the publisher's clientId.
    assert_eq!(batch[0].client_id.as_deref(), Some(client_id.as_str()));
    assert_eq!(sub_transport.close_count(), 1);

    // Publisher's transport saw nothing yet: its response is queued
    // until the dispatcher flushes.
    assert!(pub_transport.writes().is_empty());
    publisher.flush();
    let batch = parse_batch(&pub_transport.last_write().unwrap());
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].successful, Some(true));
}

#[test]
fn test_publish_to_wildcard_subscribers() {
    let router = Router::new(RouterConfig::default());
    let (_one, t_one) = subscriber(&router, "/chat/*");
    let (_two, t_two) = subscriber(&router, "/chat/**");
    let (_three, t_three) = subscriber(&router, "/game/*");
    let (publisher, _t) = subscriber(&router, "/elsewhere");
    let client_id = publisher.client_id().unwrap();

    publisher.publish(
        &router,
        &request(&format!(
            r#"{{"channel":"/chat/demo","clientId":"{client_id}","data":{{"n":1}}}}"#
        )),
    );

    assert_eq!(t_one.writes().len(), 1);
    assert_eq!(t_two.writes().len(), 1);
    assert!(t_three.writes().is_empty());
}

#[test]
fn test_self_subscribed_publisher_is_queued_not_sent() {
    let router = Router::new(RouterConfig::default());
    let (publisher, transport) = subscriber(&router, "/chat/demo");
    let client_id = publisher.client_id().unwrap();

    publisher.publish(
        &router,
        &request(&format!(
            r#"{{"channel":"/chat/demo","clientId":"{client_id}","data":{{"text":"hi"}}}}"#
        )),
    );

    // No immediate write: the publisher sees its own event alongside
    // the publish response on the next flush.
    assert!(transport.writes().is_empty());
    publisher.flush();
    let batch = parse_batch(&transport.last_write().unwrap());
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].channel.as_deref(), Some("/chat/demo"));
    assert_eq!(batch[1].successful, Some(true));
}

#[test]
fn test_publish_with_no_subscribers_still_succeeds() {
    let router = Router::new(RouterConfig::default());
    let publisher = Connection::new(PeerInfo::default());
    router.add_connection(&publisher);

    let deliver = BayeuxMessage {
        channel: Some("/lonely/channel".to_string()),
        data: Some(bayeux_core::BayeuxValue::Object(vec![])),
        ..BayeuxMessage::default()
    };
    assert!(router.publish(&publisher, deliver));
}

#[test]
fn test_publish_rejects_invalid_deliverable() {
    let router = Router::new(RouterConfig::default());
    let publisher = Connection::new(PeerInfo::default());

    // Meta channel.
    let deliver = BayeuxMessage {
        channel: Some("/meta/connect".to_string()),
        data: Some(bayeux_core::BayeuxValue::Object(vec![])),
        ..BayeuxMessage::default()
    };
    assert!(!router.publish(&publisher, deliver));

    // No data.
    let deliver = BayeuxMessage {
        channel: Some("/chat/demo".to_string()),
        ..BayeuxMessage::default()
    };
    assert!(!router.publish(&publisher, deliver));
}

#[test]
fn test_remove_connection_drops_its_subscriptions() {
    let router = Router::new(RouterConfig::default());
    let (sub, _t) = subscriber(&router, "/chat/demo");
    let (publisher, _pt) = subscriber(&router, "/elsewhere");
    let client_id = publisher.client_id().unwrap();

    assert!(router.remove_connection(&sub));

    let fresh = MockTransport::new();
    sub.bind_transport(fresh.handle());
    publisher.publish(
        &router,
        &request(&format!(
            r#"{{"channel":"/chat/demo","clientId":"{client_id}","data":{{"n":1}}}}"#
        )),
    );
    assert!(fresh.writes().is_empty());
}

#[test]
fn test_wildcard_removal_leaves_stale_empty_key() {
    let router = Router::new(RouterConfig::default());
    let conn = Connection::new(PeerInfo::default());
    router.add_connection(&conn);
    assert!(router.add_listener("/chat/demo", &conn));
    assert_eq!(router.count_subscriptions(), 1);

    // The wildcard query empties the /chat/demo list, but the cleanup
    // keys on the query itself, so the empty entry stays behind.
    assert!(router.remove_listener("/chat/*", &conn));
    assert_eq!(router.count_subscriptions(), 1);

    // The stale entry has no listeners, so delivery finds nobody.
    let transport = MockTransport::new();
    conn.bind_transport(transport.handle());
    let deliver = BayeuxMessage {
        channel: Some("/chat/demo".to_string()),
        data: Some(bayeux_core::BayeuxValue::Object(vec![])),
        ..BayeuxMessage::default()
    };
    let publisher = Connection::new(PeerInfo::default());
    assert!(router.publish(&publisher, deliver));
    assert!(transport.writes().is_empty());
}

#[test]
fn test_stranger_removal_does_not_sweep_stale_key() {
    let router = Router::new(RouterConfig::default());
    let conn = Connection::new(PeerInfo::default());
    router.add_connection(&conn);
    assert!(router.add_listener("/chat/demo", &conn));

    // Wildcard removal empties the list but the cleanup keys on the
    // query, leaving the empty entry behind.
    assert!(router.remove_listener("/chat/*", &conn));
    assert_eq!(router.count_subscriptions(), 1);

    // A connection that never subscribed removes nothing, so its
    // exact-key removal must not drop the stale entry either.
    let stranger = Connection::new(PeerInfo::default());
    assert!(router.remove_listener("/chat/demo", &stranger));
    assert_eq!(router.count_subscriptions(), 1);
}

#[test]
fn test_exact_removal_drops_key() {
    let router = Router::new(RouterConfig::default());
    let conn = Connection::new(PeerInfo::default());
    router.add_connection(&conn);
    assert!(router.add_listener("/chat/demo", &conn));
    assert!(router.remove_listener("/chat/demo", &conn));
    assert_eq!(router.count_subscriptions(), 0);
}

#[test]
fn test_clear_closes_bound_transports() {
    let router = Router::new(RouterConfig::default());
    let (_a, ta) = subscriber(&router, "/chat/a");
    let (_b, tb) = subscriber(&router, "/chat/b");

    router.clear();
    assert_eq!(router.count_connections(), 0);
    assert_eq!(router.count_subscriptions(), 0);
    assert_eq!(ta.close_count(), 1);
    assert_eq!(tb.close_count(), 1);
}

#[test]
fn test_require_connection() {
    let router = Router::new(RouterConfig::default());
    let conn = Connection::new(PeerInfo::default());
    router.add_connection(&conn);
    let id = conn.client_id().unwrap();

    assert!(router.require_connection(&id).is_ok());
    assert!(router.require_connection("missing").is_err());
}
