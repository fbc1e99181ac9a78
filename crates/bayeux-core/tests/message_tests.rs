//! Message model and classification tests

use bayeux_core::factory::{classify, create};
use bayeux_core::json::parse;
use bayeux_core::{
    advice, messages_to_json, BayeuxMessage, BayeuxValue, ConnectionType, MessageKind,
    ProtocolError,
};

fn request(text: &str) -> BayeuxMessage {
    create(&parse(text).unwrap().unwrap())
}

#[test]
fn test_full_handshake_request() {
    let msg = request(
        r#"{"channel":"/meta/handshake","version":"1.0beta","minimumVersion":"1.0beta","supportedConnectionTypes":["long-polling","callback-polling"],"ext":{"json-comment-filtered":true},"id":"1"}"#,
    );
    assert_eq!(classify(&msg), Some(MessageKind::Handshake));
    assert_eq!(
        msg.supported_connection_types,
        vec![ConnectionType::LongPolling, ConnectionType::CallbackPolling]
    );
    assert_eq!(
        msg.ext
            .as_ref()
            .and_then(|e| e.get("json-comment-filtered"))
            .and_then(|v| v.as_bool()),
        Some(true)
    );
}

#[test]
fn test_classification_precedence_is_first_match() {
    // A subscribe that lacks a subscription matches nothing rather than
    // falling through to publish.
    let msg = request(r#"{"channel":"/meta/subscribe","clientId":"abc"}"#);
    assert_eq!(classify(&msg), None);
}

#[test]
fn test_unclassifiable_messages() {
    for text in [
        r#"{"channel":"/meta/unknown"}"#,
        r#"{"channel":"/meta"}"#,
        r#"{"channel":"nochannel","data":{}}"#,
        r#"{"data":{"x":1}}"#,
    ] {
        let msg = request(text);
        assert_eq!(classify(&msg), None, "should not classify: {text}");
    }
}

#[test]
fn test_advice_object_shape() {
    let a = advice("retry", 0, false);
    assert_eq!(
        bayeux_core::json::to_json(&a),
        r#"{"reconnect":"retry","interval":0,"multiple-clients":false}"#
    );
}

#[test]
fn test_error_field_round_trip() {
    let mut resp = BayeuxMessage {
        channel: Some("/meta/subscribe".to_string()),
        successful: Some(false),
        ..BayeuxMessage::default()
    };
    resp.error = Some(ProtocolError::RepeatSubscribe.format("abc,/chat/demo"));

    let text = resp.to_json();
    let back = request(&text);
    assert_eq!(back.error.as_deref(), Some("406:abc,/chat/demo:Repeat subscribe"));
    assert_eq!(back.successful, Some(false));
}

#[test]
fn test_batch_serialization_is_parseable() {
    let deliver = BayeuxMessage {
        channel: Some("/chat/demo".to_string()),
        client_id: Some("abc".to_string()),
        data: Some(BayeuxValue::Object(vec![(
            "text".to_string(),
            "hello".into(),
        )])),
        ..BayeuxMessage::default()
    };
    let text = messages_to_json(&[deliver.clone(), deliver]);
    let parsed = parse(&text).unwrap().unwrap();
    let items = parsed.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(
        items[0].get("data").and_then(|d| d.get("text")).and_then(|v| v.as_str()),
        Some("hello")
    );
}

#[test]
fn test_deliver_carries_data_and_identity() {
    let publish = request(
        r#"{"channel":"/chat/demo","clientId":"abc","data":{"text":"hi"},"id":"9"}"#,
    );
    let mut event = BayeuxMessage::deliver_from(&publish);
    event.client_id = Some("publisher-conn".to_string());

    assert!(event.is_valid_deliver());
    assert_eq!(event.channel.as_deref(), Some("/chat/demo"));
    assert_eq!(event.data, publish.data);
    assert!(event.timestamp.is_some());
}
